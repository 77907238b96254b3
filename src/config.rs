use std::env;
use std::time::Duration;

use crate::error::ConfigError;
use crate::value_rank::{BEST_VALUE_MIN_PROBABILITY, RankParams, SHORTLIST_LEN};

const DEFAULT_API_BASE: &str = "http://localhost:8080/api";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub api_base: String,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    pub live_poll_interval: Duration,
    pub countdown_tick: Duration,
    pub unlock_cost: u64,
    pub fail_open_on_unauthorized: bool,
    pub rank: RankParams,
    pub log_level: String,
    pub log_format: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_token: None,
            request_timeout: Duration::from_secs(10),
            live_poll_interval: Duration::from_secs(30),
            countdown_tick: Duration::from_millis(1000),
            unlock_cost: 5,
            fail_open_on_unauthorized: true,
            rank: RankParams::default(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_base = env::var("INSIGHT_API_BASE")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.api_base);
        if !(api_base.starts_with("http://") || api_base.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "INSIGHT_API_BASE",
                reason: format!("expected an http(s) url, got {api_base}"),
            });
        }
        let api_token = env::var("INSIGHT_API_TOKEN")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            api_base,
            api_token,
            request_timeout: Duration::from_secs(env_u64("REQUEST_TIMEOUT_SECS", 10).clamp(1, 60)),
            live_poll_interval: Duration::from_secs(env_u64("LIVE_POLL_SECS", 30).clamp(5, 300)),
            countdown_tick: Duration::from_millis(
                env_u64("QUOTA_COUNTDOWN_TICK_MS", 1000).clamp(50, 5000),
            ),
            unlock_cost: env_u64("ANALYSIS_UNLOCK_COST", defaults.unlock_cost).clamp(1, 1000),
            fail_open_on_unauthorized: env_bool("QUOTA_FAIL_OPEN_ON_UNAUTHORIZED", true),
            rank: RankParams {
                best_value_min_probability: env::var("BEST_VALUE_MIN_PROBABILITY")
                    .ok()
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .filter(|v| v.is_finite())
                    .unwrap_or(BEST_VALUE_MIN_PROBABILITY)
                    .clamp(0.0, 100.0),
                shortlist_len: env_u64("SHORTLIST_LEN", SHORTLIST_LEN as u64).clamp(1, 20)
                    as usize,
            },
            log_level: env::var("LOG_LEVEL")
                .ok()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.log_level),
            log_format: env::var("LOG_FORMAT")
                .ok()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.log_format),
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| {
            let t = v.trim().to_ascii_lowercase();
            !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
        })
        .unwrap_or(default)
}
