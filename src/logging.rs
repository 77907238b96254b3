use tracing_subscriber::{EnvFilter, fmt};

use crate::config::EngineConfig;

/// Install the global tracing subscriber. `RUST_LOG` overrides the configured level.
pub fn init(cfg: &EngineConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    match cfg.log_format.as_str() {
        "json" => {
            fmt().json().with_env_filter(filter).init();
        }
        _ => {
            fmt().with_env_filter(filter).init();
        }
    }
}
