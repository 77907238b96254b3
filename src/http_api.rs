use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::api::{BalanceApi, BalanceOutcome, LiveDataApi, PredictionApi, QuotaApi, QuotaDecision};
use crate::catalog::{CornerCardAnalysis, H2hAnalysis, MarketOdds};
use crate::config::EngineConfig;
use crate::error::ApiError;
use crate::http_cache::fetch_json_cached;
use crate::http_client::{http_client, read_body};
use crate::state::{
    FixtureRef, Goals, LiveState, MatchEvent, MatchStatus, PlayerImpact, StatisticItem,
    TeamLineup, TeamStatisticsEntry,
};

/// REST client for the insight backend; implements every collaborator trait.
#[derive(Debug, Clone)]
pub struct HttpApi {
    base: String,
    token: Option<String>,
    client: &'static Client,
}

impl HttpApi {
    pub fn new(cfg: &EngineConfig) -> Result<Self> {
        Ok(Self {
            base: cfg.api_base.clone(),
            token: cfg.api_token.clone(),
            client: http_client(cfg.request_timeout)?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get_prediction(&self, path: &str, fixture: &FixtureRef) -> Result<String, ApiError> {
        let req = self.authed(self.client.get(self.url(path))).query(&[
            ("homeTeamId", fixture.home_team_id.to_string()),
            ("awayTeamId", fixture.away_team_id.to_string()),
            ("competition", fixture.competition.clone()),
        ]);
        read_body(req.send().await?).await
    }

    async fn get_cached(&self, path: &str) -> Result<String, ApiError> {
        let url = self.url(path);
        let req = self.authed(self.client.get(&url));
        fetch_json_cached(req, &url).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<String, ApiError> {
        let req = self.authed(self.client.post(self.url(path))).json(&body);
        read_body(req.send().await?).await
    }
}

#[async_trait]
impl PredictionApi for HttpApi {
    async fn h2h_analysis(&self, fixture: &FixtureRef) -> Result<Option<H2hAnalysis>, ApiError> {
        let body = self.get_prediction("predictions/h2h", fixture).await?;
        parse_h2h_json(&body).map_err(ApiError::decode)
    }

    async fn corner_card_analysis(
        &self,
        fixture: &FixtureRef,
    ) -> Result<Option<CornerCardAnalysis>, ApiError> {
        let body = self
            .get_prediction("predictions/corners-cards", fixture)
            .await?;
        parse_corner_card_json(&body).map_err(ApiError::decode)
    }

    async fn market_odds(&self, fixture: &FixtureRef) -> Result<Option<MarketOdds>, ApiError> {
        let body = self.get_prediction("predictions/odds", fixture).await?;
        parse_odds_json(&body).map_err(ApiError::decode)
    }

    async fn player_impact(&self, fixture: &FixtureRef) -> Result<Vec<PlayerImpact>, ApiError> {
        let body = self
            .get_prediction("predictions/player-impact", fixture)
            .await?;
        parse_player_impact_json(&body).map_err(ApiError::decode)
    }

    async fn lineups(&self, fixture: &FixtureRef) -> Result<Vec<TeamLineup>, ApiError> {
        let body = self
            .get_cached(&format!("fixtures/{}/lineups", fixture.fixture_id))
            .await?;
        parse_lineups_json(&body).map_err(ApiError::decode)
    }
}

#[async_trait]
impl LiveDataApi for HttpApi {
    async fn live_state(&self, fixture_id: &str) -> Result<Option<LiveState>, ApiError> {
        let body = self.get_cached(&format!("live/{fixture_id}")).await?;
        parse_live_state_json(&body).map_err(ApiError::decode)
    }

    async fn statistics(&self, fixture_id: &str) -> Result<Vec<TeamStatisticsEntry>, ApiError> {
        let body = self
            .get_cached(&format!("live/{fixture_id}/statistics"))
            .await?;
        parse_statistics_json(&body).map_err(ApiError::decode)
    }
}

#[async_trait]
impl QuotaApi for HttpApi {
    async fn record(
        &self,
        match_key: &str,
        override_paid: bool,
    ) -> Result<QuotaDecision, ApiError> {
        let body = self
            .post(
                "quota/record",
                json!({ "matchKey": match_key, "override": override_paid }),
            )
            .await?;
        parse_quota_json(&body).map_err(ApiError::decode)
    }
}

#[async_trait]
impl BalanceApi for HttpApi {
    async fn balance(&self) -> Result<u64, ApiError> {
        let req = self.authed(self.client.get(self.url("wallet/balance")));
        let body = read_body(req.send().await?).await?;
        parse_balance_json(&body).map_err(ApiError::decode)
    }

    async fn use_for_analysis(&self) -> Result<BalanceOutcome, ApiError> {
        let body = self.post("wallet/use-for-analysis", json!({})).await?;
        let outcome: Option<BalanceOutcome> =
            parse_optional_json(&body, "balance outcome").map_err(ApiError::decode)?;
        outcome.ok_or_else(|| ApiError::decode("empty balance outcome"))
    }
}

pub fn parse_h2h_json(raw: &str) -> Result<Option<H2hAnalysis>> {
    parse_optional_json(raw, "h2h analysis")
}

pub fn parse_corner_card_json(raw: &str) -> Result<Option<CornerCardAnalysis>> {
    parse_optional_json(raw, "corner/card analysis")
}

pub fn parse_odds_json(raw: &str) -> Result<Option<MarketOdds>> {
    parse_optional_json(raw, "odds")
}

/// Malformed rows are dropped rather than failing the whole payload.
pub fn parse_player_impact_json(raw: &str) -> Result<Vec<PlayerImpact>> {
    let Some(root) = unwrap_envelope(raw, "player impact")? else {
        return Ok(Vec::new());
    };
    let rows = root
        .get("players")
        .and_then(Value::as_array)
        .or_else(|| root.as_array())
        .context("player impact is not a list")?;
    Ok(rows
        .iter()
        .filter_map(|row| serde_json::from_value::<PlayerImpact>(row.clone()).ok())
        .collect())
}

pub fn parse_lineups_json(raw: &str) -> Result<Vec<TeamLineup>> {
    Ok(parse_optional_json::<Vec<TeamLineup>>(raw, "lineups")?.unwrap_or_default())
}

pub fn parse_quota_json(raw: &str) -> Result<QuotaDecision> {
    parse_optional_json(raw, "quota decision")?.context("empty quota decision")
}

pub fn parse_balance_json(raw: &str) -> Result<u64> {
    let Some(root) = unwrap_envelope(raw, "balance")? else {
        return Err(anyhow::anyhow!("empty balance"));
    };
    let value = root.get("balance").unwrap_or(&root);
    as_u64(value).context("balance is not a non-negative number")
}

/// Accepts the flat `{status, elapsed, goals, events}` shape as well as the
/// nested provider shape (`fixture.status.short`, `time.elapsed`, `team.id`).
pub fn parse_live_state_json(raw: &str) -> Result<Option<LiveState>> {
    let Some(root) = unwrap_envelope(raw, "live state")? else {
        return Ok(None);
    };
    let root = first_if_array(root);
    if root.is_null() {
        return Ok(None);
    }

    let fixture_status = root.get("fixture").and_then(|f| f.get("status"));
    let status_code = root
        .get("status")
        .and_then(|s| s.as_str().map(str::to_string).or_else(|| pick_string(s, &["short"])))
        .or_else(|| fixture_status.and_then(|s| pick_string(s, &["short"])));
    let Some(status_code) = status_code else {
        return Ok(None);
    };
    let elapsed = root
        .get("elapsed")
        .and_then(as_u32)
        .or_else(|| fixture_status.and_then(|s| s.get("elapsed")).and_then(as_u32));
    let goals = root
        .get("goals")
        .map(|g| Goals {
            home: g.get("home").and_then(as_u32).unwrap_or(0),
            away: g.get("away").and_then(as_u32).unwrap_or(0),
        })
        .unwrap_or_default();
    let events = root
        .get("events")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_event).collect())
        .unwrap_or_default();

    Ok(Some(LiveState {
        status: MatchStatus::from_code(&status_code),
        elapsed,
        goals,
        events,
    }))
}

pub fn parse_statistics_json(raw: &str) -> Result<Vec<TeamStatisticsEntry>> {
    let Some(root) = unwrap_envelope(raw, "statistics")? else {
        return Ok(Vec::new());
    };
    let Some(rows) = root.as_array() else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let team_id = row
            .get("teamId")
            .and_then(as_u64)
            .or_else(|| row.get("team").and_then(|t| t.get("id")).and_then(as_u64));
        let Some(team_id) = team_id else { continue };
        let statistics = row
            .get("statistics")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let kind = pick_string(item, &["type", "name"])?;
                        Some(StatisticItem {
                            kind,
                            value: item.get("value").cloned().unwrap_or(Value::Null),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        out.push(TeamStatisticsEntry {
            team_id,
            statistics,
        });
    }
    Ok(out)
}

fn parse_event(item: &Value) -> Option<MatchEvent> {
    let kind = pick_string(item, &["type"])?;
    let time = item.get("time");
    let elapsed = item
        .get("elapsed")
        .or_else(|| time.and_then(|t| t.get("elapsed")))
        .and_then(as_u32);
    let extra = item
        .get("extra")
        .or_else(|| time.and_then(|t| t.get("extra")))
        .and_then(as_u32);
    let team_id = item
        .get("teamId")
        .and_then(as_u64)
        .or_else(|| item.get("team").and_then(|t| t.get("id")).and_then(as_u64));
    let player = item.get("player").and_then(|p| {
        p.as_str()
            .map(str::to_string)
            .or_else(|| pick_string(p, &["name"]))
    });
    Some(MatchEvent {
        elapsed,
        extra,
        team_id,
        kind,
        detail: pick_string(item, &["detail"]).unwrap_or_default(),
        player,
    })
}

fn parse_optional_json<T: DeserializeOwned>(raw: &str, what: &str) -> Result<Option<T>> {
    let Some(root) = unwrap_envelope(raw, what)? else {
        return Ok(None);
    };
    let parsed = serde_json::from_value(root).with_context(|| format!("invalid {what} json"))?;
    Ok(Some(parsed))
}

/// Empty bodies and `null` (bare or under `data`/`response`) read as `None`.
fn unwrap_envelope(raw: &str, what: &str) -> Result<Option<Value>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(None);
    }
    let mut root: Value =
        serde_json::from_str(trimmed).with_context(|| format!("invalid {what} json"))?;
    for key in ["data", "response"] {
        if let Some(inner) = root.get_mut(key) {
            root = inner.take();
            break;
        }
    }
    if root.is_null() {
        return Ok(None);
    }
    Ok(Some(root))
}

fn first_if_array(value: Value) -> Value {
    match value {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        Value::Array(_) => Value::Null,
        other => other,
    }
}

fn pick_string(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = value.get(*key).and_then(Value::as_str) {
            let s = s.trim();
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    None
}

fn as_u64(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    value.as_str().and_then(|s| s.trim().parse::<u64>().ok())
}

/// Out-of-range counts read as absent rather than wrapping.
fn as_u32(value: &Value) -> Option<u32> {
    as_u64(value).and_then(|n| u32::try_from(n).ok())
}
