//! Remote collaborators the engine consumes. All of them are keyed by the
//! authenticated user on the server side.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{CornerCardAnalysis, H2hAnalysis, MarketOdds};
use crate::error::ApiError;
use crate::state::{FixtureRef, LiveState, PlayerImpact, TeamLineup, TeamStatisticsEntry};

/// Per-fixture prediction and statistics analysis.
///
/// `Ok(None)` means the source has nothing for this fixture.
#[async_trait]
pub trait PredictionApi: Send + Sync {
    async fn h2h_analysis(&self, fixture: &FixtureRef) -> Result<Option<H2hAnalysis>, ApiError>;

    async fn corner_card_analysis(
        &self,
        fixture: &FixtureRef,
    ) -> Result<Option<CornerCardAnalysis>, ApiError>;

    async fn market_odds(&self, fixture: &FixtureRef) -> Result<Option<MarketOdds>, ApiError>;

    async fn player_impact(&self, fixture: &FixtureRef) -> Result<Vec<PlayerImpact>, ApiError>;

    async fn lineups(&self, fixture: &FixtureRef) -> Result<Vec<TeamLineup>, ApiError>;
}

#[async_trait]
pub trait LiveDataApi: Send + Sync {
    async fn live_state(&self, fixture_id: &str) -> Result<Option<LiveState>, ApiError>;

    async fn statistics(&self, fixture_id: &str) -> Result<Vec<TeamStatisticsEntry>, ApiError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaDecision {
    pub allowed: bool,
    #[serde(default)]
    pub reset_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub views_used_today: u32,
}

#[async_trait]
pub trait QuotaApi: Send + Sync {
    /// Record a view of `match_key` and report whether it may be shown.
    async fn record(&self, match_key: &str, override_paid: bool)
    -> Result<QuotaDecision, ApiError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceOutcome {
    pub success: bool,
    #[serde(default)]
    pub new_balance: u64,
}

#[async_trait]
pub trait BalanceApi: Send + Sync {
    async fn balance(&self) -> Result<u64, ApiError>;

    /// Spend the fixed analysis-unlock amount.
    async fn use_for_analysis(&self) -> Result<BalanceOutcome, ApiError>;
}
