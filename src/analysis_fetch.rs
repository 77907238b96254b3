use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::api::PredictionApi;
use crate::catalog::{CornerCardAnalysis, H2hAnalysis, MarketOdds, build_catalog};
use crate::error::ApiError;
use crate::state::{CandidateOutcome, FixtureRef, PlayerImpact, TeamLineup};
use crate::value_rank::{RankParams, Shortlists, rank_with};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AnalysisSource {
    HeadToHead,
    CornersCards,
    Odds,
    PlayerImpact,
    Lineups,
}

impl fmt::Display for AnalysisSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::HeadToHead => "head-to-head",
            Self::CornersCards => "corners/cards",
            Self::Odds => "odds",
            Self::PlayerImpact => "player impact",
            Self::Lineups => "lineups",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceFailure {
    pub source: AnalysisSource,
    pub error: ApiError,
}

impl SourceFailure {
    pub fn is_retryable(&self) -> bool {
        self.error.is_transient()
    }
}

/// Result of one full analysis fetch for a fixture view. Sources fail
/// independently; whatever arrived is still catalogued and ranked.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub fixture: FixtureRef,
    pub h2h: Option<H2hAnalysis>,
    pub corner_cards: Option<CornerCardAnalysis>,
    pub odds: Option<MarketOdds>,
    pub player_impact: Vec<PlayerImpact>,
    pub lineups: Vec<TeamLineup>,
    pub catalog: Vec<CandidateOutcome>,
    pub shortlists: Shortlists,
    pub failures: Vec<SourceFailure>,
}

impl AnalysisReport {
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failure(&self, source: AnalysisSource) -> Option<&SourceFailure> {
        self.failures.iter().find(|f| f.source == source)
    }

    /// Up to `n` players of one side, most influential first.
    pub fn key_players(&self, team_id: u64, n: usize) -> Vec<&PlayerImpact> {
        let mut players: Vec<&PlayerImpact> = self
            .player_impact
            .iter()
            .filter(|p| p.team_id == team_id)
            .collect();
        players.sort_by(|a, b| b.impact.abs().total_cmp(&a.impact.abs()));
        players.truncate(n);
        players
    }
}

pub async fn fetch_analysis(
    api: &dyn PredictionApi,
    fixture: &FixtureRef,
    params: &RankParams,
) -> AnalysisReport {
    let (h2h, corner_cards, odds, player_impact, lineups) = tokio::join!(
        api.h2h_analysis(fixture),
        api.corner_card_analysis(fixture),
        api.market_odds(fixture),
        api.player_impact(fixture),
        api.lineups(fixture),
    );

    let mut failures = Vec::new();
    let h2h = keep(h2h, AnalysisSource::HeadToHead, &mut failures).flatten();
    let corner_cards = keep(corner_cards, AnalysisSource::CornersCards, &mut failures).flatten();
    let odds = keep(odds, AnalysisSource::Odds, &mut failures).flatten();
    let player_impact =
        keep(player_impact, AnalysisSource::PlayerImpact, &mut failures).unwrap_or_default();
    let lineups = keep(lineups, AnalysisSource::Lineups, &mut failures).unwrap_or_default();

    let catalog = build_catalog(
        h2h.as_ref(),
        corner_cards.as_ref(),
        odds.as_ref(),
        &fixture.home_name,
        &fixture.away_name,
    );
    let shortlists = rank_with(&catalog, params);
    debug!(
        fixture = %fixture.fixture_id,
        candidates = catalog.len(),
        failures = failures.len(),
        "analysis built"
    );

    AnalysisReport {
        fixture: fixture.clone(),
        h2h,
        corner_cards,
        odds,
        player_impact,
        lineups,
        catalog,
        shortlists,
        failures,
    }
}

fn keep<T>(
    result: Result<T, ApiError>,
    source: AnalysisSource,
    failures: &mut Vec<SourceFailure>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(%source, %error, "analysis source failed");
            failures.push(SourceFailure { source, error });
            None
        }
    }
}
