use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value_rank;

/// One probability-annotated outcome for a single market on a fixture.
///
/// Rebuilt wholesale on every analysis fetch. `estimated_odds` and
/// `value_score` are always derived from `probability` and `market_odds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateOutcome {
    pub category: String,
    pub label: String,
    /// Percentage in `0..=100`.
    pub probability: f64,
    #[serde(default)]
    pub market_odds: Option<f64>,
    pub estimated_odds: f64,
    pub value_score: f64,
    pub reasoning: String,
}

impl CandidateOutcome {
    pub fn new(
        category: impl Into<String>,
        label: impl Into<String>,
        probability: f64,
        market_odds: Option<f64>,
        reasoning: impl Into<String>,
    ) -> Self {
        let market_odds = market_odds.filter(|o| o.is_finite() && *o > 0.0);
        let estimated_odds = value_rank::estimated_odds(probability, market_odds);
        Self {
            category: category.into(),
            label: label.into(),
            probability,
            market_odds,
            estimated_odds,
            value_score: value_rank::value_score(probability, estimated_odds),
            reasoning: reasoning.into(),
        }
    }
}

/// A user pick held by the selection ledger. At most one per `match_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub match_id: String,
    pub match_name: String,
    pub category: String,
    pub outcome: String,
    pub probability: f64,
}

impl Selection {
    pub fn from_candidate(fixture: &FixtureRef, candidate: &CandidateOutcome) -> Self {
        Self {
            match_id: fixture.fixture_id.clone(),
            match_name: fixture.display_name(),
            category: candidate.category.clone(),
            outcome: candidate.label.clone(),
            probability: candidate.probability,
        }
    }

    pub fn is_same_pick(&self, match_id: &str, category: &str, outcome: &str) -> bool {
        self.match_id == match_id && self.category == category && self.outcome == outcome
    }
}

/// Everything the engine needs to know about a fixture to fetch and key its data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureRef {
    pub fixture_id: String,
    pub home_team_id: u64,
    pub away_team_id: u64,
    pub home_name: String,
    pub away_name: String,
    pub competition: String,
}

impl FixtureRef {
    /// Key the quota collaborator counts views against.
    pub fn match_key(&self) -> String {
        format!(
            "{}-{}-{}",
            self.home_team_id, self.away_team_id, self.competition
        )
    }

    pub fn display_name(&self) -> String {
        format!("{} vs {}", self.home_name, self.away_name)
    }
}

/// Fixture lifecycle phase as reported by the live-match provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchStatus {
    #[serde(rename = "NS")]
    NotStarted,
    #[serde(rename = "1H")]
    FirstHalf,
    #[serde(rename = "HT")]
    HalfTime,
    #[serde(rename = "2H")]
    SecondHalf,
    #[serde(rename = "ET")]
    ExtraTime,
    #[serde(rename = "LIVE")]
    Live,
    #[serde(rename = "FT")]
    FullTime,
    #[serde(rename = "AET")]
    AfterExtraTime,
    #[serde(rename = "P", alias = "PEN")]
    Penalties,
    #[serde(other)]
    Unknown,
}

impl MatchStatus {
    pub fn from_code(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NS" => Self::NotStarted,
            "1H" => Self::FirstHalf,
            "HT" => Self::HalfTime,
            "2H" => Self::SecondHalf,
            "ET" => Self::ExtraTime,
            "LIVE" => Self::Live,
            "FT" => Self::FullTime,
            "AET" => Self::AfterExtraTime,
            "P" | "PEN" => Self::Penalties,
            _ => Self::Unknown,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::NotStarted => "NS",
            Self::FirstHalf => "1H",
            Self::HalfTime => "HT",
            Self::SecondHalf => "2H",
            Self::ExtraTime => "ET",
            Self::Live => "LIVE",
            Self::FullTime => "FT",
            Self::AfterExtraTime => "AET",
            Self::Penalties => "P",
            Self::Unknown => "?",
        }
    }

    pub fn is_in_play(self) -> bool {
        matches!(
            self,
            Self::FirstHalf | Self::HalfTime | Self::SecondHalf | Self::ExtraTime | Self::Live
        )
    }

    pub fn is_finished(self) -> bool {
        matches!(self, Self::FullTime | Self::AfterExtraTime | Self::Penalties)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goals {
    #[serde(default)]
    pub home: u32,
    #[serde(default)]
    pub away: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    #[serde(default)]
    pub elapsed: Option<u32>,
    #[serde(default)]
    pub extra: Option<u32>,
    #[serde(default)]
    pub team_id: Option<u64>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub player: Option<String>,
}

/// Statistics re-keyed from provider team ids to home/away roles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamStatistics {
    pub home: BTreeMap<String, Value>,
    pub away: BTreeMap<String, Value>,
}

impl TeamStatistics {
    pub fn is_empty(&self) -> bool {
        self.home.is_empty() && self.away.is_empty()
    }
}

/// Raw per-team statistics row as returned by the statistics endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStatisticsEntry {
    pub team_id: u64,
    #[serde(default)]
    pub statistics: Vec<StatisticItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: Value,
}

/// Payload of the live-state endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveState {
    pub status: MatchStatus,
    #[serde(default)]
    pub elapsed: Option<u32>,
    #[serde(default)]
    pub goals: Goals,
    #[serde(default)]
    pub events: Vec<MatchEvent>,
}

/// The merged picture of a fixture shown by the live-score panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub status: MatchStatus,
    pub elapsed: Option<u32>,
    pub goals: Goals,
    pub statistics: TeamStatistics,
    pub events: Vec<MatchEvent>,
}

impl From<LiveState> for LiveSnapshot {
    fn from(live: LiveState) -> Self {
        Self {
            status: live.status,
            elapsed: live.elapsed,
            goals: live.goals,
            statistics: TeamStatistics::default(),
            events: live.events,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineupPlayer {
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub number: Option<u32>,
    #[serde(default)]
    pub pos: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamLineup {
    pub team_id: u64,
    #[serde(default)]
    pub formation: Option<String>,
    #[serde(default)]
    pub starting: Vec<LineupPlayer>,
    #[serde(default)]
    pub substitutes: Vec<LineupPlayer>,
}

/// Modelled influence of one player on the fixture outcome.
///
/// `impact` is a signed probability swing in percentage points for the
/// player's own side; `samples` is how many past appearances back it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerImpact {
    pub team_id: u64,
    #[serde(default)]
    pub player_id: Option<u64>,
    pub name: String,
    pub impact: f64,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub samples: Option<u32>,
}

/// Client-side read-through copy of the quota collaborator's record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaState {
    pub match_key: String,
    pub allowed: bool,
    pub views_used_today: u32,
    pub reset_at: Option<DateTime<Utc>>,
    pub override_paid: bool,
}

/// A section-level update produced by one poll tick.
#[derive(Debug, Clone)]
pub enum SnapshotDelta {
    Live(LiveState),
    Statistics(TeamStatistics),
}

/// Merge one poll section into the current snapshot. Returns whether the
/// snapshot changed.
///
/// Live state replaces status/elapsed/goals/events together; statistics replace
/// the statistics section. Nothing else is touched, so a section that failed to
/// refresh keeps its last good value. Statistics are held back until live state
/// has merged once, since a snapshot without a scoreline would show a 0-0 that
/// never happened.
pub fn apply_snapshot_delta(current: &mut Option<LiveSnapshot>, delta: SnapshotDelta) -> bool {
    let Some(snapshot) = current.as_mut() else {
        return match delta {
            SnapshotDelta::Live(live) => {
                *current = Some(live.into());
                true
            }
            SnapshotDelta::Statistics(_) => false,
        };
    };
    match delta {
        SnapshotDelta::Live(live) => {
            snapshot.status = live.status;
            snapshot.elapsed = live.elapsed;
            snapshot.goals = live.goals;
            snapshot.events = live.events;
        }
        SnapshotDelta::Statistics(statistics) => {
            snapshot.statistics = statistics;
        }
    }
    true
}
