#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use match_insight::api::{
    BalanceApi, BalanceOutcome, LiveDataApi, PredictionApi, QuotaApi, QuotaDecision,
};
use match_insight::catalog::{CornerCardAnalysis, H2hAnalysis, MarketOdds};
use match_insight::error::ApiError;
use match_insight::state::{
    CandidateOutcome, FixtureRef, Goals, LiveState, MatchStatus, PlayerImpact, StatisticItem,
    TeamLineup, TeamStatisticsEntry,
};

pub const HOME_ID: u64 = 42;
pub const AWAY_ID: u64 = 49;

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("read fixture")
}

pub fn fixture(id: &str) -> FixtureRef {
    FixtureRef {
        fixture_id: id.to_string(),
        home_team_id: HOME_ID,
        away_team_id: AWAY_ID,
        home_name: "Arsenal".to_string(),
        away_name: "Chelsea".to_string(),
        competition: "PL".to_string(),
    }
}

pub fn candidate(category: &str, label: &str, probability: f64) -> CandidateOutcome {
    CandidateOutcome::new(category, label, probability, None, "test")
}

pub fn live(status: MatchStatus, home: u32, away: u32) -> LiveState {
    LiveState {
        status,
        elapsed: None,
        goals: Goals { home, away },
        events: Vec::new(),
    }
}

pub fn stats_row(team_id: u64, kind: &str, value: i64) -> TeamStatisticsEntry {
    TeamStatisticsEntry {
        team_id,
        statistics: vec![StatisticItem {
            kind: kind.to_string(),
            value: value.into(),
        }],
    }
}

pub fn transport(msg: &str) -> ApiError {
    ApiError::Transport(msg.to_string())
}

/// Live collaborator that replays scripted responses, then falls back to a
/// steady `default_status` payload whose home score is the fixture id length.
pub struct ScriptedLive {
    pub live_script: Mutex<VecDeque<Result<Option<LiveState>, ApiError>>>,
    pub stats_script: Mutex<VecDeque<Result<Vec<TeamStatisticsEntry>, ApiError>>>,
    pub default_status: MatchStatus,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedLive {
    pub fn steady(status: MatchStatus) -> Self {
        Self {
            live_script: Mutex::new(VecDeque::new()),
            stats_script: Mutex::new(VecDeque::new()),
            default_status: status,
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn push_live(&self, result: Result<Option<LiveState>, ApiError>) {
        self.live_script.lock().unwrap().push_back(result);
    }

    pub fn push_stats(&self, result: Result<Vec<TeamStatisticsEntry>, ApiError>) {
        self.stats_script.lock().unwrap().push_back(result);
    }

    pub fn calls(&self, fixture_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(fixture_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl LiveDataApi for ScriptedLive {
    async fn live_state(&self, fixture_id: &str) -> Result<Option<LiveState>, ApiError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(fixture_id.to_string())
            .or_default() += 1;
        if let Some(next) = self.live_script.lock().unwrap().pop_front() {
            return next;
        }
        Ok(Some(live(self.default_status, fixture_id.len() as u32, 0)))
    }

    async fn statistics(&self, _fixture_id: &str) -> Result<Vec<TeamStatisticsEntry>, ApiError> {
        if let Some(next) = self.stats_script.lock().unwrap().pop_front() {
            return next;
        }
        Ok(Vec::new())
    }
}

/// Quota collaborator replaying scripted decisions, then `fallback`.
pub struct ScriptedQuota {
    script: Mutex<VecDeque<Result<QuotaDecision, ApiError>>>,
    fallback: Result<QuotaDecision, ApiError>,
    pub records: Mutex<Vec<(String, bool)>>,
}

impl ScriptedQuota {
    pub fn new(fallback: Result<QuotaDecision, ApiError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, result: Result<QuotaDecision, ApiError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn records(&self) -> Vec<(String, bool)> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuotaApi for ScriptedQuota {
    async fn record(
        &self,
        match_key: &str,
        override_paid: bool,
    ) -> Result<QuotaDecision, ApiError> {
        self.records
            .lock()
            .unwrap()
            .push((match_key.to_string(), override_paid));
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        self.fallback.clone()
    }
}

pub fn allowed() -> QuotaDecision {
    QuotaDecision {
        allowed: true,
        reset_at: None,
        views_used_today: 1,
    }
}

pub fn blocked(reset_at: DateTime<Utc>) -> QuotaDecision {
    QuotaDecision {
        allowed: false,
        reset_at: Some(reset_at),
        views_used_today: 3,
    }
}

pub struct FakeWallet {
    pub balance: Mutex<u64>,
    pub cost: u64,
    pub accept: bool,
    pub spends: AtomicUsize,
}

impl FakeWallet {
    pub fn new(balance: u64, cost: u64) -> Self {
        Self {
            balance: Mutex::new(balance),
            cost,
            accept: true,
            spends: AtomicUsize::new(0),
        }
    }

    pub fn declining(balance: u64, cost: u64) -> Self {
        Self {
            accept: false,
            ..Self::new(balance, cost)
        }
    }

    pub fn spends(&self) -> usize {
        self.spends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceApi for FakeWallet {
    async fn balance(&self) -> Result<u64, ApiError> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn use_for_analysis(&self) -> Result<BalanceOutcome, ApiError> {
        self.spends.fetch_add(1, Ordering::SeqCst);
        let mut balance = self.balance.lock().unwrap();
        if !self.accept || *balance < self.cost {
            return Ok(BalanceOutcome {
                success: false,
                new_balance: *balance,
            });
        }
        *balance -= self.cost;
        Ok(BalanceOutcome {
            success: true,
            new_balance: *balance,
        })
    }
}

/// Prediction collaborator with fixed per-source results.
pub struct FakePrediction {
    pub h2h: Result<Option<H2hAnalysis>, ApiError>,
    pub corner_cards: Result<Option<CornerCardAnalysis>, ApiError>,
    pub odds: Result<Option<MarketOdds>, ApiError>,
    pub player_impact: Result<Vec<PlayerImpact>, ApiError>,
    pub lineups: Result<Vec<TeamLineup>, ApiError>,
    pub fetches: AtomicUsize,
}

impl FakePrediction {
    pub fn from_fixtures() -> Self {
        Self {
            h2h: Ok(Some(
                serde_json::from_str(&read_fixture("h2h_analysis.json")).expect("h2h fixture"),
            )),
            corner_cards: Ok(Some(
                serde_json::from_str(&read_fixture("corners_cards.json"))
                    .expect("corners fixture"),
            )),
            odds: Ok(Some(
                serde_json::from_str(&read_fixture("odds.json")).expect("odds fixture"),
            )),
            player_impact: Ok(serde_json::from_str(&read_fixture("player_impact.json"))
                .expect("player impact fixture")),
            lineups: Ok(Vec::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PredictionApi for FakePrediction {
    async fn h2h_analysis(&self, _fixture: &FixtureRef) -> Result<Option<H2hAnalysis>, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.h2h.clone()
    }

    async fn corner_card_analysis(
        &self,
        _fixture: &FixtureRef,
    ) -> Result<Option<CornerCardAnalysis>, ApiError> {
        self.corner_cards.clone()
    }

    async fn market_odds(&self, _fixture: &FixtureRef) -> Result<Option<MarketOdds>, ApiError> {
        self.odds.clone()
    }

    async fn player_impact(&self, _fixture: &FixtureRef) -> Result<Vec<PlayerImpact>, ApiError> {
        self.player_impact.clone()
    }

    async fn lineups(&self, _fixture: &FixtureRef) -> Result<Vec<TeamLineup>, ApiError> {
        self.lineups.clone()
    }
}
