use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::analysis_fetch::{AnalysisReport, fetch_analysis};
use crate::api::{BalanceApi, LiveDataApi, PredictionApi, QuotaApi};
use crate::config::EngineConfig;
use crate::error::UnlockError;
use crate::ledger::SelectionLedger;
use crate::live_poll::LivePollSlot;
use crate::quota_gate::{GateState, QuotaGate};
use crate::state::{CandidateOutcome, FixtureRef, LiveSnapshot, MatchStatus, Selection};
use crate::value_rank::{RankParams, Shortlists};

/// The remote services a fixture view talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub prediction: Arc<dyn PredictionApi>,
    pub live: Arc<dyn LiveDataApi>,
    pub quota: Arc<dyn QuotaApi>,
    pub balance: Arc<dyn BalanceApi>,
}

/// Proof that a fetch was started under a given gate generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
}

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// One mounted fixture view: quota gate, analysis, live panel, and a handle
/// to the shared selection ledger.
///
/// The live panel polls regardless of the gate; analysis is only fetched once
/// the gate is open.
pub struct FixtureSession {
    fixture: FixtureRef,
    prediction: Arc<dyn PredictionApi>,
    rank: RankParams,
    countdown_tick: Duration,
    gate: QuotaGate,
    ledger: SelectionLedger,
    polls: LivePollSlot,
    report: Option<AnalysisReport>,
}

impl FixtureSession {
    pub fn new(
        collaborators: Collaborators,
        fixture: FixtureRef,
        ledger: SelectionLedger,
        cfg: &EngineConfig,
    ) -> Self {
        let gate = QuotaGate::new(
            collaborators.quota,
            collaborators.balance,
            fixture.match_key(),
            cfg.unlock_cost,
            cfg.fail_open_on_unauthorized,
        );
        Self {
            fixture,
            prediction: collaborators.prediction,
            rank: cfg.rank,
            countdown_tick: cfg.countdown_tick,
            gate,
            ledger,
            polls: LivePollSlot::new(collaborators.live, cfg.live_poll_interval),
            report: None,
        }
    }

    /// Mount the view: start the live panel, run the entry check, and fetch
    /// the analysis if the gate lets us.
    pub async fn open(&mut self, phase: MatchStatus) -> &GateState {
        self.polls.attach(&self.fixture, phase);
        self.gate.check().await;
        if self.gate.state().is_open() {
            self.load_analysis().await;
        }
        self.gate.state()
    }

    /// Report a lifecycle change observed elsewhere (e.g. kickoff).
    pub fn set_phase(&mut self, phase: MatchStatus) {
        self.polls.attach(&self.fixture, phase);
    }

    pub fn begin_fetch(&self) -> FetchTicket {
        FetchTicket {
            generation: self.gate.generation(),
        }
    }

    /// Store a finished fetch unless the gate reopened since it started.
    pub fn apply_fetch(&mut self, ticket: FetchTicket, report: AnalysisReport) -> bool {
        if ticket.generation != self.gate.generation() {
            info!(
                fixture = %self.fixture.fixture_id,
                ticket = ticket.generation,
                current = self.gate.generation(),
                "discarding stale analysis fetch"
            );
            return false;
        }
        self.report = Some(report);
        true
    }

    /// Fetch and rank the full analysis. No-op while the gate is not open.
    pub async fn load_analysis(&mut self) -> Option<&AnalysisReport> {
        if !self.gate.state().is_open() {
            return None;
        }
        let ticket = self.begin_fetch();
        let report = fetch_analysis(self.prediction.as_ref(), &self.fixture, &self.rank).await;
        self.apply_fetch(ticket, report);
        self.report.as_ref()
    }

    /// Paid unlock; on success the full fetch sequence runs as if the quota
    /// had allowed the view.
    pub async fn unlock(&mut self) -> Result<(), UnlockError> {
        self.gate.unlock().await?;
        self.load_analysis().await;
        Ok(())
    }

    /// Wait for the quota reset and reload once the gate reopens.
    pub async fn await_reset(&mut self, cancel: &CancellationToken) -> &GateState {
        let before = self.gate.generation();
        self.gate.run_countdown(self.countdown_tick, cancel).await;
        if self.gate.generation() != before && self.gate.state().is_open() {
            self.load_analysis().await;
        }
        self.gate.state()
    }

    pub fn close(&mut self) {
        self.polls.detach();
    }

    pub fn fixture(&self) -> &FixtureRef {
        &self.fixture
    }

    pub fn gate_state(&self) -> &GateState {
        self.gate.state()
    }

    pub fn gate(&self) -> &QuotaGate {
        &self.gate
    }

    pub fn countdown(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.gate.countdown(now)
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        self.report.as_ref()
    }

    pub fn shortlists(&self) -> Option<&Shortlists> {
        self.report.as_ref().map(|r| &r.shortlists)
    }

    pub fn live_snapshot(&self) -> Option<LiveSnapshot> {
        self.polls.snapshot()
    }

    pub fn subscribe_live(&self) -> Option<watch::Receiver<Option<LiveSnapshot>>> {
        self.polls.subscribe()
    }

    pub fn ledger(&self) -> &SelectionLedger {
        &self.ledger
    }

    pub fn toggle_selection(&self, candidate: &CandidateOutcome) {
        self.ledger
            .add(Selection::from_candidate(&self.fixture, candidate));
    }

    pub fn is_selected(&self, candidate: &CandidateOutcome) -> bool {
        self.ledger.is_selected(
            &self.fixture.fixture_id,
            &candidate.category,
            &candidate.label,
        )
    }
}
