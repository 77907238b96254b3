use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::LiveDataApi;
use crate::error::ApiError;
use crate::state::{
    FixtureRef, LiveSnapshot, MatchStatus, SnapshotDelta, TeamStatistics, TeamStatisticsEntry,
    apply_snapshot_delta,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Idle,
    Once,
    Every(Duration),
}

/// Not started: nothing to poll. In play: recurring. Finished: one fetch on mount.
pub fn poll_cadence(status: MatchStatus, interval: Duration) -> Cadence {
    if status.is_in_play() {
        Cadence::Every(interval)
    } else if status.is_finished() {
        Cadence::Once
    } else {
        Cadence::Idle
    }
}

/// Re-key provider team ids to home/away. Rows for any other team are dropped.
pub fn rekey_statistics(
    entries: &[TeamStatisticsEntry],
    home_team_id: u64,
    away_team_id: u64,
) -> TeamStatistics {
    let mut out = TeamStatistics::default();
    for entry in entries {
        let side = if entry.team_id == home_team_id {
            &mut out.home
        } else if entry.team_id == away_team_id {
            &mut out.away
        } else {
            continue;
        };
        for item in &entry.statistics {
            side.insert(item.kind.clone(), item.value.clone());
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub enum SectionOutcome {
    Merged,
    Empty,
    /// Statistics arrived before any live state; held back until a scoreline exists.
    Deferred,
    Failed(ApiError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub live: SectionOutcome,
    pub statistics: SectionOutcome,
}

impl TickReport {
    pub fn merged_any(&self) -> bool {
        self.live == SectionOutcome::Merged || self.statistics == SectionOutcome::Merged
    }
}

/// Fetch both endpoints once and merge whatever succeeded into `current`.
///
/// A failed or empty section leaves its part of the snapshot untouched.
pub async fn poll_once(
    api: &dyn LiveDataApi,
    fixture: &FixtureRef,
    current: &mut Option<LiveSnapshot>,
) -> TickReport {
    let (live, stats) = tokio::join!(
        api.live_state(&fixture.fixture_id),
        api.statistics(&fixture.fixture_id)
    );

    let live = match live {
        Ok(Some(state)) => {
            apply_snapshot_delta(current, SnapshotDelta::Live(state));
            SectionOutcome::Merged
        }
        Ok(None) => SectionOutcome::Empty,
        Err(err) => SectionOutcome::Failed(err),
    };

    let statistics = match stats {
        Ok(entries) => {
            let stats = rekey_statistics(&entries, fixture.home_team_id, fixture.away_team_id);
            if stats.is_empty() {
                SectionOutcome::Empty
            } else if apply_snapshot_delta(current, SnapshotDelta::Statistics(stats)) {
                SectionOutcome::Merged
            } else {
                SectionOutcome::Deferred
            }
        }
        Err(err) => SectionOutcome::Failed(err),
    };

    TickReport { live, statistics }
}

/// A running poller bound to one fixture. Dropping the handle cancels it.
#[derive(Debug)]
pub struct PollHandle {
    fixture_id: String,
    phase: MatchStatus,
    cancel: CancellationToken,
    snapshot: watch::Receiver<Option<LiveSnapshot>>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn fixture_id(&self) -> &str {
        &self.fixture_id
    }

    /// Phase the poller was started in.
    pub fn phase(&self) -> MatchStatus {
        self.phase
    }

    pub fn snapshot(&self) -> Option<LiveSnapshot> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<LiveSnapshot>> {
        self.snapshot.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub fn spawn_live_poller(
    api: Arc<dyn LiveDataApi>,
    fixture: FixtureRef,
    phase: MatchStatus,
    interval: Duration,
) -> PollHandle {
    let cancel = CancellationToken::new();
    let (tx, rx) = watch::channel(None);
    let fixture_id = fixture.fixture_id.clone();
    let task = tokio::spawn(run_poller(api, fixture, phase, interval, cancel.clone(), tx));
    PollHandle {
        fixture_id,
        phase,
        cancel,
        snapshot: rx,
        task,
    }
}

async fn run_poller(
    api: Arc<dyn LiveDataApi>,
    fixture: FixtureRef,
    phase: MatchStatus,
    interval: Duration,
    cancel: CancellationToken,
    tx: watch::Sender<Option<LiveSnapshot>>,
) {
    let period = match poll_cadence(phase, interval) {
        Cadence::Idle => {
            debug!(fixture = %fixture.fixture_id, %phase, "live polling idle");
            return;
        }
        Cadence::Once => {
            tick(api.as_ref(), &fixture, phase, &cancel, &tx).await;
            return;
        }
        Cadence::Every(period) => period,
    };

    let mut phase = phase;
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(status) = tick(api.as_ref(), &fixture, phase, &cancel, &tx).await else {
            break;
        };
        phase = status;
        if phase.is_finished() {
            debug!(fixture = %fixture.fixture_id, %phase, "fixture finished, live polling stops");
            break;
        }
    }
}

/// One serialized tick. Returns the phase after merging, or `None` if cancelled.
async fn tick(
    api: &dyn LiveDataApi,
    fixture: &FixtureRef,
    phase: MatchStatus,
    cancel: &CancellationToken,
    tx: &watch::Sender<Option<LiveSnapshot>>,
) -> Option<MatchStatus> {
    let mut next = tx.borrow().clone();
    let report = tokio::select! {
        _ = cancel.cancelled() => return None,
        report = poll_once(api, fixture, &mut next) => report,
    };
    if cancel.is_cancelled() {
        return None;
    }
    for (section, outcome) in [("live", &report.live), ("statistics", &report.statistics)] {
        if let SectionOutcome::Failed(err) = outcome {
            debug!(fixture = %fixture.fixture_id, section, error = %err, "live poll section failed");
        }
    }
    let status = next.as_ref().map(|s| s.status).unwrap_or(phase);
    if report.merged_any() {
        tx.send_replace(next);
    }
    Some(status)
}

/// Holds at most one poller. Attaching a different fixture cancels the old one
/// first, so no tick from the previous fixture can publish afterwards.
pub struct LivePollSlot {
    api: Arc<dyn LiveDataApi>,
    interval: Duration,
    current: Option<PollHandle>,
}

impl LivePollSlot {
    pub fn new(api: Arc<dyn LiveDataApi>, interval: Duration) -> Self {
        Self {
            api,
            interval,
            current: None,
        }
    }

    /// Re-attaching the same fixture keeps the running poller and its
    /// snapshot. A poller started idle is replaced once the phase changes.
    pub fn attach(&mut self, fixture: &FixtureRef, phase: MatchStatus) {
        if let Some(handle) = &self.current
            && handle.fixture_id() == fixture.fixture_id
            && (handle.phase() == phase
                || (poll_cadence(handle.phase(), self.interval) != Cadence::Idle
                    && !handle.is_finished()))
        {
            return;
        }
        self.detach();
        self.current = Some(spawn_live_poller(
            self.api.clone(),
            fixture.clone(),
            phase,
            self.interval,
        ));
    }

    pub fn detach(&mut self) {
        if let Some(handle) = self.current.take() {
            debug!(fixture = %handle.fixture_id(), "live poller detached");
            handle.cancel();
        }
    }

    pub fn snapshot(&self) -> Option<LiveSnapshot> {
        self.current.as_ref().and_then(PollHandle::snapshot)
    }

    pub fn subscribe(&self) -> Option<watch::Receiver<Option<LiveSnapshot>>> {
        self.current.as_ref().map(PollHandle::subscribe)
    }

    pub fn fixture_id(&self) -> Option<&str> {
        self.current.as_ref().map(PollHandle::fixture_id)
    }
}

impl Drop for LivePollSlot {
    fn drop(&mut self) {
        self.detach();
    }
}
