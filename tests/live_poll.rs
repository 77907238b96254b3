mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use match_insight::live_poll::{
    Cadence, LivePollSlot, SectionOutcome, poll_cadence, poll_once, rekey_statistics,
    spawn_live_poller,
};
use match_insight::state::{Goals, MatchStatus};

use common::{AWAY_ID, HOME_ID, ScriptedLive, fixture, live, stats_row, transport};

const INTERVAL: Duration = Duration::from_secs(30);

#[test]
fn cadence_follows_lifecycle_phase() {
    assert_eq!(poll_cadence(MatchStatus::NotStarted, INTERVAL), Cadence::Idle);
    assert_eq!(poll_cadence(MatchStatus::Unknown, INTERVAL), Cadence::Idle);
    for status in [
        MatchStatus::FirstHalf,
        MatchStatus::HalfTime,
        MatchStatus::SecondHalf,
        MatchStatus::ExtraTime,
        MatchStatus::Live,
    ] {
        assert_eq!(poll_cadence(status, INTERVAL), Cadence::Every(INTERVAL));
    }
    for status in [
        MatchStatus::FullTime,
        MatchStatus::AfterExtraTime,
        MatchStatus::Penalties,
    ] {
        assert_eq!(poll_cadence(status, INTERVAL), Cadence::Once);
    }
}

#[test]
fn rekey_maps_team_ids_and_drops_strangers() {
    let entries = vec![
        stats_row(AWAY_ID, "Corner Kicks", 3),
        stats_row(777, "Corner Kicks", 99),
        stats_row(HOME_ID, "Corner Kicks", 8),
    ];
    let stats = rekey_statistics(&entries, HOME_ID, AWAY_ID);
    assert_eq!(stats.home.get("Corner Kicks"), Some(&Value::from(8)));
    assert_eq!(stats.away.get("Corner Kicks"), Some(&Value::from(3)));
    assert_eq!(stats.home.len() + stats.away.len(), 2);
}

#[tokio::test]
async fn failed_tick_then_success_matches_payload() {
    let api = ScriptedLive::steady(MatchStatus::SecondHalf);
    api.push_live(Err(transport("connection reset")));
    api.push_stats(Err(transport("connection reset")));
    api.push_live(Ok(Some(live(MatchStatus::SecondHalf, 2, 1))));
    api.push_stats(Ok(vec![stats_row(HOME_ID, "Shots on Goal", 6)]));

    let fx = fixture("f1");
    let mut current = None;
    let first = poll_once(&api, &fx, &mut current).await;
    assert!(matches!(first.live, SectionOutcome::Failed(_)));
    assert!(!first.merged_any());
    assert!(current.is_none());

    let second = poll_once(&api, &fx, &mut current).await;
    assert!(second.merged_any());
    let snap = current.expect("snapshot after success");
    assert_eq!(snap.status, MatchStatus::SecondHalf);
    assert_eq!(snap.goals, Goals { home: 2, away: 1 });
    assert_eq!(snap.statistics.home.get("Shots on Goal"), Some(&Value::from(6)));
}

#[tokio::test]
async fn statistics_before_first_live_state_are_held_back() {
    let api = ScriptedLive::steady(MatchStatus::SecondHalf);
    api.push_live(Err(transport("connection reset")));
    api.push_stats(Ok(vec![stats_row(HOME_ID, "Shots on Goal", 6)]));
    api.push_live(Ok(Some(live(MatchStatus::SecondHalf, 2, 1))));
    api.push_stats(Err(transport("timeout")));
    api.push_stats(Ok(vec![stats_row(HOME_ID, "Shots on Goal", 7)]));

    let fx = fixture("f1");
    let mut current = None;
    let first = poll_once(&api, &fx, &mut current).await;
    assert_eq!(first.statistics, SectionOutcome::Deferred);
    assert!(!first.merged_any());
    assert!(current.is_none(), "no scoreline to show yet");

    poll_once(&api, &fx, &mut current).await;
    let snap = current.clone().expect("snapshot once live state lands");
    assert_eq!(snap.goals, Goals { home: 2, away: 1 });
    assert!(snap.statistics.is_empty());

    let third = poll_once(&api, &fx, &mut current).await;
    assert_eq!(third.statistics, SectionOutcome::Merged);
    let snap = current.expect("snapshot");
    assert_eq!(snap.statistics.home.get("Shots on Goal"), Some(&Value::from(7)));
}

#[tokio::test]
async fn failed_section_keeps_last_good_value() {
    let api = ScriptedLive::steady(MatchStatus::FirstHalf);
    api.push_live(Ok(Some(live(MatchStatus::FirstHalf, 1, 0))));
    api.push_stats(Ok(vec![stats_row(AWAY_ID, "Fouls", 4)]));
    api.push_live(Ok(Some(live(MatchStatus::FirstHalf, 1, 1))));
    api.push_stats(Err(transport("timeout")));

    let fx = fixture("f1");
    let mut current = None;
    poll_once(&api, &fx, &mut current).await;
    let report = poll_once(&api, &fx, &mut current).await;
    assert_eq!(report.live, SectionOutcome::Merged);
    assert!(matches!(report.statistics, SectionOutcome::Failed(_)));

    let snap = current.expect("snapshot");
    assert_eq!(snap.goals, Goals { home: 1, away: 1 });
    assert_eq!(snap.statistics.away.get("Fouls"), Some(&Value::from(4)));
}

#[tokio::test]
async fn empty_response_is_not_an_update() {
    let api = ScriptedLive::steady(MatchStatus::FirstHalf);
    api.push_live(Ok(Some(live(MatchStatus::FirstHalf, 0, 2))));
    api.push_live(Ok(None));
    api.push_stats(Ok(Vec::new()));
    api.push_stats(Ok(vec![stats_row(777, "Fouls", 1)]));

    let fx = fixture("f1");
    let mut current = None;
    poll_once(&api, &fx, &mut current).await;
    let before = current.clone();
    let report = poll_once(&api, &fx, &mut current).await;
    assert_eq!(report.live, SectionOutcome::Empty);
    assert_eq!(report.statistics, SectionOutcome::Empty);
    assert_eq!(current, before);
}

#[tokio::test(start_paused = true)]
async fn not_started_fixture_is_never_polled() {
    let api = Arc::new(ScriptedLive::steady(MatchStatus::NotStarted));
    let handle = spawn_live_poller(api.clone(), fixture("ns"), MatchStatus::NotStarted, INTERVAL);
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(api.calls("ns"), 0);
    assert!(handle.is_finished());
    assert!(handle.snapshot().is_none());
}

#[tokio::test(start_paused = true)]
async fn finished_fixture_is_fetched_once() {
    let api = Arc::new(ScriptedLive::steady(MatchStatus::FullTime));
    let handle = spawn_live_poller(api.clone(), fixture("ft"), MatchStatus::FullTime, INTERVAL);
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(api.calls("ft"), 1);
    assert!(handle.is_finished());
    let snap = handle.snapshot().expect("one-shot snapshot");
    assert_eq!(snap.status, MatchStatus::FullTime);
}

#[tokio::test(start_paused = true)]
async fn in_play_fixture_polls_until_cancelled() {
    let api = Arc::new(ScriptedLive::steady(MatchStatus::SecondHalf));
    let handle = spawn_live_poller(api.clone(), fixture("live"), MatchStatus::SecondHalf, INTERVAL);
    tokio::time::sleep(Duration::from_secs(65)).await;
    let polled = api.calls("live");
    assert!(polled >= 2, "polled {polled} times");
    assert_eq!(handle.snapshot().map(|s| s.goals.home), Some(4));

    handle.cancel();
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(api.calls("live"), polled);
    assert!(handle.is_finished());
}

#[tokio::test(start_paused = true)]
async fn polling_stops_after_final_whistle() {
    let api = Arc::new(ScriptedLive::steady(MatchStatus::FullTime));
    api.push_live(Ok(Some(live(MatchStatus::SecondHalf, 1, 0))));
    let handle = spawn_live_poller(api.clone(), fixture("end"), MatchStatus::SecondHalf, INTERVAL);
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(api.calls("end"), 2);
    assert!(handle.is_finished());
    assert_eq!(handle.snapshot().map(|s| s.status), Some(MatchStatus::FullTime));
}

#[tokio::test(start_paused = true)]
async fn switching_fixture_stops_the_old_poller() {
    let api = Arc::new(ScriptedLive::steady(MatchStatus::FirstHalf));
    let mut slot = LivePollSlot::new(api.clone(), INTERVAL);

    slot.attach(&fixture("a"), MatchStatus::FirstHalf);
    tokio::time::sleep(Duration::from_secs(35)).await;
    assert_eq!(slot.snapshot().map(|s| s.goals.home), Some(1));

    slot.attach(&fixture("bbb"), MatchStatus::FirstHalf);
    let a_calls = api.calls("a");
    tokio::time::sleep(Duration::from_secs(95)).await;
    assert_eq!(api.calls("a"), a_calls);
    assert!(api.calls("bbb") >= 2);
    assert_eq!(slot.fixture_id(), Some("bbb"));
    assert_eq!(slot.snapshot().map(|s| s.goals.home), Some(3));

    slot.detach();
    assert!(slot.snapshot().is_none());
}

#[tokio::test(start_paused = true)]
async fn reattaching_same_fixture_keeps_running_poller() {
    let api = Arc::new(ScriptedLive::steady(MatchStatus::FirstHalf));
    let mut slot = LivePollSlot::new(api.clone(), INTERVAL);
    slot.attach(&fixture("a"), MatchStatus::FirstHalf);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(api.calls("a"), 1);
    let rx = slot.subscribe().expect("attached");

    slot.attach(&fixture("a"), MatchStatus::HalfTime);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(api.calls("a"), 1);
    assert!(rx.has_changed().is_ok(), "first poller should still be running");
}

#[tokio::test(start_paused = true)]
async fn kickoff_restarts_idle_poller() {
    let api = Arc::new(ScriptedLive::steady(MatchStatus::FirstHalf));
    let mut slot = LivePollSlot::new(api.clone(), INTERVAL);
    slot.attach(&fixture("k"), MatchStatus::NotStarted);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(api.calls("k"), 0);

    slot.attach(&fixture("k"), MatchStatus::FirstHalf);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(api.calls("k"), 1);
    assert_eq!(slot.snapshot().map(|s| s.status), Some(MatchStatus::FirstHalf));
}
