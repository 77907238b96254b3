use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use match_insight::analysis_fetch::AnalysisReport;
use match_insight::config::EngineConfig;
use match_insight::http_api::HttpApi;
use match_insight::ledger::SelectionLedger;
use match_insight::logging;
use match_insight::quota_gate::{GateState, UnlockOffer};
use match_insight::session::{Collaborators, FixtureSession};
use match_insight::state::{CandidateOutcome, FixtureRef, LiveSnapshot, MatchStatus};

const USAGE: &str = "usage: match_insight <fixture_id> <home_team_id> <away_team_id> <competition> [status] [home_name] [away_name]";

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let cfg = EngineConfig::from_env()?;
    logging::init(&cfg);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 4 {
        eprintln!("{USAGE}");
        std::process::exit(2);
    }
    let fixture = FixtureRef {
        fixture_id: args[0].clone(),
        home_team_id: args[1].parse().context("home_team_id must be a number")?,
        away_team_id: args[2].parse().context("away_team_id must be a number")?,
        competition: args[3].clone(),
        home_name: args.get(5).cloned().unwrap_or_else(|| "Home".to_string()),
        away_name: args.get(6).cloned().unwrap_or_else(|| "Away".to_string()),
    };
    let phase = args
        .get(4)
        .map(|s| MatchStatus::from_code(s))
        .unwrap_or(MatchStatus::NotStarted);

    let api = Arc::new(HttpApi::new(&cfg)?);
    let collaborators = Collaborators {
        prediction: api.clone(),
        live: api.clone(),
        quota: api.clone(),
        balance: api,
    };
    let mut session = FixtureSession::new(collaborators, fixture, SelectionLedger::new(), &cfg);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            cancel.cancel();
        });
    }

    let state = session.open(phase).await.clone();
    if let GateState::Blocked { offer, .. } = &state {
        match session.countdown(Utc::now()) {
            Some(left) => println!("Daily analysis quota used up, resets in {}s", left.as_secs()),
            None => println!("Daily analysis quota used up"),
        }
        if let UnlockOffer::Available { balance, cost } = offer {
            println!("Unlock available for {cost} coins (balance {balance})");
        }
        session.await_reset(&cancel).await;
    }

    if let Some(report) = session.report() {
        print_report(report);
    }

    let Some(mut live) = session.subscribe_live() else {
        return Ok(());
    };
    if let Some(snapshot) = live.borrow_and_update().clone() {
        print_snapshot(&snapshot);
    }
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = live.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(snapshot) = live.borrow_and_update().clone() {
                    print_snapshot(&snapshot);
                }
            }
        }
    }
    session.close();
    Ok(())
}

fn print_report(report: &AnalysisReport) {
    println!("{}", report.fixture.display_name());
    print_list("Best value", &report.shortlists.best_value);
    print_list("Safest", &report.shortlists.safest);
    for (team, id) in [
        (&report.fixture.home_name, report.fixture.home_team_id),
        (&report.fixture.away_name, report.fixture.away_team_id),
    ] {
        let names: Vec<String> = report
            .key_players(id, 3)
            .into_iter()
            .map(|p| format!("{} ({:+.1})", p.name, p.impact))
            .collect();
        if !names.is_empty() {
            println!("-- Key players {team}: {}", names.join(", "));
        }
    }
    for failure in &report.failures {
        let hint = if failure.is_retryable() { " (retry)" } else { "" };
        println!("! {} unavailable: {}{hint}", failure.source, failure.error);
    }
}

fn print_list(title: &str, items: &[CandidateOutcome]) {
    println!("-- {title}");
    if items.is_empty() {
        println!("   (none)");
    }
    for c in items {
        println!(
            "   {:<22} {:<20} {:>5.1}%  @{:>5.2}  value {:>5.1}",
            c.category, c.label, c.probability, c.estimated_odds, c.value_score
        );
    }
}

fn print_snapshot(s: &LiveSnapshot) {
    let minute = s.elapsed.map(|m| format!("{m}'")).unwrap_or_default();
    println!(
        "[{}] {} {}-{} ({} events, {} stats)",
        s.status,
        minute,
        s.goals.home,
        s.goals.away,
        s.events.len(),
        s.statistics.home.len() + s.statistics.away.len()
    );
}
