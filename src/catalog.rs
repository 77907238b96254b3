use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::state::CandidateOutcome;

pub const MATCH_RESULT: &str = "Match Result";
pub const DOUBLE_CHANCE: &str = "Double Chance";
pub const DRAW_NO_BET: &str = "Draw No Bet";
pub const TOTAL_GOALS: &str = "Total Goals";
pub const BTTS: &str = "Both Teams To Score";
pub const FIRST_GOAL: &str = "First Goal";
pub const TEAM_TOTALS: &str = "Team Totals";
pub const FIRST_HALF_RESULT: &str = "First Half Result";
pub const FIRST_HALF_GOALS: &str = "First Half Goals";
pub const MULTIGOALS: &str = "Multigoals";
pub const CORNERS_RESULT: &str = "Corners Result";
pub const CORNER_RANGE: &str = "Corner Range";
pub const TOTAL_CORNERS: &str = "Total Corners";
pub const TOTAL_CARDS: &str = "Total Cards";
pub const RED_CARD: &str = "Red Card";

const MIN_MATCH_RESULT: f64 = 40.0;
const MIN_DOUBLE_CHANCE: f64 = 55.0;
const MIN_DRAW_NO_BET: f64 = 60.0;
const MIN_TOTAL_GOALS: f64 = 50.0;
const MIN_BTTS: f64 = 55.0;
const MIN_FIRST_GOAL: f64 = 50.0;
const MIN_TEAM_OVER_0_5: f64 = 70.0;
const MIN_TEAM_OVER_1_5: f64 = 55.0;
const MIN_FIRST_HALF_RESULT: f64 = 45.0;
const MIN_FIRST_HALF_GOALS: f64 = 55.0;
const MIN_MULTIGOALS: f64 = 60.0;
const MIN_CORNERS_RESULT: f64 = 50.0;
const MIN_CORNER_RANGE: f64 = 45.0;
const MIN_TOTAL_CORNERS: f64 = 55.0;
const MIN_TOTAL_CARDS: f64 = 55.0;
const MIN_RED_CARD_YES: f64 = 35.0;
const MIN_RED_CARD_NO: f64 = 70.0;

/// Home/draw/away percentages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreeWay {
    #[serde(default, deserialize_with = "de_pct")]
    pub home: Option<f64>,
    #[serde(default, deserialize_with = "de_pct")]
    pub draw: Option<f64>,
    #[serde(default, deserialize_with = "de_pct")]
    pub away: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoubleChance {
    #[serde(default, deserialize_with = "de_pct")]
    pub home_or_draw: Option<f64>,
    #[serde(default, deserialize_with = "de_pct")]
    pub draw_or_away: Option<f64>,
    #[serde(default, deserialize_with = "de_pct")]
    pub home_or_away: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeAway {
    #[serde(default, deserialize_with = "de_pct")]
    pub home: Option<f64>,
    #[serde(default, deserialize_with = "de_pct")]
    pub away: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YesNo {
    #[serde(default, deserialize_with = "de_pct")]
    pub yes: Option<f64>,
    #[serde(default, deserialize_with = "de_pct")]
    pub no: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstGoal {
    #[serde(default, deserialize_with = "de_pct")]
    pub home: Option<f64>,
    #[serde(default, deserialize_with = "de_pct")]
    pub away: Option<f64>,
    #[serde(default, deserialize_with = "de_pct")]
    pub none: Option<f64>,
}

/// Over/under split for one line (goals, corners, cards).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalLine {
    pub line: f64,
    #[serde(default, deserialize_with = "de_pct")]
    pub over: Option<f64>,
    #[serde(default, deserialize_with = "de_pct")]
    pub under: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamTotals {
    #[serde(default, deserialize_with = "de_pct", rename = "homeOver05")]
    pub home_over_0_5: Option<f64>,
    #[serde(default, deserialize_with = "de_pct", rename = "awayOver05")]
    pub away_over_0_5: Option<f64>,
    #[serde(default, deserialize_with = "de_pct", rename = "homeOver15")]
    pub home_over_1_5: Option<f64>,
    #[serde(default, deserialize_with = "de_pct", rename = "awayOver15")]
    pub away_over_1_5: Option<f64>,
}

/// Share of past fixtures landing inside a range, e.g. `"2-4"` goals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeShare {
    pub label: String,
    #[serde(default, deserialize_with = "de_pct")]
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstHalf {
    #[serde(default, deserialize_with = "de_family")]
    pub result: Option<ThreeWay>,
    #[serde(default, deserialize_with = "de_family")]
    pub goal_lines: Option<Vec<TotalLine>>,
}

/// Head-to-head analysis from the prediction API.
///
/// Every family is optional; a family that fails to deserialize is dropped to
/// `None` instead of failing the whole payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct H2hAnalysis {
    #[serde(default)]
    pub matches_analyzed: Option<u32>,
    #[serde(default, deserialize_with = "de_family")]
    pub match_result: Option<ThreeWay>,
    #[serde(default, deserialize_with = "de_family")]
    pub double_chance: Option<DoubleChance>,
    #[serde(default, deserialize_with = "de_family")]
    pub draw_no_bet: Option<HomeAway>,
    #[serde(default, deserialize_with = "de_family")]
    pub goal_lines: Option<Vec<TotalLine>>,
    #[serde(default, deserialize_with = "de_family")]
    pub btts: Option<YesNo>,
    #[serde(default, deserialize_with = "de_family")]
    pub first_goal: Option<FirstGoal>,
    #[serde(default, deserialize_with = "de_family")]
    pub team_totals: Option<TeamTotals>,
    #[serde(default, deserialize_with = "de_family")]
    pub first_half: Option<FirstHalf>,
    #[serde(default, deserialize_with = "de_family")]
    pub multigoals: Option<Vec<RangeShare>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CornerAnalysis {
    #[serde(default, deserialize_with = "de_family")]
    pub result: Option<ThreeWay>,
    #[serde(default, deserialize_with = "de_family")]
    pub ranges: Option<Vec<RangeShare>>,
    #[serde(default, deserialize_with = "de_family")]
    pub lines: Option<Vec<TotalLine>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardAnalysis {
    #[serde(default, deserialize_with = "de_family")]
    pub lines: Option<Vec<TotalLine>>,
    #[serde(default, deserialize_with = "de_family")]
    pub red_card: Option<YesNo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CornerCardAnalysis {
    #[serde(default, deserialize_with = "de_family")]
    pub corners: Option<CornerAnalysis>,
    #[serde(default, deserialize_with = "de_family")]
    pub cards: Option<CardAnalysis>,
}

/// Observed decimal bookmaker prices for the markets we can annotate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOdds {
    #[serde(default)]
    pub home: Option<f64>,
    #[serde(default)]
    pub draw: Option<f64>,
    #[serde(default)]
    pub away: Option<f64>,
    #[serde(default, rename = "over25")]
    pub over_2_5: Option<f64>,
    #[serde(default, rename = "under25")]
    pub under_2_5: Option<f64>,
    #[serde(default)]
    pub btts_yes: Option<f64>,
    #[serde(default)]
    pub btts_no: Option<f64>,
}

struct Entry {
    label: String,
    pct: Option<f64>,
    threshold: f64,
    odds: Option<f64>,
    reasoning: String,
}

impl Entry {
    fn new(label: impl Into<String>, pct: Option<f64>, threshold: f64, reasoning: String) -> Self {
        Self {
            label: label.into(),
            pct,
            threshold,
            odds: None,
            reasoning,
        }
    }

    fn with_odds(mut self, odds: Option<f64>) -> Self {
        self.odds = odds;
        self
    }
}

/// Flatten per-market statistics into candidate outcomes.
///
/// Families are visited in a fixed order and each applies its own inclusion
/// threshold. Missing families are skipped; a family holding an out-of-range
/// percentage is skipped whole.
pub fn build_catalog(
    h2h: Option<&H2hAnalysis>,
    stats: Option<&CornerCardAnalysis>,
    odds: Option<&MarketOdds>,
    team_a: &str,
    team_b: &str,
) -> Vec<CandidateOutcome> {
    let mut out = Vec::new();
    let odds = odds.cloned().unwrap_or_default();

    if let Some(h2h) = h2h {
        let sample = h2h
            .matches_analyzed
            .map(|n| format!(" across {n} meetings"))
            .unwrap_or_default();

        if let Some(r) = &h2h.match_result {
            emit(
                &mut out,
                MATCH_RESULT,
                vec![
                    Entry::new(
                        "1",
                        r.home,
                        MIN_MATCH_RESULT,
                        format!("{team_a} won {}% of past meetings{sample}", pct(r.home)),
                    )
                    .with_odds(odds.home),
                    Entry::new(
                        "X",
                        r.draw,
                        MIN_MATCH_RESULT,
                        format!("{}% of {team_a} vs {team_b} meetings ended level", pct(r.draw)),
                    )
                    .with_odds(odds.draw),
                    Entry::new(
                        "2",
                        r.away,
                        MIN_MATCH_RESULT,
                        format!("{team_b} won {}% of past meetings{sample}", pct(r.away)),
                    )
                    .with_odds(odds.away),
                ],
            );
        }

        if let Some(dc) = &h2h.double_chance {
            emit(
                &mut out,
                DOUBLE_CHANCE,
                vec![
                    Entry::new(
                        "1X",
                        dc.home_or_draw,
                        MIN_DOUBLE_CHANCE,
                        format!("{team_a} avoided defeat in {}% of meetings", pct(dc.home_or_draw)),
                    ),
                    Entry::new(
                        "X2",
                        dc.draw_or_away,
                        MIN_DOUBLE_CHANCE,
                        format!("{team_b} avoided defeat in {}% of meetings", pct(dc.draw_or_away)),
                    ),
                    Entry::new(
                        "12",
                        dc.home_or_away,
                        MIN_DOUBLE_CHANCE,
                        format!("{}% of meetings produced a winner", pct(dc.home_or_away)),
                    ),
                ],
            );
        }

        if let Some(dnb) = &h2h.draw_no_bet {
            emit(
                &mut out,
                DRAW_NO_BET,
                vec![
                    Entry::new(
                        "1 DNB",
                        dnb.home,
                        MIN_DRAW_NO_BET,
                        format!("{team_a} took {}% of decided meetings", pct(dnb.home)),
                    ),
                    Entry::new(
                        "2 DNB",
                        dnb.away,
                        MIN_DRAW_NO_BET,
                        format!("{team_b} took {}% of decided meetings", pct(dnb.away)),
                    ),
                ],
            );
        }

        if let Some(lines) = &h2h.goal_lines {
            emit_lines(&mut out, TOTAL_GOALS, lines, MIN_TOTAL_GOALS, "goals", Some(&odds));
        }

        if let Some(btts) = &h2h.btts {
            emit(
                &mut out,
                BTTS,
                vec![
                    Entry::new(
                        "Yes",
                        btts.yes,
                        MIN_BTTS,
                        format!("Both {team_a} and {team_b} scored in {}% of meetings", pct(btts.yes)),
                    )
                    .with_odds(odds.btts_yes),
                    Entry::new(
                        "No",
                        btts.no,
                        MIN_BTTS,
                        format!("At least one side blanked in {}% of meetings", pct(btts.no)),
                    )
                    .with_odds(odds.btts_no),
                ],
            );
        }

        if let Some(fg) = &h2h.first_goal {
            emit(
                &mut out,
                FIRST_GOAL,
                vec![
                    Entry::new(
                        team_a,
                        fg.home,
                        MIN_FIRST_GOAL,
                        format!("{team_a} opened the scoring in {}% of meetings", pct(fg.home)),
                    ),
                    Entry::new(
                        team_b,
                        fg.away,
                        MIN_FIRST_GOAL,
                        format!("{team_b} opened the scoring in {}% of meetings", pct(fg.away)),
                    ),
                    Entry::new(
                        "No Goal",
                        fg.none,
                        MIN_FIRST_GOAL,
                        format!("{}% of meetings finished goalless", pct(fg.none)),
                    ),
                ],
            );
        }

        if let Some(tt) = &h2h.team_totals {
            emit(
                &mut out,
                TEAM_TOTALS,
                vec![
                    Entry::new(
                        format!("{team_a} Over 0.5"),
                        tt.home_over_0_5,
                        MIN_TEAM_OVER_0_5,
                        format!("{team_a} scored in {}% of meetings", pct(tt.home_over_0_5)),
                    ),
                    Entry::new(
                        format!("{team_b} Over 0.5"),
                        tt.away_over_0_5,
                        MIN_TEAM_OVER_0_5,
                        format!("{team_b} scored in {}% of meetings", pct(tt.away_over_0_5)),
                    ),
                    Entry::new(
                        format!("{team_a} Over 1.5"),
                        tt.home_over_1_5,
                        MIN_TEAM_OVER_1_5,
                        format!("{team_a} scored twice or more in {}% of meetings", pct(tt.home_over_1_5)),
                    ),
                    Entry::new(
                        format!("{team_b} Over 1.5"),
                        tt.away_over_1_5,
                        MIN_TEAM_OVER_1_5,
                        format!("{team_b} scored twice or more in {}% of meetings", pct(tt.away_over_1_5)),
                    ),
                ],
            );
        }

        if let Some(fh) = &h2h.first_half {
            if let Some(r) = &fh.result {
                emit(
                    &mut out,
                    FIRST_HALF_RESULT,
                    vec![
                        Entry::new(
                            "1",
                            r.home,
                            MIN_FIRST_HALF_RESULT,
                            format!("{team_a} led at the break in {}% of meetings", pct(r.home)),
                        ),
                        Entry::new(
                            "X",
                            r.draw,
                            MIN_FIRST_HALF_RESULT,
                            format!("{}% of meetings were level at half-time", pct(r.draw)),
                        ),
                        Entry::new(
                            "2",
                            r.away,
                            MIN_FIRST_HALF_RESULT,
                            format!("{team_b} led at the break in {}% of meetings", pct(r.away)),
                        ),
                    ],
                );
            }
            if let Some(lines) = &fh.goal_lines {
                emit_lines(
                    &mut out,
                    FIRST_HALF_GOALS,
                    lines,
                    MIN_FIRST_HALF_GOALS,
                    "first-half goals",
                    None,
                );
            }
        }

        if let Some(ranges) = &h2h.multigoals {
            emit_ranges(&mut out, MULTIGOALS, ranges, MIN_MULTIGOALS, "total goals");
        }
    }

    if let Some(stats) = stats {
        if let Some(corners) = &stats.corners {
            if let Some(r) = &corners.result {
                emit(
                    &mut out,
                    CORNERS_RESULT,
                    vec![
                        Entry::new(
                            "1",
                            r.home,
                            MIN_CORNERS_RESULT,
                            format!("{team_a} won the corner count in {}% of matches", pct(r.home)),
                        ),
                        Entry::new(
                            "X",
                            r.draw,
                            MIN_CORNERS_RESULT,
                            format!("Corners finished level in {}% of matches", pct(r.draw)),
                        ),
                        Entry::new(
                            "2",
                            r.away,
                            MIN_CORNERS_RESULT,
                            format!("{team_b} won the corner count in {}% of matches", pct(r.away)),
                        ),
                    ],
                );
            }
            if let Some(ranges) = &corners.ranges {
                emit_ranges(&mut out, CORNER_RANGE, ranges, MIN_CORNER_RANGE, "corners");
            }
            if let Some(lines) = &corners.lines {
                emit_lines(&mut out, TOTAL_CORNERS, lines, MIN_TOTAL_CORNERS, "corners", None);
            }
        }

        if let Some(cards) = &stats.cards {
            if let Some(lines) = &cards.lines {
                emit_lines(&mut out, TOTAL_CARDS, lines, MIN_TOTAL_CARDS, "cards", None);
            }
            if let Some(red) = &cards.red_card {
                emit(
                    &mut out,
                    RED_CARD,
                    vec![
                        Entry::new(
                            "Yes",
                            red.yes,
                            MIN_RED_CARD_YES,
                            format!("A red card was shown in {}% of matches", pct(red.yes)),
                        ),
                        Entry::new(
                            "No",
                            red.no,
                            MIN_RED_CARD_NO,
                            format!("{}% of matches finished without a red card", pct(red.no)),
                        ),
                    ],
                );
            }
        }
    }

    out
}

fn emit(out: &mut Vec<CandidateOutcome>, category: &str, entries: Vec<Entry>) {
    if entries.iter().any(|e| e.pct.is_some_and(|p| !is_valid_pct(p))) {
        debug!(category, "skipping malformed market family");
        return;
    }
    for entry in entries {
        let Some(p) = entry.pct else { continue };
        if p >= entry.threshold {
            out.push(CandidateOutcome::new(
                category,
                entry.label,
                p,
                entry.odds,
                entry.reasoning,
            ));
        }
    }
}

fn emit_lines(
    out: &mut Vec<CandidateOutcome>,
    category: &str,
    lines: &[TotalLine],
    threshold: f64,
    unit: &str,
    odds: Option<&MarketOdds>,
) {
    if lines.iter().any(|l| !l.line.is_finite() || l.line < 0.0) {
        debug!(category, "skipping market family with invalid line");
        return;
    }
    let mut entries = Vec::with_capacity(lines.len() * 2);
    for l in lines {
        let is_2_5 = (l.line - 2.5).abs() < 1e-9;
        let (over_odds, under_odds) = match odds {
            Some(o) if is_2_5 => (o.over_2_5, o.under_2_5),
            _ => (None, None),
        };
        entries.push(
            Entry::new(
                format!("Over {}", l.line),
                l.over,
                threshold,
                format!("{}% of matches went over {} {unit}", pct(l.over), l.line),
            )
            .with_odds(over_odds),
        );
        entries.push(
            Entry::new(
                format!("Under {}", l.line),
                l.under,
                threshold,
                format!("{}% of matches stayed under {} {unit}", pct(l.under), l.line),
            )
            .with_odds(under_odds),
        );
    }
    emit(out, category, entries);
}

fn emit_ranges(
    out: &mut Vec<CandidateOutcome>,
    category: &str,
    ranges: &[RangeShare],
    threshold: f64,
    unit: &str,
) {
    let entries = ranges
        .iter()
        .filter(|r| !r.label.trim().is_empty())
        .map(|r| {
            Entry::new(
                r.label.trim(),
                r.percentage,
                threshold,
                format!("{}% of matches finished with {} {unit}", pct(r.percentage), r.label.trim()),
            )
        })
        .collect();
    emit(out, category, entries);
}

fn is_valid_pct(p: f64) -> bool {
    p.is_finite() && (0.0..=100.0).contains(&p)
}

fn pct(p: Option<f64>) -> String {
    match p {
        Some(p) if p.fract() == 0.0 => format!("{p:.0}"),
        Some(p) => format!("{p:.1}"),
        None => "-".to_string(),
    }
}

/// Accepts `62`, `62.5`, `"62.5"` or `"62.5%"`; anything else reads as missing.
fn de_pct<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(parse_pct_value))
}

/// A family with the wrong shape deserializes to `None`.
fn de_family<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| serde_json::from_value(v).ok()))
}

fn parse_pct_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_pct_cell(s),
        _ => None,
    }
}

fn parse_pct_cell(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() || s == "-" {
        return None;
    }
    let s = s.trim_end_matches('%').replace(',', "");
    s.trim().parse::<f64>().ok()
}
