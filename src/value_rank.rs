use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::state::CandidateOutcome;

pub const BEST_VALUE_MIN_PROBABILITY: f64 = 45.0;
pub const SHORTLIST_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankParams {
    pub best_value_min_probability: f64,
    pub shortlist_len: usize,
}

impl Default for RankParams {
    fn default() -> Self {
        Self {
            best_value_min_probability: BEST_VALUE_MIN_PROBABILITY,
            shortlist_len: SHORTLIST_LEN,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shortlists {
    pub best_value: Vec<CandidateOutcome>,
    pub safest: Vec<CandidateOutcome>,
}

/// Observed bookmaker odds when present, otherwise zero-margin fair odds
/// (`100 / probability`). Zero or negative probabilities cannot be priced
/// and yield `0.0`.
pub fn estimated_odds(probability: f64, market_odds: Option<f64>) -> f64 {
    if let Some(odds) = market_odds {
        return odds;
    }
    if !probability.is_finite() || probability <= 0.0 {
        return 0.0;
    }
    100.0 / probability
}

/// `probability * log2(odds)`, or zero when the odds pay nothing back (`<= 1`).
pub fn value_score(probability: f64, estimated_odds: f64) -> f64 {
    if estimated_odds > 1.0 && probability.is_finite() {
        probability * estimated_odds.log2()
    } else {
        0.0
    }
}

pub fn rank(catalog: &[CandidateOutcome]) -> Shortlists {
    rank_with(catalog, &RankParams::default())
}

/// Both shortlists are always produced; either may be empty.
///
/// Sorting is stable, so equal scores keep catalog order.
pub fn rank_with(catalog: &[CandidateOutcome], params: &RankParams) -> Shortlists {
    let mut best_value: Vec<CandidateOutcome> = catalog
        .iter()
        .filter(|c| c.probability >= params.best_value_min_probability)
        .cloned()
        .collect();
    best_value.sort_by(|a, b| desc(a.value_score, b.value_score));
    best_value.truncate(params.shortlist_len);

    let mut safest: Vec<CandidateOutcome> = catalog
        .iter()
        .filter(|c| !c.probability.is_nan())
        .cloned()
        .collect();
    safest.sort_by(|a, b| desc(a.probability, b.probability));
    safest.truncate(params.shortlist_len);

    Shortlists { best_value, safest }
}

fn desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fair_odds_inverse_of_probability() {
        assert!((estimated_odds(50.0, None) - 2.0).abs() < 1e-12);
        assert!((estimated_odds(72.0, None) - 1.388_888).abs() < 1e-5);
    }

    #[test]
    fn market_odds_win_over_fair_odds() {
        assert_eq!(estimated_odds(50.0, Some(2.4)), 2.4);
    }

    #[test]
    fn zero_probability_is_unpriced() {
        assert_eq!(estimated_odds(0.0, None), 0.0);
        assert_eq!(value_score(0.0, 0.0), 0.0);
    }

    #[test]
    fn break_even_odds_score_zero() {
        for p in [1.0, 45.0, 90.0, 100.0] {
            assert_eq!(value_score(p, 1.0), 0.0);
        }
        assert_eq!(value_score(80.0, 0.9), 0.0);
    }

    #[test]
    fn desc_orders_larger_first() {
        let mut xs = vec![1.0, 3.0, 2.0];
        xs.sort_by(|a, b| desc(*a, *b));
        assert_eq!(xs, vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn nan_probability_is_left_out_of_shortlists() {
        let catalog = vec![
            CandidateOutcome::new("BTTS", "Yes", f64::NAN, None, "test"),
            CandidateOutcome::new("BTTS", "No", 60.0, None, "test"),
            CandidateOutcome::new("Double Chance", "1X", 75.0, Some(1.6), "test"),
        ];
        let lists = rank_with(&catalog, &RankParams::default());
        let safest: Vec<&str> = lists.safest.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(safest, vec!["1X", "No"]);
        assert!(lists.best_value.iter().all(|c| !c.probability.is_nan()));
    }
}
