use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::debug;

use crate::state::Selection;

#[derive(Debug, Default)]
struct LedgerInner {
    selections: Vec<Selection>,
    revision: u64,
}

/// The user's advisory picks, at most one per fixture.
///
/// Cloning yields another handle to the same store; every handle observes a
/// write as soon as the writing call returns. Views that want to re-render on
/// change can `subscribe()` to the revision counter.
#[derive(Debug, Clone)]
pub struct SelectionLedger {
    inner: Arc<Mutex<LedgerInner>>,
    revision_tx: Arc<watch::Sender<u64>>,
}

impl Default for SelectionLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionLedger {
    pub fn new() -> Self {
        let (revision_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(LedgerInner::default())),
            revision_tx: Arc::new(revision_tx),
        }
    }

    /// Toggle or replace: the identical pick removes it, any other pick for the
    /// same fixture replaces the existing one.
    pub fn add(&self, selection: Selection) {
        self.mutate(|inner| {
            let existing = inner
                .selections
                .iter()
                .position(|s| s.match_id == selection.match_id);
            match existing {
                Some(idx)
                    if inner.selections[idx].is_same_pick(
                        &selection.match_id,
                        &selection.category,
                        &selection.outcome,
                    ) =>
                {
                    debug!(match_id = %selection.match_id, "selection toggled off");
                    inner.selections.remove(idx);
                }
                Some(idx) => {
                    debug!(match_id = %selection.match_id, outcome = %selection.outcome, "selection replaced");
                    inner.selections.remove(idx);
                    inner.selections.push(selection);
                }
                None => {
                    debug!(match_id = %selection.match_id, outcome = %selection.outcome, "selection added");
                    inner.selections.push(selection);
                }
            }
            true
        });
    }

    pub fn remove(&self, match_id: &str) {
        self.mutate(|inner| {
            let before = inner.selections.len();
            inner.selections.retain(|s| s.match_id != match_id);
            inner.selections.len() != before
        });
    }

    pub fn clear_all(&self) {
        self.mutate(|inner| {
            let had_any = !inner.selections.is_empty();
            inner.selections.clear();
            had_any
        });
    }

    pub fn is_selected(&self, match_id: &str, category: &str, outcome: &str) -> bool {
        self.lock()
            .selections
            .iter()
            .any(|s| s.is_same_pick(match_id, category, outcome))
    }

    pub fn selection_for(&self, match_id: &str) -> Option<Selection> {
        self.lock()
            .selections
            .iter()
            .find(|s| s.match_id == match_id)
            .cloned()
    }

    pub fn selections(&self) -> Vec<Selection> {
        self.lock().selections.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().selections.is_empty()
    }

    pub fn combined_probability(&self) -> f64 {
        combined_probability(&self.lock().selections)
    }

    pub fn risk_score(&self) -> f64 {
        risk_score(self.combined_probability())
    }

    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision_tx.subscribe()
    }

    fn mutate(&self, f: impl FnOnce(&mut LedgerInner) -> bool) {
        let revision = {
            let mut inner = self.lock();
            if !f(&mut inner) {
                return;
            }
            inner.revision += 1;
            inner.revision
        };
        self.revision_tx.send_replace(revision);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerInner> {
        self.inner.lock().expect("selection ledger lock poisoned")
    }
}

/// Product of the pick probabilities, treating every pick as independent.
///
/// Picks drawn from the same fixture are usually correlated (e.g. Over 2.5 and
/// BTTS Yes), so this understates or overstates the real joint probability.
pub fn combined_probability(selections: &[Selection]) -> f64 {
    if selections.is_empty() {
        return 0.0;
    }
    100.0
        * selections
            .iter()
            .map(|s| s.probability / 100.0)
            .product::<f64>()
}

/// Reciprocal of the combined probability, rounded to one decimal place.
pub fn risk_score(combined_probability: f64) -> f64 {
    if combined_probability == 0.0 {
        return 0.0;
    }
    (10.0 / (combined_probability / 100.0)).round() / 10.0
}
