use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{BalanceApi, QuotaApi, QuotaDecision};
use crate::error::{ApiError, UnlockError};
use crate::state::QuotaState;

/// Whether a paid unlock can be offered while blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOffer {
    /// The balance collaborator could not be reached.
    Unknown,
    Available { balance: u64, cost: u64 },
    Unavailable { balance: u64, cost: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    /// No entry check has run yet.
    Unchecked,
    Open {
        override_paid: bool,
    },
    Blocked {
        reset_at: Option<DateTime<Utc>>,
        offer: UnlockOffer,
    },
}

impl GateState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

/// Daily view-quota gate for one `(user, match_key)` pair.
///
/// `generation` increments on every `Blocked -> Open` transition; fetches
/// started under an older generation must be discarded.
pub struct QuotaGate {
    quota: Arc<dyn QuotaApi>,
    balance: Arc<dyn BalanceApi>,
    match_key: String,
    unlock_cost: u64,
    fail_open_on_unauthorized: bool,
    state: GateState,
    cached: Option<QuotaState>,
    generation: u64,
}

impl QuotaGate {
    pub fn new(
        quota: Arc<dyn QuotaApi>,
        balance: Arc<dyn BalanceApi>,
        match_key: impl Into<String>,
        unlock_cost: u64,
        fail_open_on_unauthorized: bool,
    ) -> Self {
        Self {
            quota,
            balance,
            match_key: match_key.into(),
            unlock_cost,
            fail_open_on_unauthorized,
            state: GateState::Unchecked,
            cached: None,
            generation: 0,
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn quota_state(&self) -> Option<&QuotaState> {
        self.cached.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn match_key(&self) -> &str {
        &self.match_key
    }

    /// Record a view and move to `Open` or `Blocked`.
    pub async fn check(&mut self) -> &GateState {
        self.evaluate(false).await;
        &self.state
    }

    /// Spend balance to unlock this fixture, then re-run the entry check with
    /// the override flag.
    pub async fn unlock(&mut self) -> Result<(), UnlockError> {
        if !self.state.is_blocked() {
            return Err(UnlockError::NotBlocked);
        }
        let balance = self.balance.balance().await?;
        if balance < self.unlock_cost {
            self.set_offer(UnlockOffer::Unavailable {
                balance,
                cost: self.unlock_cost,
            });
            return Err(UnlockError::InsufficientBalance {
                balance,
                cost: self.unlock_cost,
            });
        }

        let outcome = self.balance.use_for_analysis().await?;
        if !outcome.success {
            warn!(match_key = %self.match_key, "analysis unlock payment declined");
            return Err(UnlockError::PaymentDeclined);
        }
        info!(match_key = %self.match_key, new_balance = outcome.new_balance, "analysis unlocked with balance");

        self.evaluate(true).await;
        if self.state.is_open() {
            Ok(())
        } else {
            Err(UnlockError::Rejected)
        }
    }

    /// Time left until the server resets the quota, while blocked.
    pub fn countdown(&self, now: DateTime<Utc>) -> Option<Duration> {
        let GateState::Blocked {
            reset_at: Some(reset_at),
            ..
        } = &self.state
        else {
            return None;
        };
        Some((*reset_at - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// Re-run the entry check once the countdown has reached zero. Returns
    /// whether a re-check happened.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> bool {
        if self.countdown(now) != Some(Duration::ZERO) {
            return false;
        }
        debug!(match_key = %self.match_key, "quota reset reached, re-checking");
        self.evaluate(false).await;
        true
    }

    /// Drive the countdown until the gate leaves `Blocked`, the block has no
    /// reset time, or `cancel` fires. The first tick fires immediately.
    ///
    /// A re-check that stays blocked without moving `reset_at` forward ends
    /// the countdown, so a server that disagrees about the reset is not asked
    /// again on every tick.
    pub async fn run_countdown(&mut self, every: Duration, cancel: &CancellationToken) -> &GateState {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        while self.countdown(Utc::now()).is_some() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let before = self.blocked_reset_at();
            if self.tick(Utc::now()).await
                && self.state.is_blocked()
                && self.blocked_reset_at() <= before
            {
                warn!(
                    match_key = %self.match_key,
                    reset_at = ?self.blocked_reset_at(),
                    "quota still exhausted after its reset time, countdown stopped"
                );
                break;
            }
        }
        &self.state
    }

    fn blocked_reset_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            GateState::Blocked { reset_at, .. } => *reset_at,
            _ => None,
        }
    }

    async fn evaluate(&mut self, override_paid: bool) {
        let was_blocked = self.state.is_blocked();
        match self.quota.record(&self.match_key, override_paid).await {
            Ok(decision) => self.apply_decision(decision, override_paid, was_blocked).await,
            Err(err) => self.apply_failure(err, was_blocked),
        }
    }

    async fn apply_decision(&mut self, decision: QuotaDecision, override_paid: bool, was_blocked: bool) {
        self.cached = Some(QuotaState {
            match_key: self.match_key.clone(),
            allowed: decision.allowed,
            views_used_today: decision.views_used_today,
            reset_at: decision.reset_at,
            override_paid: override_paid && decision.allowed,
        });
        if decision.allowed {
            self.open(override_paid, was_blocked);
            return;
        }
        let offer = self.unlock_offer().await;
        info!(match_key = %self.match_key, reset_at = ?decision.reset_at, "view quota exhausted");
        self.state = GateState::Blocked {
            reset_at: decision.reset_at,
            offer,
        };
    }

    fn apply_failure(&mut self, err: ApiError, was_blocked: bool) {
        if err.is_unauthorized() && !self.fail_open_on_unauthorized {
            warn!(match_key = %self.match_key, "quota check unauthorized, blocking");
            self.state = GateState::Blocked {
                reset_at: None,
                offer: UnlockOffer::Unknown,
            };
            return;
        }
        warn!(match_key = %self.match_key, error = %err, "quota check failed, failing open");
        self.open(false, was_blocked);
    }

    fn open(&mut self, override_paid: bool, was_blocked: bool) {
        if was_blocked {
            self.generation += 1;
            info!(match_key = %self.match_key, generation = self.generation, "gate reopened");
        }
        self.state = GateState::Open { override_paid };
    }

    async fn unlock_offer(&self) -> UnlockOffer {
        match self.balance.balance().await {
            Ok(balance) if balance >= self.unlock_cost => UnlockOffer::Available {
                balance,
                cost: self.unlock_cost,
            },
            Ok(balance) => UnlockOffer::Unavailable {
                balance,
                cost: self.unlock_cost,
            },
            Err(err) => {
                debug!(error = %err, "balance lookup failed");
                UnlockOffer::Unknown
            }
        }
    }

    fn set_offer(&mut self, next: UnlockOffer) {
        if let GateState::Blocked { offer, .. } = &mut self.state {
            *offer = next;
        }
    }
}
