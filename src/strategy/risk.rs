//! Risk state and halt policy.
//!
//! `RiskState` is rebuilt every cycle from the venue's balance and open
//! orders. It is mutated sequentially by the sizer and then by the
//! executor; it never outlives the cycle.

use std::fmt;

use crate::config::RiskConfig;

/// Why a cycle stopped taking new risk. A halt is policy, not failure.
#[derive(Debug, Clone, PartialEq)]
pub enum HaltReason {
    NonPositiveBalance { balance: f64 },
    ExposureCap { exposure: f64, cap: f64 },
    Drawdown { balance: f64, peak: f64, limit_pct: f64 },
    StopLoss { asset: String, loss_pct: f64, limit_pct: f64 },
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::NonPositiveBalance { balance } => {
                write!(f, "balance ${balance:.2} is not positive; no new positions")
            }
            HaltReason::ExposureCap { exposure, cap } => {
                write!(f, "exposure ${exposure:.2} reached cap ${cap:.2}; remaining signals skipped")
            }
            HaltReason::Drawdown { balance, peak, limit_pct } => write!(
                f,
                "drawdown halt: balance ${balance:.2} vs session peak ${peak:.2} exceeds {:.0}% limit",
                limit_pct * 100.0
            ),
            HaltReason::StopLoss { asset, loss_pct, limit_pct } => write!(
                f,
                "stop-loss breached on {asset}: loss {:.1}% >= {:.0}% limit (advisory, no exit placed)",
                loss_pct * 100.0,
                limit_pct * 100.0
            ),
        }
    }
}

/// Ephemeral per-cycle risk bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskState {
    pub balance: f64,
    /// Exposure already resting at the venue when the cycle started.
    pub seed_exposure: f64,
    /// Seed plus everything reserved by the sizer this cycle.
    pub total_exposure: f64,
    /// Seed plus notional of orders actually placed this cycle.
    pub committed_exposure: f64,
    max_total_exposure_pct: f64,
}

impl RiskState {
    pub fn new(balance: f64, seed_exposure: f64, config: &RiskConfig) -> Self {
        let seed_exposure = seed_exposure.max(0.0);
        Self {
            balance,
            seed_exposure,
            total_exposure: seed_exposure,
            committed_exposure: seed_exposure,
            max_total_exposure_pct: config.max_total_exposure_pct,
        }
    }

    /// Aggregate exposure cap in dollars.
    pub fn exposure_cap(&self) -> f64 {
        self.balance.max(0.0) * self.max_total_exposure_pct
    }

    /// Dollars that can still be committed before the cap.
    pub fn headroom(&self) -> f64 {
        (self.exposure_cap() - self.total_exposure).max(0.0)
    }

    /// `Some` once running exposure has reached the cap.
    pub fn exposure_halt(&self) -> Option<HaltReason> {
        if self.total_exposure >= self.exposure_cap() {
            Some(HaltReason::ExposureCap {
                exposure: self.total_exposure,
                cap: self.exposure_cap(),
            })
        } else {
            None
        }
    }

    pub fn add_exposure(&mut self, amount: f64) {
        self.total_exposure += amount.max(0.0);
    }

    /// `Some` once placed orders have used up the cap.
    pub fn committed_halt(&self) -> Option<HaltReason> {
        if self.committed_exposure >= self.exposure_cap() {
            Some(HaltReason::ExposureCap {
                exposure: self.committed_exposure,
                cap: self.exposure_cap(),
            })
        } else {
            None
        }
    }

    pub fn commit(&mut self, notional: f64) {
        self.committed_exposure += notional.max(0.0);
    }
}

/// Session high-water mark for the optional drawdown halt.
///
/// Lives in memory for the life of the process only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawdownTracker {
    peak_balance: f64,
}

impl DrawdownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peak(&self) -> f64 {
        self.peak_balance
    }

    /// Record a balance observation and check it against the limit.
    pub fn observe(&mut self, balance: f64, limit_pct: f64) -> Option<HaltReason> {
        if balance > self.peak_balance {
            self.peak_balance = balance;
        }
        if self.peak_balance <= 0.0 {
            return None;
        }
        let drawdown = 1.0 - balance / self.peak_balance;
        if drawdown >= limit_pct {
            Some(HaltReason::Drawdown {
                balance,
                peak: self.peak_balance,
                limit_pct,
            })
        } else {
            None
        }
    }
}

/// Fractional loss of a filled position marked at `mark`.
pub fn unrealized_loss_pct(entry_price: f64, mark: f64) -> f64 {
    if entry_price <= 0.0 {
        return 0.0;
    }
    ((entry_price - mark) / entry_price).max(0.0)
}
