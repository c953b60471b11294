//! Kelly criterion position sizing.
//!
//! Turns edge signals into share counts using fractional Kelly, a
//! per-position cap and an aggregate exposure circuit breaker seeded from
//! the venue's live open orders.

use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::risk::{DrawdownTracker, HaltReason, RiskState};
use crate::config::RiskConfig;
use crate::platforms::{timed, VenueClient};
use crate::types::{CycleLog, EdgeSignal, SizedPosition};

// ---------------------------------------------------------------------------
// Kelly math
// ---------------------------------------------------------------------------

/// Full-Kelly fraction `f* = (p·b − q) / b` for win probability `p` and net
/// odds `b`. Non-positive odds never justify a bet.
pub fn kelly_fraction(p: f64, b: f64) -> f64 {
    if !(b > 0.0) || !b.is_finite() {
        return 0.0;
    }
    let q = 1.0 - p;
    (p * b - q) / b
}

/// Net odds for buying an outcome at `price`: win `1/price − 1` per dollar.
pub fn net_odds(price: f64) -> f64 {
    if !(price > 0.0) {
        return 0.0;
    }
    1.0 / price - 1.0
}

// ---------------------------------------------------------------------------
// Sizer
// ---------------------------------------------------------------------------

/// Result of one sizing pass.
#[derive(Debug, Clone, Default)]
pub struct SizingOutcome {
    pub positions: Vec<SizedPosition>,
    /// `None` when no usable balance was obtained.
    pub risk: Option<RiskState>,
    pub log: CycleLog,
}

pub struct PositionSizer {
    config: RiskConfig,
}

impl PositionSizer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Applied bankroll fraction for one signal, in `[0, max_position_pct]`.
    ///
    /// `p` is the model's YES probability on both sides; only the odds
    /// follow the side, priced off the YES or NO execution price.
    pub fn applied_fraction(&self, signal: &EdgeSignal) -> f64 {
        let p = signal.model_fair / 100.0;
        let b = net_odds(signal.execution_price());
        let raw = kelly_fraction(p, b);
        (raw * self.config.kelly_fraction).clamp(0.0, self.config.max_position_pct)
    }

    /// Fetch balance and open orders, apply the pre-sizing halts, then size.
    pub async fn size(
        &self,
        signals: &[EdgeSignal],
        venue: &dyn VenueClient,
        drawdown: &mut DrawdownTracker,
        call_timeout: Duration,
    ) -> SizingOutcome {
        let mut log = CycleLog::new();

        let balance = match timed("get_balance", call_timeout, venue.get_balance()).await {
            Ok(b) => b.to_f64().unwrap_or(0.0),
            Err(e) => {
                log.error(None, format!("balance lookup failed: {e}"));
                return SizingOutcome { log, ..Default::default() };
            }
        };

        if balance <= 0.0 {
            log.halt(None, HaltReason::NonPositiveBalance { balance }.to_string());
            return SizingOutcome { log, ..Default::default() };
        }

        let drawdown_halt = drawdown.observe(balance, self.config.max_drawdown_pct);
        if self.config.enforce_drawdown {
            if let Some(reason) = drawdown_halt {
                log.halt(None, reason.to_string());
                return SizingOutcome { log, ..Default::default() };
            }
        }

        let seed = match timed("get_open_orders", call_timeout, venue.get_open_orders()).await {
            Ok(orders) => {
                let total: Decimal = orders.iter().map(|o| o.open_notional()).sum();
                total.to_f64().unwrap_or(0.0)
            }
            Err(e) => {
                log.error(
                    None,
                    format!("open-order lookup failed, assuming zero open exposure (best effort): {e}"),
                );
                0.0
            }
        };

        let mut risk = RiskState::new(balance, seed, &self.config);
        let (positions, sized_log) = self.size_with(signals, &mut risk);
        log.extend(sized_log);

        SizingOutcome {
            positions,
            risk: Some(risk),
            log,
        }
    }

    /// Size signals against an already-built risk state, in signal order.
    pub fn size_with(&self, signals: &[EdgeSignal], risk: &mut RiskState) -> (Vec<SizedPosition>, CycleLog) {
        let mut log = CycleLog::new();
        let mut positions = Vec::new();

        if risk.balance <= 0.0 {
            log.halt(None, HaltReason::NonPositiveBalance { balance: risk.balance }.to_string());
            return (positions, log);
        }

        for signal in signals {
            if let Some(reason) = risk.exposure_halt() {
                log.halt(Some(&signal.asset), reason.to_string());
                break;
            }

            let fraction = self.applied_fraction(signal);
            if fraction <= 0.0 {
                debug!(market_id = %signal.market.id, "Non-positive Kelly, dropped");
                continue;
            }

            let price = signal.execution_price();
            let size_usd = (fraction * risk.balance).min(risk.headroom());
            let shares = (size_usd / price).floor();
            if !(shares >= 1.0) {
                debug!(
                    market_id = %signal.market.id,
                    size_usd = format!("${:.2}", size_usd),
                    "Position rounds to zero shares, dropped"
                );
                continue;
            }

            risk.add_exposure(size_usd);
            let position = SizedPosition {
                signal: signal.clone(),
                kelly_fraction: fraction,
                size_usd,
                shares: shares as u64,
            };
            info!(
                market_id = %signal.market.id,
                position = %position,
                exposure = format!("${:.2}", risk.total_exposure),
                "Position sized"
            );
            positions.push(position);
        }

        (positions, log)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
