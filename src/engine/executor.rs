//! Trade executor.
//!
//! Places one limit order per sized position at the venue, rounding the
//! execution price to the venue tick. Failures are isolated per position
//! and the committed exposure is re-checked before every order.

use std::time::Duration;

use chrono::Utc;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::info;

use crate::config::ExecutionConfig;
use crate::platforms::{timed, VenueClient};
use crate::strategy::risk::RiskState;
use crate::types::{CycleLog, EngineError, OrderRequest, Side, SizedPosition, TradeResult};

// ---------------------------------------------------------------------------
// Execution report
// ---------------------------------------------------------------------------

/// Result of executing a batch of positions.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub results: Vec<TradeResult>,
    pub log: CycleLog,
    /// Sum of `price × size` over placed orders.
    pub committed: f64,
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct ExecutionController {
    tick_size: Decimal,
    call_timeout: Duration,
}

impl ExecutionController {
    pub fn new(config: &ExecutionConfig) -> Self {
        Self {
            tick_size: Decimal::from_f64(config.tick_size).unwrap_or(Decimal::new(1, 2)),
            call_timeout: config.call_timeout(),
        }
    }

    /// Round a probability price to the nearest tick, kept inside
    /// `[tick, 1 − tick]` so the order is always valid.
    pub fn round_to_tick(&self, price: f64) -> Result<Decimal, EngineError> {
        let raw = Decimal::from_f64(price)
            .filter(|p| *p > Decimal::ZERO && *p < Decimal::ONE)
            .ok_or_else(|| EngineError::domain(format!("execution price {price} is not a valid probability")))?;
        let ticks = (raw / self.tick_size).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        let rounded = (ticks * self.tick_size).clamp(self.tick_size, Decimal::ONE - self.tick_size);
        Ok(rounded.normalize())
    }

    /// Build the venue order for a position: buy the outcome token of the
    /// position's side.
    ///
    /// Rounding up to the tick can raise the price, so the share count is
    /// re-fitted to the position's dollar size at the rounded price. The
    /// placed notional never exceeds `size_usd`.
    pub fn order_for(&self, position: &SizedPosition) -> Result<OrderRequest, EngineError> {
        let side = position.signal.side;
        let token_id = position
            .signal
            .market
            .token_for(side)
            .ok_or_else(|| EngineError::domain(format!("market has no outcome token for {side}")))?;
        let price = self.round_to_tick(position.execution_price())?;

        let budget = Decimal::from_f64(position.size_usd)
            .map(|b| b.round_dp(6))
            .unwrap_or(Decimal::ZERO);
        let size = Decimal::from(position.shares).min((budget / price).floor());
        if size < Decimal::ONE {
            return Err(EngineError::domain(format!(
                "${:.2} buys no whole share at tick price {price}",
                position.size_usd
            )));
        }

        Ok(OrderRequest {
            token_id: token_id.to_string(),
            price,
            size,
            side: Side::Buy,
        })
    }

    /// Place every position in order. One failure never stops the batch;
    /// reaching the aggregate cap does.
    pub async fn execute(
        &self,
        positions: &[SizedPosition],
        risk: &mut RiskState,
        venue: &dyn VenueClient,
    ) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        for position in positions {
            let signal = &position.signal;
            let asset = signal.asset.as_str();

            if let Some(reason) = risk.committed_halt() {
                report.log.halt(Some(asset), reason.to_string());
                break;
            }

            let order = match self.order_for(position) {
                Ok(o) => o,
                Err(e) => {
                    report.log.error(Some(asset), format!("{}: {e}", signal.market.id));
                    continue;
                }
            };

            match timed("place_order", self.call_timeout, venue.place_order(&order)).await {
                Ok(receipt) => {
                    let notional = (order.price * order.size).to_f64().unwrap_or(0.0);
                    risk.commit(notional);
                    report.committed += notional;
                    report.log.trade(
                        Some(asset),
                        format!(
                            "{} {} x{} @ {} notional=${:.2} edge={:+.2}pp kelly={:.2}% order={} status={}",
                            signal.side,
                            signal.market.id,
                            order.size,
                            order.price,
                            notional,
                            signal.divergence,
                            position.kelly_fraction * 100.0,
                            receipt.order_id,
                            receipt.status,
                        ),
                    );
                    report.results.push(TradeResult {
                        position: position.clone(),
                        price: order.price,
                        size: order.size,
                        order_id: receipt.order_id,
                        status: receipt.status,
                        timestamp: Utc::now(),
                    });
                }
                Err(e) => {
                    report
                        .log
                        .error(Some(asset), format!("{}: order placement failed: {e}", signal.market.id));
                }
            }
        }

        info!(
            placed = report.results.len(),
            attempted = positions.len(),
            committed = format!("${:.2}", report.committed),
            "Batch execution complete"
        );
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
