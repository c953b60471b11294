//! Position monitor.
//!
//! Reports fill state of resting orders after execution. With
//! `risk.enforce_stop_loss` on, a partially filled order whose outcome is
//! now marked below the stop emits a HALT advisory. No exits are placed.

use std::collections::HashMap;
use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

use crate::config::RiskConfig;
use crate::platforms::{timed, VenueClient};
use crate::strategy::risk::{unrealized_loss_pct, HaltReason};
use crate::types::{CycleLog, Market};

/// Current outcome prices keyed by token id.
pub fn marks_from_markets(markets: &[Market]) -> HashMap<String, f64> {
    let mut marks = HashMap::new();
    for m in markets {
        if !m.yes_token.is_empty() {
            marks.insert(m.yes_token.clone(), m.price_yes);
        }
        if !m.no_token.is_empty() {
            marks.insert(m.no_token.clone(), m.price_no);
        }
    }
    marks
}

pub struct PositionMonitor {
    config: RiskConfig,
    call_timeout: Duration,
}

impl PositionMonitor {
    pub fn new(config: RiskConfig, call_timeout: Duration) -> Self {
        Self { config, call_timeout }
    }

    pub async fn monitor(&self, venue: &dyn VenueClient, marks: &HashMap<String, f64>) -> CycleLog {
        let mut log = CycleLog::new();

        let orders = match timed("get_open_orders", self.call_timeout, venue.get_open_orders()).await {
            Ok(orders) => orders,
            Err(e) => {
                log.error(None, format!("open-order lookup failed during monitoring: {e}"));
                return log;
            }
        };

        let mut partial = 0usize;
        for order in orders.iter().filter(|o| o.is_partially_filled()) {
            partial += 1;
            let pct = if order.original_size.is_zero() {
                0.0
            } else {
                (order.size_matched / order.original_size).to_f64().unwrap_or(0.0) * 100.0
            };
            let mark = marks.get(&order.asset).copied();
            let mark_note = mark.map(|m| format!(" mark={m:.2}")).unwrap_or_default();
            log.scan(
                Some(&order.asset),
                format!(
                    "{} fill {}/{} ({:.0}%) @ {} remaining={}{}",
                    order.side,
                    order.size_matched,
                    order.original_size,
                    pct,
                    order.price,
                    order.remaining(),
                    mark_note,
                ),
            );

            if !self.config.enforce_stop_loss {
                continue;
            }
            let (Some(mark), Some(entry)) = (mark, order.price.to_f64()) else {
                continue;
            };
            let loss_pct = unrealized_loss_pct(entry, mark);
            if loss_pct >= self.config.stop_loss_pct {
                let reason = HaltReason::StopLoss {
                    asset: order.asset.clone(),
                    loss_pct,
                    limit_pct: self.config.stop_loss_pct,
                };
                log.halt(Some(&order.asset), reason.to_string());
            }
        }

        debug!(open = orders.len(), partially_filled = partial, "Monitor pass complete");
        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::MockVenueClient;
    use crate::types::{EngineError, LogAction, OpenOrder, Side};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn order(asset: &str, price: Decimal, original: Decimal, matched: Decimal) -> OpenOrder {
        OpenOrder {
            price,
            original_size: original,
            size_matched: matched,
            asset: asset.to_string(),
            side: Side::Buy,
        }
    }

    fn venue_with(orders: Vec<OpenOrder>) -> MockVenueClient {
        let mut venue = MockVenueClient::new();
        venue.expect_get_open_orders().returning(move || Ok(orders.clone()));
        venue
    }

    fn monitor(enforce_stop_loss: bool) -> PositionMonitor {
        PositionMonitor::new(
            RiskConfig { enforce_stop_loss, ..RiskConfig::default() },
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_reports_only_partially_filled_orders() {
        let venue = venue_with(vec![
            order("tok-a", dec!(0.45), dec!(100), dec!(40)),
            order("tok-b", dec!(0.30), dec!(50), dec!(0)),
        ]);
        let log = monitor(false).monitor(&venue, &HashMap::new()).await;
        assert_eq!(log.len(), 1);
        let entry = &log.entries()[0];
        assert_eq!(entry.action, LogAction::Scan);
        assert_eq!(entry.asset.as_deref(), Some("tok-a"));
        assert!(entry.details.contains("fill 40/100 (40%)"));
        assert!(entry.details.contains("remaining=60"));
    }

    #[tokio::test]
    async fn test_lookup_failure_single_error() {
        let mut venue = MockVenueClient::new();
        venue
            .expect_get_open_orders()
            .times(1)
            .returning(|| Err(EngineError::transport("venue", "connection reset")));
        let log = monitor(true).monitor(&venue, &HashMap::new()).await;
        assert_eq!(log.len(), 1);
        assert_eq!(log.count(LogAction::Error), 1);
    }

    #[tokio::test]
    async fn test_stop_loss_advisory_when_enforced() {
        let orders = vec![order("tok-a", dec!(0.50), dec!(100), dec!(100))];
        let marks = HashMap::from([("tok-a".to_string(), 0.40)]);

        let lenient = monitor(false).monitor(&venue_with(orders.clone()), &marks).await;
        assert_eq!(lenient.count(LogAction::Halt), 0);

        let strict = monitor(true).monitor(&venue_with(orders), &marks).await;
        assert_eq!(strict.count(LogAction::Scan), 1);
        assert_eq!(strict.count(LogAction::Halt), 1);
        assert!(strict.entries()[1].details.contains("stop-loss breached on tok-a"));
    }

    #[tokio::test]
    async fn test_stop_loss_needs_a_mark() {
        let venue = venue_with(vec![order("tok-a", dec!(0.50), dec!(100), dec!(10))]);
        let log = monitor(true).monitor(&venue, &HashMap::new()).await;
        assert_eq!(log.count(LogAction::Halt), 0);
    }

    #[test]
    fn test_marks_from_markets() {
        let marks = marks_from_markets(&[Market::sample()]);
        assert_eq!(marks.get("tok-yes"), Some(&0.45));
        assert_eq!(marks.get("tok-no"), Some(&0.55));
    }
}
