//! End-to-end decision cycles against the in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use binary_edge::config::AppConfig;
use binary_edge::engine::{CycleOrchestrator, CyclePhase};
use binary_edge::platforms::paper::PaperVenue;
use binary_edge::platforms::VenueClient;
use binary_edge::storage::{load_entries, JsonlLogSink};
use binary_edge::types::{EngineError, LogAction, OpenOrder, Side};

use crate::mock_venue::{market, MockMarkets, MockSpots, MockVenue};

const BTC_Q: &str = "Will Bitcoin be up in the next 5 minutes?";

fn all_spots() -> MockSpots {
    MockSpots::new(&[("BTC", 66_235.0), ("ETH", 3_120.0), ("SOL", 142.5), ("XRP", 0.52)])
}

fn build(markets: MockMarkets, venue: Arc<dyn VenueClient>) -> CycleOrchestrator {
    CycleOrchestrator::from_config(&AppConfig::default(), Arc::new(markets), Arc::new(all_spots()), venue)
}

#[tokio::test]
async fn reference_scenario_buys_yes() {
    let venue = Arc::new(MockVenue::new(dec!(1000)));
    let orch = build(MockMarkets::new(vec![market("btc-5m", BTC_Q, 0.45)]), venue.clone());

    let report = orch.run_cycle().await.unwrap();

    assert_eq!(
        report.phases,
        vec![
            CyclePhase::Scan,
            CyclePhase::Size,
            CyclePhase::Execute,
            CyclePhase::Monitor,
            CyclePhase::Done
        ]
    );
    let scan = &report.entries[0];
    assert_eq!(scan.action, LogAction::Scan);
    assert!(scan.details.contains("model=49.98"));
    assert!(scan.details.contains("edge=+4.98pp"));

    // Quarter-Kelly on $1000 is ~$22.64, so 50 shares at 0.45
    let placed = venue.placed();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].token_id, "btc-5m-yes");
    assert_eq!(placed[0].price, dec!(0.45));
    assert_eq!(placed[0].size, dec!(50));

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].position.signal.side, Side::Buy);
    assert!((report.summary.committed - 22.5).abs() < 1e-9);
}

#[tokio::test]
async fn one_rejected_order_does_not_stop_the_batch() {
    let venue = Arc::new(MockVenue::new(dec!(1000)));
    venue.reject("eth-5m-yes");
    let markets = MockMarkets::new(vec![
        market("btc-5m", BTC_Q, 0.45),
        market("eth-5m", "Will Ethereum be up in the next 5 minutes?", 0.45),
        market("sol-5m", "Will Solana be up in the next 5 minutes?", 0.45),
        market("xrp-5m", "Will XRP be up in the next 5 minutes?", 0.45),
    ]);
    let report = build(markets, venue.clone()).run_cycle().await.unwrap();

    assert_eq!(report.results.len(), 3);
    assert_eq!(report.summary.trades, 3);
    let errors: Vec<_> = report
        .entries
        .iter()
        .filter(|e| e.action == LogAction::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].asset.as_deref(), Some("ETH"));

    let tokens: Vec<_> = venue.placed().into_iter().map(|o| o.token_id).collect();
    assert_eq!(tokens, vec!["btc-5m-yes", "sol-5m-yes", "xrp-5m-yes"]);
}

#[tokio::test]
async fn exposure_never_exceeds_caps() {
    let venue = Arc::new(MockVenue::new(dec!(1000)));
    let markets = MockMarkets::new((0..12).map(|i| market(&format!("m{i:02}"), BTC_Q, 0.20)).collect());
    let report = build(markets, venue.clone()).run_cycle().await.unwrap();

    assert!(report.summary.halts >= 1);
    let sizes: Vec<f64> = report.results.iter().map(|r| r.position.size_usd).collect();
    assert!(!sizes.is_empty());
    for size in &sizes {
        assert!(*size <= 1000.0 * 0.05 + 1e-9);
    }
    assert!(sizes.iter().sum::<f64>() <= 1000.0 * 0.40 + 1e-9);
    assert!(report.summary.committed <= 400.0 + 1e-9);
    assert!(venue.placed().len() <= 8);
}

#[tokio::test]
async fn resting_orders_consume_headroom() {
    // $390 already resting against a $400 cap leaves $10 of headroom.
    let venue = Arc::new(MockVenue::new(dec!(1000)).with_open_orders(vec![OpenOrder {
        price: dec!(0.39),
        original_size: dec!(1000),
        size_matched: dec!(0),
        asset: "older-yes".into(),
        side: Side::Buy,
    }]));
    let markets = MockMarkets::new(vec![market("btc-5m", BTC_Q, 0.45), market("btc-5m-b", BTC_Q, 0.45)]);
    let report = build(markets, venue.clone()).run_cycle().await.unwrap();

    let placed = venue.placed();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].size, dec!(22));
    assert_eq!(report.summary.halts, 1);
}

#[tokio::test]
async fn unmatched_market_prices_off_default_spot() {
    let venue = Arc::new(MockVenue::new(dec!(1000)));
    let markets = MockMarkets::new(vec![market("doge-5m", "Will Dogecoin be up in the next 5 minutes?", 0.45)]);
    let report = build(markets, venue).run_cycle().await.unwrap();

    let scan = report
        .entries
        .iter()
        .find(|e| e.action == LogAction::Scan)
        .unwrap();
    assert_eq!(scan.asset.as_deref(), Some("BTC"));
    assert!(scan.details.contains("spot fallback: no asset matched question"));
    assert!(scan.details.contains("spot=66235.00"));
    assert_eq!(report.summary.trades, 1);
}

#[tokio::test]
async fn open_order_failure_assumes_zero_exposure() {
    let venue = Arc::new(MockVenue::new(dec!(1000)));
    venue.fail_open_orders("gateway timeout");
    let report = build(MockMarkets::new(vec![market("btc-5m", BTC_Q, 0.45)]), venue.clone())
        .run_cycle()
        .await
        .unwrap();

    assert!(report
        .entries
        .iter()
        .any(|e| e.action == LogAction::Error && e.details.contains("assuming zero open exposure")));
    assert_eq!(report.summary.trades, 1);
    assert_eq!(venue.placed().len(), 1);
}

#[tokio::test]
async fn balance_failure_ends_after_sizing() {
    let venue = Arc::new(MockVenue::new(dec!(1000)));
    venue.fail_balance("HTTP 503");
    let report = build(MockMarkets::new(vec![market("btc-5m", BTC_Q, 0.45)]), venue.clone())
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(report.path(), "SCAN → SIZE → DONE");
    assert_eq!(report.summary.errors, 1);
    assert!(venue.placed().is_empty());
}

#[tokio::test]
async fn market_fetch_failure_is_an_empty_scan() {
    let markets = MockMarkets::new(vec![market("btc-5m", BTC_Q, 0.45)]);
    markets.set_error("HTTP 500");
    let report = build(markets, Arc::new(MockVenue::new(dec!(1000))))
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(report.path(), "SCAN → DONE");
    assert_eq!(report.summary.errors, 1);
    assert_eq!(report.summary.scans, 0);
}

#[tokio::test]
async fn fair_market_produces_no_trade() {
    let venue = Arc::new(MockVenue::new(dec!(1000)));
    let markets = MockMarkets::new(vec![
        market("btc-5m", BTC_Q, 0.50),
        market("btc-settled", BTC_Q, 0.99),
    ]);
    let report = build(markets, venue.clone()).run_cycle().await.unwrap();

    assert_eq!(report.phases, vec![CyclePhase::Scan, CyclePhase::Done]);
    assert_eq!(report.summary.scans, 1);
    assert_eq!(report.summary.skips, 2);
    assert!(venue.placed().is_empty());
}

#[tokio::test]
async fn overlapping_trigger_is_rejected() {
    let markets = MockMarkets::new(vec![]).with_delay(Duration::from_millis(200));
    let orch = build(markets, Arc::new(MockVenue::new(dec!(1000))));

    let (first, second) = tokio::join!(orch.run_cycle(), orch.run_cycle());
    assert!(first.is_ok());
    assert!(matches!(second, Err(EngineError::CycleInFlight)));

    // The session is free again afterwards
    assert_eq!(orch.run_cycle().await.unwrap().cycle_number, 2);
}

#[tokio::test]
async fn paper_venue_fills_and_debits() {
    let paper = Arc::new(PaperVenue::new(dec!(1000)));
    let orch = build(MockMarkets::new(vec![market("btc-5m", BTC_Q, 0.45)]), paper.clone());
    let report = orch.run_cycle().await.unwrap();

    assert_eq!(report.results.len(), 1);
    assert!(report.results[0].order_id.starts_with("paper-"));
    assert_eq!(report.results[0].status, "matched");
    assert_eq!(paper.get_balance().await.unwrap(), dec!(977.50));
}

#[tokio::test]
async fn off_tick_prices_never_overshoot_position_size() {
    // 0.205 rounds up to 0.21 at the venue tick
    let paper = Arc::new(PaperVenue::new(dec!(1000)));
    let markets = MockMarkets::new((0..12).map(|i| market(&format!("m{i:02}"), BTC_Q, 0.205)).collect());
    let report = build(markets, paper.clone()).run_cycle().await.unwrap();

    let fills = paper.fills().await;
    assert_eq!(fills.len(), 8);
    let mut placed = Decimal::ZERO;
    for (_, order) in &fills {
        assert_eq!(order.price, dec!(0.21));
        assert!(order.price * order.size <= dec!(50));
        placed += order.price * order.size;
    }
    assert!(placed <= dec!(400));
    assert_eq!(paper.get_balance().await.unwrap(), dec!(1000) - placed);

    let placed = placed.to_f64().unwrap();
    assert!((report.summary.committed - placed).abs() < 1e-9);
    let from_results: f64 = report.results.iter().map(|r| r.notional()).sum();
    assert!((from_results - placed).abs() < 1e-9);
}

#[tokio::test]
async fn cycle_log_is_appended_to_jsonl_sink() {
    let mut path = std::env::temp_dir();
    path.push(format!("binary_edge_cycle_{}.jsonl", uuid::Uuid::new_v4()));

    let orch = build(
        MockMarkets::new(vec![market("btc-5m", BTC_Q, 0.45)]),
        Arc::new(MockVenue::new(dec!(1000))),
    )
    .with_sink(Arc::new(JsonlLogSink::new(&path)));

    let first = orch.run_cycle().await.unwrap();
    let second = orch.run_cycle().await.unwrap();

    let records = load_entries(&path).await.unwrap();
    assert_eq!(records.len(), first.entries.len() + second.entries.len());
    assert_eq!(records[0].cycle, 1);
    assert_eq!(records.last().map(|r| r.cycle), Some(2));
    assert!(records.iter().any(|r| r.entry.action == LogAction::Trade));

    let _ = tokio::fs::remove_file(&path).await;
}
