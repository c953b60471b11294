//! binary-edge: decision engine for binary outcome markets.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the market, spot and venue clients, and runs one decision cycle
//! per tick until Ctrl+C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use binary_edge::config;
use binary_edge::data::cache::SystemClock;
use binary_edge::data::spot::CoinGeckoSpotSource;
use binary_edge::data::{CachedSpotSource, SpotPriceSource};
use binary_edge::engine::accountant::CycleReport;
use binary_edge::engine::CycleOrchestrator;
use binary_edge::platforms::paper::PaperVenue;
use binary_edge::platforms::polymarket::{GammaMarketSource, OrderGatewayClient};
use binary_edge::platforms::{MarketSource, VenueClient};
use binary_edge::storage::JsonlLogSink;
use binary_edge::types::EngineError;

const BANNER: &str = r#"
  _     _                                _
 | |__ (_)_ __   __ _ _ __ _   _    ___  __| | __ _  ___
 | '_ \| | '_ \ / _` | '__| | | |  / _ \/ _` |/ _` |/ _ \
 | |_) | | | | | (_| | |  | |_| | |  __/ (_| | (_| |  __/
 |_.__/|_|_| |_|\__,_|_|   \__, |  \___|\__,_|\__, |\___|
                           |___/              |___/
  Fair-value edge detection for binary outcome markets
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        scan_interval_secs = cfg.agent.scan_interval_secs,
        category = %cfg.agent.market_category,
        dry_run = cfg.agent.dry_run,
        assets = cfg.assets.len(),
        "binary-edge starting up"
    );

    // -- Initialise components -------------------------------------------

    let markets: Arc<dyn MarketSource> = Arc::new(GammaMarketSource::new(&cfg.data_sources)?);

    let spots: Arc<dyn SpotPriceSource> = Arc::new(CachedSpotSource::new(
        CoinGeckoSpotSource::new(&cfg.data_sources, &cfg.assets)?,
        chrono::Duration::seconds(cfg.data_sources.spot_cache_ttl_secs),
        Arc::new(SystemClock),
    ));

    let venue: Arc<dyn VenueClient> = if cfg.agent.dry_run {
        let balance = Decimal::from_f64(cfg.agent.paper_balance)
            .context("agent.paper_balance is not a representable amount")?;
        info!(balance = %balance, "Dry run: orders go to the paper venue");
        Arc::new(PaperVenue::new(balance))
    } else {
        let credentials = cfg.venue.credentials()?;
        info!(gateway = %cfg.venue.gateway_url, "Live mode: orders go to the gateway");
        Arc::new(OrderGatewayClient::new(&cfg.venue, credentials)?)
    };

    let mut orchestrator = CycleOrchestrator::from_config(&cfg, markets, spots, venue);
    if let Some(path) = &cfg.log_sink.path {
        info!(path = %path, "Appending cycle logs");
        orchestrator = orchestrator.with_sink(Arc::new(JsonlLogSink::new(path)));
    }
    let orchestrator = Arc::new(orchestrator);

    // -- Main loop -------------------------------------------------------

    let scan_interval = Duration::from_secs(cfg.agent.scan_interval_secs);
    let mut interval = tokio::time::interval(scan_interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.agent.scan_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move {
                    match orchestrator.run_cycle().await {
                        Ok(report) => print_report(&report),
                        Err(EngineError::CycleInFlight) => {
                            warn!("Previous cycle still running, tick skipped");
                        }
                        Err(e) => error!(error = %e, "Cycle failed, continuing to next"),
                    }
                });
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!(
        cycles = orchestrator.cycles_run().unwrap_or_default(),
        "binary-edge shut down cleanly."
    );
    Ok(())
}

/// Print the cycle's audit trail, one line per entry.
fn print_report(report: &CycleReport) {
    println!("── cycle {} ({}) ──", report.cycle_number, report.path());
    for entry in &report.entries {
        println!("  {entry}");
    }
    let s = &report.summary;
    println!(
        "  {} scanned, {} traded, {} skipped, {} halted, {} errors, ${:.2} committed",
        s.scans, s.trades, s.skips, s.halts, s.errors, s.committed
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("binary_edge=info"));

    let json_logging = std::env::var("BINARY_EDGE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
