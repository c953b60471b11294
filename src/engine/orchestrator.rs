//! Cycle orchestrator.
//!
//! Runs one decision cycle through the phase machine
//! `SCAN → SIZE → EXECUTE → MONITOR → DONE`, short-circuiting to `DONE`
//! when a phase produces nothing for the next. All component logs are
//! appended to one ordered log. Only one cycle may run at a time.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::data::SpotPriceSource;
use crate::engine::accountant::{Accountant, CyclePhase, CycleReport};
use crate::engine::executor::ExecutionController;
use crate::engine::monitor::{marks_from_markets, PositionMonitor};
use crate::engine::scanner::MarketScanner;
use crate::platforms::{MarketSource, VenueClient};
use crate::storage::LogSink;
use crate::strategy::edge::EdgeDetector;
use crate::strategy::kelly::{PositionSizer, SizingOutcome};
use crate::strategy::risk::DrawdownTracker;
use crate::types::{CycleLog, EngineError, TradeResult};

/// State that survives between cycles.
#[derive(Debug, Default)]
struct SessionState {
    cycles: u64,
    drawdown: DrawdownTracker,
}

pub struct CycleOrchestrator {
    scanner: MarketScanner,
    detector: EdgeDetector,
    sizer: PositionSizer,
    executor: ExecutionController,
    monitor: PositionMonitor,
    venue: Arc<dyn VenueClient>,
    sink: Option<Arc<dyn LogSink>>,
    call_timeout: Duration,
    session: Mutex<SessionState>,
}

impl CycleOrchestrator {
    pub fn new(
        scanner: MarketScanner,
        detector: EdgeDetector,
        sizer: PositionSizer,
        executor: ExecutionController,
        monitor: PositionMonitor,
        venue: Arc<dyn VenueClient>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            scanner,
            detector,
            sizer,
            executor,
            monitor,
            venue,
            sink: None,
            call_timeout,
            session: Mutex::new(SessionState::default()),
        }
    }

    /// Wire every component from configuration.
    pub fn from_config(
        config: &AppConfig,
        markets: Arc<dyn MarketSource>,
        spots: Arc<dyn SpotPriceSource>,
        venue: Arc<dyn VenueClient>,
    ) -> Self {
        let call_timeout = config.execution.call_timeout();
        Self::new(
            MarketScanner::from_config(config, markets, spots),
            EdgeDetector::from_config(config),
            PositionSizer::new(config.risk.clone()),
            ExecutionController::new(&config.execution),
            PositionMonitor::new(config.risk.clone(), call_timeout),
            venue,
            call_timeout,
        )
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Number of cycles started so far. `None` while a cycle is running.
    pub fn cycles_run(&self) -> Option<u64> {
        self.session.try_lock().ok().map(|s| s.cycles)
    }

    /// Run one full cycle.
    ///
    /// Fails only with `EngineError::CycleInFlight` when another cycle holds
    /// the session; every collaborator failure is folded into the log.
    pub async fn run_cycle(&self) -> Result<CycleReport, EngineError> {
        let mut session = self.session.try_lock().map_err(|_| EngineError::CycleInFlight)?;
        session.cycles += 1;
        let cycle_number = session.cycles;
        let started_at = Utc::now();
        info!(cycle = cycle_number, "Cycle started");

        let mut phases = vec![CyclePhase::Scan];
        let mut log = CycleLog::new();

        let snapshot = self.scanner.scan().await;
        log.extend(snapshot.log);
        let (signals, edge_log) = self.detector.scan(&snapshot.markets, &snapshot.spots);
        log.extend(edge_log);
        if signals.is_empty() {
            return Ok(self.complete(cycle_number, started_at, phases, log, Vec::new()).await);
        }

        phases.push(CyclePhase::Size);
        let SizingOutcome {
            positions,
            risk,
            log: sizing_log,
        } = self
            .sizer
            .size(&signals, self.venue.as_ref(), &mut session.drawdown, self.call_timeout)
            .await;
        log.extend(sizing_log);
        let Some(mut risk) = risk.filter(|_| !positions.is_empty()) else {
            return Ok(self.complete(cycle_number, started_at, phases, log, Vec::new()).await);
        };

        phases.push(CyclePhase::Execute);
        let execution = self.executor.execute(&positions, &mut risk, self.venue.as_ref()).await;
        log.extend(execution.log);

        phases.push(CyclePhase::Monitor);
        let marks = marks_from_markets(&snapshot.markets);
        log.extend(self.monitor.monitor(self.venue.as_ref(), &marks).await);

        Ok(self
            .complete(cycle_number, started_at, phases, log, execution.results)
            .await)
    }

    async fn complete(
        &self,
        cycle_number: u64,
        started_at: DateTime<Utc>,
        phases: Vec<CyclePhase>,
        log: CycleLog,
        results: Vec<TradeResult>,
    ) -> CycleReport {
        let report = Accountant::finish(cycle_number, started_at, phases, log, results);
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.publish(&report).await {
                error!(cycle = cycle_number, error = %e, "Failed to publish cycle log");
            }
        }
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
