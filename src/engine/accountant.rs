//! Accountant — per-cycle summary and report.
//!
//! Folds a finished cycle's log and trade results into the structured
//! report handed to the log sink and printed by the binary.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{CycleLog, LogAction, LogEntry, TradeResult};

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Cycle state-machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CyclePhase {
    Scan,
    Size,
    Execute,
    Monitor,
    Done,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CyclePhase::Scan => "SCAN",
            CyclePhase::Size => "SIZE",
            CyclePhase::Execute => "EXECUTE",
            CyclePhase::Monitor => "MONITOR",
            CyclePhase::Done => "DONE",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

/// Counts derived from one cycle's log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub scans: usize,
    pub trades: usize,
    pub skips: usize,
    pub halts: usize,
    pub errors: usize,
    /// Dollar notional of orders placed this cycle.
    pub committed: f64,
}

impl CycleSummary {
    pub fn from_log(log: &CycleLog, results: &[TradeResult]) -> Self {
        Self {
            scans: log.count(LogAction::Scan),
            trades: log.count(LogAction::Trade),
            skips: log.count(LogAction::Skip),
            halts: log.count(LogAction::Halt),
            errors: log.count(LogAction::Error),
            committed: results.iter().map(TradeResult::notional).sum(),
        }
    }
}

/// Everything observable about one completed cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_number: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub phases: Vec<CyclePhase>,
    pub summary: CycleSummary,
    pub results: Vec<TradeResult>,
    pub entries: Vec<LogEntry>,
}

impl CycleReport {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Phase path as `SCAN → SIZE → DONE`.
    pub fn path(&self) -> String {
        self.phases
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

// ---------------------------------------------------------------------------
// Accountant
// ---------------------------------------------------------------------------

pub struct Accountant;

impl Accountant {
    /// Close out a cycle: append `Done`, summarise, and log the summary.
    pub fn finish(
        cycle_number: u64,
        started_at: DateTime<Utc>,
        mut phases: Vec<CyclePhase>,
        log: CycleLog,
        results: Vec<TradeResult>,
    ) -> CycleReport {
        if phases.last() != Some(&CyclePhase::Done) {
            phases.push(CyclePhase::Done);
        }
        let summary = CycleSummary::from_log(&log, &results);
        let report = CycleReport {
            cycle_number,
            started_at,
            finished_at: Utc::now(),
            phases,
            summary,
            results,
            entries: log.into_entries(),
        };

        info!(
            cycle = report.cycle_number,
            path = %report.path(),
            scans = report.summary.scans,
            trades = report.summary.trades,
            skips = report.summary.skips,
            halts = report.summary.halts,
            errors = report.summary.errors,
            committed = format!("${:.2}", report.summary.committed),
            duration_ms = report.duration_ms(),
            "Cycle complete"
        );

        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
