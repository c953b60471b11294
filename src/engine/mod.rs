//! Core engine: the scan → size → execute → monitor cycle.

pub mod accountant;
pub mod executor;
pub mod monitor;
pub mod orchestrator;
pub mod scanner;

pub use accountant::{CyclePhase, CycleReport, CycleSummary};
pub use orchestrator::CycleOrchestrator;
