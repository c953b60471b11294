//! Persistence layer.
//!
//! Cycle reports are published to a `LogSink`. The bundled sink appends
//! every log entry as one JSON line, tagged with its cycle number, so the
//! file is the cumulative audit trail across restarts.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::engine::accountant::CycleReport;
use crate::types::LogEntry;

/// Destination for finished cycle reports.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn publish(&self, report: &CycleReport) -> Result<()>;
}

/// One line of the JSON-lines file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkRecord {
    pub cycle: u64,
    #[serde(flatten)]
    pub entry: LogEntry,
}

pub struct JsonlLogSink {
    path: PathBuf,
}

impl JsonlLogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LogSink for JsonlLogSink {
    async fn publish(&self, report: &CycleReport) -> Result<()> {
        let mut buf = String::new();
        for entry in &report.entries {
            let record = SinkRecord {
                cycle: report.cycle_number,
                entry: entry.clone(),
            };
            buf.push_str(&serde_json::to_string(&record).context("Failed to serialise log entry")?);
            buf.push('\n');
        }
        if buf.is_empty() {
            return Ok(());
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open log sink {}", self.path.display()))?;
        file.write_all(buf.as_bytes())
            .await
            .with_context(|| format!("Failed to append to log sink {}", self.path.display()))?;
        file.flush().await?;

        debug!(
            path = %self.path.display(),
            cycle = report.cycle_number,
            entries = report.entries.len(),
            "Cycle log appended"
        );
        Ok(())
    }
}

/// Read back every record in a JSON-lines log. A missing file is empty.
pub async fn load_entries(path: impl AsRef<Path>) -> Result<Vec<SinkRecord>> {
    let path = path.as_ref();
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(Vec::new());
    }
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read log sink {}", path.display()))?;

    contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("Malformed record at line {} of {}", i + 1, path.display()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
