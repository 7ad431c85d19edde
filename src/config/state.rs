use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::ports::{ExportOutcome, Exporter};

/// Snapshot of a claimed block, written for other tooling to inspect.
///
/// The record is informational only: ownership of the block lives in the
/// bound lock socket, not in this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRecord {
    pub base_port: u16,
    pub ports: BTreeMap<String, u16>,
    pub claimed_at: DateTime<Utc>,
    pub pid: u32,
}

impl ClaimRecord {
    /// Create a record for the current process
    pub fn new(base_port: u16, ports: BTreeMap<String, u16>) -> Self {
        Self {
            base_port,
            ports,
            claimed_at: Utc::now(),
            pid: std::process::id(),
        }
    }

    /// Save the record as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Load a record from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let record: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(record)
    }
}

/// Batching exporter that writes the winning block as a claim record
pub struct RecordExporter {
    path: PathBuf,
    base_port: Option<u16>,
    pending: BTreeMap<String, u16>,
}

impl RecordExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            base_port: None,
            pending: BTreeMap::new(),
        }
    }
}

impl Exporter for RecordExporter {
    fn notify(&mut self, id: &str, port: u16) -> ExportOutcome {
        if id.is_empty() {
            self.base_port = Some(port);
        } else {
            self.pending.insert(id.to_string(), port);
        }
        ExportOutcome::Accepted
    }

    fn commit(&mut self) {
        let record = ClaimRecord::new(
            self.base_port.take().unwrap_or_default(),
            std::mem::take(&mut self.pending),
        );
        // The block is already frozen at this point; a failed write is
        // reported, not unwound
        if let Err(err) = record.save(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to write claim record");
        }
    }

    fn rollback(&mut self) {
        self.base_port = None;
        self.pending.clear();
    }
}
