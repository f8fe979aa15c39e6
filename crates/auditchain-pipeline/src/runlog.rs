//! Run-log appends: one NDJSON entry per stage invocation, written
//! append-only and flushed immediately so each line is atomic on its own.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use auditchain_contracts::{AuditError, AuditResult};

/// One run-log entry. `counters` is a free-form JSON value so each stage
/// can log its own counter shape (`input_events`, `enriched_events?`,
/// `unknown_events?`, `dropped_events?`, `error_events`, …) without a
/// shared counters struct spanning every stage. `duration_ms` and
/// `detail` are populated only in detailed mode.
#[derive(Debug, Clone, Serialize)]
pub struct RunLogEntry {
    pub stage: String,
    pub ts: DateTime<Utc>,
    pub counters: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl RunLogEntry {
    pub fn new(stage: impl Into<String>, ts: DateTime<Utc>, counters: serde_json::Value) -> Self {
        Self {
            stage: stage.into(),
            ts,
            counters,
            duration_ms: None,
            detail: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Append `entry` to the run-log file at `path`, creating it if needed.
///
/// Opens in append mode, writes one compact JSON object plus a trailing
/// newline, then flushes — a line is either fully written and flushed,
/// or (on a crash mid-write) absent, never half-written and visible to
/// a concurrent reader tailing the file.
pub fn append_run_log(path: &Path, entry: &RunLogEntry) -> AuditResult<()> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| AuditError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AuditError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

    let line = serde_json::to_string(entry).expect("RunLogEntry must serialize");
    writeln!(file, "{line}").map_err(|e| AuditError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    file.flush().map_err(|e| AuditError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}
