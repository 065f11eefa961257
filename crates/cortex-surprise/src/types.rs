use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row of the capture stream: a user turn awaiting scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureEntry {
    pub id: i64,
    pub message: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// Outcome of scoring a single capture entry, returned for logging/testing.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoringOutcome {
    /// Surprise score was below threshold; nothing written to C2.
    Skipped { surprise: f64 },
    /// Surprise score met the threshold; a memory record was written to C2.
    Stored { surprise: f64, record_id: String },
}

/// Statistics from one archival worker run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchivalStats {
    pub scanned: usize,
    pub archived: usize,
    pub kept: usize,
    pub files_created: usize,
    pub skipped_missing: usize,
}
