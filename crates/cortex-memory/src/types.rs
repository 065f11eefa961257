use std::collections::HashMap;

use chrono::{DateTime, Utc};
use cortex_core::types::RecordId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Namespace of episodic memories written by the surprise pipeline.
pub const NS_MEMORIES: &str = "memories";
/// Namespace of ingested document chunks.
pub const NS_DOCUMENTS: &str = "documents";

/// A namespace-keyed record: the embedding plus whatever tag/numeric fields
/// that namespace's callers filter on, plus a catch-all metadata blob for
/// everything else. Memory records and document chunks are both instances
/// of this shape rather than separate Rust types, since C2 treats every
/// namespace the same way — one ANN index plus one SQLite table per namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub namespace: String,
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    /// Equality-filterable string fields (e.g. `session_tag`, `file_type`).
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Range-filterable numeric fields (e.g. `perplexity`, `chunk_index`).
    #[serde(default)]
    pub numeric: HashMap<String, f64>,
    /// Everything else — opaque to the store, round-tripped as-is.
    #[serde(default)]
    pub metadata: Value,
}

impl Record {
    pub fn new(namespace: impl Into<String>, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        let created_at = Utc::now();
        Self {
            namespace: namespace.into(),
            id: RecordId::new(created_at.timestamp_millis()).0,
            text: text.into(),
            embedding,
            created_at,
            tags: HashMap::new(),
            numeric: HashMap::new(),
            metadata: Value::Null,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_tag(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(field.into(), value.into());
        self
    }

    pub fn with_numeric(mut self, field: impl Into<String>, value: f64) -> Self {
        self.numeric.insert(field.into(), value);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn tag(&self, field: &str) -> Option<&str> {
        self.tags.get(field).map(String::as_str)
    }

    pub fn numeric_field(&self, field: &str) -> Option<f64> {
        self.numeric.get(field).copied()
    }
}

/// A filter applied alongside ANN search or a plain `scan`. Values are
/// always carried as data and bound as SQL parameters at the query site —
/// never interpolated into the query string — so no value can change what
/// the query matches beyond its own field/value, however it's composed.
#[derive(Debug, Clone)]
pub enum Filter {
    Tag { field: String, value: String },
    NumericRange { field: String, min: Option<f64>, max: Option<f64> },
}

impl Filter {
    pub fn tag(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Tag {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn numeric_range(field: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        Filter::NumericRange {
            field: field.into(),
            min,
            max,
        }
    }
}

/// A search result: the record plus its ascending cosine distance from the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub record: Record,
    pub distance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_round_trips_tags_and_numeric() {
        let rec = Record::new(NS_MEMORIES, "hello", vec![0.1, 0.2])
            .with_tag("session_tag", "sess-1")
            .with_numeric("perplexity", 2.5);
        assert_eq!(rec.tag("session_tag"), Some("sess-1"));
        assert_eq!(rec.numeric_field("perplexity"), Some(2.5));
    }
}
