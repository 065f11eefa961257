use std::sync::Mutex;

use rusqlite::Connection;
use serde_json::Value;
use tracing::warn;

use crate::db;
use crate::types::CaptureEntry;

/// Append-only bounded log of user turns awaiting scoring. Many-writer
/// (C5's request handlers), single-reader (the scoring worker).
pub struct CaptureStream {
    conn: Mutex<Connection>,
    max_len: usize,
}

impl CaptureStream {
    pub fn open(db_path: &str, max_len: usize) -> crate::error::Result<Self> {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        db::init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_len,
        })
    }

    /// Best-effort append. Never blocks the caller's critical path and never
    /// propagates a storage failure — it is logged and swallowed, matching
    /// spec §4.3's "append never blocks" rule.
    pub fn append(&self, message: &str, metadata: Value) {
        let conn = self.conn.lock().expect("capture stream mutex poisoned");
        if let Err(e) = db::append(&conn, message, &metadata, self.max_len) {
            warn!(error = %e, "capture stream append failed, entry dropped");
        }
    }

    pub fn read_after(&self, after_id: i64, limit: usize) -> crate::error::Result<Vec<CaptureEntry>> {
        let conn = self.conn.lock().expect("capture stream mutex poisoned");
        db::read_after(&conn, after_id, limit)
    }

    pub fn max_id(&self) -> crate::error::Result<Option<i64>> {
        let conn = self.conn.lock().expect("capture stream mutex poisoned");
        db::max_id(&conn)
    }

    pub fn get_checkpoint(&self, key: &str) -> crate::error::Result<Option<i64>> {
        let conn = self.conn.lock().expect("capture stream mutex poisoned");
        db::get_checkpoint(&conn, key)
    }

    pub fn set_checkpoint(&self, key: &str, value: i64) -> crate::error::Result<()> {
        let conn = self.conn.lock().expect("capture stream mutex poisoned");
        db::set_checkpoint(&conn, key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_is_swallowed_on_failure_not_propagated() {
        let dir = tempfile::tempdir().unwrap();
        let stream = CaptureStream::open(dir.path().join("cortex.db").to_str().unwrap(), 10).unwrap();
        stream.append("hello", serde_json::json!({"session_tag": "s1"}));
        let entries = stream.read_after(0, 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "hello");
    }

    #[test]
    fn checkpoint_defaults_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let stream = CaptureStream::open(dir.path().join("cortex.db").to_str().unwrap(), 10).unwrap();
        assert_eq!(stream.get_checkpoint("scoring").unwrap(), None);
    }
}
