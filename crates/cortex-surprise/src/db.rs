use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::types::CaptureEntry;

/// Initialise `capture_stream` and `checkpoints`. Shares the same SQLite file
/// as C2's `records` table (one `<DATA_ROOT>/cortex.db` per spec §6) but owns
/// its own connection and tables — C2 and C3 never contend over one
/// `Mutex<Connection>` handle, just the same on-disk file.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
        CREATE TABLE IF NOT EXISTS capture_stream (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            message     TEXT NOT NULL,
            metadata    TEXT NOT NULL DEFAULT '{}',
            created_at  INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS checkpoints (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;
    Ok(())
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<CaptureEntry> {
    let id: i64 = row.get("id")?;
    let message: String = row.get("message")?;
    let metadata_json: String = row.get("metadata")?;
    let created_at_ms: i64 = row.get("created_at")?;

    let metadata = serde_json::from_str(&metadata_json).unwrap_or(serde_json::Value::Null);
    let created_at =
        chrono::DateTime::from_timestamp_millis(created_at_ms).unwrap_or_else(Utc::now);

    Ok(CaptureEntry {
        id,
        message,
        metadata,
        created_at,
    })
}

/// Insert a new entry and trim the stream to `max_len`, oldest-first. Never
/// fails loudly to the caller's critical path — `CaptureStream::append` is
/// responsible for swallowing any error this returns.
pub fn append(conn: &Connection, message: &str, metadata: &serde_json::Value, max_len: usize) -> Result<i64> {
    conn.execute(
        "INSERT INTO capture_stream (message, metadata, created_at) VALUES (?1, ?2, ?3)",
        params![message, serde_json::to_string(metadata)?, Utc::now().timestamp_millis()],
    )?;
    let id = conn.last_insert_rowid();

    conn.execute(
        "DELETE FROM capture_stream WHERE id IN (
            SELECT id FROM capture_stream ORDER BY id DESC LIMIT -1 OFFSET ?1
        )",
        params![max_len as i64],
    )?;

    Ok(id)
}

/// Up to `limit` entries strictly after `after_id`, oldest first.
pub fn read_after(conn: &Connection, after_id: i64, limit: usize) -> Result<Vec<CaptureEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, message, metadata, created_at FROM capture_stream
         WHERE id > ?1 ORDER BY id ASC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![after_id, limit as i64], row_to_entry)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Highest id currently in the stream, or `None` if empty — used by the
/// "start from latest" checkpoint policy.
pub fn max_id(conn: &Connection) -> Result<Option<i64>> {
    let id: Option<i64> = conn
        .query_row("SELECT MAX(id) FROM capture_stream", [], |row| row.get(0))
        .optional()?
        .flatten();
    Ok(id)
}

pub fn get_checkpoint(conn: &Connection, key: &str) -> Result<Option<i64>> {
    let value: Option<String> = conn
        .query_row("SELECT value FROM checkpoints WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(value.and_then(|v| v.parse().ok()))
}

pub fn set_checkpoint(conn: &Connection, key: &str, value: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO checkpoints (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value.to_string()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn
    }

    #[test]
    fn append_then_read_after_returns_in_order() {
        let conn = open();
        append(&conn, "one", &serde_json::json!({}), 100).unwrap();
        let id2 = append(&conn, "two", &serde_json::json!({}), 100).unwrap();

        let entries = read_after(&conn, 0, 10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].id, id2);
        assert_eq!(entries[1].message, "two");
    }

    #[test]
    fn append_trims_to_max_len() {
        let conn = open();
        for i in 0..5 {
            append(&conn, &format!("msg-{i}"), &serde_json::json!({}), 3).unwrap();
        }
        let entries = read_after(&conn, 0, 100).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "msg-2");
        assert_eq!(entries[2].message, "msg-4");
    }

    #[test]
    fn checkpoint_round_trips() {
        let conn = open();
        assert_eq!(get_checkpoint(&conn, "scoring").unwrap(), None);
        set_checkpoint(&conn, "scoring", 42).unwrap();
        assert_eq!(get_checkpoint(&conn, "scoring").unwrap(), Some(42));
        set_checkpoint(&conn, "scoring", 99).unwrap();
        assert_eq!(get_checkpoint(&conn, "scoring").unwrap(), Some(99));
    }

    #[test]
    fn max_id_reflects_latest_insert() {
        let conn = open();
        assert_eq!(max_id(&conn).unwrap(), None);
        let id = append(&conn, "only", &serde_json::json!({}), 100).unwrap();
        assert_eq!(max_id(&conn).unwrap(), Some(id));
    }
}
