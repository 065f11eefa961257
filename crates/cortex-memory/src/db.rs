use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::types::Record;

/// Initialise the `records` table. Safe to call on every startup (idempotent).
/// One table backs every namespace; `namespace` plus `id` form the primary key.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS records (
            namespace   TEXT NOT NULL,
            id          TEXT NOT NULL,
            text        TEXT NOT NULL,
            embedding   BLOB NOT NULL,
            created_at  INTEGER NOT NULL,
            tags        TEXT NOT NULL DEFAULT '{}',
            numeric     TEXT NOT NULL DEFAULT '{}',
            metadata    TEXT NOT NULL DEFAULT 'null',
            PRIMARY KEY (namespace, id)
        );
        CREATE INDEX IF NOT EXISTS idx_records_namespace_created
            ON records(namespace, created_at);",
    )?;
    Ok(())
}

fn embedding_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn embedding_from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn insert_record(conn: &Connection, record: &Record) -> Result<()> {
    conn.execute(
        "INSERT INTO records (namespace, id, text, embedding, created_at, tags, numeric, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(namespace, id) DO UPDATE SET
            text = excluded.text,
            embedding = excluded.embedding,
            created_at = excluded.created_at,
            tags = excluded.tags,
            numeric = excluded.numeric,
            metadata = excluded.metadata",
        params![
            record.namespace,
            record.id,
            record.text,
            embedding_to_bytes(&record.embedding),
            record.created_at.timestamp_millis(),
            serde_json::to_string(&record.tags)?,
            serde_json::to_string(&record.numeric)?,
            serde_json::to_string(&record.metadata)?,
        ],
    )?;
    Ok(())
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
    let namespace: String = row.get("namespace")?;
    let id: String = row.get("id")?;
    let text: String = row.get("text")?;
    let embedding_bytes: Vec<u8> = row.get("embedding")?;
    let created_at_ms: i64 = row.get("created_at")?;
    let tags_json: String = row.get("tags")?;
    let numeric_json: String = row.get("numeric")?;
    let metadata_json: String = row.get("metadata")?;

    let tags = serde_json::from_str(&tags_json).unwrap_or_default();
    let numeric = serde_json::from_str(&numeric_json).unwrap_or_default();
    let metadata = serde_json::from_str(&metadata_json).unwrap_or(serde_json::Value::Null);
    let created_at = chrono::DateTime::from_timestamp_millis(created_at_ms)
        .unwrap_or_else(chrono::Utc::now);

    Ok(Record {
        namespace,
        id,
        text,
        embedding: embedding_from_bytes(&embedding_bytes),
        created_at,
        tags,
        numeric,
        metadata,
    })
}

pub fn get_record(conn: &Connection, namespace: &str, id: &str) -> Result<Option<Record>> {
    let record = conn
        .query_row(
            "SELECT namespace, id, text, embedding, created_at, tags, numeric, metadata
             FROM records WHERE namespace = ?1 AND id = ?2",
            params![namespace, id],
            row_to_record,
        )
        .optional()?;
    Ok(record)
}

pub fn get_records(conn: &Connection, namespace: &str, ids: &[String]) -> Result<Vec<Record>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = std::iter::repeat("?").take(ids.len()).collect::<Vec<_>>().join(",");
    let sql = format!(
        "SELECT namespace, id, text, embedding, created_at, tags, numeric, metadata
         FROM records WHERE namespace = ? AND id IN ({placeholders})"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut bind_params: Vec<&dyn rusqlite::ToSql> = vec![&namespace];
    bind_params.extend(ids.iter().map(|id| id as &dyn rusqlite::ToSql));

    let rows = stmt.query_map(bind_params.as_slice(), row_to_record)?;
    let mut out = Vec::with_capacity(ids.len());
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn delete_record(conn: &Connection, namespace: &str, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "DELETE FROM records WHERE namespace = ?1 AND id = ?2",
        params![namespace, id],
    )?;
    Ok(affected > 0)
}

pub fn count(conn: &Connection, namespace: &str) -> Result<i64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM records WHERE namespace = ?1",
        params![namespace],
        |row| row.get(0),
    )?;
    Ok(n)
}

/// All ids in a namespace, oldest first — used by `scan` and by the archival
/// worker, which needs ascending-timestamp order before applying retention.
pub fn scan_ids(conn: &Connection, namespace: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM records WHERE namespace = ?1 ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map(params![namespace], |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn scan_records(conn: &Connection, namespace: &str) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare(
        "SELECT namespace, id, text, embedding, created_at, tags, numeric, metadata
         FROM records WHERE namespace = ?1 ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map(params![namespace], row_to_record)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Fetch ids filtered by tag/numeric fields, using `json_extract` against the
/// `tags`/`numeric` JSON columns. Field names are programmer-chosen constants
/// (never caller-supplied strings), so they're safe to interpolate into the
/// path expression directly; every filter *value* is bound as a parameter.
pub fn filter_ids(
    conn: &Connection,
    namespace: &str,
    filters: &[crate::types::Filter],
) -> Result<Vec<String>> {
    let mut sql = String::from("SELECT id FROM records WHERE namespace = ?");
    let mut bind_values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(namespace.to_string())];

    for filter in filters {
        match filter {
            crate::types::Filter::Tag { field, value } => {
                sql.push_str(&format!(" AND json_extract(tags, '$.{field}') = ?"));
                bind_values.push(Box::new(value.clone()));
            }
            crate::types::Filter::NumericRange { field, min, max } => {
                if let Some(min) = min {
                    sql.push_str(&format!(" AND json_extract(numeric, '$.{field}') >= ?"));
                    bind_values.push(Box::new(*min));
                }
                if let Some(max) = max {
                    sql.push_str(&format!(" AND json_extract(numeric, '$.{field}') <= ?"));
                    bind_values.push(Box::new(*max));
                }
            }
        }
    }

    let mut stmt = conn.prepare(&sql)?;
    let bind_refs: Vec<&dyn rusqlite::ToSql> = bind_values.iter().map(|b| b.as_ref()).collect();
    let rows = stmt.query_map(bind_refs.as_slice(), |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
