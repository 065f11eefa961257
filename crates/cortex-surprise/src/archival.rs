use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use cortex_core::config::ArchivalConfig;
use cortex_memory::{MemoryStore, Record, NS_MEMORIES};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{Result, SurpriseError};
use crate::schedule::next_daily_run;
use crate::types::ArchivalStats;

/// Archive files larger than this are skipped by `search_archive` rather
/// than loaded whole, to avoid memory exhaustion on a pathological file.
const SEARCH_FILE_SIZE_CAP_BYTES: u64 = 64 * 1024 * 1024;

fn archive_path(archive_root: &str, created_at: DateTime<Utc>) -> PathBuf {
    let month_dir = format!("{:04}-{:02}", created_at.year(), created_at.month());
    let file_name = format!("memories-{:04}{:02}{:02}.json", created_at.year(), created_at.month(), created_at.day());
    Path::new(archive_root).join(month_dir).join(file_name)
}

/// A record in its cold-storage JSON shape: binary fields are wrapped so
/// they round-trip bit-exactly through base64, everything else is plain.
fn encode_record(record: &Record) -> Value {
    serde_json::json!({
        "id": record.id,
        "text": record.text,
        "embedding": { "_binary": true, "data": BASE64.encode(embedding_to_le_bytes(&record.embedding)) },
        "created_at": record.created_at.to_rfc3339(),
        "tags": record.tags,
        "numeric": record.numeric,
        "metadata": record.metadata,
    })
}

fn decode_record(value: &Value) -> Result<Record> {
    let id = value["id"].as_str().ok_or_else(|| SurpriseError::Archive("archive record missing id".into()))?;
    let text = value["text"].as_str().ok_or_else(|| SurpriseError::Archive("archive record missing text".into()))?;
    let embedding_bytes = BASE64
        .decode(value["embedding"]["data"].as_str().unwrap_or_default())
        .map_err(|e| SurpriseError::Archive(format!("bad embedding base64: {e}")))?;
    let created_at: DateTime<Utc> = value["created_at"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| SurpriseError::Archive("archive record missing created_at".into()))?;
    let tags = serde_json::from_value(value["tags"].clone()).unwrap_or_default();
    let numeric = serde_json::from_value(value["numeric"].clone()).unwrap_or_default();
    let metadata = value["metadata"].clone();

    Ok(Record {
        namespace: NS_MEMORIES.to_string(),
        id: id.to_string(),
        text: text.to_string(),
        embedding: embedding_from_le_bytes(&embedding_bytes),
        created_at,
        tags,
        numeric,
        metadata,
    })
}

fn embedding_to_le_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn embedding_from_le_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
}

/// Append `records` to the JSON array at `path`, creating it if absent.
/// Write-then-verify-then-rename: the existing file is never modified
/// in place, so a crash mid-write leaves the original untouched.
fn append_to_archive_file(path: &Path, records: &[Record]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut existing: Vec<Value> = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Vec::new()
    };
    existing.extend(records.iter().map(encode_record));

    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, serde_json::to_vec_pretty(&existing)?)?;
    // Verify the temp file parses before committing — a half-written file
    // must never replace a good one.
    let verify = std::fs::read_to_string(&tmp_path)?;
    serde_json::from_str::<Vec<Value>>(&verify)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Scan C2's `memories` namespace and migrate eligible records to cold
/// storage. Keeps the newest `keep_recent` records and anything newer than
/// `max_age_days`; everything else is archived.
pub fn archive_once(config: &ArchivalConfig, memory: &MemoryStore) -> Result<ArchivalStats> {
    let mut stats = ArchivalStats::default();

    let mut records = memory.scan(NS_MEMORIES)?;
    stats.scanned = records.len();
    records.sort_by_key(|r| r.created_at);

    let cutoff = Utc::now() - chrono::Duration::days(config.max_age_days);
    let retain_from_index = records.len().saturating_sub(config.keep_recent);

    let mut to_archive: Vec<Record> = Vec::new();
    for (i, record) in records.into_iter().enumerate() {
        let keep_by_recency = i >= retain_from_index;
        let keep_by_age = record.created_at > cutoff;
        if keep_by_recency || keep_by_age {
            stats.kept += 1;
        } else {
            to_archive.push(record);
        }
    }

    if to_archive.is_empty() {
        debug!("archival run found nothing eligible");
        return Ok(stats);
    }

    let mut by_path: HashMap<PathBuf, Vec<Record>> = HashMap::new();
    for record in to_archive {
        let path = archive_path(&config.cold_storage_path, record.created_at);
        by_path.entry(path).or_default().push(record);
    }
    stats.files_created = by_path.len();

    for (path, group) in by_path {
        if let Err(e) = append_to_archive_file(&path, &group) {
            warn!(path = %path.display(), error = %e, "failed to append to archive file, skipping group");
            continue;
        }

        for record in group {
            match memory.get(NS_MEMORIES, &record.id) {
                Ok(Some(_)) => match memory.delete(NS_MEMORIES, &record.id) {
                    Ok(_) => stats.archived += 1,
                    Err(e) => warn!(id = %record.id, error = %e, "archived record delete failed"),
                },
                Ok(None) => {
                    warn!(id = %record.id, "record already deleted before archival delete, skipping");
                    stats.skipped_missing += 1;
                }
                Err(e) => warn!(id = %record.id, error = %e, "existence recheck failed, skipping delete"),
            }
        }
    }

    info!(
        scanned = stats.scanned,
        archived = stats.archived,
        kept = stats.kept,
        files_created = stats.files_created,
        "archival run complete"
    );
    Ok(stats)
}

/// Substring search over archived records, newest files first, stopping at
/// `max` matches. Files over `SEARCH_FILE_SIZE_CAP_BYTES` are skipped.
pub fn search_archive(archive_root: &str, substring: &str, max: usize) -> Result<Vec<Record>> {
    let mut out = Vec::new();
    let mut files = list_archive_files(archive_root)?;
    files.sort_by(|a, b| b.cmp(a));

    for path in files {
        if out.len() >= max {
            break;
        }
        let metadata = std::fs::metadata(&path)?;
        if metadata.len() > SEARCH_FILE_SIZE_CAP_BYTES {
            warn!(path = %path.display(), size = metadata.len(), "skipping oversized archive file");
            continue;
        }
        let content = std::fs::read_to_string(&path)?;
        let values: Vec<Value> = serde_json::from_str(&content).unwrap_or_default();
        for value in values {
            if out.len() >= max {
                break;
            }
            if value["text"].as_str().is_some_and(|t| t.contains(substring)) {
                if let Ok(record) = decode_record(&value) {
                    out.push(record);
                }
            }
        }
    }

    Ok(out)
}

/// Reinsert every archived record whose file falls within `[start, end]`
/// (inclusive, by calendar date) back into C2.
pub fn restore(archive_root: &str, memory: &MemoryStore, start: NaiveDate, end: NaiveDate) -> Result<ArchivalStats> {
    let mut stats = ArchivalStats::default();
    for path in list_archive_files(archive_root)? {
        let Some(date) = file_date(&path) else { continue };
        if date < start || date > end {
            continue;
        }
        let content = std::fs::read_to_string(&path)?;
        let values: Vec<Value> = serde_json::from_str(&content).unwrap_or_default();
        stats.scanned += values.len();
        for value in values {
            match decode_record(&value) {
                Ok(record) => {
                    memory.put(NS_MEMORIES, record)?;
                    stats.archived += 1;
                }
                Err(e) => warn!(error = %e, "skipping unreadable archive record during restore"),
            }
        }
    }
    Ok(stats)
}

fn list_archive_files(archive_root: &str) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let root = Path::new(archive_root);
    if !root.exists() {
        return Ok(out);
    }
    for month_entry in std::fs::read_dir(root)? {
        let month_entry = month_entry?;
        if !month_entry.file_type()?.is_dir() {
            continue;
        }
        for file_entry in std::fs::read_dir(month_entry.path())? {
            let file_entry = file_entry?;
            if file_entry.path().extension().is_some_and(|ext| ext == "json") {
                out.push(file_entry.path());
            }
        }
    }
    Ok(out)
}

fn file_date(path: &Path) -> Option<NaiveDate> {
    let stem = path.file_stem()?.to_str()?;
    let digits = stem.strip_prefix("memories-")?;
    NaiveDate::parse_from_str(digits, "%Y%m%d").ok()
}

/// Drives `archive_once` on a daily wall-clock schedule.
pub struct ArchivalWorker {
    memory: Arc<MemoryStore>,
    config: ArchivalConfig,
}

impl ArchivalWorker {
    pub fn new(memory: Arc<MemoryStore>, config: ArchivalConfig) -> Self {
        Self { memory, config }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if !self.config.enabled {
            info!("archival worker disabled via config");
            return;
        }
        info!("archival worker starting");

        loop {
            let next_run = next_daily_run(self.config.hour_utc, self.config.minute_utc, Utc::now());
            let sleep_for = (next_run - Utc::now()).to_std().unwrap_or(std::time::Duration::ZERO);

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {
                    let memory = self.memory.clone();
                    let config = self.config.clone();
                    let result = tokio::task::spawn_blocking(move || archive_once(&config, &memory)).await;
                    match result {
                        Ok(Ok(stats)) => info!(?stats, "archival run succeeded"),
                        Ok(Err(e)) => warn!(error = %e, "archival run failed"),
                        Err(e) => warn!(error = %e, "archival task panicked"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("archival worker shutting down");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record(text: &str, days_ago: i64) -> Record {
        Record {
            namespace: NS_MEMORIES.to_string(),
            id: format!("id-{text}"),
            text: text.to_string(),
            embedding: vec![0.1, 0.2, 0.3],
            created_at: Utc::now() - chrono::Duration::days(days_ago),
            tags: Default::default(),
            numeric: Default::default(),
            metadata: Value::Null,
        }
    }

    #[test]
    fn encode_then_decode_round_trips_embedding_bit_exactly() {
        let record = sample_record("hello", 5);
        let encoded = encode_record(&record);
        let decoded = decode_record(&encoded).unwrap();
        assert_eq!(decoded.embedding, record.embedding);
        assert_eq!(decoded.text, record.text);
    }

    #[test]
    fn append_to_archive_file_accumulates_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memories-20260101.json");

        append_to_archive_file(&path, &[sample_record("a", 40)]).unwrap();
        append_to_archive_file(&path, &[sample_record("b", 40)]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let values: Vec<Value> = serde_json::from_str(&content).unwrap();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn archive_path_groups_by_year_month() {
        let created_at = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        let path = archive_path("/data/cold", created_at);
        assert_eq!(path, PathBuf::from("/data/cold/2026-03/memories-20260315.json"));
    }
}
