use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use cortex_core::config::MemoryConfig;
use tracing::{debug, info, warn};

use crate::db;
use crate::embeddings::Embedder;
use crate::error::{MemoryError, Result};
use crate::types::{Filter, Record, SearchHit, NS_DOCUMENTS, NS_MEMORIES};
use crate::vector::{VectorIndex, VectorIndexConfig};

/// How many extra candidates to pull from the ANN index per requested result
/// when a filter is present, before narrowing down in SQLite. Filters can
/// exclude most of the nearest neighbors, so we oversample rather than
/// under-return.
const FILTER_OVERSAMPLE_FACTOR: usize = 4;

/// C2: namespace-keyed vector memory. Durable fields live in `rusqlite`;
/// each namespace's embedding graph lives in an in-process `usearch::Index`
/// guarded by the same mutex discipline as the SQLite connection.
pub struct MemoryStore {
    conn: Mutex<rusqlite::Connection>,
    indices: Mutex<HashMap<String, VectorIndex>>,
    embedder: Embedder,
    vector_dir: PathBuf,
    dims: usize,
}

impl MemoryStore {
    pub fn open(config: &MemoryConfig) -> Result<Self> {
        if let Some(parent) = Path::new(&config.db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = rusqlite::Connection::open(&config.db_path)?;
        db::init_db(&conn)?;

        let vector_dir = Path::new(&config.vector_index_path)
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&vector_dir)?;

        let store = Self {
            conn: Mutex::new(conn),
            indices: Mutex::new(HashMap::new()),
            embedder: Embedder::new(&config.vector_index_path, config.embedding_dims),
            vector_dir,
            dims: config.embedding_dims,
        };

        store.ensure_namespace(NS_MEMORIES)?;
        store.ensure_namespace(NS_DOCUMENTS)?;
        Ok(store)
    }

    fn index_path(&self, namespace: &str) -> PathBuf {
        self.vector_dir.join(format!("{namespace}.usearch"))
    }

    /// Load a namespace's ANN index from disk, or rebuild it from SQLite if
    /// the file is missing or fails to load (stale/corrupt sidecar).
    fn ensure_namespace(&self, namespace: &str) -> Result<()> {
        let mut indices = self.indices.lock().expect("vector index mutex poisoned");
        if indices.contains_key(namespace) {
            return Ok(());
        }

        let path = self.index_path(namespace);
        let loaded = if path.exists() {
            VectorIndex::load(&path, VectorIndexConfig::new(self.dims)).ok()
        } else {
            None
        };

        let index = match loaded {
            Some(index) => index,
            None => {
                debug!(namespace, "rebuilding ANN index from SQLite");
                self.rebuild_namespace_locked(namespace)?
            }
        };

        indices.insert(namespace.to_string(), index);
        Ok(())
    }

    fn rebuild_namespace_locked(&self, namespace: &str) -> Result<VectorIndex> {
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        let records = db::scan_records(&conn, namespace)?;
        drop(conn);

        let mut index = VectorIndex::new(VectorIndexConfig::new(self.dims))?;
        for record in &records {
            index.put(&record.id, &record.embedding)?;
        }
        Ok(index)
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    /// Atomic write of all fields including the embedding. If `record.embedding`
    /// is empty it is computed from `record.text` — callers that already have
    /// a vector (e.g. re-indexing) may supply it directly, but it must come
    /// from the same embedding function or searches against it will be wrong.
    pub fn put(&self, namespace: &str, mut record: Record) -> Result<Record> {
        record.namespace = namespace.to_string();
        if record.embedding.is_empty() {
            record.embedding = self.embedder.embed(&record.text)?;
        }
        if record.embedding.len() != self.dims {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dims,
                got: record.embedding.len(),
            });
        }

        self.ensure_namespace(namespace)?;
        {
            let conn = self.conn.lock().expect("sqlite mutex poisoned");
            db::insert_record(&conn, &record)?;
        }
        {
            let mut indices = self.indices.lock().expect("vector index mutex poisoned");
            let index = indices.get_mut(namespace).expect("namespace just ensured");
            index.put(&record.id, &record.embedding)?;
        }

        Ok(record)
    }

    pub fn get(&self, namespace: &str, id: &str) -> Result<Option<Record>> {
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        db::get_record(&conn, namespace, id)
    }

    pub fn delete(&self, namespace: &str, id: &str) -> Result<bool> {
        let deleted = {
            let conn = self.conn.lock().expect("sqlite mutex poisoned");
            db::delete_record(&conn, namespace, id)?
        };
        if deleted {
            self.ensure_namespace(namespace)?;
            let mut indices = self.indices.lock().expect("vector index mutex poisoned");
            if let Some(index) = indices.get_mut(namespace) {
                index.remove(id)?;
            }
        }
        Ok(deleted)
    }

    pub fn count(&self, namespace: &str) -> Result<i64> {
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        db::count(&conn, namespace)
    }

    /// Ascending-timestamp ids, used by the archival worker's retention scan.
    pub fn scan_ids(&self, namespace: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        db::scan_ids(&conn, namespace)
    }

    pub fn scan(&self, namespace: &str) -> Result<Vec<Record>> {
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        db::scan_records(&conn, namespace)
    }

    /// Embeds `query_text` on the fly and returns the `k` nearest records by
    /// ascending cosine distance, honoring any tag/numeric filters.
    pub fn search(
        &self,
        namespace: &str,
        query_text: &str,
        k: usize,
        filters: &[Filter],
    ) -> Result<Vec<SearchHit>> {
        self.ensure_namespace(namespace)?;
        let query_vector = self.embedder.embed(query_text)?;
        self.search_by_vector(namespace, &query_vector, k, filters)
    }

    /// Same as `search` but with a precomputed query vector — used by the
    /// surprise pipeline's novelty check, which already has the message's
    /// embedding on hand from `put`.
    pub fn search_by_vector(
        &self,
        namespace: &str,
        query_vector: &[f32],
        k: usize,
        filters: &[Filter],
    ) -> Result<Vec<SearchHit>> {
        self.ensure_namespace(namespace)?;

        let ann_limit = if filters.is_empty() {
            k
        } else {
            (k * FILTER_OVERSAMPLE_FACTOR).max(k)
        };

        let candidates = {
            let indices = self.indices.lock().expect("vector index mutex poisoned");
            let index = indices.get(namespace).expect("namespace just ensured");
            index.search(query_vector, ann_limit)?
        };

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let allowed_ids: Option<std::collections::HashSet<String>> = if filters.is_empty() {
            None
        } else {
            let conn = self.conn.lock().expect("sqlite mutex poisoned");
            Some(db::filter_ids(&conn, namespace, filters)?.into_iter().collect())
        };

        let mut filtered: Vec<(String, f32)> = candidates
            .into_iter()
            .filter(|(id, _)| allowed_ids.as_ref().is_none_or(|allowed| allowed.contains(id)))
            .take(k)
            .collect();
        filtered.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let ids: Vec<String> = filtered.iter().map(|(id, _)| id.clone()).collect();
        let records = {
            let conn = self.conn.lock().expect("sqlite mutex poisoned");
            db::get_records(&conn, namespace, &ids)?
        };
        let by_id: HashMap<&str, &Record> = records.iter().map(|r| (r.id.as_str(), r)).collect();

        let mut hits = Vec::with_capacity(filtered.len());
        for (id, distance) in filtered.drain(..) {
            if let Some(record) = by_id.get(id.as_str()) {
                hits.push(SearchHit {
                    record: (*record).clone(),
                    distance,
                });
            }
        }
        Ok(hits)
    }

    /// Persists every namespace's in-memory ANN graph to disk. Called at
    /// graceful shutdown; a missing or stale file at next startup just
    /// triggers a rebuild from SQLite (`ensure_namespace`), so this is not
    /// required for correctness, only to avoid paying the rebuild cost.
    pub fn save_indices(&self) -> Result<()> {
        let indices = self.indices.lock().expect("vector index mutex poisoned");
        for (namespace, index) in indices.iter() {
            let path = self.index_path(namespace);
            if let Err(e) = index.save(&path) {
                warn!(namespace, error = %e, "failed to persist ANN index");
            } else {
                info!(namespace, vectors = index.len(), "persisted ANN index");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_core::config::MemoryConfig;

    fn test_config(dir: &tempfile::TempDir) -> MemoryConfig {
        MemoryConfig {
            db_path: dir.path().join("cortex.db").to_string_lossy().to_string(),
            vector_index_path: dir.path().join("vector").join("memories.usearch").to_string_lossy().to_string(),
            embedding_dims: 8,
        }
    }

    // Embedding in these tests is driven directly via precomputed vectors
    // (search_by_vector / put with a non-empty embedding) since loading the
    // real fastembed ONNX model is not viable in a unit test sandbox.
    fn vector(seed: f32) -> Vec<f32> {
        (0..8).map(|i| ((i as f32 + seed) / 8.0).sin()).collect()
    }

    #[test]
    fn put_then_get_round_trips_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(&test_config(&dir)).unwrap();

        let record = Record::new(NS_MEMORIES, "hello world", vector(1.0))
            .with_tag("session_tag", "sess-1")
            .with_numeric("perplexity", 3.2);
        let id = record.id.clone();
        store.put(NS_MEMORIES, record).unwrap();

        let fetched = store.get(NS_MEMORIES, &id).unwrap().unwrap();
        assert_eq!(fetched.text, "hello world");
        assert_eq!(fetched.tag("session_tag"), Some("sess-1"));
    }

    #[test]
    fn search_by_vector_respects_tag_filter() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(&test_config(&dir)).unwrap();

        let a = Record::new(NS_MEMORIES, "a", vector(1.0)).with_tag("session_tag", "s1");
        let b = Record::new(NS_MEMORIES, "b", vector(1.1)).with_tag("session_tag", "s2");
        store.put(NS_MEMORIES, a).unwrap();
        store.put(NS_MEMORIES, b).unwrap();

        let hits = store
            .search_by_vector(NS_MEMORIES, &vector(1.0), 5, &[Filter::tag("session_tag", "s2")])
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.text, "b");
    }

    #[test]
    fn delete_removes_from_both_sqlite_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(&test_config(&dir)).unwrap();

        let record = Record::new(NS_MEMORIES, "ephemeral", vector(2.0));
        let id = record.id.clone();
        store.put(NS_MEMORIES, record).unwrap();
        assert!(store.delete(NS_MEMORIES, &id).unwrap());
        assert!(store.get(NS_MEMORIES, &id).unwrap().is_none());

        let hits = store.search_by_vector(NS_MEMORIES, &vector(2.0), 5, &[]).unwrap();
        assert!(hits.iter().all(|h| h.record.id != id));
    }

    #[test]
    fn count_and_scan_reflect_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(&test_config(&dir)).unwrap();

        store.put(NS_MEMORIES, Record::new(NS_MEMORIES, "one", vector(1.0))).unwrap();
        store.put(NS_MEMORIES, Record::new(NS_MEMORIES, "two", vector(2.0))).unwrap();

        assert_eq!(store.count(NS_MEMORIES).unwrap(), 2);
        assert_eq!(store.scan(NS_MEMORIES).unwrap().len(), 2);
    }
}
