//! Per-namespace ANN index over `usearch`, cosine metric.
//!
//! Unlike a similarity-search UI, callers here want ascending distance
//! (closer = smaller), since that's what novelty scoring and the record
//! search API both reason about directly — no `1.0 - distance` flip.

use std::collections::HashMap;
use std::path::Path;

use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::error::{MemoryError, Result};

const DEFAULT_CONNECTIVITY: usize = 16;
const DEFAULT_EXPANSION_ADD: usize = 128;
const DEFAULT_EXPANSION_SEARCH: usize = 64;

#[derive(Debug, Clone)]
pub struct VectorIndexConfig {
    pub dimensions: usize,
    pub connectivity: usize,
    pub expansion_add: usize,
    pub expansion_search: usize,
}

impl VectorIndexConfig {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            connectivity: DEFAULT_CONNECTIVITY,
            expansion_add: DEFAULT_EXPANSION_ADD,
            expansion_search: DEFAULT_EXPANSION_SEARCH,
        }
    }
}

/// One namespace's ANN graph, plus the string-key <-> usearch-id mapping
/// (usearch itself only knows u64 keys).
pub struct VectorIndex {
    index: Index,
    config: VectorIndexConfig,
    key_to_id: HashMap<String, u64>,
    id_to_key: HashMap<u64, String>,
    next_id: u64,
}

impl VectorIndex {
    pub fn new(config: VectorIndexConfig) -> Result<Self> {
        let options = IndexOptions {
            dimensions: config.dimensions,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: config.connectivity,
            expansion_add: config.expansion_add,
            expansion_search: config.expansion_search,
            multi: false,
        };

        let index = Index::new(&options).map_err(|e| MemoryError::Vector(e.to_string()))?;
        index
            .reserve(16)
            .map_err(|e| MemoryError::Vector(e.to_string()))?;

        Ok(Self {
            index,
            config,
            key_to_id: HashMap::new(),
            id_to_key: HashMap::new(),
            next_id: 0,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    pub fn len(&self) -> usize {
        self.index.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.key_to_id.contains_key(key)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.config.dimensions {
            return Err(MemoryError::DimensionMismatch {
                expected: self.config.dimensions,
                got: vector.len(),
            });
        }
        Ok(())
    }

    fn ensure_capacity(&self) -> Result<()> {
        let size = self.index.size();
        let capacity = self.index.capacity();
        if size >= capacity {
            let new_capacity = std::cmp::max(capacity * 2, 16);
            self.index
                .reserve(new_capacity)
                .map_err(|e| MemoryError::Vector(e.to_string()))?;
        }
        Ok(())
    }

    /// Insert or, if `key` already exists, replace its vector.
    pub fn put(&mut self, key: &str, vector: &[f32]) -> Result<()> {
        self.check_dimensions(vector)?;

        if let Some(&existing_id) = self.key_to_id.get(key) {
            self.index
                .remove(existing_id)
                .map_err(|e| MemoryError::Vector(e.to_string()))?;
            self.ensure_capacity()?;
            self.index
                .add(existing_id, vector)
                .map_err(|e| MemoryError::Vector(e.to_string()))?;
            return Ok(());
        }

        self.ensure_capacity()?;
        let id = self.next_id;
        self.next_id += 1;
        self.index
            .add(id, vector)
            .map_err(|e| MemoryError::Vector(e.to_string()))?;
        self.key_to_id.insert(key.to_string(), id);
        self.id_to_key.insert(id, key.to_string());
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Result<bool> {
        match self.key_to_id.remove(key) {
            Some(id) => {
                self.id_to_key.remove(&id);
                self.index
                    .remove(id)
                    .map_err(|e| MemoryError::Vector(e.to_string()))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Ascending-distance nearest neighbors of `query`, at most `limit`.
    /// Oversampling for post-hoc filtering is the caller's responsibility
    /// (pass a larger `limit` than the final result count needed).
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<(String, f32)>> {
        self.check_dimensions(query)?;
        if self.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let matches = self
            .index
            .search(query, limit)
            .map_err(|e| MemoryError::Vector(e.to_string()))?;

        let mut out = Vec::with_capacity(matches.keys.len());
        for (id, distance) in matches.keys.iter().zip(matches.distances.iter()) {
            if let Some(key) = self.id_to_key.get(id) {
                out.push((key.clone(), *distance));
            }
        }
        Ok(out)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let path_str = path
            .to_str()
            .ok_or_else(|| MemoryError::Vector("non-utf8 index path".to_string()))?;
        self.index
            .save(path_str)
            .map_err(|e| MemoryError::Vector(e.to_string()))?;

        let mappings_path = path.with_extension("mappings.json");
        let mappings = serde_json::json!({
            "key_to_id": self.key_to_id,
            "next_id": self.next_id,
        });
        std::fs::write(&mappings_path, serde_json::to_vec(&mappings)?)?;
        Ok(())
    }

    pub fn load(path: &Path, config: VectorIndexConfig) -> Result<Self> {
        let options = IndexOptions {
            dimensions: config.dimensions,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: config.connectivity,
            expansion_add: config.expansion_add,
            expansion_search: config.expansion_search,
            multi: false,
        };
        let index = Index::new(&options).map_err(|e| MemoryError::Vector(e.to_string()))?;
        let path_str = path
            .to_str()
            .ok_or_else(|| MemoryError::Vector("non-utf8 index path".to_string()))?;
        index
            .load(path_str)
            .map_err(|e| MemoryError::Vector(e.to_string()))?;

        let mappings_path = path.with_extension("mappings.json");
        let mappings_str = std::fs::read_to_string(&mappings_path)?;
        let mappings: serde_json::Value = serde_json::from_str(&mappings_str)?;
        let key_to_id: HashMap<String, u64> = serde_json::from_value(mappings["key_to_id"].clone())?;
        let next_id = mappings["next_id"]
            .as_u64()
            .ok_or_else(|| MemoryError::Vector("missing next_id in index mappings".to_string()))?;
        let id_to_key = key_to_id.iter().map(|(k, &v)| (v, k.clone())).collect();

        Ok(Self {
            index,
            config,
            key_to_id,
            id_to_key,
            next_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(seed: f32, dims: usize) -> Vec<f32> {
        (0..dims).map(|i| ((i as f32 + seed) / dims as f32).sin()).collect()
    }

    #[test]
    fn put_then_search_returns_nearest_first_ascending() {
        let mut idx = VectorIndex::new(VectorIndexConfig::new(8)).unwrap();
        let a = vector(1.0, 8);
        let b = vector(50.0, 8);
        idx.put("a", &a).unwrap();
        idx.put("b", &b).unwrap();

        let results = idx.search(&a, 2).unwrap();
        assert_eq!(results[0].0, "a");
        assert!(results[0].1 <= results[1].1, "distances must be ascending");
    }

    #[test]
    fn search_on_empty_index_returns_empty() {
        let idx = VectorIndex::new(VectorIndexConfig::new(4)).unwrap();
        let results = idx.search(&[0.1, 0.2, 0.3, 0.4], 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut idx = VectorIndex::new(VectorIndexConfig::new(4)).unwrap();
        let err = idx.put("x", &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, MemoryError::DimensionMismatch { .. }));
    }

    #[test]
    fn put_twice_on_same_key_updates_rather_than_duplicates() {
        let mut idx = VectorIndex::new(VectorIndexConfig::new(4)).unwrap();
        idx.put("a", &vector(1.0, 4)).unwrap();
        idx.put("a", &vector(2.0, 4)).unwrap();
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn remove_then_contains_is_false() {
        let mut idx = VectorIndex::new(VectorIndexConfig::new(4)).unwrap();
        idx.put("a", &vector(1.0, 4)).unwrap();
        assert!(idx.remove("a").unwrap());
        assert!(!idx.contains("a"));
    }
}
