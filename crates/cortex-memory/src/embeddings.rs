//! Local text embedding via a process-wide `fastembed` singleton.
//!
//! Model loading is seconds-scale; it happens once behind a `OnceLock` and
//! every `embed` call after that reuses the loaded ONNX session.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::error::{MemoryError, Result};

/// Native output width of `AllMiniLML6V2` — matches the
/// `sentence-transformers/all-MiniLM-L6-v2` model this mirrors.
pub const NATIVE_DIMENSIONS: usize = 384;

const MAX_TEXT_LENGTH: usize = 8192;
const BATCH_SIZE: usize = 32;

static MODEL: OnceLock<std::result::Result<Mutex<TextEmbedding>, String>> = OnceLock::new();

fn cache_dir(vector_index_path: &str) -> PathBuf {
    std::path::Path::new(vector_index_path)
        .parent()
        .map(|p| p.join("embedding_cache"))
        .unwrap_or_else(|| PathBuf::from("./embedding_cache"))
}

fn get_model(vector_index_path: &str) -> Result<MutexGuard<'static, TextEmbedding>> {
    let result = MODEL.get_or_init(|| {
        let dir = cache_dir(vector_index_path);
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(?dir, error = %e, "failed to create embedding cache directory");
        }

        let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(false)
            .with_cache_dir(dir);

        TextEmbedding::try_new(options).map(Mutex::new).map_err(|e| {
            format!(
                "failed to initialize all-MiniLM-L6-v2 embedding model: {e}. \
                 ensure ONNX runtime is available and model files can be downloaded"
            )
        })
    });

    match result {
        Ok(model) => model
            .lock()
            .map_err(|e| MemoryError::Embedding(format!("embedding model mutex poisoned: {e}"))),
        Err(err) => Err(MemoryError::Embedding(err.clone())),
    }
}

/// Truncate to `dims` and L2-renormalize. A no-op when `dims` equals the
/// model's native width (the default), kept general so a smaller configured
/// `embedding_dims` still produces a valid unit vector.
fn truncate_and_normalize(mut vector: Vec<f32>, dims: usize) -> Vec<f32> {
    if vector.len() > dims {
        vector.truncate(dims);
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}

/// Generates fixed-dimension embeddings from the shared model singleton.
/// `vector_index_path` only supplies the cache directory location (a
/// sibling of the ANN index files) — it doesn't own a `usearch::Index`.
pub struct Embedder {
    vector_index_path: String,
    dims: usize,
}

impl Embedder {
    pub fn new(vector_index_path: impl Into<String>, dims: usize) -> Self {
        Self {
            vector_index_path: vector_index_path.into(),
            dims,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dims
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(MemoryError::Embedding("text cannot be empty".to_string()));
        }
        let text = if text.len() > MAX_TEXT_LENGTH {
            &text[..MAX_TEXT_LENGTH]
        } else {
            text
        };

        let mut model = get_model(&self.vector_index_path)?;
        let embeddings = model
            .embed(vec![text], None)
            .map_err(|e| MemoryError::Embedding(e.to_string()))?;
        let vector = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::Embedding("no embedding generated".to_string()))?;

        Ok(truncate_and_normalize(vector, self.dims))
    }

    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut model = get_model(&self.vector_index_path)?;
        let mut out = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let truncated: Vec<&str> = chunk
                .iter()
                .map(|t| if t.len() > MAX_TEXT_LENGTH { &t[..MAX_TEXT_LENGTH] } else { *t })
                .collect();
            let embeddings = model
                .embed(truncated, None)
                .map_err(|e| MemoryError::Embedding(e.to_string()))?;
            out.extend(embeddings.into_iter().map(|v| truncate_and_normalize(v, self.dims)));
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_and_normalize_is_identity_at_native_width() {
        let v = vec![1.0_f32, 2.0, 3.0];
        let out = truncate_and_normalize(v.clone(), 3);
        let norm: f32 = out.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn truncate_and_normalize_shrinks_dims() {
        let v = vec![1.0_f32, 2.0, 3.0, 4.0];
        let out = truncate_and_normalize(v, 2);
        assert_eq!(out.len(), 2);
    }
}
