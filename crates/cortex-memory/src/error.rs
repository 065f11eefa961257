use thiserror::Error;

/// Errors raised by the vector memory store. Kept distinct from the
/// crate-wide `cortex_core::CortexError` the same way `cortex-inference`
/// keeps its own `ProviderError` — callers at the orchestrator boundary
/// fold this into `CortexError` for HTTP status mapping.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("record not found: {namespace}:{id}")]
    NotFound { namespace: String, id: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("vector index error: {0}")]
    Vector(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("embedding dimension mismatch: index expects {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),
}

pub type Result<T> = std::result::Result<T, MemoryError>;
