use thiserror::Error;

/// Errors raised by the capture stream, scoring worker, and archival worker.
/// Kept distinct from `cortex_core::CortexError` the same way `cortex-inference`
/// and `cortex-memory` keep their own domain error types.
#[derive(Debug, Error)]
pub enum SurpriseError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("inference gateway error: {0}")]
    Inference(#[from] cortex_inference::ProviderError),

    #[error("memory store error: {0}")]
    Memory(#[from] cortex_memory::MemoryError),

    #[error("archive path error: {0}")]
    Archive(String),
}

pub type Result<T> = std::result::Result<T, SurpriseError>;
