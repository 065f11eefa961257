use thiserror::Error;

/// Errors raised by C4's reasoning engines. Kept distinct from the
/// crate-wide `cortex_core::CortexError` the same way `cortex-inference`
/// and `cortex-surprise` keep their own domain error types — callers at the
/// orchestrator boundary fold this into `CortexError` for HTTP status mapping.
#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("inference error: {0}")]
    Inference(#[from] cortex_inference::ProviderError),

    #[error("memory error: {0}")]
    Memory(#[from] cortex_memory::MemoryError),

    #[error("a tool named '{0}' is already registered")]
    DuplicateTool(String),

    #[error("sandbox error: {0}")]
    Sandbox(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("step budget of {max_steps} exhausted without a final answer")]
    StepBudgetExhausted { max_steps: usize },
}

pub type Result<T> = std::result::Result<T, ReasoningError>;
