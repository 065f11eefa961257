use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::prompt::SystemPrompt;
use crate::thinking::ThinkingLevel;

/// A single message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Request to an LLM provider's `chat` operation.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    /// Plain text system prompt (used by non-Anthropic providers).
    pub system: String,
    /// Optional 3-tier prompt with cache breakpoints (Anthropic only).
    pub system_prompt: Option<SystemPrompt>,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    /// Optional thinking level for extended reasoning (Anthropic only).
    /// `None` and `Some(ThinkingLevel::Off)` both disable the thinking block.
    pub thinking: Option<ThinkingLevel>,
    /// Sequences that end generation early, e.g. the ReAct loop's `Observation:`
    /// guard that stops the model from hallucinating tool output.
    pub stop: Option<Vec<String>>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, system: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            system_prompt: None,
            messages,
            max_tokens: 4096,
            temperature: None,
            thinking: None,
            stop: None,
        }
    }
}

/// Response from an LLM provider's `chat` operation.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub stop_reason: String,
}

/// Request to an LLM provider's `complete` operation — used both for plain
/// text completion and, with `echo` + `logprobs` set, for perplexity extraction.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: Option<f64>,
    pub stop: Option<Vec<String>>,
    /// Number of log-probabilities to return per token position. `Some(0)`
    /// or `None` disables logprob reporting entirely.
    pub logprobs: Option<u32>,
    /// When true, the prompt tokens themselves are included in the response
    /// so their log-probabilities can be read back (used for perplexity).
    pub echo: bool,
}

impl CompletionRequest {
    /// Build a request shaped for mean-log-prob extraction: a single output
    /// token, the prompt echoed back, one logprob per position.
    pub fn for_logprobs(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            max_tokens: 1,
            temperature: 0.0,
            top_p: None,
            stop: None,
            logprobs: Some(1),
            echo: true,
        }
    }
}

/// Response from an LLM provider's `complete` operation.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub model: String,
    /// Per-token log-probabilities, in prompt order, when `logprobs` was requested.
    /// `None` entries mark tokens the backend declined to score (e.g. the first
    /// token of the prompt, which has no preceding context).
    pub token_logprobs: Vec<Option<f64>>,
    /// Raw provider payload, preserved for callers that need backend-specific detail.
    pub raw: serde_json::Value,
}

impl CompletionResponse {
    /// Mean of the non-null log-probabilities. `None` when every entry is null.
    pub fn mean_logprob(&self) -> Option<f64> {
        let present: Vec<f64> = self.token_logprobs.iter().filter_map(|lp| *lp).collect();
        if present.is_empty() {
            None
        } else {
            Some(present.iter().sum::<f64>() / present.len() as f64)
        }
    }
}

/// Common interface for all LLM backends (Anthropic, OpenAI, Ollama, etc).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider id used in configuration and fallback ordering.
    fn name(&self) -> &str;

    /// Send a non-streaming chat request, wait for the full response.
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Text completion; with `echo` + `logprobs` set, used to read back
    /// per-token log-probabilities for perplexity extraction.
    async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Cheap liveness probe used by the rolling health tracker.
    async fn health(&self) -> bool {
        true
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("operation cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Whether the router should cascade to the next backend in the
    /// fallback chain rather than retrying the same one.
    pub fn is_retryable_on_same_backend(&self) -> bool {
        match self {
            ProviderError::Http(_) => true,
            ProviderError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
