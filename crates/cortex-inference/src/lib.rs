//! C1 Inference Gateway: a uniform chat/complete/health interface over a
//! fallback chain of LLM backends, with rolling health tracking and
//! log-probability extraction for perplexity scoring.

pub mod anthropic;
pub mod health;
pub mod ollama;
pub mod openai;
pub mod prompt;
pub mod provider;
pub mod router;
pub mod runtime;
pub mod thinking;

pub use anthropic::AnthropicProvider;
pub use health::{HealthTracker, ProviderHealthEntry, ProviderStatus};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use prompt::{PromptBuilder, SessionInfo, SystemPrompt};
pub use provider::{
    ChatRequest, ChatResponse, CompletionRequest, CompletionResponse, LlmProvider, Message,
    ProviderError, Role,
};
pub use router::{ProviderRouter, ProviderSlot, RoutedChatResponse, RoutedCompletionResponse};
pub use runtime::Gateway;
pub use thinking::{strip_thinking_blocks, ThinkingLevel};
