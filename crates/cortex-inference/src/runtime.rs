use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::info;

use crate::health::HealthTracker;
use crate::prompt::{PromptBuilder, SessionInfo};
use crate::provider::{
    ChatRequest, ChatResponse, CompletionRequest, CompletionResponse, LlmProvider, Message,
    ProviderError, Role,
};
use crate::router::{ProviderRouter, RoutedChatResponse};

/// The Inference Gateway: a fallback chain of backends plus the health
/// tracker and prompt builder shared across all callers, held behind an
/// `Arc` in `AppState`.
pub struct Gateway {
    router: ProviderRouter,
    health: std::sync::Arc<HealthTracker>,
    prompt: RwLock<PromptBuilder>,
    default_model: RwLock<String>,
}

impl Gateway {
    pub fn new(router: ProviderRouter, prompt: PromptBuilder, default_model: String) -> Self {
        Self {
            router,
            health: HealthTracker::new(),
            prompt: RwLock::new(prompt),
            default_model: RwLock::new(default_model),
        }
    }

    pub fn health_tracker(&self) -> std::sync::Arc<HealthTracker> {
        self.health.clone()
    }

    pub async fn get_model(&self) -> String {
        self.default_model.read().await.clone()
    }

    pub async fn set_model(&self, model: String) -> String {
        let mut guard = self.default_model.write().await;
        std::mem::replace(&mut *guard, model)
    }

    pub async fn prompt(&self) -> tokio::sync::RwLockReadGuard<'_, PromptBuilder> {
        self.prompt.read().await
    }

    /// Plain chat turn, with persona system prompt and optional session context applied.
    pub async fn chat(&self, user_message: &str) -> Result<ChatResponse, ProviderError> {
        self.chat_with_context(user_message, None, None, None).await
    }

    pub async fn chat_with_context(
        &self,
        user_message: &str,
        user_context: Option<&str>,
        session_info: Option<&SessionInfo>,
        model_override: Option<&str>,
    ) -> Result<ChatResponse, ProviderError> {
        let req = self
            .build_request(user_message, user_context, session_info, model_override)
            .await;
        info!(
            model = %req.model,
            cached = req.system_prompt.is_some(),
            "processing chat request"
        );

        let started = Instant::now();
        match self.router.chat(&req).await {
            Ok(routed) => {
                self.health
                    .record_success(&routed.served_by, started.elapsed().as_millis() as u64);
                Ok(routed.response)
            }
            Err(err) => {
                // the backend that produced the terminal error isn't identified here;
                // the router already logged per-attempt failures at `warn`.
                self.health.record_error("router", &err);
                Err(err)
            }
        }
    }

    /// Mean log-probability of `text` under the default model, used for perplexity.
    pub async fn mean_logprob(&self, text: &str) -> Result<f64, ProviderError> {
        let model = self.default_model.read().await.clone();
        let req = CompletionRequest::for_logprobs(model, text);
        let started = Instant::now();
        match self.router.complete(&req).await {
            Ok(routed) => {
                self.health
                    .record_success(&routed.served_by, started.elapsed().as_millis() as u64);
                routed
                    .response
                    .mean_logprob()
                    .ok_or_else(|| ProviderError::Parse("no logprobs returned".into()))
            }
            Err(err) => {
                self.health.record_error("router", &err);
                Err(err)
            }
        }
    }

    /// Chat call with caller-controlled messages/temperature/stop sequences,
    /// bypassing persona injection — used by C4's reasoning engines, which
    /// build their own prompts (draft/verify/revise, ReAct thought/action
    /// blocks) rather than a plain user turn.
    pub async fn chat_raw(
        &self,
        system: &str,
        messages: Vec<Message>,
        temperature: f64,
        max_tokens: u32,
        stop: Option<Vec<String>>,
    ) -> Result<RoutedChatResponse, ProviderError> {
        let model = self.default_model.read().await.clone();
        let req = ChatRequest {
            model,
            system: system.to_string(),
            system_prompt: None,
            messages,
            max_tokens,
            temperature: Some(temperature),
            thinking: None,
            stop,
        };

        let started = Instant::now();
        match self.router.chat(&req).await {
            Ok(routed) => {
                self.health
                    .record_success(&routed.served_by, started.elapsed().as_millis() as u64);
                Ok(routed)
            }
            Err(err) => {
                self.health.record_error("router", &err);
                Err(err)
            }
        }
    }

    pub async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let started = Instant::now();
        match self.router.complete(req).await {
            Ok(routed) => {
                self.health
                    .record_success(&routed.served_by, started.elapsed().as_millis() as u64);
                Ok(routed.response)
            }
            Err(err) => {
                self.health.record_error("router", &err);
                Err(err)
            }
        }
    }

    /// `true` when at least one configured backend reports healthy.
    pub async fn health(&self, deadline: Duration) -> bool {
        tokio::time::timeout(deadline, self.router.health())
            .await
            .unwrap_or(false)
    }

    async fn build_request(
        &self,
        user_message: &str,
        user_context: Option<&str>,
        session_info: Option<&SessionInfo>,
        model_override: Option<&str>,
    ) -> ChatRequest {
        let prompt_builder = self.prompt.read().await;
        let system_prompt = prompt_builder.build_prompt(user_context, session_info);
        let plain = system_prompt.to_plain_text();
        let model = match model_override {
            Some(m) => m.to_string(),
            None => self.default_model.read().await.clone(),
        };
        ChatRequest {
            model,
            system: plain,
            system_prompt: Some(system_prompt),
            messages: vec![Message {
                role: Role::User,
                content: user_message.to_string(),
            }],
            max_tokens: 4096,
            temperature: None,
            thinking: None,
            stop: None,
        }
    }
}
