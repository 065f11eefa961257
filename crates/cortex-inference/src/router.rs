use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::provider::{
    ChatRequest, ChatResponse, CompletionRequest, CompletionResponse, LlmProvider, ProviderError,
};

/// A single backend in the fallback chain, in priority order.
pub struct ProviderSlot {
    pub provider: Box<dyn LlmProvider>,
}

impl ProviderSlot {
    pub fn new(provider: Box<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

/// A response annotated with the backend id that actually served it.
#[derive(Debug, Clone)]
pub struct RoutedChatResponse {
    pub response: ChatResponse,
    pub served_by: String,
}

#[derive(Debug, Clone)]
pub struct RoutedCompletionResponse {
    pub response: CompletionResponse,
    pub served_by: String,
}

/// Routes requests across a priority-ordered chain of backends.
///
/// On a transport error or 5xx from a backend, the router cascades to the
/// next one. A per-call deadline is enforced with `tokio::time::timeout`;
/// a timeout is never retried against the same backend, it also cascades.
pub struct ProviderRouter {
    slots: Vec<ProviderSlot>,
    call_timeout: Duration,
}

impl ProviderRouter {
    /// `slots` must be non-empty; `call_timeout` bounds each individual
    /// backend attempt, not the whole fallback chain.
    pub fn new(slots: Vec<ProviderSlot>, call_timeout: Duration) -> Self {
        assert!(
            !slots.is_empty(),
            "ProviderRouter requires at least one provider slot"
        );
        Self { slots, call_timeout }
    }

    pub async fn chat(&self, req: &ChatRequest) -> Result<RoutedChatResponse, ProviderError> {
        let mut last_err: Option<ProviderError> = None;

        for slot in &self.slots {
            let name = slot.provider.name();
            match tokio::time::timeout(self.call_timeout, slot.provider.chat(req)).await {
                Ok(Ok(resp)) => {
                    return Ok(RoutedChatResponse {
                        response: resp,
                        served_by: name.to_string(),
                    })
                }
                Ok(Err(e)) => {
                    warn!(provider = %name, err = %e, "chat backend failed, cascading");
                    last_err = Some(e);
                }
                Err(_) => {
                    warn!(provider = %name, "chat backend timed out, cascading");
                    last_err = Some(ProviderError::Timeout {
                        ms: self.call_timeout.as_millis() as u64,
                    });
                }
            }
            info!(provider = %name, "provider exhausted, trying next in chain");
        }

        Err(last_err.unwrap_or_else(|| ProviderError::Unavailable("no providers configured".into())))
    }

    pub async fn complete(
        &self,
        req: &CompletionRequest,
    ) -> Result<RoutedCompletionResponse, ProviderError> {
        let mut last_err: Option<ProviderError> = None;

        for slot in &self.slots {
            let name = slot.provider.name();
            match tokio::time::timeout(self.call_timeout, slot.provider.complete(req)).await {
                Ok(Ok(resp)) => {
                    return Ok(RoutedCompletionResponse {
                        response: resp,
                        served_by: name.to_string(),
                    })
                }
                Ok(Err(e)) => {
                    warn!(provider = %name, err = %e, "complete backend failed, cascading");
                    last_err = Some(e);
                }
                Err(_) => {
                    warn!(provider = %name, "complete backend timed out, cascading");
                    last_err = Some(ProviderError::Timeout {
                        ms: self.call_timeout.as_millis() as u64,
                    });
                }
            }
            info!(provider = %name, "provider exhausted, trying next in chain");
        }

        Err(last_err.unwrap_or_else(|| ProviderError::Unavailable("no providers configured".into())))
    }

    /// `Ok | Degraded | Down` per backend, derived from each provider's own
    /// health probe; the rolling window itself is owned by `HealthTracker`.
    pub async fn health_all(&self) -> Vec<(String, bool)> {
        let mut out = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            out.push((slot.provider.name().to_string(), slot.provider.health().await));
        }
        out
    }
}

#[async_trait]
impl LlmProvider for ProviderRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        ProviderRouter::chat(self, req).await.map(|r| r.response)
    }

    async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        ProviderRouter::complete(self, req).await.map(|r| r.response)
    }

    async fn health(&self) -> bool {
        self.health_all().await.iter().any(|(_, ok)| *ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Message, Role};

    struct AlwaysFail;

    #[async_trait]
    impl LlmProvider for AlwaysFail {
        fn name(&self) -> &str {
            "always-fail"
        }
        async fn chat(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Err(ProviderError::Unavailable("intentional failure".to_string()))
        }
        async fn complete(
            &self,
            _req: &CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            Err(ProviderError::Unavailable("intentional failure".to_string()))
        }
    }

    struct AlwaysOk;

    #[async_trait]
    impl LlmProvider for AlwaysOk {
        fn name(&self) -> &str {
            "always-ok"
        }
        async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: "ok".to_string(),
                model: req.model.clone(),
                tokens_in: 1,
                tokens_out: 1,
                stop_reason: "stop".to_string(),
            })
        }
        async fn complete(
            &self,
            req: &CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse {
                text: "ok".to_string(),
                model: req.model.clone(),
                token_logprobs: vec![Some(-1.0)],
                raw: serde_json::json!({}),
            })
        }
    }

    fn dummy_request() -> ChatRequest {
        ChatRequest::new(
            "test-model",
            "You are a test.",
            vec![Message {
                role: Role::User,
                content: "hello".to_string(),
            }],
        )
    }

    #[tokio::test]
    async fn router_falls_back_to_second_provider() {
        let router = ProviderRouter::new(
            vec![
                ProviderSlot::new(Box::new(AlwaysFail)),
                ProviderSlot::new(Box::new(AlwaysOk)),
            ],
            Duration::from_secs(5),
        );

        let result = router.chat(&dummy_request()).await.unwrap();
        assert_eq!(result.response.content, "ok");
        assert_eq!(result.served_by, "always-ok");
    }

    #[tokio::test]
    async fn router_errors_when_all_fail() {
        let router = ProviderRouter::new(
            vec![
                ProviderSlot::new(Box::new(AlwaysFail)),
                ProviderSlot::new(Box::new(AlwaysFail)),
            ],
            Duration::from_secs(5),
        );

        let result = router.chat(&dummy_request()).await;
        assert!(result.is_err());
    }
}
