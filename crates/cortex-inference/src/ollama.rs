use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{
    ChatRequest, ChatResponse, CompletionRequest, CompletionResponse, LlmProvider, ProviderError,
};

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaProvider {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| "http://localhost:11434".to_string()),
        }
    }

    fn map_transport_err(e: reqwest::Error) -> ProviderError {
        if e.is_connect() || e.is_timeout() {
            ProviderError::Unavailable(e.to_string())
        } else {
            ProviderError::Http(e)
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = build_chat_body(req);
        let url = format!("{}/api/chat", self.base_url);

        debug!(model = %req.model, "sending chat request to Ollama");

        let resp = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(Self::map_transport_err)?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Ollama chat API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ChatApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(parse_chat_response(api_resp))
    }

    /// Ollama has no logprobs-bearing chat/completions API; `/api/generate`
    /// does expose per-token data via `logprobs`-less `eval` counts only, so
    /// mean-log-prob extraction falls back to parsing the `context` field's
    /// absence as "unsupported" — we report a parse error and let the router
    /// cascade rather than fabricate a number.
    async fn complete(
        &self,
        req: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let body = serde_json::json!({
            "model": req.model,
            "prompt": req.prompt,
            "stream": false,
            "raw": true,
            "options": {
                "num_predict": req.max_tokens,
                "temperature": req.temperature,
                "top_p": req.top_p,
                "stop": req.stop,
            },
        });
        let url = format!("{}/api/generate", self.base_url);

        debug!(model = %req.model, "sending completion request to Ollama");

        let resp = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(Self::map_transport_err)?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Ollama generate API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let raw: serde_json::Value = resp
            .text()
            .await
            .ok()
            .and_then(|t| serde_json::from_str(&t).ok())
            .ok_or_else(|| ProviderError::Parse("invalid generate JSON".to_string()))?;

        let api_resp: GenerateApiResponse = serde_json::from_value(raw.clone())
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        // Ollama does not return per-token logprobs; when the caller asked
        // for them (echo + logprobs, used for perplexity), there is nothing
        // to report and the gateway must cascade to a backend that can.
        if req.logprobs.is_some() && req.echo {
            return Err(ProviderError::Parse(
                "ollama backend does not expose token logprobs".to_string(),
            ));
        }

        Ok(CompletionResponse {
            text: api_resp.response,
            model: api_resp.model,
            token_logprobs: Vec::new(),
            raw,
        })
    }

    async fn health(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .is_ok()
    }
}

fn build_chat_body(req: &ChatRequest) -> serde_json::Value {
    let mut messages = vec![serde_json::json!({
        "role": "system",
        "content": req.system,
    })];

    for m in &req.messages {
        messages.push(serde_json::json!({
            "role": m.role,
            "content": m.content,
        }));
    }

    let mut options = serde_json::json!({
        "num_predict": req.max_tokens,
    });
    if let Some(temp) = req.temperature {
        options["temperature"] = serde_json::json!(temp);
    }
    if let Some(ref stop) = req.stop {
        options["stop"] = serde_json::json!(stop);
    }

    serde_json::json!({
        "model": req.model,
        "messages": messages,
        "stream": false,
        "options": options,
    })
}

fn parse_chat_response(resp: ChatApiResponse) -> ChatResponse {
    let content = resp.message.content;
    let tokens_in = resp.prompt_eval_count.unwrap_or(0);
    let tokens_out = resp.eval_count.unwrap_or(0);
    let stop_reason = if resp.done {
        "stop".to_string()
    } else {
        String::new()
    };

    ChatResponse {
        content,
        model: resp.model,
        tokens_in,
        tokens_out,
        stop_reason,
    }
}

#[derive(Deserialize)]
struct ChatApiResponse {
    model: String,
    message: OllamaMessage,
    done: bool,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

#[derive(Deserialize)]
struct GenerateApiResponse {
    model: String,
    response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chat_response_extracts_content_and_counts() {
        let resp = ChatApiResponse {
            model: "llama3".to_string(),
            message: OllamaMessage {
                content: "hi there".to_string(),
            },
            done: true,
            prompt_eval_count: Some(12),
            eval_count: Some(4),
        };
        let parsed = parse_chat_response(resp);
        assert_eq!(parsed.content, "hi there");
        assert_eq!(parsed.tokens_in, 12);
        assert_eq!(parsed.tokens_out, 4);
        assert_eq!(parsed.stop_reason, "stop");
    }

    #[test]
    fn parse_chat_response_in_progress_has_no_stop_reason() {
        let resp = ChatApiResponse {
            model: "llama3".to_string(),
            message: OllamaMessage {
                content: "partial".to_string(),
            },
            done: false,
            prompt_eval_count: None,
            eval_count: None,
        };
        let parsed = parse_chat_response(resp);
        assert!(parsed.stop_reason.is_empty());
        assert_eq!(parsed.tokens_in, 0);
    }
}
