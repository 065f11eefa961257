use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ReasoningError, Result};

/// Client for the sandboxed code-execution collaborator. The wire contract
/// is fixed: POST `{code, context, timeout}`, get back `{status, result?,
/// error?}` where `status` is `"success"` or `"error"`. Running untrusted
/// code is entirely the collaborator's concern; this crate only shuttles
/// the request and interprets the response.
pub struct SandboxClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Clone, Serialize)]
struct SandboxRequest<'a> {
    code: &'a str,
    context: &'a HashMap<String, Value>,
    timeout: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct SandboxResponse {
    status: String,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Outcome of a single sandbox call.
#[derive(Debug, Clone)]
pub struct SandboxOutcome {
    pub success: bool,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl SandboxClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub async fn execute(
        &self,
        code: &str,
        context: HashMap<String, Value>,
        timeout: Duration,
    ) -> Result<SandboxOutcome> {
        let body = SandboxRequest {
            code,
            context: &context,
            timeout: timeout.as_secs(),
        };

        let resp = self
            .client
            .post(format!("{}/execute", self.base_url))
            .json(&body)
            .timeout(timeout + Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| ReasoningError::Sandbox(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ReasoningError::Sandbox(format!(
                "sandbox returned HTTP {status}: {text}"
            )));
        }

        let parsed: SandboxResponse = resp
            .json()
            .await
            .map_err(|e| ReasoningError::Sandbox(format!("invalid sandbox response: {e}")))?;

        Ok(SandboxOutcome {
            success: parsed.status == "success",
            result: parsed.result,
            error: parsed.error,
        })
    }
}
