//! POST /code_assist — generate code for a task, execute it in the sandbox,
//! and retry with the failure fed back to the model until it passes or the
//! attempt budget is exhausted. A C5-level composition over C1 and the
//! sandbox collaborator, not a registered C4 reasoning engine.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, State};
use axum::Json;
use cortex_inference::{Message, Role};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::engine;
use crate::error_response::ApiError;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const CODE_ASSIST_MAX_TOKENS: u32 = 1024;

const CODE_ASSIST_SYSTEM: &str = "You write Python to solve the user's task. Respond with a single \
fenced Python code block containing the complete solution, followed by a short 'Explanation:' line. \
The code must print its result or assertion outcome so the sandbox's stdout shows whether it worked.";

#[derive(Deserialize)]
pub struct CodeAssistRequest {
    pub task: String,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Serialize)]
pub struct CodeAssistReply {
    pub task: String,
    pub code: String,
    pub explanation: String,
    pub test_output: Option<String>,
    pub success: bool,
    pub attempts: u32,
    pub error: Option<String>,
}

pub async fn code_assist_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<CodeAssistRequest>,
) -> Result<Json<CodeAssistReply>, ApiError> {
    engine::require_non_empty("task", &req.task)?;
    engine::enforce_rate_limit(&state, &engine::client_key(addr))?;
    engine::capture_turn(&state, &req.task, "code_assist");

    let max_attempts = req.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS).max(1);
    let timeout = Duration::from_secs(req.timeout.unwrap_or(state.config.sandbox.timeout_secs));

    let mut last_error: Option<String> = None;
    let mut attempt = 0;

    while attempt < max_attempts {
        attempt += 1;
        let prompt = build_prompt(&req.task, last_error.as_deref());
        let routed = state
            .gateway
            .chat_raw(
                CODE_ASSIST_SYSTEM,
                vec![Message {
                    role: Role::User,
                    content: prompt,
                }],
                0.3,
                CODE_ASSIST_MAX_TOKENS,
                None,
            )
            .await?;

        let (code, explanation) = parse_code_response(&routed.response.content);
        if code.is_empty() {
            last_error = Some("model response did not contain a fenced code block".to_string());
            continue;
        }

        let outcome = state.sandbox.execute(&code, HashMap::new(), timeout).await?;
        if outcome.success {
            return Ok(Json(CodeAssistReply {
                task: req.task,
                code,
                explanation,
                test_output: outcome.result,
                success: true,
                attempts: attempt,
                error: None,
            }));
        }
        last_error = outcome
            .error
            .or_else(|| Some("sandbox reported failure with no error detail".to_string()));
    }

    Ok(Json(CodeAssistReply {
        task: req.task,
        code: String::new(),
        explanation: String::new(),
        test_output: None,
        success: false,
        attempts: max_attempts,
        error: last_error,
    }))
}

fn build_prompt(task: &str, previous_error: Option<&str>) -> String {
    match previous_error {
        None => format!("Task: {task}"),
        Some(err) => format!(
            "Task: {task}\n\nThe previous attempt failed with this error, fix it:\n{err}"
        ),
    }
}

/// Extracts the first fenced code block plus whatever follows an
/// `Explanation:` marker, if present.
fn parse_code_response(text: &str) -> (String, String) {
    let Some(start) = text.find("```") else {
        return (String::new(), text.trim().to_string());
    };
    let after_open = start + 3;
    let rest = &text[after_open..];
    // Skip an optional language tag on the opening fence (e.g. "python\n").
    let code_start = rest.find('\n').map(|i| i + 1).unwrap_or(0);
    let Some(close_rel) = rest[code_start..].find("```") else {
        return (rest[code_start..].trim().to_string(), String::new());
    };
    let code = rest[code_start..code_start + close_rel].trim().to_string();
    let after_close = &rest[code_start + close_rel + 3..];

    let explanation = after_close
        .find("Explanation:")
        .map(|i| after_close[i + "Explanation:".len()..].trim().to_string())
        .unwrap_or_else(|| after_close.trim().to_string());

    (code, explanation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_code_and_explanation() {
        let text = "```python\nprint(1 + 1)\n```\nExplanation: adds two numbers.";
        let (code, explanation) = parse_code_response(text);
        assert_eq!(code, "print(1 + 1)");
        assert_eq!(explanation, "adds two numbers.");
    }

    #[test]
    fn missing_code_block_returns_empty_code() {
        let (code, _) = parse_code_response("I am not sure how to do this.");
        assert!(code.is_empty());
    }
}
