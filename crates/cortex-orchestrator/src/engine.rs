//! Shared pieces of the request lifecycle (spec §4.5): rate limiting,
//! non-blocking capture-stream append, and persona system-prompt injection.
//! Used by every endpoint that talks to C1 directly or through a C4 engine.

use std::net::SocketAddr;

use cortex_core::error::CortexError;
use cortex_inference::SessionInfo;
use serde_json::json;

use crate::app::AppState;
use crate::error_response::{bad_request, ApiError};

pub fn client_key(addr: SocketAddr) -> String {
    addr.ip().to_string()
}

/// Rejects with 429 once `client_key` has exceeded the configured request
/// budget within the trailing window.
pub fn enforce_rate_limit(state: &AppState, key: &str) -> Result<(), ApiError> {
    if state.rate_limiter.is_allowed(key) {
        Ok(())
    } else {
        Err(ApiError(CortexError::RateLimited))
    }
}

pub fn require_non_empty(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(bad_request(field, format!("'{field}' must not be empty")))
    } else {
        Ok(())
    }
}

/// Best-effort: append the turn to the capture stream. Never fails the
/// request — the stream itself swallows storage errors.
pub fn capture_turn(state: &AppState, message: &str, source: &str) {
    state.capture.append(message, json!({ "source": source }));
}

/// The active persona's system prompt plus history, rendered as the single
/// text blob `Gateway::chat_with_context` expects as `user_context`. `None`
/// when no persona is active.
pub fn active_persona_context(state: &AppState) -> Option<String> {
    let persona = state.personas.active_persona().ok().flatten()?;
    let mut text = persona.system_prompt;
    if let Some(history) = persona.history.filter(|h| !h.is_empty()) {
        text.push_str("\n\n");
        text.push_str(&history);
    }
    Some(text)
}

pub fn session_info(session_key: &str, turn_count: u32) -> SessionInfo {
    SessionInfo {
        session_key: session_key.to_string(),
        turn_count,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}
