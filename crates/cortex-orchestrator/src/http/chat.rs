//! POST /chat — plain chat turn through C1, persona-injected, rate-limited.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::engine;
use crate::error_response::ApiError;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct ChatReply {
    pub response: String,
    pub engine: &'static str,
}

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    engine::require_non_empty("message", &req.message)?;
    engine::enforce_rate_limit(&state, &engine::client_key(addr))?;
    engine::capture_turn(&state, &req.message, "chat");

    let persona_context = engine::active_persona_context(&state);
    let session_key = req.session_id.unwrap_or_else(|| "default".to_string());
    let session = engine::session_info(&session_key, 0);

    let response = state
        .gateway
        .chat_with_context(&req.message, persona_context.as_deref(), Some(&session), None)
        .await?;

    Ok(Json(ChatReply {
        response: response.content,
        engine: "chat",
    }))
}
