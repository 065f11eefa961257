//! POST /verify — Chain-of-Verification: draft, plan questions, answer them
//! independently, revise.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::Json;
use cortex_reasoning::cov;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::engine;
use crate::error_response::ApiError;

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub message: String,
}

#[derive(Serialize)]
pub struct VerifyReply {
    pub initial_response: String,
    pub verification_questions: Vec<String>,
    pub verification_qa: Vec<cov::VerificationQa>,
    pub final_response: String,
    pub revised: bool,
    pub engine: &'static str,
}

pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyReply>, ApiError> {
    engine::require_non_empty("message", &req.message)?;
    engine::enforce_rate_limit(&state, &engine::client_key(addr))?;
    engine::capture_turn(&state, &req.message, "verify");

    let result = cov::verify(&state.gateway, &req.message).await?;

    Ok(Json(VerifyReply {
        initial_response: result.draft,
        verification_questions: result.questions,
        verification_qa: result.verification_qa,
        final_response: result.final_response,
        revised: result.revised,
        engine: "chain_of_verification",
    }))
}
