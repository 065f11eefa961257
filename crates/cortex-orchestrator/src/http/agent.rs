//! POST /agent, /agent/advanced, /agent/recursive — the ReAct and recursive
//! reasoning engines, differing only in which tool registry (or corpus) is
//! used.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::Json;
use cortex_reasoning::{react::AgentStep, solve_recursive, ReactAgent, ToolRegistry};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::engine;
use crate::error_response::ApiError;

#[derive(Deserialize)]
pub struct AgentRequest {
    pub question: String,
    #[serde(default)]
    pub max_steps: Option<usize>,
}

#[derive(Deserialize)]
pub struct RecursiveAgentRequest {
    pub question: String,
    pub corpus: String,
    #[serde(default)]
    pub max_steps: Option<usize>,
}

#[derive(Serialize)]
pub struct AgentReply {
    pub answer: String,
    pub steps: Vec<AgentStep>,
    pub total_steps: usize,
    pub success: bool,
    pub engine: &'static str,
    pub error: Option<String>,
}

async fn run_agent(
    state: &AppState,
    tools: &ToolRegistry,
    question: &str,
    max_steps: Option<usize>,
    engine_name: &'static str,
) -> AgentReply {
    let steps = max_steps.unwrap_or(state.config.reasoning.agent_max_steps);
    let agent = ReactAgent::new(&state.gateway, tools)
        .with_max_steps(steps)
        .with_capture(state.capture.clone());
    let result = agent.solve(question).await;

    AgentReply {
        answer: result.answer,
        steps: result.steps,
        total_steps: result.total_steps,
        success: result.success,
        engine: engine_name,
        error: result.error,
    }
}

pub async fn agent_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<AgentRequest>,
) -> Result<Json<AgentReply>, ApiError> {
    engine::require_non_empty("question", &req.question)?;
    engine::enforce_rate_limit(&state, &engine::client_key(addr))?;
    engine::capture_turn(&state, &req.question, "agent");

    let reply = run_agent(&state, &state.basic_tools, &req.question, req.max_steps, "react_basic").await;
    Ok(Json(reply))
}

pub async fn agent_advanced_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<AgentRequest>,
) -> Result<Json<AgentReply>, ApiError> {
    engine::require_non_empty("question", &req.question)?;
    engine::enforce_rate_limit(&state, &engine::client_key(addr))?;
    engine::capture_turn(&state, &req.question, "agent_advanced");

    let reply = run_agent(&state, &state.advanced_tools, &req.question, req.max_steps, "react_advanced").await;
    Ok(Json(reply))
}

pub async fn agent_recursive_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<RecursiveAgentRequest>,
) -> Result<Json<AgentReply>, ApiError> {
    engine::require_non_empty("question", &req.question)?;
    engine::require_non_empty("corpus", &req.corpus)?;
    engine::enforce_rate_limit(&state, &engine::client_key(addr))?;
    engine::capture_turn(&state, &req.question, "agent_recursive");

    let steps = req.max_steps.unwrap_or(state.config.reasoning.agent_max_steps);
    let result = solve_recursive(
        &state.gateway,
        state.sandbox.clone(),
        &req.question,
        req.corpus,
        steps,
    )
    .await;

    Ok(Json(AgentReply {
        answer: result.answer,
        steps: result.steps,
        total_steps: result.total_steps,
        success: result.success,
        engine: "recursive",
        error: result.error,
    }))
}
