//! GET /health — liveness probe: server metadata plus per-backend health
//! from C1's rolling health tracker.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// Short commit hash, embedded by `build.rs`. `"unknown"` outside a git checkout.
const GIT_SHA: &str = env!("CORTEX_GIT_SHA");

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let backends = state.gateway.health_tracker().all_entries();

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "git_sha": GIT_SHA,
        "backends": backends,
    }))
}
