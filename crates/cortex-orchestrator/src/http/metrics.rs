//! GET /metrics and GET /metrics/?hours= — process resource usage, per-backend
//! health, rolling token/sec estimates, and bounded history from C2.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::app::AppState;
use crate::metrics::MetricsSnapshot;

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_hours")]
    pub hours: i64,
}

fn default_hours() -> i64 {
    24
}

pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    let snapshot = state.metrics.collect(&state.gateway).await;
    crate::metrics::record_snapshot(&state.memory, &snapshot);
    Json(snapshot)
}

pub async fn metrics_history_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<MetricsSnapshot>> {
    let history = crate::metrics::history(&state.memory, query.hours);
    Json(history)
}
