//! POST /library/search, GET /library/stats — read access to C2's ingested
//! `documents` namespace. Ingestion itself (chunking/OCR) is an out-of-scope
//! collaborator (spec §1); this surface only searches what's already there.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use cortex_memory::{SearchHit, NS_DOCUMENTS};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::error_response::ApiError;

#[derive(Deserialize)]
pub struct LibrarySearchRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    5
}

#[derive(Serialize)]
pub struct LibrarySearchReply {
    pub results: Vec<SearchHit>,
}

pub async fn search_library(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LibrarySearchRequest>,
) -> Result<Json<LibrarySearchReply>, ApiError> {
    crate::engine::require_non_empty("query", &req.query)?;

    let memory = state.memory.clone();
    let top_k = req.top_k;
    let query = req.query.clone();
    let results = tokio::task::spawn_blocking(move || memory.search(NS_DOCUMENTS, &query, top_k, &[]))
        .await
        .map_err(|e| cortex_core::error::CortexError::Internal(e.to_string()))??;

    Ok(Json(LibrarySearchReply { results }))
}

#[derive(Serialize)]
pub struct LibraryStatsReply {
    pub total_chunks: i64,
}

pub async fn library_stats(State(state): State<Arc<AppState>>) -> Result<Json<LibraryStatsReply>, ApiError> {
    let memory = state.memory.clone();
    let total_chunks = tokio::task::spawn_blocking(move || memory.count(NS_DOCUMENTS))
        .await
        .map_err(|e| cortex_core::error::CortexError::Internal(e.to_string()))??;

    Ok(Json(LibraryStatsReply { total_chunks }))
}
