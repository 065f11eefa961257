//! GET /memories, POST /memories/search, GET|DELETE /memories/{id} — direct
//! read/search/delete access to C2's `memories` namespace (§6).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use cortex_memory::{Filter, Record, SearchHit, NS_MEMORIES};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::error_response::{not_found, ApiError};

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Serialize)]
pub struct MemoryListReply {
    pub memories: Vec<Record>,
    pub total: i64,
    pub limit: usize,
    pub offset: usize,
}

pub async fn list_memories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<MemoryListReply>, ApiError> {
    let memory = state.memory.clone();
    let (mut all, total) = tokio::task::spawn_blocking(move || {
        let total = memory.count(NS_MEMORIES)?;
        let records = memory.scan(NS_MEMORIES)?;
        Ok::<_, cortex_memory::MemoryError>((records, total))
    })
    .await
    .map_err(|e| cortex_core::error::CortexError::Internal(e.to_string()))??;

    all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let page = all.into_iter().skip(query.offset).take(query.limit).collect();

    Ok(Json(MemoryListReply {
        memories: page,
        total,
        limit: query.limit,
        offset: query.offset,
    }))
}

#[derive(Deserialize)]
pub struct SearchMemoriesRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub session_id: Option<String>,
}

fn default_top_k() -> usize {
    5
}

#[derive(Serialize)]
pub struct MemorySearchHit {
    #[serde(flatten)]
    pub record: Record,
    pub similarity_score: f32,
}

#[derive(Serialize)]
pub struct MemorySearchReply {
    pub memories: Vec<MemorySearchHit>,
}

pub async fn search_memories(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchMemoriesRequest>,
) -> Result<Json<MemorySearchReply>, ApiError> {
    crate::engine::require_non_empty("query", &req.query)?;

    let memory = state.memory.clone();
    let filters: Vec<Filter> = req
        .session_id
        .clone()
        .map(|tag| vec![Filter::tag("session_tag", tag)])
        .unwrap_or_default();
    let top_k = req.top_k;
    let query_text = req.query.clone();

    let hits: Vec<SearchHit> = tokio::task::spawn_blocking(move || {
        memory.search(NS_MEMORIES, &query_text, top_k, &filters)
    })
    .await
    .map_err(|e| cortex_core::error::CortexError::Internal(e.to_string()))??;

    let memories = hits
        .into_iter()
        .map(|hit| MemorySearchHit {
            record: hit.record,
            similarity_score: hit.distance,
        })
        .collect();

    Ok(Json(MemorySearchReply { memories }))
}

pub async fn get_memory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Record>, ApiError> {
    let memory = state.memory.clone();
    let lookup_id = id.clone();
    let record = tokio::task::spawn_blocking(move || memory.get(NS_MEMORIES, &lookup_id))
        .await
        .map_err(|e| cortex_core::error::CortexError::Internal(e.to_string()))??
        .ok_or_else(|| not_found(format!("memories:{id}")))?;
    Ok(Json(record))
}

pub async fn delete_memory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let memory = state.memory.clone();
    let delete_id = id.clone();
    let deleted = tokio::task::spawn_blocking(move || memory.delete(NS_MEMORIES, &delete_id))
        .await
        .map_err(|e| cortex_core::error::CortexError::Internal(e.to_string()))??;
    if !deleted {
        return Err(not_found(format!("memories:{id}")));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}
