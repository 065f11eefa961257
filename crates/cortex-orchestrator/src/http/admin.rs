//! POST /admin/archive_old_memories, GET /admin/archive_stats,
//! POST /admin/search_archive — administrative cold-tier controls over C3's
//! archival worker (§4.3, §6).

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use cortex_memory::Record;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::error_response::ApiError;

/// Caps a single `search_archive` request regardless of what the caller asks for.
const SEARCH_ARCHIVE_HARD_CAP: usize = 500;

#[derive(Serialize)]
pub struct ArchiveRunReply {
    pub archived: usize,
    pub kept_in_redis: usize,
    pub files_created: usize,
    pub scanned: usize,
    pub skipped_missing: usize,
}

pub async fn archive_old_memories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ArchiveRunReply>, ApiError> {
    let memory = state.memory.clone();
    let config = state.config.archival.clone();
    let stats = tokio::task::spawn_blocking(move || cortex_surprise::archive_once(&config, &memory))
        .await
        .map_err(|e| cortex_core::error::CortexError::Internal(e.to_string()))??;

    Ok(Json(ArchiveRunReply {
        archived: stats.archived,
        kept_in_redis: stats.kept,
        files_created: stats.files_created,
        scanned: stats.scanned,
        skipped_missing: stats.skipped_missing,
    }))
}

#[derive(Serialize)]
pub struct ArchiveStatsReply {
    pub total_archived_memories: usize,
    pub archive_files: usize,
}

pub async fn archive_stats(State(state): State<Arc<AppState>>) -> Result<Json<ArchiveStatsReply>, ApiError> {
    let archive_root = state.config.archival.cold_storage_path.clone();
    let (total_archived_memories, archive_files) = tokio::task::spawn_blocking(move || {
        let records = cortex_surprise::search_archive(&archive_root, "", usize::MAX)?;
        let files = count_archive_files(&archive_root)?;
        Ok::<_, cortex_surprise::SurpriseError>((records.len(), files))
    })
    .await
    .map_err(|e| cortex_core::error::CortexError::Internal(e.to_string()))??;

    Ok(Json(ArchiveStatsReply {
        total_archived_memories,
        archive_files,
    }))
}

fn count_archive_files(archive_root: &str) -> std::io::Result<usize> {
    let root = std::path::Path::new(archive_root);
    if !root.exists() {
        return Ok(0);
    }
    let mut count = 0;
    for month_entry in std::fs::read_dir(root)? {
        let month_entry = month_entry?;
        if !month_entry.file_type()?.is_dir() {
            continue;
        }
        for file_entry in std::fs::read_dir(month_entry.path())? {
            let file_entry = file_entry?;
            if file_entry.path().extension().is_some_and(|ext| ext == "json") {
                count += 1;
            }
        }
    }
    Ok(count)
}

#[derive(Deserialize)]
pub struct SearchArchiveRequest {
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    20
}

#[derive(Serialize)]
pub struct SearchArchiveReply {
    pub results: Vec<Record>,
}

pub async fn search_archive_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchArchiveRequest>,
) -> Result<Json<SearchArchiveReply>, ApiError> {
    crate::engine::require_non_empty("query", &req.query)?;

    let archive_root = state.config.archival.cold_storage_path.clone();
    let max = req.max_results.min(SEARCH_ARCHIVE_HARD_CAP);
    let query = req.query.clone();
    let results = tokio::task::spawn_blocking(move || cortex_surprise::search_archive(&archive_root, &query, max))
        .await
        .map_err(|e| cortex_core::error::CortexError::Internal(e.to_string()))??;

    Ok(Json(SearchArchiveReply { results }))
}
