//! Persona CRUD and activation — thin wrappers over `PersonaStore`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::app::AppState;
use crate::error_response::{not_found, ApiError};
use crate::persona::{Persona, PersonaPayload};

#[derive(Serialize)]
pub struct ActivationReply {
    pub active_id: String,
}

pub async fn list_personas(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Persona>>, ApiError> {
    let personas = state
        .personas
        .get_all()
        .map_err(|e| cortex_core::error::CortexError::Database(e.to_string()))?;
    Ok(Json(personas))
}

pub async fn create_persona(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PersonaPayload>,
) -> Result<Json<Persona>, ApiError> {
    let persona = state
        .personas
        .create(payload)
        .map_err(|e| cortex_core::error::CortexError::Database(e.to_string()))?;
    Ok(Json(persona))
}

pub async fn get_persona(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Persona>, ApiError> {
    let persona = state
        .personas
        .get_by_id(&id)
        .map_err(|e| cortex_core::error::CortexError::Database(e.to_string()))?
        .ok_or_else(|| not_found(format!("persona:{id}")))?;
    Ok(Json(persona))
}

pub async fn update_persona(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<PersonaPayload>,
) -> Result<Json<Persona>, ApiError> {
    let persona = state
        .personas
        .update(&id, payload)
        .map_err(|e| cortex_core::error::CortexError::Database(e.to_string()))?
        .ok_or_else(|| not_found(format!("persona:{id}")))?;
    Ok(Json(persona))
}

pub async fn delete_persona(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = state
        .personas
        .delete(&id)
        .map_err(|e| cortex_core::error::CortexError::Database(e.to_string()))?;
    if !deleted {
        return Err(not_found(format!("persona:{id}")));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn activate_persona(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ActivationReply>, ApiError> {
    let activated = state
        .personas
        .activate(&id)
        .map_err(|e| cortex_core::error::CortexError::Database(e.to_string()))?;
    if !activated {
        return Err(not_found(format!("persona:{id}")));
    }
    Ok(Json(ActivationReply { active_id: id }))
}
