//! POST /voice/transcribe, POST /voice/synthesize — thin proxies to the
//! speech-to-text/text-to-speech collaborator (Faster-Whisper/XTTS-v2
//! upstream). Reimplementing STT/TTS models is out of scope; this surface
//! only forwards bytes and is gated by `features.enable_voice`.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::error_response::{bad_request, ApiError};
use cortex_core::error::CortexError;

fn require_enabled(state: &AppState) -> Result<(), ApiError> {
    if state.config.features.enable_voice {
        Ok(())
    } else {
        Err(ApiError(CortexError::CollaboratorUnreachable {
            collaborator: "voice".to_string(),
            message: "voice features disabled".to_string(),
        }))
    }
}

#[derive(Serialize)]
pub struct TranscriptionReply {
    pub text: String,
    pub language: Option<String>,
    pub duration: Option<f64>,
}

pub async fn transcribe_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<TranscriptionReply>, ApiError> {
    require_enabled(&state)?;

    let mut audio_bytes = None;
    let mut filename = "audio.wav".to_string();
    let mut content_type = "audio/wav".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request("audio", e.to_string()))?
    {
        if field.name() == Some("audio") {
            filename = field.file_name().unwrap_or("audio.wav").to_string();
            content_type = field
                .content_type()
                .unwrap_or("audio/wav")
                .to_string();
            audio_bytes = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| bad_request("audio", e.to_string()))?,
            );
        }
    }

    let audio_bytes = audio_bytes.ok_or_else(|| bad_request("audio", "no audio file provided"))?;

    let part = reqwest::multipart::Part::bytes(audio_bytes.to_vec())
        .file_name(filename)
        .mime_str(&content_type)
        .map_err(|e| CortexError::Internal(e.to_string()))?;
    let form = reqwest::multipart::Form::new().part("audio", part);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(state.config.voice.timeout_secs))
        .build()
        .map_err(|e| CortexError::Internal(e.to_string()))?;

    let resp = client
        .post(format!("{}/transcribe", state.config.voice.base_url))
        .multipart(form)
        .send()
        .await
        .map_err(|e| collaborator_unreachable(e.to_string()))?;

    if !resp.status().is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError(CortexError::CollaboratorUnreachable {
            collaborator: "voice".to_string(),
            message: body,
        }));
    }

    let reply: TranscriptionReply = resp
        .json()
        .await
        .map_err(|e| CortexError::Internal(format!("malformed voice collaborator response: {e}")))?;
    Ok(Json(reply))
}

#[derive(Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
}

pub async fn synthesize_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SynthesisRequest>,
) -> Result<Response, ApiError> {
    require_enabled(&state)?;
    crate::engine::require_non_empty("text", &req.text)?;

    let mut form = reqwest::multipart::Form::new().text("text", req.text);

    if let Some(persona) = state
        .personas
        .active_persona()
        .map_err(|e| CortexError::Database(e.to_string()))?
    {
        if let Some(reference_path) = persona.voice_reference_path {
            if let Ok(bytes) = tokio::fs::read(&reference_path).await {
                if let Ok(part) = reqwest::multipart::Part::bytes(bytes)
                    .file_name("reference.wav")
                    .mime_str("audio/wav")
                {
                    form = form.part("reference_audio", part);
                }
            }
        }
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(state.config.voice.timeout_secs))
        .build()
        .map_err(|e| CortexError::Internal(e.to_string()))?;

    let resp = client
        .post(format!("{}/synthesize", state.config.voice.base_url))
        .multipart(form)
        .send()
        .await
        .map_err(|e| collaborator_unreachable(e.to_string()))?;

    if !resp.status().is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError(CortexError::CollaboratorUnreachable {
            collaborator: "voice".to_string(),
            message: body,
        }));
    }

    let audio = resp
        .bytes()
        .await
        .map_err(|e| CortexError::Internal(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "audio/wav".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=speech.wav".to_string(),
            ),
        ],
        audio,
    )
        .into_response())
}

fn collaborator_unreachable(message: String) -> CortexError {
    CortexError::CollaboratorUnreachable {
        collaborator: "voice".to_string(),
        message,
    }
}
