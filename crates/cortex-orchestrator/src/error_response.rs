//! Maps each crate's domain error type into `cortex_core::CortexError` and
//! then into an HTTP response, per the status table: 400 validation, 404 not
//! found, 429 rate limit, 503 collaborator unreachable, 500 internal.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use cortex_core::error::CortexError;
use cortex_inference::ProviderError;
use cortex_memory::MemoryError;
use cortex_reasoning::ReasoningError;
use cortex_surprise::SurpriseError;

/// Thin `IntoResponse` wrapper so handlers can just write `result.map_err(ApiError::from)?`.
pub struct ApiError(pub CortexError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = status_for(&err);
        let body = Json(json!({
            "error": err.to_one_line(),
            "code": err.code(),
            "recovery_steps": err.recovery_steps(),
        }));
        (status, body).into_response()
    }
}

impl From<CortexError> for ApiError {
    fn from(e: CortexError) -> Self {
        ApiError(e)
    }
}

impl From<ProviderError> for ApiError {
    fn from(e: ProviderError) -> Self {
        ApiError(from_provider_error(e))
    }
}

impl From<MemoryError> for ApiError {
    fn from(e: MemoryError) -> Self {
        ApiError(from_memory_error(e))
    }
}

impl From<SurpriseError> for ApiError {
    fn from(e: SurpriseError) -> Self {
        ApiError(from_surprise_error(e))
    }
}

impl From<ReasoningError> for ApiError {
    fn from(e: ReasoningError) -> Self {
        ApiError(from_reasoning_error(e))
    }
}

fn status_for(err: &CortexError) -> StatusCode {
    match err {
        CortexError::Validation { .. } => StatusCode::BAD_REQUEST,
        CortexError::NotFound(_) => StatusCode::NOT_FOUND,
        CortexError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        CortexError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        CortexError::CollaboratorUnreachable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        CortexError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        CortexError::Config(_) | CortexError::Database(_) | CortexError::Serialization(_)
        | CortexError::Io(_) | CortexError::Model(_) | CortexError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub fn bad_request(field: &str, message: impl Into<String>) -> ApiError {
    ApiError(CortexError::Validation {
        field: field.to_string(),
        message: message.into(),
    })
}

pub fn not_found(what: impl Into<String>) -> ApiError {
    ApiError(CortexError::NotFound(what.into()))
}

pub fn from_provider_error(e: ProviderError) -> CortexError {
    match e {
        ProviderError::Timeout { ms } => CortexError::Timeout { ms },
        ProviderError::RateLimited { .. } => CortexError::RateLimited,
        ProviderError::Unavailable(message) => CortexError::CollaboratorUnreachable {
            collaborator: "inference".to_string(),
            message,
        },
        ProviderError::Cancelled => CortexError::Internal("request cancelled".to_string()),
        other => CortexError::Model(other.to_string()),
    }
}

pub fn from_memory_error(e: MemoryError) -> CortexError {
    match e {
        MemoryError::NotFound { namespace, id } => {
            CortexError::NotFound(format!("{namespace}:{id}"))
        }
        MemoryError::InvalidFilter(message) => CortexError::Validation {
            field: "filter".to_string(),
            message,
        },
        MemoryError::UnknownNamespace(ns) => CortexError::Validation {
            field: "namespace".to_string(),
            message: format!("unknown namespace '{ns}'"),
        },
        MemoryError::DimensionMismatch { expected, got } => CortexError::Internal(format!(
            "embedding dimension mismatch: expected {expected}, got {got}"
        )),
        other => CortexError::Database(other.to_string()),
    }
}

pub fn from_surprise_error(e: SurpriseError) -> CortexError {
    match e {
        SurpriseError::Inference(inner) => from_provider_error(inner),
        SurpriseError::Memory(inner) => from_memory_error(inner),
        other => CortexError::Database(other.to_string()),
    }
}

pub fn from_reasoning_error(e: ReasoningError) -> CortexError {
    match e {
        ReasoningError::Inference(inner) => from_provider_error(inner),
        ReasoningError::Memory(inner) => from_memory_error(inner),
        ReasoningError::Sandbox(message) => CortexError::CollaboratorUnreachable {
            collaborator: "sandbox".to_string(),
            message,
        },
        ReasoningError::StepBudgetExhausted { max_steps } => {
            CortexError::Internal(format!("step budget of {max_steps} exhausted"))
        }
        other => CortexError::Internal(other.to_string()),
    }
}
