//! Typed runtime errors.
//!
//! Mirrors the teacher's `agents::orchestrator::OrchestratorError` shape: a
//! flat `thiserror` enum, one variant per error kind the spec distinguishes
//! by *behavior* rather than by name.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    #[error("Cannot cancel run with status '{0}'")]
    IllegalState(String),

    /// Captures any error raised from within `exec_run`. Recorded on the Run
    /// record as `last_error: {code: "EXEC_ERROR", message}`.
    #[error("execution failed: {0}")]
    ExecError(String),

    #[error("store I/O error: {0}")]
    Store(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl RuntimeError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        RuntimeError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Stable machine-readable code, used for `last_error.code` on failed runs.
    pub fn code(&self) -> &'static str {
        match self {
            RuntimeError::NotFound { .. } => "NOT_FOUND",
            RuntimeError::IllegalArgument(_) => "ILLEGAL_ARGUMENT",
            RuntimeError::IllegalState(_) => "ILLEGAL_STATE",
            RuntimeError::ExecError(_) => "EXEC_ERROR",
            RuntimeError::Store(_) => "STORE_ERROR",
            RuntimeError::Serde(_) => "STORE_ERROR",
        }
    }
}

// The default host binding maps NotFound/IllegalState to 404/409 (spec.md §6
// explicitly permits this refinement over the bare-500 fallback).
impl IntoResponse for RuntimeError {
    fn into_response(self) -> Response {
        let status = match &self {
            RuntimeError::NotFound { .. } => StatusCode::NOT_FOUND,
            RuntimeError::IllegalArgument(_) => StatusCode::BAD_REQUEST,
            RuntimeError::IllegalState(_) => StatusCode::CONFLICT,
            RuntimeError::ExecError(_) | RuntimeError::Store(_) | RuntimeError::Serde(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = json!({ "error": { "code": self.code(), "message": self.to_string() } });
        (status, axum::Json(body)).into_response()
    }
}
