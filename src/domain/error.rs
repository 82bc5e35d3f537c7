//! Crate-wide error taxonomy.
//!
//! Mirrors the error table of the engine spec: each variant maps to exactly
//! one HTTP status in `transport::http::types`.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::transport::http::types::ApiResponse;

#[derive(Debug, thiserror::Error)]
pub enum QuipuError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("shutdown in progress")]
    ShuttingDown,
}

impl From<rocksdb::Error> for QuipuError {
    fn from(e: rocksdb::Error) -> Self {
        QuipuError::Storage(e.to_string())
    }
}

impl QuipuError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            QuipuError::Validation(_) => StatusCode::BAD_REQUEST,
            QuipuError::NotFound(_) => StatusCode::NOT_FOUND,
            QuipuError::Conflict(_) => StatusCode::CONFLICT,
            QuipuError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            QuipuError::Protocol(_) => StatusCode::BAD_REQUEST,
            QuipuError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for QuipuError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        tracing::warn!(error = %self, %status, "request failed");
        (
            status,
            Json(ApiResponse {
                success: false,
                data: None,
                error: Some(self.to_string()),
            }),
        )
            .into_response()
    }
}

pub type QuipuResult<T> = Result<T, QuipuError>;
