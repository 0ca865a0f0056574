use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::engine::EngineError;

/// Request-level failures, mapped onto HTTP statuses.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("multipart upload has no `file` field")]
    MissingFile,
    #[error("invalid multipart payload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("failed to decode image: {0}")]
    BadImage(#[from] image::ImageError),
    #[error("matching failed: {0}")]
    Engine(#[from] EngineError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFile | ApiError::Multipart(_) | ApiError::BadImage(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Engine(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
