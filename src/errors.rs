use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::services::{
    ingest_service::IngestError, metadata_service::MetadataError, object_store::StoreError,
};

/// A lightweight wrapper for request failures that keeps the message local.
///
/// The message is what the client sees; anything internal is logged where
/// the error is converted and replaced by a generic message here.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, msg)
    }

    pub fn unsupported_media_type(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<MetadataError> for AppError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::VideoNotFound(_) => AppError::not_found("Video not found"),
            other => {
                tracing::error!(error = %other, "metadata store failure");
                AppError::internal("Couldn't access video metadata")
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "object store failure");
        AppError::internal("Couldn't resolve video URL")
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::BadRequest(msg) => AppError::bad_request(msg),
            IngestError::PayloadTooLarge(limit) => AppError::payload_too_large(format!(
                "File is too large. Maximum size is {} MB.",
                limit / (1024 * 1024)
            )),
            IngestError::UnsupportedMediaType { sniffed, allowed } => {
                AppError::unsupported_media_type(format!(
                    "Unsupported file type {}. Allowed: {}",
                    sniffed,
                    allowed.join(", ")
                ))
            }
            other => {
                tracing::error!(error = %other, "upload pipeline failed");
                AppError::internal(other.public_message())
            }
        }
    }
}
