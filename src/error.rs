use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum FileServerError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Access denied")]
    Forbidden(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("File too large")]
    TooLarge { size: u64, limit: u64 },

    #[error("File type not allowed")]
    ExtensionNotAllowed(String),

    #[error("Directory operation not allowed on file")]
    NotADirectory,

    #[error("Failed to save file")]
    Storage(#[source] std::io::Error),

    #[error("Server error")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl FileServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidPath(_) => StatusCode::BAD_REQUEST,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::ExtensionNotAllowed(_) => StatusCode::BAD_REQUEST,
            Self::NotADirectory => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::InvalidPath(_) => "INVALID_PATH",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::TooLarge { .. } => "FILE_TOO_LARGE",
            Self::ExtensionNotAllowed(_) => "EXTENSION_NOT_ALLOWED",
            Self::NotADirectory => "NOT_A_DIRECTORY",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Optional client-facing detail. Server-side failures stay opaque.
    fn details(&self) -> Option<String> {
        match self {
            Self::ExtensionNotAllowed(ext) if !ext.is_empty() => {
                Some(format!("extension {ext} is not in the allow-list"))
            }
            Self::ExtensionNotAllowed(_) => Some("file has no extension".to_string()),
            Self::Forbidden(reason) => Some(reason.clone()),
            Self::TooLarge { limit, .. } => Some(format!("maximum upload size is {limit} bytes")),
            _ => None,
        }
    }
}

impl IntoResponse for FileServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            Self::Storage(e) => error!("Storage failure: {}", e),
            Self::Io(e) => error!("IO failure: {}", e),
            _ => {}
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: self.error_code(),
            details: self.details(),
        };

        (status, Json(body)).into_response()
    }
}
