use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

pub type AppResult<T> = Result<T, AppError>;

/// Every way a conversion request can fail.
///
/// Client-input conditions render as `400` with a stable message; server-side
/// conditions render as `500` with a generic message while the internal
/// detail only reaches the logs.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("No images uploaded")]
    NoFilesProvided,

    #[error("Only .jpg, .jpeg, .png files are allowed")]
    UnsupportedMediaType { content_type: String },

    #[error("File too large. Max {limit_mb}MB per file")]
    PayloadTooLarge { limit_mb: usize },

    #[error("Too many files. Max {limit}")]
    TooManyFiles { limit: usize },

    #[error("Unexpected file field")]
    UnexpectedField { field: String },

    #[error("Upload error")]
    Multipart { message: String },

    #[error("Failed to generate PDF")]
    ConversionFailed { detail: String },

    #[error("Server error during conversion")]
    Internal { message: String },
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NoFilesProvided => "NO_FILES_PROVIDED",
            AppError::UnsupportedMediaType { .. } => "UNSUPPORTED_MEDIA_TYPE",
            AppError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            AppError::TooManyFiles { .. } => "TOO_MANY_FILES",
            AppError::UnexpectedField { .. } => "UNEXPECTED_FIELD",
            AppError::Multipart { .. } => "MALFORMED_MULTIPART",
            AppError::ConversionFailed { .. } => "CONVERSION_FAILED",
            AppError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NoFilesProvided
            | AppError::UnsupportedMediaType { .. }
            | AppError::PayloadTooLarge { .. }
            | AppError::TooManyFiles { .. }
            | AppError::UnexpectedField { .. }
            | AppError::Multipart { .. } => StatusCode::BAD_REQUEST,
            AppError::ConversionFailed { .. } | AppError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Server-side context that must never reach the wire.
    fn detail(&self) -> Option<&str> {
        match self {
            AppError::UnsupportedMediaType { content_type } => Some(content_type),
            AppError::UnexpectedField { field } => Some(field),
            AppError::Multipart { message } => Some(message),
            AppError::ConversionFailed { detail } => Some(detail),
            AppError::Internal { message } => Some(message),
            _ => None,
        }
    }

    pub fn conversion(detail: impl Into<String>) -> Self {
        AppError::ConversionFailed {
            detail: detail.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal {
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        tracing::error!(
            error_code = self.error_code(),
            status_code = %status,
            detail = self.detail().unwrap_or(""),
            "request failed: {}",
            message
        );

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::Multipart {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: format!("IO error: {}", err),
        }
    }
}
