//! Error types for the OCR Extractor server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::ocr::OcrError;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Ocr(#[from] OcrError),
}

/// Upload validation and storage errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file uploaded")]
    NoFileUploaded,

    #[error("No file selected")]
    NoFileSelected,

    #[error("Invalid file type")]
    InvalidFileType,

    /// Malformed or oversized multipart body
    #[error("{message}")]
    Multipart { status: StatusCode, message: String },

    #[error("Failed to store upload: {0}")]
    Storage(#[from] std::io::Error),
}

impl UploadError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            UploadError::NoFileUploaded
            | UploadError::NoFileSelected
            | UploadError::InvalidFileType => StatusCode::BAD_REQUEST,
            UploadError::Multipart { status, .. } => *status,
            UploadError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for UploadError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        UploadError::Multipart {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub success: bool,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            success: false,
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Upload(e) => e.status_code(),
            AppError::Ocr(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = ?self, "Upload request failed");
        } else {
            tracing::debug!(%status, "Upload rejected: {}", self);
        }
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_bad_requests() {
        for err in [
            UploadError::NoFileUploaded,
            UploadError::NoFileSelected,
            UploadError::InvalidFileType,
        ] {
            assert_eq!(AppError::from(err).status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_multipart_keeps_framework_status() {
        let err = UploadError::Multipart {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: "length limit exceeded".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.to_string(), "length limit exceeded");
    }

    #[test]
    fn test_ocr_errors_are_server_errors() {
        let err = AppError::from(OcrError::Engine("boom".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "OCR Error: boom");
    }

    #[test]
    fn test_error_body_shape() {
        let body = serde_json::to_value(ErrorResponse::new("Invalid file type")).unwrap();
        assert_eq!(body, serde_json::json!({"error": "Invalid file type", "success": false}));
    }
}
