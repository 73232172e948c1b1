//! Image upload and text extraction
//!
//! `POST /upload` takes a multipart `file` field, stores it for the duration
//! of the request, runs the configured OCR pipeline and answers with the
//! report plus a base64 copy of the uploaded bytes.

use axum::{
    extract::{Multipart, State},
    Json,
};
use base64::Engine;
use serde::Serialize;

use crate::error::{AppError, UploadError};
use crate::ocr::OcrReport;
use crate::state::AppState;
use crate::upload::{allowed_file, TempUpload};

/// Successful extraction
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: OcrReport,
    /// Base64 of the original upload
    pub image: String,
}

/// Handle an image upload
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    tracing::debug!("Starting image upload processing");

    while let Some(field) = multipart.next_field().await.map_err(UploadError::from)? {
        let name = field.name().unwrap_or("").to_string();
        let filename = field.file_name().map(|s| s.to_string());

        tracing::debug!(
            "Received field: name='{}', filename={:?}, content_type={:?}",
            name,
            filename,
            field.content_type()
        );

        if name != "file" {
            continue;
        }
        // Plain form values named `file` are not uploads.
        let Some(filename) = filename else {
            continue;
        };

        if filename.is_empty() {
            return Err(UploadError::NoFileSelected.into());
        }
        if !allowed_file(&filename) {
            return Err(UploadError::InvalidFileType.into());
        }

        let data = field.bytes().await.map_err(UploadError::from)?;
        tracing::debug!("Read {} bytes of file data", data.len());

        let upload = TempUpload::write(&state.config().upload.dir, &filename, &data)
            .await
            .map_err(UploadError::from)?;

        let report = state.pipeline().extract(upload.path()).await?;
        drop(upload);

        tracing::info!(
            filename = %filename,
            bytes = data.len(),
            chars = report.text().chars().count(),
            "Extracted text from upload"
        );

        return Ok(Json(UploadResponse {
            success: true,
            report,
            image: base64::engine::general_purpose::STANDARD.encode(&data),
        }));
    }

    Err(UploadError::NoFileUploaded.into())
}
