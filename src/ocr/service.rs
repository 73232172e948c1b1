//! OCR Service
//!
//! Builds the process-wide pipeline selected by configuration.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;

use super::classical::{ClassicalEngine, ClassicalPipeline};
use super::tesseract::TesseractEngine;
use super::types::{EngineKind, OcrError, OcrReport};
use crate::config::OcrConfig;

/// Image-in, report-out OCR pipeline
#[async_trait]
pub trait OcrPipeline: Send + Sync {
    /// Engine family this pipeline runs
    fn engine(&self) -> EngineKind;

    /// Decode the image at `image_path` and extract its text
    async fn extract(&self, image_path: &Path) -> Result<OcrReport, OcrError>;
}

/// Decode an image file on the blocking pool
pub async fn load_image(path: &Path) -> Result<DynamicImage, OcrError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        image::ImageReader::open(&path)?
            .with_guessed_format()?
            .decode()
            .map_err(OcrError::UnreadableImage)
    })
    .await?
}

/// Build the pipeline for the configured engine.
///
/// Fails when the engine cannot be used; callers treat that as a start-up fault.
pub async fn build_pipeline(config: &OcrConfig) -> Result<Arc<dyn OcrPipeline>, OcrError> {
    match config.engine {
        EngineKind::Classical => {
            let engine = TesseractEngine::new(&config.tesseract_cmd, &config.language);
            if !engine.is_available().await {
                return Err(OcrError::EngineUnavailable(format!(
                    "`{} --version` failed; is tesseract installed?",
                    config.tesseract_cmd
                )));
            }
            tracing::info!(
                command = %config.tesseract_cmd,
                language = %config.language,
                "Using classical OCR engine"
            );
            Ok(Arc::new(ClassicalPipeline::new(Arc::new(engine))))
        }
        EngineKind::Neural => build_neural(config),
    }
}

#[cfg(feature = "ocr-onnx")]
fn build_neural(config: &OcrConfig) -> Result<Arc<dyn OcrPipeline>, OcrError> {
    use super::neural::NeuralPipeline;
    use super::onnx::OnnxTextReader;

    let reader = OnnxTextReader::from_config(&config.onnx)?;
    tracing::info!("Using neural OCR engine");
    Ok(Arc::new(NeuralPipeline::new(Arc::new(reader))))
}

#[cfg(not(feature = "ocr-onnx"))]
fn build_neural(_config: &OcrConfig) -> Result<Arc<dyn OcrPipeline>, OcrError> {
    Err(OcrError::EngineUnavailable(
        "neural engine requires the `ocr-onnx` feature".to_string(),
    ))
}
