//! Tesseract CLI engine
//!
//! Images are handed to `tesseract` through a temporary PNG; recognized text
//! and TSV tables are read from stdout.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use tokio::process::Command;

use super::classical::{ClassicalEngine, EngineConfig};
use super::tsv::{parse_tsv, OcrToken};
use super::types::OcrError;

/// Tesseract invoked as a child process
pub struct TesseractEngine {
    /// Executable name or path
    command: String,
    /// Language used by configurations without an explicit one
    default_language: String,
    /// Where input images are staged
    scratch_dir: PathBuf,
}

impl TesseractEngine {
    pub fn new(command: &str, default_language: &str) -> Self {
        Self {
            command: command.to_string(),
            default_language: default_language.to_string(),
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Stage images somewhere other than the system temp directory
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Run tesseract over `image`, returning stdout
    async fn run(
        &self,
        image: &DynamicImage,
        config: &EngineConfig,
        output_format: Option<&str>,
    ) -> Result<String, OcrError> {
        let input = StagedImage {
            path: self
                .scratch_dir
                .join(format!("ocr_input_{}.png", uuid::Uuid::new_v4())),
        };

        // The guard travels with the blocking save so an abandoned write is removed too.
        let input = {
            let image = image.clone();
            tokio::task::spawn_blocking(move || {
                image
                    .save_with_format(&input.path, ImageFormat::Png)
                    .map(|()| input)
            })
            .await?
            .map_err(|e| OcrError::Engine(format!("Failed to write temp file: {}", e)))?
        };

        let mut command = Command::new(&self.command);
        command
            .arg(&input.path)
            .arg("stdout")
            .args(config.to_args(&self.default_language));
        if let Some(format) = output_format {
            command.arg(format);
        }
        let output = command
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;
        drop(input);

        let output =
            output.map_err(|e| OcrError::Engine(format!("Failed to run tesseract: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(format!(
                "Tesseract failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Input image handed to tesseract, removed on drop.
///
/// Dropping the request future mid-recognition still cleans up.
struct StagedImage {
    path: PathBuf,
}

impl Drop for StagedImage {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                "Failed to remove tesseract input: {}",
                e
            ),
        }
    }
}

#[async_trait]
impl ClassicalEngine for TesseractEngine {
    async fn is_available(&self) -> bool {
        Command::new(&self.command)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    async fn image_to_string(
        &self,
        image: &DynamicImage,
        config: &EngineConfig,
    ) -> Result<String, OcrError> {
        self.run(image, config, None).await
    }

    async fn image_to_data(
        &self,
        image: &DynamicImage,
        config: &EngineConfig,
    ) -> Result<Vec<OcrToken>, OcrError> {
        let tsv = self.run(image, config, Some("tsv")).await?;
        Ok(parse_tsv(&tsv))
    }
}
