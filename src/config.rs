//! Configuration management for the OCR Extractor Server

use std::env;
use std::path::PathBuf;

use crate::ocr::EngineKind;

/// Maximum request body accepted by `POST /upload`: 16MB
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub ocr: OcrConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory holding transient upload files
    pub dir: PathBuf,
    /// Request body ceiling in bytes
    pub max_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub engine: EngineKind,
    /// Tesseract executable (classical engine)
    pub tesseract_cmd: String,
    /// Default recognition language
    pub language: String,
    pub onnx: OnnxModelConfig,
}

/// Model files for the neural engine
#[derive(Debug, Clone)]
pub struct OnnxModelConfig {
    pub detection_model: PathBuf,
    pub recognition_model: PathBuf,
    pub character_dict: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            upload: UploadConfig {
                dir: PathBuf::from("uploads"),
                max_bytes: MAX_UPLOAD_BYTES,
            },
            ocr: OcrConfig {
                engine: EngineKind::Classical,
                tesseract_cmd: "tesseract".to_string(),
                language: "eng".to_string(),
                onnx: OnnxModelConfig {
                    detection_model: PathBuf::from("models/det.onnx"),
                    recognition_model: PathBuf::from("models/rec.onnx"),
                    character_dict: PathBuf::from("models/keys.txt"),
                },
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let port = match env::var("SERVER_PORT") {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidValue { name: "SERVER_PORT", value })?,
            Err(_) => defaults.server.port,
        };

        let engine = match env::var("OCR_ENGINE") {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidValue { name: "OCR_ENGINE", value })?,
            Err(_) => defaults.ocr.engine,
        };

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port,
            },
            upload: UploadConfig {
                dir: env::var("UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.upload.dir),
                max_bytes: MAX_UPLOAD_BYTES,
            },
            ocr: OcrConfig {
                engine,
                tesseract_cmd: env::var("TESSERACT_CMD").unwrap_or(defaults.ocr.tesseract_cmd),
                language: env::var("OCR_LANGUAGE").unwrap_or(defaults.ocr.language),
                onnx: OnnxModelConfig {
                    detection_model: env::var("ONNX_DET_MODEL")
                        .map(PathBuf::from)
                        .unwrap_or(defaults.ocr.onnx.detection_model),
                    recognition_model: env::var("ONNX_REC_MODEL")
                        .map(PathBuf::from)
                        .unwrap_or(defaults.ocr.onnx.recognition_model),
                    character_dict: env::var("ONNX_KEYS")
                        .map(PathBuf::from)
                        .unwrap_or(defaults.ocr.onnx.character_dict),
                },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.upload.max_bytes, 16 * 1024 * 1024);
        assert_eq!(config.ocr.engine, EngineKind::Classical);
        assert_eq!(config.ocr.language, "eng");
    }
}
