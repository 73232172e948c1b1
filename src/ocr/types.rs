//! OCR Types
//!
//! Defines the engine selector, engine outputs and the per-request reports.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// OCR engine family serving `/upload`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Neural text detection + recognition over the untouched image
    Neural,
    /// Tesseract over several preprocessed variants
    Classical,
}

impl Default for EngineKind {
    fn default() -> Self {
        Self::Classical
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Neural => write!(f, "neural"),
            Self::Classical => write!(f, "classical"),
        }
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "neural" | "easyocr" | "onnx" => Ok(Self::Neural),
            "classical" | "tesseract" => Ok(Self::Classical),
            other => Err(format!("unknown OCR engine: {}", other)),
        }
    }
}

/// Pixel-space point of a detection polygon
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Single neural engine detection
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    /// Bounding polygon, clockwise from top-left
    pub polygon: Vec<Point>,
    /// Recognized text
    pub text: String,
    /// Confidence in [0, 1]
    pub confidence: f32,
}

/// Aggregated neural result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeuralReport {
    pub text: String,
    pub detections: usize,
    /// Mean confidence as a percentage, 2 decimals
    pub confidence: f64,
    pub char_count: usize,
}

/// Aggregated classical result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassicalReport {
    pub text: String,
    pub regions_count: usize,
    /// Mean token confidence as a percentage, 2 decimals
    pub avg_confidence: f64,
    /// Winning preprocessing/configuration combination
    pub method_used: String,
}

/// Report returned by an OCR pipeline, serialized flat into the upload response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OcrReport {
    Neural(NeuralReport),
    Classical(ClassicalReport),
}

impl OcrReport {
    pub fn text(&self) -> &str {
        match self {
            Self::Neural(report) => &report.text,
            Self::Classical(report) => &report.text,
        }
    }
}

/// OCR error types
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("Failed to read image file")]
    UnreadableImage(#[source] image::ImageError),

    #[error("OCR Error: {0}")]
    Engine(String),

    #[error("OCR engine not available: {0}")]
    EngineUnavailable(String),

    #[error("Image too large to process: {width}x{height}")]
    ImageTooLarge { width: u64, height: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OCR task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_parsing() {
        assert_eq!("neural".parse::<EngineKind>().unwrap(), EngineKind::Neural);
        assert_eq!("Tesseract".parse::<EngineKind>().unwrap(), EngineKind::Classical);
        assert_eq!(" classical ".parse::<EngineKind>().unwrap(), EngineKind::Classical);
        assert!("gpt".parse::<EngineKind>().is_err());
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(93.456), 93.46);
        assert_eq!(round2(0.0), 0.0);
        assert_eq!(round2(87.5), 87.5);
    }

    #[test]
    fn test_report_serializes_flat() {
        let report = OcrReport::Neural(NeuralReport {
            text: "AB".to_string(),
            detections: 1,
            confidence: 99.5,
            char_count: 2,
        });
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["text"], "AB");
        assert_eq!(value["detections"], 1);
        assert_eq!(value["char_count"], 2);
        assert!(value.get("Neural").is_none());
    }
}
