//! OCR Module
//!
//! Text extraction from uploaded images with one of two engine families:
//!
//! - Classical: Tesseract over three preprocessed variants and the original,
//!   five (image, configuration) plans, longest transcription wins
//! - Neural: a single detect+recognize pass (ONNX Runtime, `ocr-onnx` feature)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ocr_extractor_server::config::Config;
//! use ocr_extractor_server::ocr::build_pipeline;
//!
//! let config = Config::from_env()?;
//! let pipeline = build_pipeline(&config.ocr).await?;
//! let report = pipeline.extract(Path::new("uploads/scan.png")).await?;
//! println!("{}", report.text());
//! ```

mod classical;
mod neural;
#[cfg(feature = "ocr-onnx")]
mod onnx;
mod service;
mod tesseract;
mod tsv;
mod types;

pub use classical::{
    select_best, ClassicalEngine, ClassicalPipeline, EngineConfig, PlanImage, RecognitionPlan,
    RECOGNITION_PLANS,
};
pub use neural::{summarize_detections, NeuralPipeline, TextReader};
#[cfg(feature = "ocr-onnx")]
pub use onnx::OnnxTextReader;
pub use service::{build_pipeline, load_image, OcrPipeline};
pub use tesseract::TesseractEngine;
pub use tsv::{average_confidence, parse_tsv, OcrToken};
pub use types::{
    round2, ClassicalReport, Detection, EngineKind, NeuralReport, OcrError, OcrReport, Point,
};
