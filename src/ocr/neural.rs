//! Neural OCR pipeline
//!
//! One detect+recognize pass over the untouched upload, aggregated into
//! text, detection count, mean confidence and character count.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;

use super::service::{load_image, OcrPipeline};
use super::types::{round2, Detection, EngineKind, NeuralReport, OcrError, OcrReport};

/// Neural text detector + recognizer.
///
/// Implementations are blocking and called from the blocking pool.
pub trait TextReader: Send + Sync {
    /// Ordered detections for the whole image
    fn read_text(&self, image: &DynamicImage) -> Result<Vec<Detection>, OcrError>;
}

/// Collapse detections into the response statistics
pub fn summarize_detections(detections: &[Detection]) -> NeuralReport {
    let mut joined = String::new();
    for detection in detections {
        joined.push_str(&detection.text);
        joined.push('\n');
    }

    let char_count = joined.chars().filter(|c| *c != '\n').count();

    let confidence = if detections.is_empty() {
        0.0
    } else {
        let total: f64 = detections
            .iter()
            .map(|d| f64::from(d.confidence) * 100.0)
            .sum();
        round2(total / detections.len() as f64)
    };

    NeuralReport {
        text: joined.trim().to_string(),
        detections: detections.len(),
        confidence,
        char_count,
    }
}

/// Pipeline behind `POST /upload` for the neural engine
pub struct NeuralPipeline {
    reader: Arc<dyn TextReader>,
}

impl NeuralPipeline {
    pub fn new(reader: Arc<dyn TextReader>) -> Self {
        Self { reader }
    }

    pub async fn recognize(&self, image: DynamicImage) -> Result<NeuralReport, OcrError> {
        let reader = Arc::clone(&self.reader);
        let detections = tokio::task::spawn_blocking(move || reader.read_text(&image)).await??;

        let report = summarize_detections(&detections);
        tracing::info!(
            detections = report.detections,
            confidence = report.confidence,
            "Neural OCR complete"
        );
        Ok(report)
    }
}

#[async_trait]
impl OcrPipeline for NeuralPipeline {
    fn engine(&self) -> EngineKind {
        EngineKind::Neural
    }

    async fn extract(&self, image_path: &Path) -> Result<OcrReport, OcrError> {
        let image = load_image(image_path).await?;
        self.recognize(image).await.map(OcrReport::Neural)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::types::Point;
    use image::GrayImage;

    fn detection(text: &str, confidence: f32) -> Detection {
        Detection {
            polygon: vec![
                Point { x: 0.0, y: 0.0 },
                Point { x: 10.0, y: 0.0 },
                Point { x: 10.0, y: 5.0 },
                Point { x: 0.0, y: 5.0 },
            ],
            text: text.to_string(),
            confidence,
        }
    }

    struct FixedReader(Vec<Detection>);

    impl TextReader for FixedReader {
        fn read_text(&self, _image: &DynamicImage) -> Result<Vec<Detection>, OcrError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_char_count_excludes_newlines() {
        let report = summarize_detections(&[detection("AB", 0.9), detection("CD", 0.8)]);
        assert_eq!(report.text, "AB\nCD");
        assert_eq!(report.char_count, 4);
        assert_eq!(report.detections, 2);
        assert_eq!(report.confidence, 85.0);
    }

    #[test]
    fn test_char_count_keeps_inner_spaces() {
        let report = summarize_detections(&[detection(" Hello world ", 0.5)]);
        assert_eq!(report.text, "Hello world");
        // counted before trimming
        assert_eq!(report.char_count, 13);
    }

    #[test]
    fn test_confidence_rounds_to_two_decimals() {
        let report = summarize_detections(&[
            detection("a", 0.91234),
            detection("b", 0.8),
            detection("c", 0.7),
        ]);
        assert_eq!(report.confidence, 80.41);
    }

    #[test]
    fn test_no_detections() {
        let report = summarize_detections(&[]);
        assert_eq!(
            report,
            NeuralReport {
                text: String::new(),
                detections: 0,
                confidence: 0.0,
                char_count: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_pipeline_uses_reader() {
        let pipeline = NeuralPipeline::new(Arc::new(FixedReader(vec![detection("STOP", 0.99)])));
        let report = pipeline
            .recognize(DynamicImage::ImageLuma8(GrayImage::new(8, 8)))
            .await
            .unwrap();
        assert_eq!(report.text, "STOP");
        assert_eq!(report.confidence, 99.0);
        assert_eq!(pipeline.engine(), EngineKind::Neural);
    }
}
