//! Classical OCR pipeline
//!
//! Runs the classical engine over five fixed (image, configuration) plans,
//! keeps the longest non-empty transcription, then asks the engine for the
//! per-token confidence table of the winning pair.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;

use super::service::{load_image, OcrPipeline};
use super::tsv::{average_confidence, OcrToken};
use super::types::{ClassicalReport, EngineKind, OcrError, OcrReport};
use crate::preprocess::{PreprocessMethod, PreprocessedSet};
use crate::regions::count_text_regions;

/// Engine configuration for a single recognition call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// OCR engine mode (3 = default, whatever is available)
    pub oem: u8,
    /// Page segmentation mode
    pub psm: u8,
    /// Keep runs of spaces between words
    pub preserve_interword_spaces: bool,
    /// Explicit language; `None` uses the engine default
    pub language: Option<&'static str>,
}

impl EngineConfig {
    pub const fn new(psm: u8) -> Self {
        Self {
            oem: 3,
            psm,
            preserve_interword_spaces: true,
            language: None,
        }
    }

    /// Command-line options, filling in `default_language` when none is set
    pub fn to_args(&self, default_language: &str) -> Vec<String> {
        let mut args = vec![
            "--oem".to_string(),
            self.oem.to_string(),
            "--psm".to_string(),
            self.psm.to_string(),
            "-l".to_string(),
            self.language.unwrap_or(default_language).to_string(),
        ];
        if self.preserve_interword_spaces {
            args.push("-c".to_string());
            args.push("preserve_interword_spaces=1".to_string());
        }
        args
    }
}

/// Which image a plan feeds to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanImage {
    Preprocessed(PreprocessMethod),
    Original,
}

/// One (image, configuration) combination
#[derive(Debug, Clone, Copy)]
pub struct RecognitionPlan {
    pub name: &'static str,
    pub image: PlanImage,
    pub config: EngineConfig,
}

/// Plans in definition order; ties in selection go to the earlier entry.
pub const RECOGNITION_PLANS: [RecognitionPlan; 5] = [
    RecognitionPlan {
        name: "adaptive_psm3",
        image: PlanImage::Preprocessed(PreprocessMethod::Adaptive),
        config: EngineConfig::new(3),
    },
    RecognitionPlan {
        name: "otsu_psm6",
        image: PlanImage::Preprocessed(PreprocessMethod::Otsu),
        config: EngineConfig::new(6),
    },
    RecognitionPlan {
        name: "simple_psm4",
        image: PlanImage::Preprocessed(PreprocessMethod::Simple),
        config: EngineConfig::new(4),
    },
    RecognitionPlan {
        name: "adaptive_psm11",
        image: PlanImage::Preprocessed(PreprocessMethod::Adaptive),
        config: EngineConfig::new(11),
    },
    RecognitionPlan {
        name: "original_psm3",
        image: PlanImage::Original,
        config: EngineConfig {
            oem: 3,
            psm: 3,
            preserve_interword_spaces: false,
            language: Some("eng"),
        },
    },
];

/// Classical OCR engine
#[async_trait]
pub trait ClassicalEngine: Send + Sync {
    /// Check if the engine can be invoked
    async fn is_available(&self) -> bool;

    /// Recognize the text of an image
    async fn image_to_string(
        &self,
        image: &DynamicImage,
        config: &EngineConfig,
    ) -> Result<String, OcrError>;

    /// Per-token boxes and confidences for an image
    async fn image_to_data(
        &self,
        image: &DynamicImage,
        config: &EngineConfig,
    ) -> Result<Vec<OcrToken>, OcrError>;
}

/// Index of the longest non-empty (trimmed) text; earliest wins ties.
///
/// Falls back to 0 when every text is blank.
pub fn select_best<S: AsRef<str>>(texts: &[S]) -> usize {
    let mut best: Option<(usize, usize)> = None;
    for (index, text) in texts.iter().enumerate() {
        let trimmed = text.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        let len = trimmed.chars().count();
        match best {
            Some((_, best_len)) if len <= best_len => {}
            _ => best = Some((index, len)),
        }
    }
    best.map(|(index, _)| index).unwrap_or(0)
}

/// Pipeline behind `POST /upload` for the classical engine
pub struct ClassicalPipeline {
    engine: Arc<dyn ClassicalEngine>,
}

impl ClassicalPipeline {
    pub fn new(engine: Arc<dyn ClassicalEngine>) -> Self {
        Self { engine }
    }

    /// Run all plans over an already decoded image
    pub async fn recognize(&self, image: DynamicImage) -> Result<ClassicalReport, OcrError> {
        let image = Arc::new(image);

        let prepared = {
            let image = Arc::clone(&image);
            tokio::task::spawn_blocking(move || {
                let variants = PreprocessedSet::build(&image)?;
                let regions = count_text_regions(&image);
                Ok::<_, OcrError>((variants, regions))
            })
            .await??
        };
        let (variants, regions_count) = prepared;

        let adaptive = DynamicImage::ImageLuma8(variants.adaptive);
        let otsu = DynamicImage::ImageLuma8(variants.otsu);
        let simple = DynamicImage::ImageLuma8(variants.simple);
        let image_for = |source: PlanImage| match source {
            PlanImage::Preprocessed(PreprocessMethod::Adaptive) => &adaptive,
            PlanImage::Preprocessed(PreprocessMethod::Otsu) => &otsu,
            PlanImage::Preprocessed(PreprocessMethod::Simple) => &simple,
            PlanImage::Original => &*image,
        };

        let mut texts = Vec::with_capacity(RECOGNITION_PLANS.len());
        for plan in &RECOGNITION_PLANS {
            let text = self
                .engine
                .image_to_string(image_for(plan.image), &plan.config)
                .await?;
            tracing::debug!(
                method = plan.name,
                chars = text.trim().chars().count(),
                "Recognition plan finished"
            );
            texts.push(text);
        }

        let best_index = select_best(&texts);
        let best = &RECOGNITION_PLANS[best_index];
        let tokens = self
            .engine
            .image_to_data(image_for(best.image), &best.config)
            .await?;
        let avg_confidence = average_confidence(&tokens);

        tracing::info!(
            method = best.name,
            regions = regions_count,
            avg_confidence,
            "Classical OCR complete"
        );

        Ok(ClassicalReport {
            text: texts[best_index].trim().to_string(),
            regions_count,
            avg_confidence,
            method_used: best.name.to_string(),
        })
    }
}

#[async_trait]
impl OcrPipeline for ClassicalPipeline {
    fn engine(&self) -> EngineKind {
        EngineKind::Classical
    }

    async fn extract(&self, image_path: &Path) -> Result<OcrReport, OcrError> {
        let image = load_image(image_path).await?;
        self.recognize(image).await.map(OcrReport::Classical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::tsv::parse_tsv;
    use image::{GrayImage, Luma};
    use std::sync::Mutex;

    /// Engine answering by page segmentation mode
    struct ScriptedEngine {
        texts: Vec<(u8, bool, &'static str)>,
        tsv: &'static str,
        data_calls: Mutex<Vec<EngineConfig>>,
    }

    impl ScriptedEngine {
        fn new(texts: Vec<(u8, bool, &'static str)>) -> Self {
            Self {
                texts,
                tsv: concat!(
                    "5\t1\t1\t1\t1\t1\t0\t0\t10\t10\t80\tword\n",
                    "5\t1\t1\t1\t1\t2\t0\t0\t10\t10\t-1\t",
                ),
                data_calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ClassicalEngine for ScriptedEngine {
        async fn is_available(&self) -> bool {
            true
        }

        async fn image_to_string(
            &self,
            _image: &DynamicImage,
            config: &EngineConfig,
        ) -> Result<String, OcrError> {
            Ok(self
                .texts
                .iter()
                .find(|(psm, original, _)| {
                    *psm == config.psm && *original == config.language.is_some()
                })
                .map(|(_, _, text)| text.to_string())
                .unwrap_or_default())
        }

        async fn image_to_data(
            &self,
            _image: &DynamicImage,
            config: &EngineConfig,
        ) -> Result<Vec<OcrToken>, OcrError> {
            self.data_calls.lock().unwrap().push(*config);
            Ok(parse_tsv(self.tsv))
        }
    }

    struct FailingEngine;

    #[async_trait]
    impl ClassicalEngine for FailingEngine {
        async fn is_available(&self) -> bool {
            false
        }

        async fn image_to_string(
            &self,
            _image: &DynamicImage,
            _config: &EngineConfig,
        ) -> Result<String, OcrError> {
            Err(OcrError::Engine("tesseract exited with status 1".to_string()))
        }

        async fn image_to_data(
            &self,
            _image: &DynamicImage,
            _config: &EngineConfig,
        ) -> Result<Vec<OcrToken>, OcrError> {
            Err(OcrError::Engine("unreachable".to_string()))
        }
    }

    fn tall_page() -> DynamicImage {
        // Tall enough to skip upscaling, narrow enough to keep the test fast.
        let mut gray = GrayImage::from_pixel(16, 1000, Luma([255]));
        for y in 100..130 {
            for x in 2..14 {
                gray.put_pixel(x, y, Luma([0]));
            }
        }
        DynamicImage::ImageLuma8(gray)
    }

    #[test]
    fn test_plan_order() {
        let names: Vec<_> = RECOGNITION_PLANS.iter().map(|p| p.name).collect();
        assert_eq!(
            names,
            vec!["adaptive_psm3", "otsu_psm6", "simple_psm4", "adaptive_psm11", "original_psm3"]
        );
    }

    #[test]
    fn test_config_args() {
        let args = RECOGNITION_PLANS[3].config.to_args("deu");
        assert_eq!(
            args,
            vec!["--oem", "3", "--psm", "11", "-l", "deu", "-c", "preserve_interword_spaces=1"]
        );
        let original = RECOGNITION_PLANS[4].config.to_args("deu");
        assert_eq!(original, vec!["--oem", "3", "--psm", "3", "-l", "eng"]);
    }

    #[test]
    fn test_select_longest() {
        assert_eq!(select_best(&["ab", "abcd", "abc"]), 1);
    }

    #[test]
    fn test_select_first_of_tied_maxima() {
        // lengths [5, 3, 9, 9, 0]
        let texts = ["aaaaa", "bbb", "ccccccccc", "ddddddddd", ""];
        let index = select_best(&texts);
        assert_eq!(index, 2);
        assert_eq!(RECOGNITION_PLANS[index].name, "simple_psm4");
    }

    #[test]
    fn test_select_ignores_surrounding_whitespace() {
        let texts = ["  \n\n  abc \n\n\n", "abcd"];
        assert_eq!(select_best(&texts), 1);
    }

    #[test]
    fn test_select_all_blank_falls_back_to_first() {
        assert_eq!(select_best(&["", "  ", "\n\x0c", "", ""]), 0);
        let empty: [&str; 0] = [];
        assert_eq!(select_best(&empty), 0);
    }

    #[tokio::test]
    async fn test_pipeline_reports_winning_plan() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            (3, false, "short"),
            (6, false, "Hello world\n"),
            (4, false, "Hello"),
            (11, false, "Hello\nworld"),
            (3, true, "He1lo"),
        ]));
        let pipeline = ClassicalPipeline::new(engine.clone());

        let report = pipeline.recognize(tall_page()).await.unwrap();
        assert_eq!(report.method_used, "otsu_psm6");
        assert_eq!(report.text, "Hello world");
        assert_eq!(report.avg_confidence, 80.0);
        assert_eq!(report.regions_count, 1);

        let calls = engine.data_calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[RECOGNITION_PLANS[1].config]);
    }

    #[tokio::test]
    async fn test_pipeline_blank_results_use_first_plan() {
        let engine = Arc::new(ScriptedEngine::new(vec![]));
        let pipeline = ClassicalPipeline::new(engine);

        let report = pipeline.recognize(tall_page()).await.unwrap();
        assert_eq!(report.method_used, "adaptive_psm3");
        assert_eq!(report.text, "");
    }

    #[tokio::test]
    async fn test_pipeline_refuses_oversized_upscale_before_engine() {
        let engine = Arc::new(ScriptedEngine::new(vec![(3, false, "never")]));
        let pipeline = ClassicalPipeline::new(engine.clone());

        let strip = DynamicImage::ImageLuma8(GrayImage::new(30_000, 8));
        let result = pipeline.recognize(strip).await;
        assert!(matches!(result, Err(OcrError::ImageTooLarge { .. })));
        assert!(engine.data_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pipeline_propagates_engine_errors() {
        let pipeline = ClassicalPipeline::new(Arc::new(FailingEngine));
        let result = pipeline.recognize(tall_page()).await;
        assert!(matches!(result, Err(OcrError::Engine(_))));
    }
}
