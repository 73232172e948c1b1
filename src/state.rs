//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::ocr::OcrPipeline;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    pipeline: Arc<dyn OcrPipeline>,
}

impl AppState {
    /// Create a new application state around an already built pipeline
    pub fn new(config: Config, pipeline: Arc<dyn OcrPipeline>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, pipeline }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the OCR pipeline
    pub fn pipeline(&self) -> &Arc<dyn OcrPipeline> {
        &self.inner.pipeline
    }
}
