//! OCR Extractor Server Library
//!
//! This crate exposes the router and its building blocks for the binary,
//! integration tests and benchmarks. The server binary is in main.rs.
//!
//! # Modules
//!
//! - `preprocess`: grayscale normalisation and the three binarisation pipelines
//! - `regions`: coarse text-region counting
//! - `ocr`: engines, pipelines and result aggregation
//! - `upload`: filename validation and transient upload files
//! - `routes`: HTTP handlers

pub mod config;
pub mod error;
pub mod ocr;
pub mod preprocess;
pub mod regions;
pub mod routes;
pub mod state;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use state::AppState;

/// Application routes, without the tracing and CORS layers added in `main`.
///
/// `POST /upload` bodies are capped at the configured `upload.max_bytes`.
pub fn build_router(state: AppState) -> Router {
    let max_upload_bytes = state.config().upload.max_bytes;

    Router::new()
        .route("/", get(routes::index::index))
        .route("/health", get(routes::health::health_check))
        .route(
            "/upload",
            post(routes::upload::upload_image).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(state)
}
