//! Health check endpoint

use axum::{extract::State, Json};
use serde::Serialize;

use crate::ocr::EngineKind;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub engine: EngineKind,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        engine: state.pipeline().engine(),
    })
}
