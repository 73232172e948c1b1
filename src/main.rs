//! OCR Extractor Server
//!
//! Upload an image, get its text back. The OCR engine (classical Tesseract
//! pipeline or neural ONNX reader) is chosen at start-up with `OCR_ENGINE`.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ocr_extractor_server::{build_router, config::Config, ocr, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ocr_extractor_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Invalid configuration")?;

    tracing::info!("Starting OCR Extractor Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("OCR engine: {}", config.ocr.engine);
    tracing::info!("Upload directory: {}", config.upload.dir.display());

    tokio::fs::create_dir_all(&config.upload.dir)
        .await
        .with_context(|| format!("Failed to create {}", config.upload.dir.display()))?;

    let pipeline = ocr::build_pipeline(&config.ocr)
        .await
        .context("Failed to initialize OCR engine")?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let app_state = AppState::new(config, pipeline);

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = build_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server with graceful shutdown
    tracing::info!("OCR Extractor Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
