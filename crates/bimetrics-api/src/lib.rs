//! JSON HTTP API for the metrics engine
//!
//! Routes are organized into modules:
//! - routes::reports: configured report tables and trees
//! - routes::engine: ad-hoc totals, running totals and rollups

pub mod error;
pub mod routes;

use axum::http::{header, Method};
use axum::{
    routing::{get, post},
    Router,
};
use bimetrics_config::Config;
use bimetrics_core::{EngineRef, MetricsEngine};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use error::ApiError;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub engine: EngineRef,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            engine: Arc::new(MetricsEngine::new(config)),
        }
    }
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    use routes::engine::{api_cumulative, api_rollup, api_totals};
    use routes::reports::{api_report, api_report_tree, api_reports};

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/reports", get(api_reports))
        .route("/api/reports/:name", post(api_report))
        .route("/api/reports/:name/tree", post(api_report_tree))
        .route("/api/totals", post(api_totals))
        .route("/api/cumulative", post(api_cumulative))
        .route("/api/rollup", post(api_rollup))
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Bind the configured address and serve until Ctrl-C
pub async fn start_server(config: Config) -> anyhow::Result<()> {
    let addr = config.bind_address();
    let report_count = config.reports.len();
    let router = create_router(AppState::new(config));

    let listener = TcpListener::bind(&addr).await?;
    log::info!("Starting bimetrics server on http://{}", addr);
    log::info!("Serving {} report definitions under /api/reports", report_count);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("Server stopped gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
    }
}
