use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

use crate::api;
use crate::orchestrator::QueryOrchestrator;

const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn app(orchestrator: Arc<QueryOrchestrator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(api::health))
        .nest("/api", api::router(orchestrator))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
}

pub async fn run(orchestrator: Arc<QueryOrchestrator>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Web server running at http://{}", addr);

    axum::serve(listener, app(orchestrator))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down web server");
        })
        .await
        .context("Web server failed")
}
