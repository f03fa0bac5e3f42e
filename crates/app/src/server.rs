use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use pdf_answer_core::QueryOrchestrator;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::router::build_router;

#[derive(Clone)]
pub(crate) struct AppState {
    pub orchestrator: Arc<QueryOrchestrator>,
    pub started_at: Instant,
}

impl AppState {
    pub(crate) fn new(orchestrator: Arc<QueryOrchestrator>) -> Self {
        Self {
            orchestrator,
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ServeOptions {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

/// Binds the listener and serves until Ctrl-C.
pub(crate) async fn serve(
    orchestrator: Arc<QueryOrchestrator>,
    options: ServeOptions,
) -> anyhow::Result<()> {
    let router = build_router(
        AppState::new(orchestrator),
        options.request_timeout,
        options.max_body_bytes,
    );

    let listener = TcpListener::bind((options.host.as_str(), options.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", options.host, options.port))?;
    let local_addr = listener.local_addr()?;

    if options.host == "0.0.0.0" {
        warn!("listening on all interfaces");
    }
    info!(
        addr = %local_addr,
        request_timeout_secs = options.request_timeout.as_secs(),
        max_body_bytes = options.max_body_bytes,
        "pdf-answer listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("pdf-answer stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested, draining connections"),
        Err(error) => {
            warn!(error = %error, "unable to listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
