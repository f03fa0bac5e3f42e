use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health_handler, root_handler, run_handler, RUN_ENDPOINT};
use crate::server::AppState;

/// `GET` routes also answer `HEAD` with an empty body.
pub(crate) fn build_router(
    state: AppState,
    request_timeout: Duration,
    max_body_bytes: usize,
) -> Router {
    let answering = Router::new()
        .route(RUN_ENDPOINT, post(run_handler))
        .layer(RequestBodyLimitLayer::new(max_body_bytes));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .merge(answering)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
