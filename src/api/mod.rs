//! HTTP API module
//!
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::{sync::Arc, time::Duration};
use axum::{routing::get, Router};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Longest a single request may run before it is answered with 408
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    with_request_timeout(
        Router::new()
            .route("/ping", get(ping_handler))
            .route("/healthcheck", get(health_handler))
            .route("/status", get(status_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state),
    )
}

fn with_request_timeout(router: Router) -> Router {
    router.layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}
