//! HTTP endpoint handlers

use std::{net::SocketAddr, sync::Arc};
use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use tracing::info;

use crate::state::AppState;
use super::responses::StatusResponse;

/// Handle GET /ping - Record a liveness signal and reset the inactivity timer
pub async fn ping_handler(
    State(state): State<Arc<AppState>>,
    remote: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let timer_reset = state.record_ping();

    let remote_addr = remote
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    info!(
        remote_addr = %remote_addr,
        user_agent = %user_agent,
        timer_reset,
        "Ping request received"
    );

    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], "pong")
}

/// Handle GET /healthcheck - Container health probe, no side effects
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")])
}

/// Handle GET /status - Return the current inactivity state
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let (last_signal_at, signal_count) = state.tracker.snapshot();

    Json(StatusResponse {
        keep_online: !state.timer.is_enabled(),
        inactivity_timeout_seconds: state.timer.timeout().as_secs(),
        last_signal_at,
        signal_count,
        timer_armed: state.timer.is_armed(),
        shutting_down: state.shutdown.is_closed(),
        uptime: state.get_uptime(),
    })
}
