//! Lightswitch - suspends an idle compute instance
//!
//! This is the main entry point for the lightswitch application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use lightswitch::{
    api::create_router,
    config::Config,
    server::run_server,
    services::{default_activity_probe, default_lifecycle_client},
    state::AppState,
    tasks::spawn_inactivity_controller,
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("lightswitch={},tower_http=info", config.log_level()))
        .init();

    info!(
        port = config.port,
        inactivity_timeout_seconds = config.inactivity_timeout,
        keep_online = config.keep_online(),
        "Lightswitch starting"
    );

    let identity = config.identity();
    if !identity.is_complete() {
        warn!("GCP project, zone or instance name missing; the instance will not be suspended");
    }

    // Create application state
    let lifecycle = default_lifecycle_client(identity)?;
    let probe = default_activity_probe(&config);
    let state = Arc::new(AppState::new(config, lifecycle, probe));

    // Register for OS signals before anything can trigger shutdown
    let os_signal = shutdown_signal()?;

    // Start the inactivity timer unless keep-online is set
    let coordinator = spawn_inactivity_controller(Arc::clone(&state));

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = state.config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("HTTP server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /ping        - Record activity and reset the inactivity timer");
    info!("  GET  /healthcheck - Health check");
    info!("  GET  /status      - Inactivity state");

    run_server(listener, app, state, coordinator, os_signal).await;

    info!("Lightswitch shutdown complete");
    Ok(())
}
