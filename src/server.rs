//! HTTP serving and the ordered teardown that follows a shutdown request

use std::{future::Future, net::SocketAddr, sync::Arc};

use axum::Router;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle, time::timeout};
use tracing::{error, info, warn};

use crate::state::AppState;

/// Serve `app` on `listener` until `terminate` resolves, the internal
/// shutdown latch closes, or the server stops by itself.
///
/// Teardown then runs in order: the inactivity timer is cancelled, the
/// coordinator is stopped, the listener stops accepting, and in-flight
/// requests get `shutdown_grace` to finish before the server is aborted.
pub async fn run_server<F>(
    listener: TcpListener,
    app: Router,
    state: Arc<AppState>,
    coordinator: Option<JoinHandle<()>>,
    terminate: F,
) where
    F: Future<Output = ()>,
{
    let grace = state.config.shutdown_grace();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = stop_rx.await;
        })
        .await
    });

    tokio::select! {
        _ = terminate => {
            info!("Shutdown signal received");
        }
        _ = state.shutdown.wait() => {
            info!("Internal shutdown triggered");
        }
        result = &mut server => {
            // The server only stops by itself on error
            match result {
                Ok(Err(e)) => error!("HTTP server error: {}", e),
                Err(e) => error!("HTTP server task failed: {}", e),
                Ok(Ok(())) => {}
            }
        }
    }

    info!("Gracefully shutting down...");

    // Stop the inactivity timer before anything else can rearm it
    state.timer.cancel();
    if let Some(coordinator) = coordinator {
        coordinator.abort();
    }

    // Stop accepting requests and let in-flight ones finish
    let _ = stop_tx.send(());
    if !server.is_finished() {
        match timeout(grace, &mut server).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => error!("Server shutdown error: {}", e),
            Ok(Err(e)) => error!("HTTP server task failed: {}", e),
            Err(_) => {
                warn!(
                    grace_seconds = grace.as_secs(),
                    "In-flight requests did not finish in time, forcing termination"
                );
                server.abort();
                // Wait for the listener to be dropped
                let _ = server.await;
            }
        }
    }
}
