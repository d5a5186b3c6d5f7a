//! Inactivity decision and the coordinator that runs it

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, warn};

use super::{ShutdownTimer, TimerFired};
use crate::{
    services::{LifecycleApi, LifecycleError, ResourceStatus},
    state::AppState,
};

/// Outcome of one timer expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Fallback activity was fresh; the timer has been rearmed
    StayUp,
    /// The shutdown signal has been closed
    ShutDown,
}

/// What the suspend procedure did to the instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuspendOutcome {
    Suspended,
    /// The instance was not running, so nothing was sent
    Skipped(ResourceStatus),
}

/// Start the inactivity state machine.
///
/// Spawns the coordinator and arms the timer. Returns `None` in keep-online
/// mode, or if the coordinator was already started.
pub fn spawn_inactivity_controller(state: Arc<AppState>) -> Option<JoinHandle<()>> {
    if !state.timer.is_enabled() {
        info!("Keep-online is set, inactivity timer disabled");
        return None;
    }

    let fired_rx = state.take_fired_rx()?;
    info!(
        timeout_seconds = state.timer.timeout().as_secs(),
        "Starting inactivity timer"
    );

    let timer_state = Arc::clone(&state);
    let handle = tokio::spawn(async move {
        inactivity_coordinator_task(timer_state, fired_rx).await;
    });
    state.timer.rearm();
    Some(handle)
}

/// Receives timer expiries and runs the decision for each current one.
///
/// Stops after a decision closes the shutdown signal.
pub async fn inactivity_coordinator_task(
    state: Arc<AppState>,
    mut fired_rx: mpsc::UnboundedReceiver<TimerFired>,
) {
    debug!("Inactivity coordinator started");

    while let Some(fired) = fired_rx.recv().await {
        if !state.timer.claim(fired) {
            debug!(generation = fired.generation, "Ignoring superseded timer event");
            continue;
        }

        info!(
            timeout_seconds = state.timer.timeout().as_secs(),
            "Inactivity timeout reached, initiating shutdown"
        );
        if decide(&state).await == Decision::ShutDown {
            break;
        }
    }

    debug!("Inactivity coordinator stopped");
}

/// Decide between staying up and suspending after the timer expired.
///
/// Never fails: every error is logged and the routine still ends in one of
/// the two decisions.
pub async fn decide(state: &AppState) -> Decision {
    let last_signal = state.tracker.last_signal_at();
    let timeout = state.timer.timeout();
    let fallback = state.probe.last_activity().await;
    let now = Utc::now();

    if let Some(last_activity) = fallback {
        let age = now.signed_duration_since(last_activity);
        if fallback_is_fresh(age, timeout) {
            info!(
                fallback_age_seconds = age.num_seconds(),
                "Staying online for fallback activity"
            );
            state.timer.rearm();
            return Decision::StayUp;
        }
    }

    info!(
        ping_duration_seconds = now.signed_duration_since(last_signal).num_seconds(),
        "Proceeding with shutdown"
    );

    let identity = state.lifecycle.identity();
    if !identity.is_complete() {
        warn!(
            project = %identity.project,
            zone = %identity.zone,
            instance = %identity.instance,
            "Missing GCP configuration, cannot suspend"
        );
    } else {
        match suspend_resource(&state.timer, state.lifecycle.as_ref()).await {
            Ok(SuspendOutcome::Suspended) => info!("Suspend request sent successfully"),
            Ok(SuspendOutcome::Skipped(_)) => {}
            Err(e) => error!(
                step = %e.step(),
                status_code = ?e.status_code(),
                "Failed to suspend instance: {}",
                e
            ),
        }
    }

    if state.timer.close_shutdown_signal() {
        info!("Shutdown signal closed");
    }
    Decision::ShutDown
}

/// Whether fallback activity of the given age counts as recent.
///
/// A negative age (a clock running ahead of ours) is fresh, but only within
/// one timeout of skew, so a time of day carried past midnight is not.
pub fn fallback_is_fresh(age: chrono::Duration, timeout: Duration) -> bool {
    let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
    age < timeout && age > -timeout
}

/// Suspend the instance if it is running.
///
/// The timer is rearmed before any remote call, so that if the instance is
/// resumed right away the process does not immediately decide to suspend
/// again. No retries: the next timer cycle is the retry.
pub async fn suspend_resource(
    timer: &ShutdownTimer,
    lifecycle: &dyn LifecycleApi,
) -> Result<SuspendOutcome, LifecycleError> {
    let identity = lifecycle.identity();
    info!(
        project = %identity.project,
        zone = %identity.zone,
        instance = %identity.instance,
        "Attempting to suspend instance via {}",
        lifecycle.describe()
    );

    timer.rearm();

    let status = lifecycle.status().await?;
    if !status.is_running() {
        info!(status = %status, "Instance is not RUNNING, skipping suspension");
        return Ok(SuspendOutcome::Skipped(status));
    }

    info!("Instance is RUNNING, suspending instance");
    lifecycle.suspend().await?;
    Ok(SuspendOutcome::Suspended)
}
