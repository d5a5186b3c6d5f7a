//! Main application state management

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

use tokio::sync::mpsc;

use super::{ActivityTracker, ShutdownSignal};
use crate::{
    config::Config,
    services::{ActivityProbe, LifecycleApi},
    tasks::{ShutdownTimer, TimerFired},
};

/// Context shared by the HTTP handlers and the inactivity coordinator.
///
/// Built once at startup and handed around as `Arc<AppState>`.
pub struct AppState {
    pub config: Config,
    /// Last liveness signal
    pub tracker: ActivityTracker,
    /// The single inactivity timer
    pub timer: ShutdownTimer,
    /// Closed when the process should terminate
    pub shutdown: Arc<ShutdownSignal>,
    /// Remote operations on the managed instance
    pub lifecycle: Arc<dyn LifecycleApi>,
    /// Secondary activity source consulted at expiry
    pub probe: Arc<dyn ActivityProbe>,
    /// Server metadata
    pub start_time: Instant,
    /// Expiry events, taken by the coordinator when it starts
    fired_rx: Mutex<Option<mpsc::UnboundedReceiver<TimerFired>>>,
}

impl AppState {
    pub fn new(
        config: Config,
        lifecycle: Arc<dyn LifecycleApi>,
        probe: Arc<dyn ActivityProbe>,
    ) -> Self {
        let shutdown = Arc::new(ShutdownSignal::new());
        let (timer, fired_rx) = ShutdownTimer::new(
            config.inactivity_timeout(),
            !config.keep_online(),
            Arc::clone(&shutdown),
        );

        Self {
            config,
            tracker: ActivityTracker::new(),
            timer,
            shutdown,
            lifecycle,
            probe,
            start_time: Instant::now(),
            fired_rx: Mutex::new(Some(fired_rx)),
        }
    }

    /// Record a liveness signal and push the inactivity deadline back.
    ///
    /// Returns whether the timer was rearmed.
    pub fn record_ping(&self) -> bool {
        self.tracker.record_signal();
        self.timer.rearm()
    }

    /// Hand out the expiry receiver. Only the first caller gets it.
    pub(crate) fn take_fired_rx(&self) -> Option<mpsc::UnboundedReceiver<TimerFired>> {
        self.fired_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}
