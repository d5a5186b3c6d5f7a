//! Rearmable inactivity timer

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{
    sync::mpsc,
    task::AbortHandle,
    time::sleep,
};
use tracing::debug;

use crate::state::ShutdownSignal;

/// Delivered to the inactivity coordinator when a scheduled timer expires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub generation: u64,
}

#[derive(Debug, Default)]
struct TimerSlot {
    handle: Option<AbortHandle>,
    generation: u64,
}

/// Owns the single outstanding inactivity timer.
///
/// Every arm bumps a generation counter and spawns a task that sleeps for the
/// timeout and then reports [`TimerFired`]. Rearming aborts the previous task,
/// and [`ShutdownTimer::claim`] rejects events from superseded generations, so
/// at most one decision is ever pending. The same lock guards closing the
/// shutdown signal; once it is closed the timer can no longer be rearmed.
#[derive(Debug)]
pub struct ShutdownTimer {
    timeout: Duration,
    enabled: bool,
    slot: Mutex<TimerSlot>,
    fired_tx: mpsc::UnboundedSender<TimerFired>,
    shutdown: Arc<ShutdownSignal>,
}

impl ShutdownTimer {
    /// Create a timer and the receiving end of its expiry events.
    ///
    /// A disabled timer (keep-online mode) never arms; `rearm` is a no-op.
    pub fn new(
        timeout: Duration,
        enabled: bool,
        shutdown: Arc<ShutdownSignal>,
    ) -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let timer = Self {
            timeout,
            enabled,
            slot: Mutex::new(TimerSlot::default()),
            fired_tx,
            shutdown,
        };
        (timer, fired_rx)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Cancel any pending expiry and schedule a new one `timeout` from now.
    ///
    /// Returns false when nothing was scheduled: the timer is disabled or
    /// shutdown has already been signalled. Must be called within a tokio
    /// runtime.
    pub fn rearm(&self) -> bool {
        if !self.enabled {
            return false;
        }

        let mut slot = self.lock_slot();
        if self.shutdown.is_closed() {
            debug!("Shutdown already signalled, not rearming timer");
            return false;
        }

        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }
        slot.generation += 1;

        let fired = TimerFired {
            generation: slot.generation,
        };
        let timeout = self.timeout;
        let tx = self.fired_tx.clone();
        let task = tokio::spawn(async move {
            sleep(timeout).await;
            // The coordinator may already be gone during teardown
            let _ = tx.send(fired);
        });
        slot.handle = Some(task.abort_handle());

        debug!(
            timeout_seconds = self.timeout.as_secs(),
            generation = fired.generation,
            "Shutdown timer reset"
        );
        true
    }

    /// Stop any pending expiry. Calling it on a stopped timer does nothing.
    pub fn cancel(&self) {
        let mut slot = self.lock_slot();
        if let Some(handle) = slot.handle.take() {
            handle.abort();
            debug!("Shutdown timer stopped");
        }
    }

    /// Whether an expiry is currently scheduled
    pub fn is_armed(&self) -> bool {
        self.lock_slot().handle.is_some()
    }

    /// Accept an expiry event if it belongs to the current schedule.
    ///
    /// A claimed event clears the slot, so the decision that follows runs
    /// with the timer disarmed until something rearms it.
    pub fn claim(&self, fired: TimerFired) -> bool {
        let mut slot = self.lock_slot();
        if slot.handle.is_none() || slot.generation != fired.generation {
            return false;
        }
        slot.handle = None;
        true
    }

    /// Close the shutdown signal while holding the timer lock.
    ///
    /// Returns true only for the call that actually closed it.
    pub fn close_shutdown_signal(&self) -> bool {
        let _slot = self.lock_slot();
        self.shutdown.close()
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, TimerSlot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ShutdownTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(seconds: u64) -> (ShutdownTimer, mpsc::UnboundedReceiver<TimerFired>) {
        ShutdownTimer::new(
            Duration::from_secs(seconds),
            true,
            Arc::new(ShutdownSignal::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_timeout() {
        let (timer, mut rx) = timer(2);
        assert!(timer.rearm());
        assert!(timer.is_armed());

        sleep(Duration::from_millis(1900)).await;
        assert!(rx.try_recv().is_err());

        sleep(Duration::from_millis(200)).await;
        let fired = rx.try_recv().unwrap();
        assert!(timer.claim(fired));
        assert!(!timer.is_armed());

        sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_rearms_fire_once() {
        let (timer, mut rx) = timer(1);
        timer.rearm();
        timer.rearm();
        timer.rearm();

        sleep(Duration::from_secs(5)).await;
        let mut claimed = 0;
        while let Ok(fired) = rx.try_recv() {
            if timer.claim(fired) {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_pushes_expiry_back() {
        let (timer, mut rx) = timer(2);
        timer.rearm();

        sleep(Duration::from_millis(1500)).await;
        timer.rearm();

        sleep(Duration::from_millis(1900)).await;
        assert!(rx.try_recv().is_err());

        sleep(Duration::from_millis(200)).await;
        assert!(timer.claim(rx.try_recv().unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_event_is_not_claimed() {
        let (timer, _rx) = timer(1);
        timer.rearm();
        let stale = TimerFired { generation: 1 };
        timer.rearm();
        assert!(!timer.claim(stale));
        assert!(timer.claim(TimerFired { generation: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent_and_prevents_firing() {
        let (timer, mut rx) = timer(1);
        timer.rearm();
        timer.cancel();
        timer.cancel();
        assert!(!timer.is_armed());

        sleep(Duration::from_secs(3)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_timer_never_arms() {
        let (timer, mut rx) = ShutdownTimer::new(
            Duration::from_secs(1),
            false,
            Arc::new(ShutdownSignal::new()),
        );
        assert!(!timer.rearm());
        assert!(!timer.is_armed());

        sleep(Duration::from_secs(3)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn no_rearm_after_shutdown_signalled() {
        let (timer, _rx) = timer(1);
        assert!(timer.close_shutdown_signal());
        assert!(!timer.close_shutdown_signal());
        assert!(!timer.rearm());
        assert!(!timer.is_armed());
    }
}
