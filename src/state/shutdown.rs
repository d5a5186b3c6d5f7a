//! One-shot shutdown latch

use tokio::sync::watch;

/// Tells the main loop to begin graceful termination.
///
/// Closing is idempotent: the first close flips the latch, later closes do
/// nothing and never wake the waiter a second time. Inside the service the
/// latch is only closed through [`crate::tasks::ShutdownTimer::close_shutdown_signal`],
/// which holds the timer lock while doing so.
#[derive(Debug)]
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
    /// Keep the receiver alive to prevent channel closure
    _rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, _rx: rx }
    }

    /// Close the latch. Returns true only for the call that actually closed it.
    pub fn close(&self) -> bool {
        self.tx.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the latch has been closed
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::Duration};

    #[test]
    fn close_is_idempotent() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_closed());
        assert!(signal.close());
        assert!(!signal.close());
        assert!(!signal.close());
        assert!(signal.is_closed());
    }

    #[tokio::test]
    async fn concurrent_closes_wake_waiter_once() {
        let signal = Arc::new(ShutdownSignal::new());
        let mut rx = signal.tx.subscribe();

        let closers: Vec<_> = (0..16)
            .map(|_| {
                let signal = Arc::clone(&signal);
                tokio::spawn(async move { signal.close() })
            })
            .collect();

        let mut winners = 0;
        for closer in closers {
            if closer.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);

        // Exactly one change is visible to the observer
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn wait_returns_after_close() {
        let signal = Arc::new(ShutdownSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            tokio::spawn(async move { signal.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        signal.close();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_already_closed() {
        let signal = ShutdownSignal::new();
        signal.close();
        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .expect("already-closed latch should not block");
    }
}
