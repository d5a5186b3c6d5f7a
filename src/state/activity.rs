//! Liveness signal tracking

use std::sync::RwLock;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy)]
struct Activity {
    last_signal_at: DateTime<Utc>,
    signal_count: u64,
}

/// Records when the last liveness signal arrived and how many have been seen.
///
/// Writers are exclusive, readers share the lock. The stored timestamp never
/// moves backwards, even if the wall clock does.
#[derive(Debug)]
pub struct ActivityTracker {
    inner: RwLock<Activity>,
}

impl ActivityTracker {
    /// Create a tracker whose last signal is "now"
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Activity {
                last_signal_at: Utc::now(),
                signal_count: 0,
            }),
        }
    }

    /// Record a liveness signal
    pub fn record_signal(&self) {
        let mut activity = self.inner.write().unwrap_or_else(|e| e.into_inner());
        activity.last_signal_at = activity.last_signal_at.max(Utc::now());
        activity.signal_count += 1;
    }

    pub fn last_signal_at(&self) -> DateTime<Utc> {
        self.snapshot().0
    }

    pub fn signal_count(&self) -> u64 {
        self.snapshot().1
    }

    /// Timestamp and count read under a single lock acquisition
    pub fn snapshot(&self) -> (DateTime<Utc>, u64) {
        let activity = self.inner.read().unwrap_or_else(|e| e.into_inner());
        (activity.last_signal_at, activity.signal_count)
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread, time::Duration};

    #[test]
    fn new_tracker_starts_now_with_no_signals() {
        let before = Utc::now();
        let tracker = ActivityTracker::new();
        assert!(tracker.last_signal_at() >= before);
        assert_eq!(tracker.signal_count(), 0);
    }

    #[test]
    fn record_signal_moves_timestamp_forward() {
        let tracker = ActivityTracker::new();
        let initial = tracker.last_signal_at();

        thread::sleep(Duration::from_millis(10));
        tracker.record_signal();

        assert!(tracker.last_signal_at() > initial);
        assert_eq!(tracker.signal_count(), 1);
    }

    #[test]
    fn concurrent_signals_are_all_counted() {
        let tracker = Arc::new(ActivityTracker::new());
        let start = tracker.last_signal_at();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || {
                    for _ in 0..250 {
                        tracker.record_signal();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let (last, count) = tracker.snapshot();
        assert_eq!(count, 2000);
        assert!(last >= start);
    }
}
