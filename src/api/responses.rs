//! API response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-only snapshot of the inactivity state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub keep_online: bool,
    pub inactivity_timeout_seconds: u64,
    pub last_signal_at: DateTime<Utc>,
    pub signal_count: u64,
    pub timer_armed: bool,
    pub shutting_down: bool,
    pub uptime: String,
}
