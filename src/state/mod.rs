//! State management module
//!
//! This module contains the shared state of the service: the activity
//! tracker, the shutdown latch and the context object tying them together.

pub mod activity;
pub mod app_state;
pub mod shutdown;

// Re-export main types
pub use activity::ActivityTracker;
pub use app_state::AppState;
pub use shutdown::ShutdownSignal;
