//! Background tasks module
//!
//! This module contains the inactivity timer and the coordinator that
//! decides what to do when it expires.

pub mod inactivity;
pub mod shutdown_timer;

// Re-export main functions
pub use inactivity::{
    decide, fallback_is_fresh, inactivity_coordinator_task, spawn_inactivity_controller,
    suspend_resource, Decision, SuspendOutcome,
};
pub use shutdown_timer::{ShutdownTimer, TimerFired};
