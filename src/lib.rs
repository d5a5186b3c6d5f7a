//! Lightswitch - suspends an idle compute instance
//!
//! This library tracks liveness pings, arms an inactivity timer and, once the
//! timer expires with no activity, suspends the instance through a lifecycle
//! API and asks the process to shut down.

pub mod config;
pub mod state;
pub mod api;
pub mod services;
pub mod tasks;
pub mod server;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use state::AppState;
pub use api::create_router;
pub use server::run_server;
pub use utils::signals::shutdown_signal;
