//! Lifecycle API abstraction for the managed compute instance

use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ResourceIdentity;

/// Status of the compute instance as reported by the lifecycle API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceStatus {
    Running,
    /// Suspended, stopped or transitioning; suspending again is pointless
    NotRunning(String),
    Unknown(String),
}

impl ResourceStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "RUNNING" => Self::Running,
            "SUSPENDED" | "SUSPENDING" | "STOPPED" | "STOPPING" | "TERMINATED" | "PROVISIONING"
            | "STAGING" | "REPAIRING" => Self::NotRunning(raw.trim().to_string()),
            _ => Self::Unknown(raw.trim().to_string()),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::NotRunning(raw) | Self::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

/// Body returned when describing an instance. Only the status is used.
#[derive(Debug, Clone, Deserialize)]
pub struct ComputeInstance {
    #[serde(default)]
    pub status: String,
}

/// Which part of the suspend procedure failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStep {
    Credentials,
    StatusFetch,
    SuspendAction,
}

impl fmt::Display for LifecycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Credentials => "credential fetch",
            Self::StatusFetch => "status fetch",
            Self::SuspendAction => "suspend action",
        };
        f.write_str(name)
    }
}

/// Errors produced by any lifecycle strategy
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("{step} request failed: {source}")]
    Transport {
        step: LifecycleStep,
        #[source]
        source: reqwest::Error,
    },
    #[error("{step} returned non-success status {status}")]
    Status { step: LifecycleStep, status: u16 },
    #[error("{step} response could not be decoded: {message}")]
    Decode { step: LifecycleStep, message: String },
    #[error("{step} command failed (exit code {exit_code:?}): {message}")]
    Command {
        step: LifecycleStep,
        exit_code: Option<i32>,
        message: String,
    },
}

impl LifecycleError {
    pub fn step(&self) -> LifecycleStep {
        match self {
            Self::Transport { step, .. }
            | Self::Status { step, .. }
            | Self::Decode { step, .. }
            | Self::Command { step, .. } => *step,
        }
    }

    /// Transport status code, when the remote side answered
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Remote operations on the managed instance.
///
/// Implementations perform a single remote action per call. The ordering
/// rules (rearm first, only suspend a running instance) live in
/// [`crate::tasks::suspend_resource`] so every strategy behaves the same.
#[async_trait]
pub trait LifecycleApi: Send + Sync {
    /// Identity the client was built for
    fn identity(&self) -> &ResourceIdentity;

    /// Short strategy name for logs
    fn describe(&self) -> &'static str;

    async fn status(&self) -> Result<ResourceStatus, LifecycleError>;

    async fn suspend(&self) -> Result<(), LifecycleError>;
}

/// In-memory lifecycle client that records calls instead of touching the network
#[derive(Debug)]
pub struct MockLifecycle {
    identity: ResourceIdentity,
    status: Mutex<ResourceStatus>,
    fail_suspend_with: Mutex<Option<u16>>,
    status_calls: AtomicUsize,
    suspend_calls: AtomicUsize,
}

impl MockLifecycle {
    /// Mock for a fully identified, running instance
    pub fn new() -> Self {
        Self::with_identity(ResourceIdentity::new(
            "test-project",
            "test-zone",
            "test-instance",
        ))
    }

    pub fn with_identity(identity: ResourceIdentity) -> Self {
        Self {
            identity,
            status: Mutex::new(ResourceStatus::Running),
            fail_suspend_with: Mutex::new(None),
            status_calls: AtomicUsize::new(0),
            suspend_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_status(&self, status: ResourceStatus) {
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = status;
    }

    /// Make every suspend call fail with the given HTTP status
    pub fn fail_suspend(&self, status: u16) {
        *self
            .fail_suspend_with
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(status);
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn suspend_calls(&self) -> usize {
        self.suspend_calls.load(Ordering::SeqCst)
    }

    pub fn was_suspend_called(&self) -> bool {
        self.suspend_calls() > 0
    }
}

impl Default for MockLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LifecycleApi for MockLifecycle {
    fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    fn describe(&self) -> &'static str {
        "mock"
    }

    async fn status(&self) -> Result<ResourceStatus, LifecycleError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.status.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn suspend(&self) -> Result<(), LifecycleError> {
        self.suspend_calls.fetch_add(1, Ordering::SeqCst);
        let failure = *self
            .fail_suspend_with
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        match failure {
            Some(status) => Err(LifecycleError::Status {
                step: LifecycleStep::SuspendAction,
                status,
            }),
            None => Ok(()),
        }
    }
}
