//! External service integration module
//!
//! This module contains the lifecycle API strategies used to suspend the
//! managed instance and the fallback activity probe.

pub mod compute_rest;
pub mod fallback;
pub mod gcloud;
pub mod lifecycle;

use std::sync::Arc;

use crate::config::{Config, ResourceIdentity};

// Re-export main types
pub use compute_rest::ComputeRestClient;
pub use fallback::{ActivityProbe, DockerLogProbe, NoProbe, StaticProbe};
pub use gcloud::GcloudCliClient;
pub use lifecycle::{
    LifecycleApi, LifecycleError, LifecycleStep, MockLifecycle, ResourceStatus,
};

/// Lifecycle client selected at build time by the `gcloud-cli` feature
#[cfg(feature = "gcloud-cli")]
pub fn default_lifecycle_client(
    identity: ResourceIdentity,
) -> anyhow::Result<Arc<dyn LifecycleApi>> {
    Ok(Arc::new(GcloudCliClient::new(identity)))
}

/// Lifecycle client selected at build time by the `gcloud-cli` feature
#[cfg(not(feature = "gcloud-cli"))]
pub fn default_lifecycle_client(
    identity: ResourceIdentity,
) -> anyhow::Result<Arc<dyn LifecycleApi>> {
    Ok(Arc::new(ComputeRestClient::new(identity)?))
}

/// Fallback probe for the configured container, or none
pub fn default_activity_probe(config: &Config) -> Arc<dyn ActivityProbe> {
    match config.fallback_container() {
        Some(container) => Arc::new(DockerLogProbe::new(container)),
        None => Arc::new(NoProbe),
    }
}
