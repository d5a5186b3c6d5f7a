//! gcloud CLI strategy: credentials are discovered by the SDK itself

use std::time::Duration;

use async_trait::async_trait;
use tokio::{process::Command, time::timeout};
use tracing::debug;

use super::lifecycle::{
    ComputeInstance, LifecycleApi, LifecycleError, LifecycleStep, ResourceStatus,
};
use crate::config::ResourceIdentity;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Drives the instance through `gcloud compute instances ...`
#[derive(Debug, Clone)]
pub struct GcloudCliClient {
    identity: ResourceIdentity,
    program: String,
}

impl GcloudCliClient {
    pub fn new(identity: ResourceIdentity) -> Self {
        Self::with_program(identity, "gcloud")
    }

    /// Use a different gcloud executable
    pub fn with_program(identity: ResourceIdentity, program: &str) -> Self {
        Self {
            identity,
            program: program.to_string(),
        }
    }

    /// Arguments passed to gcloud for the given step
    pub fn args(&self, step: LifecycleStep) -> Vec<String> {
        let verb = match step {
            LifecycleStep::StatusFetch | LifecycleStep::Credentials => "describe",
            LifecycleStep::SuspendAction => "suspend",
        };
        let mut args = vec![
            "compute".to_string(),
            "instances".to_string(),
            verb.to_string(),
            self.identity.instance.clone(),
            format!("--project={}", self.identity.project),
            format!("--zone={}", self.identity.zone),
        ];
        match step {
            LifecycleStep::SuspendAction => args.push("--quiet".to_string()),
            _ => args.push("--format=json(status)".to_string()),
        }
        args
    }

    async fn run(&self, step: LifecycleStep) -> Result<Vec<u8>, LifecycleError> {
        let args = self.args(step);
        debug!("Running {} {}", self.program, args.join(" "));

        let output = timeout(
            COMMAND_TIMEOUT,
            Command::new(&self.program)
                .args(&args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| LifecycleError::Command {
            step,
            exit_code: None,
            message: format!("timed out after {}s", COMMAND_TIMEOUT.as_secs()),
        })?
        .map_err(|e| LifecycleError::Command {
            step,
            exit_code: None,
            message: format!("failed to execute {}: {}", self.program, e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LifecycleError::Command {
                step,
                exit_code: output.status.code(),
                message: stderr.trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl LifecycleApi for GcloudCliClient {
    fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    fn describe(&self) -> &'static str {
        "gcloud CLI"
    }

    async fn status(&self) -> Result<ResourceStatus, LifecycleError> {
        let step = LifecycleStep::StatusFetch;
        let stdout = self.run(step).await?;
        let instance: ComputeInstance =
            serde_json::from_slice(&stdout).map_err(|e| LifecycleError::Decode {
                step,
                message: e.to_string(),
            })?;
        Ok(ResourceStatus::parse(&instance.status))
    }

    async fn suspend(&self) -> Result<(), LifecycleError> {
        self.run(LifecycleStep::SuspendAction).await.map(|_| ())
    }
}
