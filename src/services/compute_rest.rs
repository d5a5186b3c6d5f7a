//! Direct REST strategy: metadata-server token plus Compute Engine API calls

use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::lifecycle::{
    ComputeInstance, LifecycleApi, LifecycleError, LifecycleStep, ResourceStatus,
};
use crate::config::ResourceIdentity;

pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
pub const COMPUTE_API_BASE: &str = "https://compute.googleapis.com/compute/v1";

const TOKEN_TIMEOUT: Duration = Duration::from_secs(10);
const API_TIMEOUT: Duration = Duration::from_secs(30);
/// Tokens closer than this to expiry are refreshed
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: String,
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Talks to the Compute Engine REST API using the instance's service account
#[derive(Debug)]
pub struct ComputeRestClient {
    identity: ResourceIdentity,
    token_url: String,
    api_base: String,
    token_client: reqwest::Client,
    api_client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl ComputeRestClient {
    pub fn new(identity: ResourceIdentity) -> Result<Self, reqwest::Error> {
        Self::with_endpoints(identity, METADATA_TOKEN_URL, COMPUTE_API_BASE)
    }

    /// Point the client at different token and API endpoints
    pub fn with_endpoints(
        identity: ResourceIdentity,
        token_url: &str,
        api_base: &str,
    ) -> Result<Self, reqwest::Error> {
        let token_client = reqwest::Client::builder()
            .user_agent("lightswitch")
            .timeout(TOKEN_TIMEOUT)
            .build()?;
        let api_client = reqwest::Client::builder()
            .user_agent("lightswitch")
            .timeout(API_TIMEOUT)
            .build()?;

        Ok(Self {
            identity,
            token_url: token_url.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            token_client,
            api_client,
            token: Mutex::new(None),
        })
    }

    pub fn instance_url(&self) -> String {
        format!(
            "{}/projects/{}/zones/{}/instances/{}",
            self.api_base, self.identity.project, self.identity.zone, self.identity.instance
        )
    }

    async fn fetch_token(&self) -> Result<AccessToken, LifecycleError> {
        let step = LifecycleStep::Credentials;
        let response = self
            .token_client
            .get(&self.token_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|source| LifecycleError::Transport { step, source })?;

        if response.status() != StatusCode::OK {
            return Err(LifecycleError::Status {
                step,
                status: response.status().as_u16(),
            });
        }

        response
            .json::<AccessToken>()
            .await
            .map_err(|e| LifecycleError::Decode {
                step,
                message: e.to_string(),
            })
    }

    /// Bearer token, reused while it is comfortably within its lifetime
    async fn bearer_token(&self) -> Result<String, LifecycleError> {
        {
            let cached = self.token.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(token) = cached.as_ref() {
                if Instant::now() + TOKEN_EXPIRY_MARGIN < token.expires_at {
                    return Ok(token.value.clone());
                }
            }
        }

        let token = self.fetch_token().await?;
        debug!(
            expires_in = token.expires_in,
            token_type = %token.token_type,
            "Fetched access token"
        );

        let mut cached = self.token.lock().unwrap_or_else(|e| e.into_inner());
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(token.access_token)
    }
}

#[async_trait]
impl LifecycleApi for ComputeRestClient {
    fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    fn describe(&self) -> &'static str {
        "compute REST API"
    }

    async fn status(&self) -> Result<ResourceStatus, LifecycleError> {
        let token = self.bearer_token().await?;
        let step = LifecycleStep::StatusFetch;

        let response = self
            .api_client
            .get(self.instance_url())
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await
            .map_err(|source| LifecycleError::Transport { step, source })?;

        if response.status() != StatusCode::OK {
            return Err(LifecycleError::Status {
                step,
                status: response.status().as_u16(),
            });
        }

        let instance = response
            .json::<ComputeInstance>()
            .await
            .map_err(|e| LifecycleError::Decode {
                step,
                message: e.to_string(),
            })?;
        Ok(ResourceStatus::parse(&instance.status))
    }

    async fn suspend(&self) -> Result<(), LifecycleError> {
        let token = self.bearer_token().await?;
        let step = LifecycleStep::SuspendAction;

        let response = self
            .api_client
            .post(format!("{}/suspend", self.instance_url()))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(|source| LifecycleError::Transport { step, source })?;

        if response.status() != StatusCode::OK {
            return Err(LifecycleError::Status {
                step,
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }
}
