//! Configuration and CLI argument handling
//!
//! Every setting can be given as a flag or through the environment, so the
//! same binary works from a shell and inside a container.

use std::time::Duration;

use clap::Parser;

/// CLI argument parsing structure
#[derive(Parser, Debug, Clone)]
#[command(name = "lightswitch")]
#[command(about = "Suspends an idle compute instance after a period without pings")]
#[command(version = "1.0.0")]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, env = "PORT", default_value = "8808")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Seconds without a ping before the instance is suspended
    #[arg(
        short = 't',
        long,
        env = "INACTIVITY_TIMEOUT",
        default_value = "90",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub inactivity_timeout: u64,

    /// Set to "yes" to keep the instance online and disable the timer
    #[arg(long, env = "LIBOPS_KEEP_ONLINE", default_value = "")]
    pub keep_online: String,

    /// Log level (DEBUG, INFO, WARN, ERROR)
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    pub log_level: String,

    /// GCP project that owns the instance
    #[arg(long, env = "GCP_PROJECT", default_value = "")]
    pub gcp_project: String,

    /// Zone the instance lives in
    #[arg(long, env = "GCP_ZONE", default_value = "")]
    pub gcp_zone: String,

    /// Name of the instance to suspend
    #[arg(long, env = "GCP_INSTANCE_NAME", default_value = "")]
    pub gcp_instance_name: String,

    /// Container whose latest log line counts as activity (empty disables)
    #[arg(long, env = "FALLBACK_CONTAINER", default_value = "github-actions-runner")]
    pub fallback_container: String,

    /// Seconds allowed for in-flight requests during shutdown
    #[arg(long, env = "SHUTDOWN_GRACE", default_value = "10")]
    pub shutdown_grace: u64,
}

impl Config {
    /// Parse configuration from command line arguments and environment
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Configuration with defaults and the given timeout, used by tests and embedders.
    ///
    /// The timeout is kept in whole seconds like the command line value:
    /// fractions are dropped and anything under one second becomes one second.
    /// The fallback container is left empty.
    pub fn with_timeout(inactivity_timeout: Duration) -> Self {
        Self {
            port: 8808,
            host: "0.0.0.0".to_string(),
            inactivity_timeout: inactivity_timeout.as_secs().max(1),
            keep_online: String::new(),
            log_level: "INFO".to_string(),
            gcp_project: String::new(),
            gcp_zone: String::new(),
            gcp_instance_name: String::new(),
            fallback_container: String::new(),
            shutdown_grace: 10,
        }
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace)
    }

    /// Whether the inactivity timer is disabled entirely
    pub fn keep_online(&self) -> bool {
        self.keep_online.trim().eq_ignore_ascii_case("yes")
    }

    /// Map the configured level onto a tracing filter directive
    pub fn log_level(&self) -> &'static str {
        match self.log_level.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => "debug",
            "WARN" => "warn",
            "ERROR" => "error",
            _ => "info",
        }
    }

    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity {
            project: self.gcp_project.trim().to_string(),
            zone: self.gcp_zone.trim().to_string(),
            instance: self.gcp_instance_name.trim().to_string(),
        }
    }

    /// Fallback container name, if the probe is enabled
    pub fn fallback_container(&self) -> Option<&str> {
        let name = self.fallback_container.trim();
        (!name.is_empty()).then_some(name)
    }
}

/// Fields that locate the compute instance managed by this process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceIdentity {
    pub project: String,
    pub zone: String,
    pub instance: String,
}

impl ResourceIdentity {
    pub fn new(project: &str, zone: &str, instance: &str) -> Self {
        Self {
            project: project.to_string(),
            zone: zone.to_string(),
            instance: instance.to_string(),
        }
    }

    /// True only when every field is set; suspension is skipped otherwise
    pub fn is_complete(&self) -> bool {
        !self.project.is_empty() && !self.zone.is_empty() && !self.instance.is_empty()
    }
}
