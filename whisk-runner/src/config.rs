//! Runner configuration
//!
//! Defines the platform connection settings, the default action shape, and the
//! polling parameters used while waiting for an activation.

use std::str::FromStr;
use std::time::Duration;

use whisk_client::{ActionClient, Credentials};

use crate::backoff::Backoff;

pub const DEFAULT_API_URL: &str = "http://localhost:3233/api/v1/namespaces";
pub const DEFAULT_NAMESPACE: &str = "nuvolaris";
pub const DEFAULT_ACTION_KIND: &str = "go:1.20";

/// Runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Platform API base URL, including the namespaces prefix
    pub api_url: String,

    /// Namespace used when a step does not name one
    pub namespace: String,

    /// Basic-auth user for the platform API
    pub api_user: String,

    /// Basic-auth password for the platform API
    pub api_auth: String,

    /// Runtime kind of the deployed action (e.g., "go:1.20")
    pub action_kind: String,

    /// Custom container image; when set the action is deployed as a blackbox
    pub action_image: Option<String>,

    /// Default action memory in megabytes
    pub memory_mb: u32,

    /// Default action timeout in milliseconds
    pub timeout_ms: u64,

    /// Activation log size limit in megabytes
    pub log_limit_mb: u32,

    /// How long one status refresh keeps retrying 404 answers
    pub poll_deadline: Duration,

    /// Upper bound on a single backoff delay
    pub max_backoff: Duration,

    /// Pause between log tail rounds while the task runs
    pub log_tail_interval: Duration,

    /// Shell snippet evaluated before the entrypoint (sandbox support)
    pub init_script: Option<String>,

    /// Metadata service URL forwarded to tasks
    pub service_url: Option<String>,

    /// S3 endpoint override forwarded to tasks
    pub s3_endpoint_url: Option<String>,

    /// Azure blob service endpoint forwarded to tasks
    pub azure_blob_endpoint: Option<String>,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(api_user: impl Into<String>, api_auth: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            api_user: api_user.into(),
            api_auth: api_auth.into(),
            action_kind: DEFAULT_ACTION_KIND.to_string(),
            action_image: None,
            memory_mb: 256,
            timeout_ms: 60_000,
            log_limit_mb: 10,
            poll_deadline: Duration::from_secs(60),
            max_backoff: Duration::from_secs(32),
            log_tail_interval: Duration::from_secs(1),
            init_script: None,
            service_url: None,
            s3_endpoint_url: None,
            azure_blob_endpoint: None,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - WHISK_API_USER (required)
    /// - WHISK_API_AUTH (required)
    /// - WHISK_API_URL (optional, default: local platform)
    /// - WHISK_NAMESPACE (optional, default: nuvolaris)
    /// - WHISK_ACTION_KIND / WHISK_ACTION_IMAGE (optional)
    /// - WHISK_MEMORY_MB (optional, default: 256)
    /// - WHISK_TIMEOUT_MS (optional, default: 60000)
    /// - WHISK_LOG_LIMIT_MB (optional, default: 10)
    /// - WHISK_POLL_DEADLINE (optional, seconds, default: 60)
    /// - WHISK_MAX_BACKOFF (optional, seconds, default: 32)
    /// - WHISK_LOG_TAIL_INTERVAL (optional, seconds, default: 1)
    /// - WHISK_INIT_SCRIPT, WHISK_SERVICE_URL, WHISK_S3_ENDPOINT_URL,
    ///   WHISK_AZURE_BLOB_ENDPOINT (optional, forwarded to tasks)
    pub fn from_env() -> anyhow::Result<Self> {
        let api_user = std::env::var("WHISK_API_USER")
            .map_err(|_| anyhow::anyhow!("WHISK_API_USER environment variable not set"))?;

        let api_auth = std::env::var("WHISK_API_AUTH")
            .map_err(|_| anyhow::anyhow!("WHISK_API_AUTH environment variable not set"))?;

        Ok(Self::new(api_user, api_auth).with_env_overrides())
    }

    /// Applies every optional `WHISK_*` variable that is set
    ///
    /// Credentials are left untouched.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(url) = env_string("WHISK_API_URL") {
            self.api_url = url;
        }
        if let Some(namespace) = env_string("WHISK_NAMESPACE") {
            self.namespace = namespace;
        }
        if let Some(kind) = env_string("WHISK_ACTION_KIND") {
            self.action_kind = kind;
        }
        self.action_image = env_string("WHISK_ACTION_IMAGE").or(self.action_image);
        self.memory_mb = env_parse("WHISK_MEMORY_MB").unwrap_or(self.memory_mb);
        self.timeout_ms = env_parse("WHISK_TIMEOUT_MS").unwrap_or(self.timeout_ms);
        self.log_limit_mb = env_parse("WHISK_LOG_LIMIT_MB").unwrap_or(self.log_limit_mb);
        self.poll_deadline = env_parse("WHISK_POLL_DEADLINE")
            .map(Duration::from_secs)
            .unwrap_or(self.poll_deadline);
        self.max_backoff = env_parse("WHISK_MAX_BACKOFF")
            .map(Duration::from_secs)
            .unwrap_or(self.max_backoff);
        self.log_tail_interval = env_parse("WHISK_LOG_TAIL_INTERVAL")
            .map(Duration::from_secs)
            .unwrap_or(self.log_tail_interval);
        self.init_script = env_string("WHISK_INIT_SCRIPT").or(self.init_script);
        self.service_url = env_string("WHISK_SERVICE_URL").or(self.service_url);
        self.s3_endpoint_url = env_string("WHISK_S3_ENDPOINT_URL").or(self.s3_endpoint_url);
        self.azure_blob_endpoint =
            env_string("WHISK_AZURE_BLOB_ENDPOINT").or(self.azure_blob_endpoint);
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_user.is_empty() || self.api_auth.is_empty() {
            anyhow::bail!("api credentials cannot be empty");
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            anyhow::bail!("api_url must start with http:// or https://");
        }

        if self.namespace.is_empty() {
            anyhow::bail!("namespace cannot be empty");
        }

        if self.memory_mb == 0 {
            anyhow::bail!("memory_mb must be greater than 0");
        }

        if self.timeout_ms == 0 {
            anyhow::bail!("timeout_ms must be greater than 0");
        }

        if self.poll_deadline.is_zero() {
            anyhow::bail!("poll_deadline must be greater than 0");
        }

        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.api_user, &self.api_auth)
    }

    /// Builds an HTTP client for the configured platform
    pub fn client(&self) -> ActionClient {
        ActionClient::new(&self.api_url, self.credentials())
    }

    /// Backoff policy applied to activation fetches
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.poll_deadline).with_max_delay(self.max_backoff)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_config_defaults() {
        let config = Config::new("user", "secret");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
        assert_eq!(config.memory_mb, 256);
        assert_eq!(config.timeout_ms, 60_000);
        assert_eq!(config.poll_deadline, Duration::from_secs(60));
        assert_eq!(config.max_backoff, Duration::from_secs(32));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::new("user", "secret");

        config.api_auth = String::new();
        assert!(config.validate().is_err());
        config.api_auth = "secret".to_string();

        config.api_url = "localhost:3233".to_string();
        assert!(config.validate().is_err());
        config.api_url = "https://whisk.example.com/api/v1/namespaces".to_string();
        assert!(config.validate().is_ok());

        config.memory_mb = 0;
        assert!(config.validate().is_err());
        config.memory_mb = 128;

        config.poll_deadline = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_client_uses_api_url() {
        let mut config = Config::new("user", "secret");
        config.api_url = "http://whisk.local/api/v1/namespaces/".to_string();
        assert_eq!(config.client().base_url(), "http://whisk.local/api/v1/namespaces");
    }
}
