//! Action deployment
//!
//! Deploys an action only when the fingerprint stored on the platform differs
//! from the fingerprint of the local [`ActionSpec`]. Concurrent deployers may
//! race; the last PUT wins and the fingerprints agree either way.

use std::sync::Arc;
use tracing::{debug, info};
use whisk_client::{ActionApi, ClientError};
use whisk_core::domain::action::ActionSpec;
use whisk_core::dto::action::ActionDefinition;

use crate::config::Config;

/// Executable body of every deployed action
pub const ACTION_TEMPLATE: &str = include_str!("../templates/action.go");

/// Builds action definitions and keeps the deployed copy current
#[derive(Clone)]
pub struct ActionDeployer {
    api: Arc<dyn ActionApi>,
    kind: String,
    image: Option<String>,
    log_limit_mb: u32,
}

impl ActionDeployer {
    pub fn new(api: Arc<dyn ActionApi>, kind: impl Into<String>) -> Self {
        Self {
            api,
            kind: kind.into(),
            image: None,
            log_limit_mb: 10,
        }
    }

    pub fn from_config(api: Arc<dyn ActionApi>, config: &Config) -> Self {
        Self::new(api, &config.action_kind)
            .with_image(config.action_image.clone())
            .with_log_limit(config.log_limit_mb)
    }

    /// Deploys as a blackbox action running `image` when set
    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    pub fn with_log_limit(mut self, log_limit_mb: u32) -> Self {
        self.log_limit_mb = log_limit_mb;
        self
    }

    /// Spec for `name` using the fixed action template
    pub fn spec(
        &self,
        name: impl Into<String>,
        namespace: impl Into<String>,
        memory_mb: u32,
        timeout_ms: u64,
    ) -> ActionSpec {
        ActionSpec::new(name, namespace, memory_mb, timeout_ms, ACTION_TEMPLATE)
    }

    /// Full PUT body for `spec`, including the fingerprint annotation
    pub fn definition(&self, spec: &ActionSpec) -> ActionDefinition {
        ActionDefinition::from_spec(spec, &self.kind, self.image.as_deref(), self.log_limit_mb)
    }

    /// True when the action is missing, unreadable, or carries another fingerprint
    pub async fn should_deploy(&self, spec: &ActionSpec) -> bool {
        match self.api.get_action_detail(&spec.namespace, &spec.name).await {
            Ok(detail) => {
                let stale = detail.is_stale_for(spec);
                debug!(
                    "Action {}/{} stored fingerprint {:?}, stale: {}",
                    spec.namespace,
                    spec.name,
                    detail.stored_fingerprint(),
                    stale
                );
                stale
            }
            Err(e) => {
                debug!(
                    "Action {}/{} not readable ({}), deploying",
                    spec.namespace, spec.name, e
                );
                true
            }
        }
    }

    /// Creates or overwrites the action; safe to repeat
    pub async fn deploy(&self, spec: &ActionSpec) -> Result<(), ClientError> {
        self.api.deploy_action(&self.definition(spec)).await?;
        info!(
            "Deployed action {}/{} (memory: {}MB, timeout: {}ms)",
            spec.namespace, spec.name, spec.memory_mb, spec.timeout_ms
        );
        Ok(())
    }

    /// Deploys only when [`should_deploy`](Self::should_deploy) says so
    ///
    /// Returns whether a PUT was issued.
    pub async fn ensure_deployed(&self, spec: &ActionSpec) -> Result<bool, ClientError> {
        if !self.should_deploy(spec).await {
            debug!("Action {}/{} is up to date", spec.namespace, spec.name);
            return Ok(false);
        }
        self.deploy(spec).await?;
        Ok(true)
    }
}
