//! Job launcher
//!
//! Deploys the action if its fingerprint changed, triggers a non-blocking
//! invocation and binds the returned activation id to a [`RunningJob`].

use serde::de::Error as _;
use std::sync::Arc;
use tracing::info;
use whisk_client::ActionApi;
use whisk_core::domain::action::ActionSpec;
use whisk_core::domain::activation::ActivationHandle;
use whisk_core::dto::invocation::{InvocationRequest, TriggerResponse};

use crate::backoff::Backoff;
use crate::deployer::ActionDeployer;
use crate::error::LaunchError;
use crate::job::RunningJob;

pub struct JobLauncher {
    api: Arc<dyn ActionApi>,
    deployer: ActionDeployer,
    backoff: Backoff,
}

impl JobLauncher {
    /// `backoff` is handed to every launched job for its activation fetches
    pub fn new(api: Arc<dyn ActionApi>, deployer: ActionDeployer, backoff: Backoff) -> Self {
        Self {
            api,
            deployer,
            backoff,
        }
    }

    pub fn deployer(&self) -> &ActionDeployer {
        &self.deployer
    }

    /// Launches `request` against the action described by `spec`
    ///
    /// # Errors
    /// [`LaunchError`] when deployment or the trigger fails, or when the
    /// trigger response carries no activation id. No job exists in that case.
    pub async fn launch(
        &self,
        spec: &ActionSpec,
        request: InvocationRequest,
    ) -> Result<RunningJob, LaunchError> {
        self.deployer
            .ensure_deployed(spec)
            .await
            .map_err(|source| LaunchError::Deploy {
                action: spec.name.clone(),
                source,
            })?;

        let body = self
            .api
            .execute_action(&request)
            .await
            .map_err(|source| LaunchError::Trigger {
                action: request.action_name.clone(),
                source,
            })?;

        let malformed = |source: serde_json::Error| LaunchError::MalformedResponse {
            action: request.action_name.clone(),
            source,
        };
        let response: TriggerResponse = serde_json::from_str(&body).map_err(malformed)?;
        if response.activation_id.is_empty() {
            return Err(malformed(serde_json::Error::custom("empty activationId")));
        }

        info!(
            "Launched action {}/{} as activation {}",
            request.namespace, request.action_name, response.activation_id
        );

        let handle = ActivationHandle {
            activation_id: response.activation_id,
            namespace: request.namespace,
            action_name: request.action_name,
        };
        Ok(RunningJob::new(self.api.clone(), handle, self.backoff))
    }
}
