//! Platform API abstraction
//!
//! The lifecycle components depend on this trait rather than on
//! [`ActionClient`] directly so they can be exercised against in-memory fakes.

use async_trait::async_trait;
use whisk_core::domain::action::ActionDetail;
use whisk_core::dto::action::ActionDefinition;
use whisk_core::dto::activation::ActivationDetail;
use whisk_core::dto::invocation::InvocationRequest;

use crate::ActionClient;
use crate::error::Result;

/// Operations the job lifecycle needs from the serverless platform
#[async_trait]
pub trait ActionApi: Send + Sync {
    /// Create or overwrite an action definition
    async fn deploy_action(&self, definition: &ActionDefinition) -> Result<()>;

    /// Trigger an activation; returns the raw response body
    async fn execute_action(&self, request: &InvocationRequest) -> Result<String>;

    /// Fetch the deployed action detail
    async fn get_action_detail(&self, namespace: &str, name: &str) -> Result<ActionDetail>;

    /// Fetch a completed activation; 404 while still running
    async fn get_activation_detail(
        &self,
        namespace: &str,
        activation_id: &str,
    ) -> Result<ActivationDetail>;
}

#[async_trait]
impl ActionApi for ActionClient {
    async fn deploy_action(&self, definition: &ActionDefinition) -> Result<()> {
        ActionClient::deploy_action(self, definition).await
    }

    async fn execute_action(&self, request: &InvocationRequest) -> Result<String> {
        ActionClient::execute_action(self, request).await
    }

    async fn get_action_detail(&self, namespace: &str, name: &str) -> Result<ActionDetail> {
        ActionClient::get_action_detail(self, namespace, name).await
    }

    async fn get_activation_detail(
        &self,
        namespace: &str,
        activation_id: &str,
    ) -> Result<ActivationDetail> {
        ActionClient::get_activation_detail(self, namespace, activation_id).await
    }
}
