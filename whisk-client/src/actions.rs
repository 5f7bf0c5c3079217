//! Action-related API endpoints

use tracing::debug;
use whisk_core::domain::action::ActionDetail;
use whisk_core::dto::action::ActionDefinition;
use whisk_core::dto::invocation::InvocationRequest;

use crate::ActionClient;
use crate::error::Result;

impl ActionClient {
    // =============================================================================
    // Deployment
    // =============================================================================

    /// Create or replace an action definition
    ///
    /// Uses overwrite semantics, so repeating the call with an identical
    /// definition is harmless.
    pub async fn deploy_action(&self, definition: &ActionDefinition) -> Result<()> {
        let url = self.action_url(&definition.namespace, &definition.name);
        debug!("PUT {}?overwrite=true", url);

        let response = self
            .authorized(self.client.put(&url))
            .query(&[("overwrite", "true")])
            .json(definition)
            .send()
            .await?;

        self.handle_text_response(response).await.map(|_| ())
    }

    /// Get the deployed action definition, including its annotations
    pub async fn get_action_detail(&self, namespace: &str, name: &str) -> Result<ActionDetail> {
        let url = self.action_url(namespace, name);
        debug!("GET {}", url);

        let response = self.authorized(self.client.get(&url)).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Invocation
    // =============================================================================

    /// Trigger an action without waiting for it to finish
    ///
    /// # Returns
    /// The raw response body; it is expected to carry an `activationId`.
    pub async fn execute_action(&self, request: &InvocationRequest) -> Result<String> {
        let url = self.action_url(&request.namespace, &request.action_name);
        debug!("POST {}", url);

        let response = self
            .authorized(self.client.post(&url))
            .json(&request.trigger_body())
            .send()
            .await?;

        self.handle_text_response(response).await
    }
}
