//! Activation DTOs

use serde::{Deserialize, Serialize};

use crate::domain::activation::{ActivationResult, STATUS_FAILED};

/// Reason reported when the platform ended an activation without saying why
const PLATFORM_FAILURE: &str = "Activation was ended by the platform";

/// Body of `GET .../activations/{id}` once the activation has completed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationDetail {
    #[serde(rename = "activationId", default)]
    pub activation_id: Option<String>,
    pub response: ActivationResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
    pub result: ActivationResult,
}

impl ActivationResponse {
    /// The process result, with activations ended by the platform made terminal
    ///
    /// When the platform stops an action itself (timeout, container out of
    /// memory) it reports `success: false` and a result without process fields.
    /// That result is turned into a `failed` process whose stderr carries the
    /// platform's reason.
    pub fn into_result(self) -> ActivationResult {
        let mut result = self.result;
        if self.success != Some(false) || result.status().is_some() {
            return result;
        }

        let reason = match result.error.take() {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s,
            Some(serde_json::Value::Null) | None => self
                .status
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| PLATFORM_FAILURE.to_string()),
            Some(other) => other.to_string(),
        };
        result.process_status = Some(STATUS_FAILED.to_string());
        if result.stderr_text().is_none() {
            result.stderr = Some(serde_json::Value::String(reason));
        }
        result
    }
}
