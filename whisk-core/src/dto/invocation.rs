//! Invocation DTOs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request to trigger one asynchronous activation of an action
///
/// Labels and annotations are bookkeeping only; they are not sent with the trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationRequest {
    pub action_name: String,
    pub namespace: String,
    pub command: Vec<String>,
    pub environment_variables: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

impl InvocationRequest {
    pub fn new(
        action_name: impl Into<String>,
        namespace: impl Into<String>,
        command: Vec<String>,
    ) -> Self {
        Self {
            action_name: action_name.into(),
            namespace: namespace.into(),
            command,
            ..Default::default()
        }
    }

    /// Sets an environment variable; `None` leaves the request untouched
    pub fn environment_variable<V: Into<String>>(
        mut self,
        name: impl Into<String>,
        value: Option<V>,
    ) -> Self {
        if let Some(value) = value {
            self.environment_variables.insert(name.into(), value.into());
        }
        self
    }

    pub fn label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }

    pub fn annotation(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(name.into(), value.into());
        self
    }

    /// Body for `POST .../actions/{name}`
    pub fn trigger_body(&self) -> TriggerBody<'_> {
        TriggerBody {
            command: &self.command,
            environment_variables: if self.environment_variables.is_empty() {
                None
            } else {
                Some(&self.environment_variables)
            },
        }
    }
}

/// Wire body of a trigger call
#[derive(Debug, Serialize)]
pub struct TriggerBody<'a> {
    pub command: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_variables: Option<&'a BTreeMap<String, String>>,
}

/// Response of a non-blocking trigger call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResponse {
    #[serde(rename = "activationId")]
    pub activation_id: String,
}
