//! Activation domain types

use serde::{Deserialize, Serialize};

/// Process status reported by the action while the command is still executing
pub const STATUS_RUNNING: &str = "running";

/// Process status reported by the action when the command exited cleanly
pub const STATUS_SUCCESS: &str = "success";

/// Process status of a command that did not exit cleanly
pub const STATUS_FAILED: &str = "failed";

/// Handle to one asynchronous invocation of an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationHandle {
    pub activation_id: String,
    pub namespace: String,
    pub action_name: String,
}

/// Result object returned by the action for one activation
///
/// Every field is optional: a result without `mf_process_status` means the
/// platform answered but the process has not reported yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivationResult {
    #[serde(rename = "mf_process_status", default)]
    pub process_status: Option<String>,
    #[serde(rename = "mf_process_ret_code", default)]
    pub return_code: Option<i32>,
    #[serde(rename = "mf_process_stderr", default)]
    pub stderr: Option<serde_json::Value>,
    #[serde(rename = "mf_process_stdout", default)]
    pub stdout: Option<serde_json::Value>,
    /// Set by the platform instead of the process fields when it ended the activation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

impl ActivationResult {
    /// Process status, treating the empty string as absent
    pub fn status(&self) -> Option<&str> {
        self.process_status.as_deref().filter(|s| !s.is_empty())
    }

    pub fn is_running(&self) -> bool {
        self.status() == Some(STATUS_RUNNING)
    }

    /// A present, non-running status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self.status(), Some(s) if s != STATUS_RUNNING)
    }

    pub fn is_success(&self) -> bool {
        self.status() == Some(STATUS_SUCCESS)
    }

    /// Diagnostic text captured from the process, if any
    ///
    /// Actions written in different runtimes report stderr either as a string
    /// or as a structured error object; non-string values are rendered as JSON.
    pub fn stderr_text(&self) -> Option<String> {
        match self.stderr.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(map) if map.is_empty() => None,
            other => Some(other.to_string()),
        }
    }
}
