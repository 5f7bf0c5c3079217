//! Action definition DTOs

use serde::{Deserialize, Serialize};

use crate::domain::action::{ActionSpec, Annotation, HASH_ANNOTATION};

/// Exec kind used when the action runs a custom container image
pub const BLACKBOX_KIND: &str = "blackbox";

/// Full action definition sent with `PUT .../actions/{name}?overwrite=true`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub namespace: String,
    pub name: String,
    pub exec: ExecSpec,
    pub limits: ActionLimits,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecSpec {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLimits {
    /// Milliseconds
    pub timeout: u64,
    /// Megabytes
    pub memory: u32,
    /// Megabytes of activation log retained by the platform
    pub logs: u32,
    pub concurrency: u32,
}

impl ActionDefinition {
    /// Builds the definition for `spec`, stamping its fingerprint as the hash annotation
    ///
    /// When `image` is set the action runs as a blackbox container that still
    /// receives the code template.
    pub fn from_spec(spec: &ActionSpec, kind: &str, image: Option<&str>, log_limit_mb: u32) -> Self {
        let exec = match image {
            Some(image) => ExecSpec {
                kind: BLACKBOX_KIND.to_string(),
                code: Some(spec.code_template.clone()),
                image: Some(image.to_string()),
            },
            None => ExecSpec {
                kind: kind.to_string(),
                code: Some(spec.code_template.clone()),
                image: None,
            },
        };

        Self {
            namespace: spec.namespace.clone(),
            name: spec.name.clone(),
            exec,
            limits: ActionLimits {
                timeout: spec.timeout_ms,
                memory: spec.memory_mb,
                logs: log_limit_mb,
                concurrency: spec.concurrency_limit,
            },
            annotations: vec![Annotation::new(HASH_ANNOTATION, spec.fingerprint())],
        }
    }
}
