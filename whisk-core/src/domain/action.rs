//! Action domain types

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Annotation key holding the deployment fingerprint of an action
pub const HASH_ANNOTATION: &str = "hash";

/// Immutable description of a remote action
///
/// Identity is `(namespace, name)`. The fingerprint covers every field that
/// changes what runs remotely; `namespace` and `concurrency_limit` are not part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSpec {
    pub name: String,
    pub namespace: String,
    pub memory_mb: u32,
    pub timeout_ms: u64,
    pub code_template: String,
    pub concurrency_limit: u32,
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    name: &'a str,
    memory: u32,
    timeout: u64,
    code: &'a str,
}

impl ActionSpec {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        memory_mb: u32,
        timeout_ms: u64,
        code_template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            memory_mb,
            timeout_ms,
            code_template: code_template.into(),
            concurrency_limit: 1,
        }
    }

    /// Deployment fingerprint: hex SHA-256 over `{name, memory, timeout, code}`
    ///
    /// The JSON object is always serialized in that field order, so equal
    /// inputs produce equal digests.
    pub fn fingerprint(&self) -> String {
        let input = FingerprintInput {
            name: &self.name,
            memory: self.memory_mb,
            timeout: self.timeout_ms,
            code: &self.code_template,
        };
        // Serializing a struct of strings and integers cannot fail.
        let payload = serde_json::to_string(&input).unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(payload.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Key/value annotation attached to a deployed action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub key: String,
    pub value: serde_json::Value,
}

impl Annotation {
    pub fn new(key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Server-side view of a deployed action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDetail {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl ActionDetail {
    /// The stored deployment fingerprint, if the action carries one
    pub fn stored_fingerprint(&self) -> Option<&str> {
        self.annotations
            .iter()
            .find(|a| a.key == HASH_ANNOTATION)
            .and_then(|a| a.value.as_str())
    }

    /// Whether this deployment is stale with respect to `spec`
    pub fn is_stale_for(&self, spec: &ActionSpec) -> bool {
        self.stored_fingerprint() != Some(spec.fingerprint().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ActionSpec {
        ActionSpec::new("train", "nuvolaris", 256, 60_000, "package main")
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(spec().fingerprint(), spec().fingerprint());
        assert_eq!(spec().fingerprint().len(), 64);
    }

    #[test]
    fn test_fingerprint_ignores_namespace_and_concurrency() {
        let mut other = spec();
        other.namespace = "elsewhere".to_string();
        other.concurrency_limit = 4;
        assert_eq!(spec().fingerprint(), other.fingerprint());
    }

    #[test]
    fn test_fingerprint_changes_with_each_parameter() {
        let base = spec().fingerprint();

        let mut s = spec();
        s.name = "predict".to_string();
        assert_ne!(base, s.fingerprint());

        let mut s = spec();
        s.memory_mb = 512;
        assert_ne!(base, s.fingerprint());

        let mut s = spec();
        s.timeout_ms = 120_000;
        assert_ne!(base, s.fingerprint());

        let mut s = spec();
        s.code_template.push('\n');
        assert_ne!(base, s.fingerprint());
    }

    #[test]
    fn test_stored_fingerprint_lookup() {
        let detail = ActionDetail {
            name: "train".to_string(),
            namespace: "nuvolaris".to_string(),
            version: None,
            annotations: vec![
                Annotation::new("exec", "go"),
                Annotation::new(HASH_ANNOTATION, spec().fingerprint()),
            ],
        };

        assert_eq!(
            detail.stored_fingerprint(),
            Some(spec().fingerprint().as_str())
        );
        assert!(!detail.is_stale_for(&spec()));

        let mut bigger = spec();
        bigger.memory_mb = 1024;
        assert!(detail.is_stale_for(&bigger));
    }

    #[test]
    fn test_missing_or_non_string_hash_is_stale() {
        let detail = ActionDetail {
            name: "train".to_string(),
            namespace: String::new(),
            version: None,
            annotations: vec![Annotation::new(HASH_ANNOTATION, 42)],
        };
        assert_eq!(detail.stored_fingerprint(), None);
        assert!(detail.is_stale_for(&spec()));
    }

    #[test]
    fn test_action_detail_tolerates_missing_fields() {
        let detail: ActionDetail = serde_json::from_str(r#"{"name":"train"}"#).unwrap();
        assert!(detail.annotations.is_empty());
        assert!(detail.is_stale_for(&spec()));
    }
}
