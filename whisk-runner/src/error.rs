//! Error types for the job lifecycle

use std::time::Duration;
use thiserror::Error;
use whisk_client::ClientError;
use whisk_core::domain::datastore::DatastoreKind;

/// Hint appended to every task failure message
pub const RETRY_HINT: &str = "This could be a transient error. Use @retry to retry.";

/// Deploying or triggering an action failed
///
/// Not retried at this layer; retries are a higher-level policy.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Unable to launch action '{action}': deployment failed: {source}")]
    Deploy {
        action: String,
        #[source]
        source: ClientError,
    },

    #[error("Unable to launch action '{action}': trigger failed: {source}")]
    Trigger {
        action: String,
        #[source]
        source: ClientError,
    },

    #[error("Unable to launch action '{action}': unreadable trigger response: {source}")]
    MalformedResponse {
        action: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Querying an activation failed
#[derive(Debug, Error)]
pub enum JobError {
    /// Unexpected status or malformed activation body
    #[error("Failed to query activation {activation_id}: {source}")]
    Poll {
        activation_id: String,
        #[source]
        source: ClientError,
    },

    /// The platform kept answering 404 past the backoff deadline
    ///
    /// A 404 means "still running" as well as "no such activation"; the deadline
    /// is the only way to tell them apart, so this may be a long-running task.
    #[error("Activation {activation_id} was not found after {waited:?} of retries")]
    ActivationNotFound {
        activation_id: String,
        waited: Duration,
    },
}

/// The remote process finished with a non-zero exit
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskFailure {
    #[error("Task failed with a segmentation fault. {}", RETRY_HINT)]
    Segfault,

    #[error(
        "Task ran out of memory. Increase the available memory by specifying \
         @resource(memory=...) for the step. {}",
        RETRY_HINT
    )]
    OutOfMemory,

    #[error("Task was aborted: {reason} (exit code {exit_code}). {}", RETRY_HINT)]
    Aborted { reason: String, exit_code: i32 },

    #[error("{reason} (exit code {exit_code}). {}", RETRY_HINT)]
    Crashed { reason: String, exit_code: i32 },

    #[error("{reason}. {}", RETRY_HINT)]
    Unknown { reason: String },
}

impl TaskFailure {
    /// Classifies a failed exit by its code
    ///
    /// `reason` falls back to "Task crashed" when the task reported nothing.
    pub fn classify(exit_code: Option<i32>, reason: Option<String>) -> Self {
        let reason = reason.unwrap_or_else(|| "Task crashed".to_string());
        match exit_code {
            Some(139) => Self::Segfault,
            Some(137) => Self::OutOfMemory,
            Some(134) => Self::Aborted {
                reason,
                exit_code: 134,
            },
            Some(code) if code != 0 => Self::Crashed {
                reason,
                exit_code: code,
            },
            _ => Self::Unknown { reason },
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Segfault => Some(139),
            Self::OutOfMemory => Some(137),
            Self::Aborted { exit_code, .. } | Self::Crashed { exit_code, .. } => Some(*exit_code),
            Self::Unknown { .. } => None,
        }
    }
}

/// Invalid configuration; fatal and never retried
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("No code package download command for datastore '{0}'")]
    UnsupportedDatastore(DatastoreKind),

    #[error("Remote steps require --datastore=s3 or --datastore=azure, got '{0}'")]
    DatastoreNotRemote(DatastoreKind),

    #[error("Step '{0}' requires an action name")]
    MissingAction(String),

    #[error("Step '{step}' is also marked for execution on {other}. Please use one or the other.")]
    ConflictingExecutor { step: String, other: String },

    #[error("Step '{0}' is parallel; parallel execution is not supported remotely")]
    ParallelStep(String),

    #[error("The timeout for step '{step}' should be at least 60 seconds, got {seconds}s")]
    RunTimeLimitTooShort { step: String, seconds: u64 },

    #[error("Invalid Azure blob path '{0}'")]
    InvalidAzurePath(String),
}

/// Saving a code package failed
#[derive(Debug, Error)]
#[error("Failed to save code package: {0}")]
pub struct PackageError(pub String);

/// Waiting for a launched job failed
#[derive(Debug, Error)]
pub enum WaitError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Task(#[from] TaskFailure),
}

/// Any failure in the remote step lifecycle
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Wait(#[from] WaitError),
}
