//! Whisk Runner
//!
//! Job lifecycle manager for steps executed as serverless actions.
//!
//! Architecture:
//! - Command: the `bash -c` entrypoint a remote action runs for one task
//! - Deployer: fingerprint-gated action deployment
//! - Launcher: deploy, trigger, bind the activation to a job
//! - Job: status state machine with 404-aware backoff
//! - Wait: adaptive polling, log tailing, failure classification
//! - Lifecycle: explicit step hooks and the remote step decorator
//! - Step: task-level glue used by the `whisk step` command

pub mod backoff;
pub mod command;
pub mod config;
pub mod deployer;
pub mod environment;
pub mod error;
pub mod job;
pub mod launcher;
pub mod lifecycle;
pub mod logs;
pub mod package;
pub mod step;
pub mod wait;

#[cfg(test)]
mod testing;

pub use backoff::Backoff;
pub use command::{CommandBuilder, TaskIds};
pub use config::Config;
pub use deployer::ActionDeployer;
pub use environment::{Environment, StandardEnvironment};
pub use error::{ConfigurationError, JobError, LaunchError, StepError, TaskFailure, WaitError};
pub use job::{JobStatus, RunningJob};
pub use launcher::JobLauncher;
pub use logs::{FileLogTailer, LogTailer, NullLogTailer};
pub use step::{StepExecution, StepRequest};
pub use wait::{EchoSink, Stream, WaitLoop};
