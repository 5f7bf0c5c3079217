//! Running job state machine
//!
//! Wraps one activation and caches the last fetched result. Status is derived
//! from the cached result:
//! - no result, or a result without a process status: `Waiting`
//! - process status `running`: `Running`
//! - any other process status: `Done`
//!
//! An activation the platform ended itself (action timeout, container out of
//! memory) carries no process status; it is read as a `failed` process with
//! the platform's reason as stderr, so it is `Done` as well.
//!
//! `Done` is sticky; once reached no further requests are made.
//!
//! The platform answers 404 for an activation that has not completed yet as
//! well as for an id it does not know. Each refresh retries 404s with the
//! configured [`Backoff`]; only when its deadline runs out is the 404 reported,
//! as [`JobError::ActivationNotFound`]. A task that legitimately runs longer
//! than the deadline is indistinguishable from a bad id.
//!
//! The backoff gives up as soon as the *next* delay would cross the deadline,
//! not when the deadline itself passes. With the default 60s deadline a
//! continuous run of 404s is reported after roughly 31 to 36 seconds (the
//! 1+2+4+8+16s steps plus jitter); the following 32s step would overshoot.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use whisk_client::{ActionApi, ClientError};
use whisk_core::domain::activation::{ActivationHandle, ActivationResult};

use crate::backoff::{Backoff, RetryError};
use crate::error::JobError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Waiting,
    Running,
    Done,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
        };
        write!(f, "{}", s)
    }
}

/// A launched activation being observed
pub struct RunningJob {
    api: Arc<dyn ActionApi>,
    handle: ActivationHandle,
    result: Option<ActivationResult>,
    backoff: Backoff,
}

impl RunningJob {
    /// Binds to `handle` without fetching anything
    pub fn new(api: Arc<dyn ActionApi>, handle: ActivationHandle, backoff: Backoff) -> Self {
        Self {
            api,
            handle,
            result: None,
            backoff,
        }
    }

    /// Activation id
    pub fn id(&self) -> &str {
        &self.handle.activation_id
    }

    pub fn handle(&self) -> &ActivationHandle {
        &self.handle
    }

    /// Last fetched result
    pub fn result(&self) -> Option<&ActivationResult> {
        self.result.as_ref()
    }

    /// Status derived from the cached result, without a request
    pub fn cached_status(&self) -> JobStatus {
        match &self.result {
            Some(result) if result.is_terminal() => JobStatus::Done,
            Some(result) if result.is_running() => JobStatus::Running,
            _ => JobStatus::Waiting,
        }
    }

    /// Fetches the activation unless already done
    pub async fn refresh(&mut self) -> Result<JobStatus, JobError> {
        if self.cached_status() == JobStatus::Done {
            return Ok(JobStatus::Done);
        }

        let api = &self.api;
        let namespace = self.handle.namespace.as_str();
        let activation_id = self.handle.activation_id.as_str();

        let detail = self
            .backoff
            .retry(
                move || api.get_activation_detail(namespace, activation_id),
                ClientError::is_not_found,
            )
            .await
            .map_err(|e| match e {
                RetryError::Permanent(source) => JobError::Poll {
                    activation_id: activation_id.to_string(),
                    source,
                },
                RetryError::Exhausted {
                    attempts, waited, ..
                } => {
                    warn!(
                        "Activation {} still not found after {} attempts over {:?}",
                        activation_id, attempts, waited
                    );
                    JobError::ActivationNotFound {
                        activation_id: activation_id.to_string(),
                        waited,
                    }
                }
            })?;

        self.result = Some(detail.response.into_result());
        let status = self.cached_status();
        debug!("Activation {} is {}", self.id(), status);
        Ok(status)
    }

    /// Current status, refreshing when not done
    pub async fn status(&mut self) -> Result<JobStatus, JobError> {
        self.refresh().await
    }

    pub async fn is_waiting(&mut self) -> Result<bool, JobError> {
        Ok(self.status().await? == JobStatus::Waiting)
    }

    pub async fn is_running(&mut self) -> Result<bool, JobError> {
        Ok(self.status().await? == JobStatus::Running)
    }

    pub async fn is_done(&mut self) -> Result<bool, JobError> {
        Ok(self.status().await? == JobStatus::Done)
    }

    /// True only once done with a `success` process status
    pub fn has_succeeded(&self) -> bool {
        self.done_result().is_some_and(ActivationResult::is_success)
    }

    /// True only once done with any other process status
    pub fn has_failed(&self) -> bool {
        self.done_result().is_some_and(|r| !r.is_success())
    }

    /// Exit code reported by the process, once done
    pub fn exit_code(&self) -> Option<i32> {
        self.done_result().and_then(|r| r.return_code)
    }

    /// Last line of the captured diagnostic output, once done
    pub fn reason(&self) -> Option<String> {
        let text = self.done_result()?.stderr_text()?;
        text.lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }

    /// Best-effort cancellation
    ///
    /// The platform exposes no way to cancel an activation, so this only
    /// records the request; the action runs until it finishes or its own
    /// timeout fires.
    pub fn kill(&self) -> Result<(), JobError> {
        if self.cached_status() != JobStatus::Done {
            info!(
                "Activation {} cannot be cancelled; it stops at the action timeout",
                self.id()
            );
        }
        Ok(())
    }

    fn done_result(&self) -> Option<&ActivationResult> {
        self.result.as_ref().filter(|r| r.is_terminal())
    }
}

impl fmt::Debug for RunningJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningJob")
            .field("handle", &self.handle)
            .field("result", &self.result)
            .finish()
    }
}

impl Drop for RunningJob {
    fn drop(&mut self) {
        if let Err(e) = self.kill() {
            warn!("Failed to kill activation {} on drop: {}", self.id(), e);
        }
    }
}
