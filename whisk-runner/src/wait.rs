//! Wait loop
//!
//! Drives a [`RunningJob`] to completion: polls while the activation is
//! waiting with a sigmoid-shaped delay, tails logs while it runs, drains the
//! logs once it is done and only then reports the outcome.
//!
//! Only `Done` ends the loop. A job that drops back from running to waiting
//! is polled again, and a done job without both a `success` status and an
//! exit code is a task failure.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{TaskFailure, WaitError};
use crate::job::{JobStatus, RunningJob};
use crate::logs::LogTailer;

/// Interval between repeated "Task is starting" notices
pub const STARTING_NOTICE_INTERVAL: Duration = Duration::from_secs(30);

/// Output stream a message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// User-facing sink for progress notices and task log lines
pub trait EchoSink: Send + Sync {
    fn echo(&self, message: &str, stream: Stream, job_id: &str);
}

/// Delay before the next poll of a waiting job
///
/// Close to half a second for the first ten minutes, about 15.5s at fifteen
/// minutes, then approaching 30.5s. Non-decreasing in `elapsed`.
pub fn update_delay(elapsed: Duration) -> Duration {
    let secs = elapsed.as_secs_f64();
    Duration::from_secs_f64(0.5 + 30.0 / (1.0 + (-0.01 * secs + 9.0).exp()))
}

pub struct WaitLoop<'a> {
    echo: &'a dyn EchoSink,
    log_interval: Duration,
}

impl<'a> WaitLoop<'a> {
    pub fn new(echo: &'a dyn EchoSink) -> Self {
        Self {
            echo,
            log_interval: Duration::from_secs(1),
        }
    }

    /// Pause between log tail rounds while the job runs
    pub fn with_log_interval(mut self, log_interval: Duration) -> Self {
        self.log_interval = log_interval;
        self
    }

    /// Waits for `job` and returns its exit code
    ///
    /// # Errors
    /// [`WaitError::Job`] when the activation cannot be queried, and
    /// [`WaitError::Task`] when the task finished unsuccessfully.
    pub async fn wait(
        &self,
        job: &mut RunningJob,
        stdout: &mut dyn LogTailer,
        stderr: &mut dyn LogTailer,
    ) -> Result<i32, WaitError> {
        let started = Instant::now();
        let mut last_status = None;
        let mut last_notice: Option<Instant> = None;

        loop {
            let status = job.status().await?;
            match status {
                JobStatus::Done => break,
                JobStatus::Waiting => {
                    let now = Instant::now();
                    let due = last_notice.is_none_or(|at| now - at >= STARTING_NOTICE_INTERVAL);
                    if last_status != Some(status) || due {
                        self.echo.echo(
                            &format!("Task is starting (status {})...", status),
                            Stream::Stderr,
                            job.id(),
                        );
                        last_notice = Some(now);
                    }
                    last_status = Some(status);

                    let delay = update_delay(started.elapsed());
                    debug!("Activation {} waiting, next poll in {:?}", job.id(), delay);
                    tokio::time::sleep(delay).await;
                }
                JobStatus::Running => {
                    last_status = Some(status);
                    self.forward(stdout, Stream::Stdout, job.id(), false).await;
                    self.forward(stderr, Stream::Stderr, job.id(), false).await;
                    tokio::time::sleep(self.log_interval).await;
                }
            }
        }

        self.forward(stdout, Stream::Stdout, job.id(), true).await;
        self.forward(stderr, Stream::Stderr, job.id(), true).await;

        match job.exit_code() {
            Some(exit_code) if job.has_succeeded() => {
                self.echo.echo(
                    &format!("Task finished with exit code {}.", exit_code),
                    Stream::Stderr,
                    job.id(),
                );
                Ok(exit_code)
            }
            exit_code => Err(TaskFailure::classify(exit_code, job.reason()).into()),
        }
    }

    async fn forward(&self, tailer: &mut dyn LogTailer, stream: Stream, job_id: &str, drain: bool) {
        let lines = if drain {
            tailer.drain().await
        } else {
            tailer.tail().await
        };

        match lines {
            Ok(lines) => {
                for line in lines {
                    self.echo.echo(&line, stream, job_id);
                }
            }
            Err(e) => warn!("Failed to read {:?} logs of {}: {}", stream, job_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::Backoff;
    use crate::logs::FileLogTailer;
    use crate::testing::{FakeActionApi, MemoryLogTailer, RecordingEcho, activation};
    use std::sync::Arc;
    use whisk_core::domain::activation::ActivationHandle;

    fn job(api: &Arc<FakeActionApi>) -> RunningJob {
        RunningJob::new(
            api.clone(),
            ActivationHandle {
                activation_id: "abc123".to_string(),
                namespace: "nuvolaris".to_string(),
                action_name: "train".to_string(),
            },
            Backoff::new(Duration::from_secs(60)),
        )
    }

    #[test]
    fn test_update_delay_schedule() {
        let at = |secs| update_delay(Duration::from_secs(secs)).as_secs_f64();

        assert!(at(0) < 0.6);
        assert!(at(300) < 2.0);
        assert!((at(900) - 15.5).abs() < 0.01);
        assert!(at(1500) > 29.0);
        assert!(at(100_000) <= 30.5);

        let mut previous = 0.0;
        for secs in (0..4000).step_by(10) {
            let delay = at(secs);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_reports_exit_code_after_logs() {
        let api = Arc::new(FakeActionApi::new());
        api.push_activation(Ok(activation(None, None)));
        api.push_activation(Ok(activation(Some("running"), None)));
        api.push_activation(Ok(activation(Some("success"), Some(0))));
        let echo = RecordingEcho::default();
        let mut stdout = MemoryLogTailer::new(["epoch 1", "epoch 2"]);
        let mut stderr = MemoryLogTailer::new(["warning: slow disk"]);

        let mut job = job(&api);
        let code = WaitLoop::new(&echo)
            .wait(&mut job, &mut stdout, &mut stderr)
            .await
            .unwrap();

        assert_eq!(code, 0);
        let messages = echo.messages();
        assert_eq!(
            messages.first().map(|m| m.0.as_str()),
            Some("Task is starting (status waiting)...")
        );
        assert_eq!(
            messages.last().map(|m| m.0.as_str()),
            Some("Task finished with exit code 0.")
        );
        assert!(messages.iter().any(|m| m.0 == "epoch 2" && m.1 == Stream::Stdout));
        assert!(messages.iter().any(|m| m.0 == "warning: slow disk" && m.1 == Stream::Stderr));
        assert!(messages.iter().all(|m| m.2 == "abc123"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_starting_notice_is_throttled() {
        let api = Arc::new(FakeActionApi::new());
        for _ in 0..20 {
            api.push_activation(Ok(activation(None, None)));
        }
        api.push_activation(Ok(activation(Some("success"), Some(0))));
        let echo = RecordingEcho::default();

        let mut job = job(&api);
        WaitLoop::new(&echo)
            .wait(&mut job, &mut MemoryLogTailer::empty(), &mut MemoryLogTailer::empty())
            .await
            .unwrap();

        // 20 polls roughly half a second apart fit in one notice window
        let notices = echo
            .messages()
            .iter()
            .filter(|m| m.0.starts_with("Task is starting"))
            .count();
        assert_eq!(notices, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_classified() {
        for (code, expected) in [
            (139, "Task failed with a segmentation fault."),
            (137, "Task ran out of memory."),
            (134, "Task was aborted:"),
            (2, "Task crashed (exit code 2)."),
        ] {
            let api = Arc::new(FakeActionApi::new());
            api.push_activation(Ok(activation(Some("failed"), Some(code))));
            let echo = RecordingEcho::default();

            let mut job = job(&api);
            let err = WaitLoop::new(&echo)
                .wait(&mut job, &mut MemoryLogTailer::empty(), &mut MemoryLogTailer::empty())
                .await
                .unwrap_err();

            let message = err.to_string();
            assert!(message.starts_with(expected), "{}", message);
            assert!(message.ends_with(crate::error::RETRY_HINT));
            assert!(matches!(err, WaitError::Task(_)));
            assert!(!echo.messages().iter().any(|m| m.0.starts_with("Task finished")));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_then_waiting_keeps_polling() {
        let api = Arc::new(FakeActionApi::new());
        api.push_activation(Ok(activation(Some("running"), None)));
        api.push_activation(Ok(activation(None, None)));
        api.push_activation(Ok(activation(Some("failed"), Some(1))));
        let echo = RecordingEcho::default();

        let mut job = job(&api);
        let err = WaitLoop::new(&echo)
            .wait(&mut job, &mut MemoryLogTailer::empty(), &mut MemoryLogTailer::empty())
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::Task(TaskFailure::Crashed { exit_code: 1, .. })));
        assert_eq!(api.activation_fetches(), 3);
        assert!(!echo.messages().iter().any(|m| m.0.starts_with("Task finished")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_without_exit_code_is_a_failure() {
        let api = Arc::new(FakeActionApi::new());
        api.push_activation(Ok(activation(Some("success"), None)));
        let echo = RecordingEcho::default();

        let mut job = job(&api);
        let err = WaitLoop::new(&echo)
            .wait(&mut job, &mut MemoryLogTailer::empty(), &mut MemoryLogTailer::empty())
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::Task(TaskFailure::Unknown { .. })));
        assert!(!echo.messages().iter().any(|m| m.0.starts_with("Task finished")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_ended_by_platform_fails() {
        let api = Arc::new(FakeActionApi::new());
        let mut detail = activation(None, None);
        detail.response.success = Some(false);
        detail.response.status = Some("application error".to_string());
        api.push_activation(Ok(detail));
        let echo = RecordingEcho::default();

        let mut job = job(&api);
        let err = WaitLoop::new(&echo)
            .wait(&mut job, &mut MemoryLogTailer::empty(), &mut MemoryLogTailer::empty())
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("application error."), "{}", message);
        assert!(message.ends_with(crate::error::RETRY_HINT));
        assert_eq!(api.activation_fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unterminated_log_line_precedes_exit_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stdout.log");
        std::fs::write(&path, "epoch 1\nfinal summary").unwrap();

        let api = Arc::new(FakeActionApi::new());
        api.push_activation(Ok(activation(Some("running"), None)));
        api.push_activation(Ok(activation(Some("success"), Some(0))));
        let echo = RecordingEcho::default();

        let mut job = job(&api);
        let code = WaitLoop::new(&echo)
            .wait(&mut job, &mut FileLogTailer::new(&path), &mut MemoryLogTailer::empty())
            .await
            .unwrap();
        assert_eq!(code, 0);

        let lines: Vec<String> = echo.messages().into_iter().map(|m| m.0).collect();
        let position = |text: &str| lines.iter().position(|l| l == text);
        let epoch = position("epoch 1").unwrap();
        let summary = position("final summary").unwrap();
        let finished = position("Task finished with exit code 0.").unwrap();
        assert!(epoch < summary);
        assert!(summary < finished);
        assert_eq!(finished, lines.len() - 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_errors_propagate() {
        let api = Arc::new(FakeActionApi::new());
        api.push_activation(Err(whisk_client::ClientError::api_error(500, "boom")));
        let echo = RecordingEcho::default();

        let mut job = job(&api);
        let err = WaitLoop::new(&echo)
            .wait(&mut job, &mut MemoryLogTailer::empty(), &mut MemoryLogTailer::empty())
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::Job(_)));
    }
}
