//! Entrypoint command builder
//!
//! Composes the `bash -c` script a remote action runs for one task:
//! 1. create the local log directory
//! 2. export the structured-logging variables
//! 3. fetch the code package with retries and unpack it
//! 4. run the bootstrap and user step commands with output captured
//! 5. persist the logs and exit with the step's exit code
//!
//! The whole script is preceded by an optional init script taken from
//! `METAFLOW_INIT_SCRIPT` on the remote side. Building the command performs no
//! I/O.

use std::sync::Arc;
use std::time::Duration;
use whisk_core::domain::datastore::DatastoreKind;

use crate::environment::Environment;
use crate::error::ConfigurationError;

/// Structured logs are written below `$PWD/.logs/`
pub const LOGS_DIR: &str = "$PWD/.logs";
pub const STDOUT_PATH: &str = "$PWD/.logs/mflog_stdout";
pub const STDERR_PATH: &str = "$PWD/.logs/mflog_stderr";

/// Number of code package download attempts
pub const DOWNLOAD_ATTEMPTS: u32 = 6;

/// Pause between code package download attempts
pub const DOWNLOAD_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Log helper available to every later part of the script
const LOG_FN: &str = "mflog() { echo \"[whisk] $*\"; \
     if [ -n \"$MFLOG_STDOUT\" ]; then echo \"[whisk] $*\" >> \"$MFLOG_STDOUT\"; fi; return 0; }";

/// Identifiers of the task a command is built for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskIds {
    pub flow_name: String,
    pub run_id: String,
    pub step_name: String,
    pub task_id: String,
    pub attempt: u32,
}

impl TaskIds {
    pub fn pathspec(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.flow_name, self.run_id, self.step_name, self.task_id
        )
    }
}

/// Builds the remote entrypoint for a task
#[derive(Clone)]
pub struct CommandBuilder {
    datastore: DatastoreKind,
    environment: Arc<dyn Environment>,
    download_attempts: u32,
    retry_delay: Duration,
}

impl CommandBuilder {
    pub fn new(datastore: DatastoreKind, environment: Arc<dyn Environment>) -> Self {
        Self {
            datastore,
            environment,
            download_attempts: DOWNLOAD_ATTEMPTS,
            retry_delay: DOWNLOAD_RETRY_DELAY,
        }
    }

    /// Builds the argv for `task`, fetching the package at `package_url`
    ///
    /// # Errors
    /// [`ConfigurationError`] when the datastore has no download command.
    pub fn build(
        &self,
        task: &TaskIds,
        package_url: &str,
        step_cmds: &[String],
    ) -> Result<Vec<String>, ConfigurationError> {
        let log_env = self.log_env(task);
        let init_expr = self.package_commands(package_url)?.join(" && ");

        let mut step = self
            .environment
            .bootstrap_commands(&task.step_name, self.datastore);
        step.extend(step_cmds.iter().cloned());
        let step_expr = capture_logs(&step.join(" && "));

        // `true` keeps the script valid for images whose entrypoint is `eval $@`
        let mut script = format!(
            "true && mkdir -p {} && {} && {} && {}; ",
            LOGS_DIR, log_env, init_expr, step_expr
        );
        // Runs whatever the step's outcome; the entrypoint exits with the step's code.
        // If the step is OOM-killed this never runs and the tail of the logs is lost.
        script.push_str(&format!(
            "c=$?; {}; exit $c",
            self.environment.save_logs_command()
        ));

        let script = format!(
            "${{METAFLOW_INIT_SCRIPT:+eval \"${{METAFLOW_INIT_SCRIPT}}\"}} && {}",
            script
        );

        Ok(vec!["bash".to_string(), "-c".to_string(), script])
    }

    fn log_env(&self, task: &TaskIds) -> String {
        format!(
            "export MF_PATHSPEC={} MF_DATASTORE={} MF_ATTEMPT={} MFLOG_STDOUT={} MFLOG_STDERR={}",
            quote(&task.pathspec()),
            self.datastore,
            task.attempt,
            STDOUT_PATH,
            STDERR_PATH
        )
    }

    fn package_commands(&self, package_url: &str) -> Result<Vec<String>, ConfigurationError> {
        let download = download_command(self.datastore, package_url, self.environment.python())?;

        Ok(vec![
            LOG_FN.to_string(),
            "mflog 'Setting up task environment.'".to_string(),
            "mkdir metaflow".to_string(),
            "cd metaflow".to_string(),
            // mutes the local datastore creation log
            "mkdir .metaflow".to_string(),
            fetch_with_retry(
                &download,
                package_url,
                self.download_attempts,
                self.retry_delay,
            ),
            "TAR_OPTIONS='--warning=no-timestamp' tar xf job.tar".to_string(),
            "mflog 'Task is starting.'".to_string(),
        ])
    }
}

/// Shell command that downloads the code package to `job.tar`
///
/// Uses the cloud CLI tools available in the action image since the workflow
/// runtime itself is only present after the package is unpacked.
pub fn download_command(
    datastore: DatastoreKind,
    package_url: &str,
    python: &str,
) -> Result<String, ConfigurationError> {
    match datastore {
        DatastoreKind::S3 => Ok(format!(
            "{} -m awscli ${{METAFLOW_S3_ENDPOINT_URL:+--endpoint-url=\"${{METAFLOW_S3_ENDPOINT_URL}}\"}} \
             s3 cp {} job.tar >/dev/null",
            python,
            quote(package_url)
        )),
        DatastoreKind::Azure => {
            let (container, blob) = parse_azure_path(package_url)?;
            Ok(format!(
                "download-azure-blob --blob-endpoint=${{METAFLOW_AZURE_STORAGE_BLOB_SERVICE_ENDPOINT%/}} \
                 --container={} --blob={} --output-file=job.tar",
                quote(container),
                quote(blob)
            ))
        }
        other => Err(ConfigurationError::UnsupportedDatastore(other)),
    }
}

/// Retry loop around `download`; exits the whole entrypoint after the last failure
pub(crate) fn fetch_with_retry(
    download: &str,
    package_url: &str,
    attempts: u32,
    delay: Duration,
) -> String {
    let failure = quote(&format!(
        "Failed to download code package from {} after {} tries. Exiting...",
        package_url, attempts
    ));
    format!(
        "{{ i=0; while [ $i -lt {n} ]; do mflog 'Downloading code package...'; \
         {download} && mflog 'Code package downloaded.' && break; \
         i=$((i+1)); if [ $i -lt {n} ]; then sleep {delay}; fi; done; \
         if [ $i -ge {n} ]; then mflog {failure}; exit 1; fi; }}",
        n = attempts,
        download = download,
        delay = delay.as_secs(),
        failure = failure
    )
}

/// Runs `cmd` in a subshell with stdout/stderr appended to the structured log files
fn capture_logs(cmd: &str) -> String {
    format!("({}) >>\"$MFLOG_STDOUT\" 2>>\"$MFLOG_STDERR\"", cmd)
}

/// Splits `container/blob/path` into its container and blob parts
fn parse_azure_path(path: &str) -> Result<(&str, &str), ConfigurationError> {
    let trimmed = path.strip_prefix("azure://").unwrap_or(path).trim_start_matches('/');
    match trimmed.split_once('/') {
        Some((container, blob)) if !container.is_empty() && !blob.is_empty() => {
            Ok((container, blob))
        }
        _ => Err(ConfigurationError::InvalidAzurePath(path.to_string())),
    }
}

/// Single-quotes `value` for the shell
pub(crate) fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
