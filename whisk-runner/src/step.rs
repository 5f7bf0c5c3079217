//! Remote step execution
//!
//! Task-level glue used by `whisk step`: builds the entrypoint and the
//! invocation for one task, launches it and waits for the outcome.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use whisk_client::ActionApi;
use whisk_core::domain::action::ActionSpec;
use whisk_core::domain::datastore::{DatastoreKind, PackageRef};
use whisk_core::dto::invocation::InvocationRequest;

use crate::command::{CommandBuilder, TaskIds};
use crate::config::Config;
use crate::deployer::ActionDeployer;
use crate::environment::Environment;
use crate::error::{ConfigurationError, StepError};
use crate::launcher::JobLauncher;
use crate::lifecycle::RUNTIME_ENVIRONMENT;
use crate::logs::LogTailer;
use crate::wait::{EchoSink, Stream, WaitLoop};

/// Largest value stored in a single input-paths variable
pub const INPUT_PATHS_CHUNK: usize = 30 * 1024;

/// Everything needed to run one task remotely
#[derive(Debug, Clone)]
pub struct StepRequest {
    pub task: TaskIds,
    pub user: String,
    pub package: PackageRef,
    pub datastore: DatastoreKind,
    pub action: String,
    pub namespace: Option<String>,
    pub memory_mb: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub run_time_limit: Option<Duration>,
    /// Shell command line of the user step
    pub step_command: String,
    /// Appended to the step command as `--input-paths`
    pub input_paths: Option<String>,
    pub env: BTreeMap<String, String>,
    pub retry_count: u32,
    pub minutes_between_retries: u32,
}

/// Splits `input_paths` into `METAFLOW_INPUT_PATHS_<n>` variables
///
/// Returns the variables and the shell expression that reassembles them.
pub fn split_input_paths(input_paths: &str) -> (Vec<(String, String)>, String) {
    let mut vars = Vec::new();
    let mut rest = input_paths;

    while !rest.is_empty() {
        let mut end = rest.len().min(INPUT_PATHS_CHUNK);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (chunk, tail) = rest.split_at(end);
        vars.push((format!("METAFLOW_INPUT_PATHS_{}", vars.len()), chunk.to_string()));
        rest = tail;
    }

    let expr: String = vars.iter().map(|(name, _)| format!("${{{}}}", name)).collect();
    (vars, expr)
}

pub struct StepExecution {
    config: Config,
    api: Arc<dyn ActionApi>,
    environment: Arc<dyn Environment>,
}

impl StepExecution {
    pub fn new(config: Config, api: Arc<dyn ActionApi>, environment: Arc<dyn Environment>) -> Self {
        Self {
            config,
            api,
            environment,
        }
    }

    pub fn action_spec(&self, request: &StepRequest) -> ActionSpec {
        let timeout_ms = request
            .timeout_ms
            .or_else(|| {
                request
                    .run_time_limit
                    .map(|l| u64::try_from(l.as_millis()).unwrap_or(u64::MAX))
            })
            .unwrap_or(self.config.timeout_ms);

        ActionSpec::new(
            &request.action,
            self.namespace(request),
            request.memory_mb.unwrap_or(self.config.memory_mb),
            timeout_ms,
            crate::deployer::ACTION_TEMPLATE,
        )
    }

    /// Invocation carrying the entrypoint, forwarded settings and bookkeeping tags
    pub fn invocation(&self, request: &StepRequest) -> Result<InvocationRequest, ConfigurationError> {
        let mut step_command = request.step_command.clone();
        let mut input_vars = Vec::new();
        if let Some(paths) = request.input_paths.as_deref().filter(|p| !p.is_empty()) {
            let (vars, expr) = split_input_paths(paths);
            step_command.push_str(&format!(" --input-paths={}", expr));
            input_vars = vars;
        }

        let command = CommandBuilder::new(request.datastore, Arc::clone(&self.environment)).build(
            &request.task,
            &request.package.url,
            &[step_command],
        )?;

        let task = &request.task;
        let mut invocation = InvocationRequest::new(&request.action, self.namespace(request), command)
            .environment_variable("METAFLOW_CODE_SHA", Some(&request.package.sha))
            .environment_variable("METAFLOW_CODE_URL", Some(&request.package.url))
            .environment_variable("METAFLOW_CODE_DS", Some(request.datastore.as_str()))
            .environment_variable("METAFLOW_USER", Some(&request.user))
            .environment_variable("METAFLOW_DEFAULT_DATASTORE", Some(request.datastore.as_str()))
            .environment_variable("METAFLOW_RUNTIME_ENVIRONMENT", Some(RUNTIME_ENVIRONMENT))
            .environment_variable("METAFLOW_SERVICE_URL", self.config.service_url.as_deref())
            .environment_variable("METAFLOW_S3_ENDPOINT_URL", self.config.s3_endpoint_url.as_deref())
            .environment_variable(
                "METAFLOW_AZURE_STORAGE_BLOB_SERVICE_ENDPOINT",
                self.config.azure_blob_endpoint.as_deref(),
            )
            .environment_variable("METAFLOW_INIT_SCRIPT", self.config.init_script.as_deref())
            .annotation("metaflow/user", &request.user)
            .annotation("metaflow/flow_name", &task.flow_name)
            .annotation("metaflow/run_id", &task.run_id)
            .annotation("metaflow/step_name", &task.step_name)
            .annotation("metaflow/task_id", &task.task_id)
            .annotation("metaflow/attempt", task.attempt.to_string())
            .label("app.kubernetes.io/name", "metaflow-task")
            .label("app.kubernetes.io/part-of", "metaflow");

        for (name, value) in request.env.iter().map(|(k, v)| (k.clone(), v.clone())).chain(input_vars) {
            invocation = invocation.environment_variable(name, Some(value));
        }

        Ok(invocation)
    }

    /// Launches the task and waits for it; returns the task's exit code
    pub async fn run(
        &self,
        request: &StepRequest,
        echo: &dyn EchoSink,
        stdout: &mut dyn LogTailer,
        stderr: &mut dyn LogTailer,
    ) -> Result<i32, StepError> {
        let invocation = self.invocation(request)?;
        let spec = self.action_spec(request);

        if request.retry_count > 0 {
            let minutes = request.minutes_between_retries;
            echo.echo(
                &format!("Sleeping {} minutes before the next retry", minutes),
                Stream::Stderr,
                &request.task.pathspec(),
            );
            tokio::time::sleep(Duration::from_secs(u64::from(minutes) * 60)).await;
        }

        let deployer = ActionDeployer::from_config(Arc::clone(&self.api), &self.config);
        let launcher = JobLauncher::new(Arc::clone(&self.api), deployer, self.backoff(request));

        info!("Launching task {} on action {}", request.task.pathspec(), spec.name);
        let mut job = launcher.launch(&spec, invocation).await?;

        let exit_code = WaitLoop::new(echo)
            .with_log_interval(self.config.log_tail_interval)
            .wait(&mut job, stdout, stderr)
            .await?;
        Ok(exit_code)
    }

    /// Activation fetch policy for this task
    ///
    /// The platform stops the action at its run-time limit, so a 404 within
    /// that limit may still mean "running".
    fn backoff(&self, request: &StepRequest) -> crate::backoff::Backoff {
        let backoff = self.config.backoff();
        match request.run_time_limit {
            Some(limit) if limit > backoff.deadline() => {
                crate::backoff::Backoff::new(limit).with_max_delay(self.config.max_backoff)
            }
            _ => backoff,
        }
    }

    fn namespace(&self, request: &StepRequest) -> String {
        request
            .namespace
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.config.namespace.clone())
    }
}
