//! Step lifecycle hooks
//!
//! An orchestrator drives every hook explicitly, in this order:
//! 1. `on_step_init` once per step, before any task is created
//! 2. `on_runtime_task_created` for each task
//! 3. `on_step_cli_rewrite` just before the task's command line is executed
//! 4. `on_task_pre_step` inside the task process, before user code runs
//! 5. `on_task_finished` inside the task process, after user code ran
//!
//! Every hook defaults to a no-op. [`RemoteStepDecorator`] implements the
//! hooks that route a step to the serverless platform.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use whisk_core::domain::datastore::{DatastoreKind, PackageRef};

use crate::command::quote;
use crate::error::{ConfigurationError, StepError};
use crate::package::{PackageCache, PackageStore};

/// Value of `METAFLOW_RUNTIME_ENVIRONMENT` inside a remote task
pub const RUNTIME_ENVIRONMENT: &str = "whisk";

/// Shortest run-time limit accepted for a remote step
pub const MIN_RUN_TIME_LIMIT: Duration = Duration::from_secs(60);

/// Executors that cannot be combined with remote execution
const CONFLICTING_EXECUTORS: [&str; 2] = ["batch", "kubernetes"];

/// Another decorator attached to the same step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoratorInfo {
    pub name: String,
    pub is_parallel: bool,
}

impl DecoratorInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_parallel: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepInit {
    pub flow_name: String,
    pub step_name: String,
    pub datastore: DatastoreKind,
    pub decorators: Vec<DecoratorInfo>,
    pub run_time_limit: Duration,
}

#[derive(Debug, Clone)]
pub struct TaskCreated {
    pub run_id: String,
    pub task_id: String,
    /// Cloned tasks reuse the outputs of an earlier run and never execute
    pub is_cloned: bool,
}

#[derive(Debug, Clone)]
pub struct TaskPreStep {
    pub run_id: String,
    pub step_name: String,
    pub task_id: String,
    /// `METAFLOW_RUNTIME_ENVIRONMENT` of the task process
    pub runtime_environment: Option<String>,
}

/// Bookkeeping metadata registered for a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub field: String,
    pub value: String,
}

/// Command line of one task
///
/// Renders as `entrypoint.. commands.. command_args.. --key value..`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepCli {
    pub entrypoint: Vec<String>,
    pub commands: Vec<String>,
    pub command_args: Vec<String>,
    pub command_options: BTreeMap<String, String>,
}

impl StepCli {
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = self
            .entrypoint
            .iter()
            .chain(&self.commands)
            .chain(&self.command_args)
            .cloned()
            .collect();
        for (key, value) in &self.command_options {
            args.push(format!("--{}", key));
            args.push(value.clone());
        }
        args
    }
}

#[async_trait]
pub trait StepLifecycle: Send + Sync {
    async fn on_step_init(&mut self, _step: &StepInit) -> Result<(), StepError> {
        Ok(())
    }

    async fn on_runtime_task_created(&mut self, _task: &TaskCreated) -> Result<(), StepError> {
        Ok(())
    }

    fn on_step_cli_rewrite(&self, _cli: &mut StepCli, _retry_count: u32, _max_user_code_retries: u32) {}

    fn on_task_pre_step(&self, _task: &TaskPreStep) -> Vec<MetadataEntry> {
        Vec::new()
    }

    fn on_task_finished(&self, _step_name: &str, _is_task_ok: bool) {}
}

/// Runs the scheduling-side hooks of every lifecycle for one task
pub async fn prepare_task(
    hooks: &mut [Box<dyn StepLifecycle>],
    step: &StepInit,
    task: &TaskCreated,
    cli: &mut StepCli,
    retry_count: u32,
    max_user_code_retries: u32,
) -> Result<(), StepError> {
    for hook in hooks.iter_mut() {
        hook.on_step_init(step).await?;
    }
    for hook in hooks.iter_mut() {
        hook.on_runtime_task_created(task).await?;
    }
    for hook in hooks.iter() {
        hook.on_step_cli_rewrite(cli, retry_count, max_user_code_retries);
    }
    Ok(())
}

/// Attributes of the remote execution decorator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteAttributes {
    pub action: Option<String>,
    pub namespace: Option<String>,
    pub memory_mb: Option<u32>,
    pub timeout_ms: Option<u64>,
}

/// Routes a step to the serverless platform
pub struct RemoteStepDecorator {
    attributes: RemoteAttributes,
    default_namespace: String,
    store: Arc<dyn PackageStore>,
    packages: Arc<PackageCache>,
    package_blob: Arc<Vec<u8>>,
    step: Option<StepInit>,
    task: Option<TaskCreated>,
    package: Option<PackageRef>,
}

impl RemoteStepDecorator {
    pub fn new(
        attributes: RemoteAttributes,
        default_namespace: impl Into<String>,
        store: Arc<dyn PackageStore>,
        packages: Arc<PackageCache>,
        package_blob: Arc<Vec<u8>>,
    ) -> Self {
        Self {
            attributes,
            default_namespace: default_namespace.into(),
            store,
            packages,
            package_blob,
            step: None,
            task: None,
            package: None,
        }
    }

    pub fn attributes(&self) -> &RemoteAttributes {
        &self.attributes
    }

    /// Package saved for the current run, once a task was created
    pub fn package(&self) -> Option<&PackageRef> {
        self.package.as_ref()
    }

    fn action(&self) -> Option<&str> {
        self.attributes.action.as_deref().filter(|a| !a.is_empty())
    }
}

#[async_trait]
impl StepLifecycle for RemoteStepDecorator {
    async fn on_step_init(&mut self, step: &StepInit) -> Result<(), StepError> {
        if !step.datastore.is_remote_capable() {
            return Err(ConfigurationError::DatastoreNotRemote(step.datastore).into());
        }

        if self.action().is_none() {
            return Err(ConfigurationError::MissingAction(step.step_name.clone()).into());
        }

        if self.attributes.namespace.as_deref().is_none_or(str::is_empty) {
            self.attributes.namespace = Some(self.default_namespace.clone());
        }

        if let Some(other) = step
            .decorators
            .iter()
            .find(|d| CONFLICTING_EXECUTORS.contains(&d.name.as_str()))
        {
            return Err(ConfigurationError::ConflictingExecutor {
                step: step.step_name.clone(),
                other: other.name.clone(),
            }
            .into());
        }

        if step.decorators.iter().any(|d| d.is_parallel) {
            return Err(ConfigurationError::ParallelStep(step.step_name.clone()).into());
        }

        if step.run_time_limit < MIN_RUN_TIME_LIMIT {
            return Err(ConfigurationError::RunTimeLimitTooShort {
                step: step.step_name.clone(),
                seconds: step.run_time_limit.as_secs(),
            }
            .into());
        }

        self.step = Some(step.clone());
        debug!(
            "Step {} will run remotely as action {:?}",
            step.step_name, self.attributes.action
        );
        Ok(())
    }

    async fn on_runtime_task_created(&mut self, task: &TaskCreated) -> Result<(), StepError> {
        self.task = Some(task.clone());
        if task.is_cloned {
            return Ok(());
        }
        let blob = Arc::clone(&self.package_blob);
        let package = self
            .packages
            .get_or_save(&task.run_id, self.store.as_ref(), || blob.to_vec())
            .await?;
        self.package = Some(package);
        Ok(())
    }

    fn on_step_cli_rewrite(&self, cli: &mut StepCli, retry_count: u32, max_user_code_retries: u32) {
        // Past the user-code retries a fallback runs locally
        if retry_count > max_user_code_retries {
            return;
        }
        let (Some(step), Some(task), Some(package), Some(action)) =
            (&self.step, &self.task, &self.package, self.action())
        else {
            debug!("Task not prepared for remote execution, leaving the command line as is");
            return;
        };

        // The original command line runs inside the action
        let step_command = cli
            .to_args()
            .iter()
            .map(|arg| quote(arg))
            .collect::<Vec<_>>()
            .join(" ");

        let mut options = BTreeMap::new();
        options.insert("action".to_string(), action.to_string());
        options.insert("flow-name".to_string(), step.flow_name.clone());
        options.insert("run-id".to_string(), task.run_id.clone());
        options.insert("task-id".to_string(), task.task_id.clone());
        options.insert("retry-count".to_string(), retry_count.to_string());
        options.insert("datastore".to_string(), step.datastore.to_string());
        options.insert("run-time-limit".to_string(), step.run_time_limit.as_secs().to_string());
        options.insert("step-command".to_string(), step_command);
        if let Some(namespace) = &self.attributes.namespace {
            options.insert("nuv-namespace".to_string(), namespace.clone());
        }
        if let Some(memory) = self.attributes.memory_mb {
            options.insert("memory".to_string(), memory.to_string());
        }
        if let Some(timeout) = self.attributes.timeout_ms {
            options.insert("timeout".to_string(), timeout.to_string());
        }

        *cli = StepCli {
            entrypoint: vec!["whisk".to_string()],
            commands: vec!["step".to_string()],
            command_args: vec![step.step_name.clone(), package.sha.clone(), package.url.clone()],
            command_options: options,
        };
    }

    fn on_task_pre_step(&self, task: &TaskPreStep) -> Vec<MetadataEntry> {
        if task.runtime_environment.as_deref() != Some(RUNTIME_ENVIRONMENT) {
            return Vec::new();
        }
        let Some(action) = self.action() else {
            return Vec::new();
        };
        info!(
            "Task {}/{}/{} running in action {}",
            task.run_id, task.step_name, task.task_id, action
        );
        vec![MetadataEntry {
            field: "whisk-action-name".to_string(),
            value: action.to_string(),
        }]
    }
}
