//! Step command handler
//!
//! Launches one task as an activation, tails its logs and waits for it.

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::*;
use std::collections::BTreeMap;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use whisk_core::domain::datastore::{DatastoreKind, PackageRef};
use whisk_runner::{
    Config, FileLogTailer, LogTailer, NullLogTailer, StandardEnvironment, StepError,
    StepExecution, StepRequest, TaskIds, WaitError,
};

use crate::echo::TerminalEcho;

/// Exit code telling the workflow runtime not to retry the task
const EXIT_DISALLOW_RETRY: u8 = 202;

#[derive(Args)]
pub struct StepArgs {
    /// Step name
    step_name: String,

    /// SHA of the code package
    code_package_sha: String,

    /// Datastore URL of the code package
    code_package_url: String,

    /// Action to run the task in
    #[arg(long)]
    action: String,

    /// Namespace of the action
    #[arg(long = "nuv-namespace")]
    nuv_namespace: Option<String>,

    /// Memory in MB
    #[arg(long)]
    memory: Option<u32>,

    /// Action timeout in milliseconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Run-time limit of the step in seconds
    #[arg(long = "run-time-limit")]
    run_time_limit: Option<u64>,

    #[arg(long)]
    flow_name: String,

    #[arg(long)]
    run_id: String,

    #[arg(long)]
    task_id: String,

    #[arg(long, default_value_t = 0)]
    retry_count: u32,

    #[arg(long, default_value_t = 2)]
    minutes_between_retries: u32,

    /// Datastore holding the code package (s3 or azure)
    #[arg(long, default_value = "s3")]
    datastore: String,

    /// User the task runs on behalf of
    #[arg(long, env = "USER", default_value = "unknown")]
    user: String,

    /// Command line of the user step
    #[arg(long)]
    step_command: String,

    /// Input paths of the task
    #[arg(long)]
    input_paths: Option<String>,

    /// Extra environment variable for the task (KEY=VALUE)
    #[arg(long = "env", value_parser = parse_key_val)]
    env: Vec<(String, String)>,

    /// Locally readable copy of the task's stdout log
    #[arg(long)]
    stdout_log: Option<String>,

    /// Locally readable copy of the task's stderr log
    #[arg(long)]
    stderr_log: Option<String>,
}

fn parse_key_val(s: &str) -> Result<(String, String)> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => bail!("invalid KEY=VALUE: no `=` found in `{}`", s),
    }
}

fn tailer(path: Option<String>) -> Box<dyn LogTailer> {
    match path {
        Some(path) => Box::new(FileLogTailer::new(path)),
        None => Box::new(NullLogTailer),
    }
}

pub async fn handle_step(args: StepArgs, config: &Config) -> Result<ExitCode> {
    let datastore: DatastoreKind = args
        .datastore
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))
        .context("Invalid --datastore")?;

    let request = StepRequest {
        task: TaskIds {
            flow_name: args.flow_name,
            run_id: args.run_id,
            step_name: args.step_name,
            task_id: args.task_id,
            attempt: args.retry_count,
        },
        user: args.user,
        package: PackageRef {
            url: args.code_package_url,
            sha: args.code_package_sha,
        },
        datastore,
        action: args.action,
        namespace: args.nuv_namespace,
        memory_mb: args.memory,
        timeout_ms: args.timeout,
        run_time_limit: args.run_time_limit.map(Duration::from_secs),
        step_command: args.step_command,
        input_paths: args.input_paths,
        env: args.env.into_iter().collect::<BTreeMap<_, _>>(),
        retry_count: args.retry_count,
        minutes_between_retries: args.minutes_between_retries,
    };

    let execution = StepExecution::new(
        config.clone(),
        Arc::new(config.client()),
        Arc::new(StandardEnvironment::new()),
    );

    let mut stdout = tailer(args.stdout_log);
    let mut stderr = tailer(args.stderr_log);

    match execution
        .run(&request, &TerminalEcho, stdout.as_mut(), stderr.as_mut())
        .await
    {
        Ok(_) => Ok(ExitCode::SUCCESS),
        // The task ran and failed; the runtime may retry it
        Err(StepError::Wait(WaitError::Task(failure))) => {
            eprintln!("{} {}", "Task failed:".red().bold(), failure);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            error!("Step {} failed: {:#}", request.task.pathspec(), anyhow::Error::from(e));
            Ok(ExitCode::from(EXIT_DISALLOW_RETRY))
        }
    }
}
