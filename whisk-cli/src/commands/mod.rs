//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod action;
mod activation;
mod deploy;
mod step;

use anyhow::Result;
use clap::Subcommand;
use std::process::ExitCode;
use whisk_runner::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run one task remotely and wait for it
    Step(step::StepArgs),
    /// Deploy an action if its fingerprint changed
    Deploy {
        /// Action name
        #[arg(long)]
        action: String,

        /// Namespace of the action
        #[arg(long = "nuv-namespace")]
        nuv_namespace: Option<String>,

        /// Memory in MB
        #[arg(long)]
        memory: Option<u32>,

        /// Timeout in milliseconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Deploy even if the stored fingerprint matches
        #[arg(long)]
        force: bool,
    },
    /// Show a deployed action and whether it is current
    Action {
        /// Action name
        name: String,

        /// Namespace of the action
        #[arg(long = "nuv-namespace")]
        nuv_namespace: Option<String>,

        /// Memory in MB used for the local fingerprint
        #[arg(long)]
        memory: Option<u32>,

        /// Timeout in milliseconds used for the local fingerprint
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Show the result of an activation
    Activation {
        /// Activation ID
        id: String,

        /// Namespace of the activation
        #[arg(long = "nuv-namespace")]
        nuv_namespace: Option<String>,

        /// Print the raw activation body
        #[arg(long)]
        json: bool,
    },
}

/// Routes the command to its handler module
pub async fn handle_command(command: Commands, config: &Config) -> Result<ExitCode> {
    match command {
        Commands::Step(args) => step::handle_step(args, config).await,
        Commands::Deploy {
            action,
            nuv_namespace,
            memory,
            timeout,
            force,
        } => {
            deploy::handle_deploy(config, &action, nuv_namespace, memory, timeout, force).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Action {
            name,
            nuv_namespace,
            memory,
            timeout,
        } => {
            action::show_action(config, &name, nuv_namespace, memory, timeout).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Activation {
            id,
            nuv_namespace,
            json,
        } => {
            activation::show_activation(config, &id, nuv_namespace, json).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
