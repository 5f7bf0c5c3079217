//! Whisk CLI
//!
//! Runs workflow steps as serverless actions and inspects deployed actions
//! and activations.

mod commands;
mod echo;

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use whisk_runner::Config;
use whisk_runner::config::{DEFAULT_API_URL, DEFAULT_NAMESPACE};

use commands::{Commands, handle_command};

#[derive(Parser)]
#[command(name = "whisk")]
#[command(about = "Run workflow steps on a serverless platform", long_about = None)]
struct Cli {
    /// Platform API URL, including the namespaces prefix
    #[arg(long, env = "WHISK_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Default namespace
    #[arg(long, env = "WHISK_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// API user
    #[arg(long, env = "WHISK_API_USER")]
    api_user: Option<String>,

    /// API password
    #[arg(long, env = "WHISK_API_AUTH", hide_env_values = true)]
    api_auth: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr; stdout carries command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "whisk=info,whisk_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Missing credentials are reported by validate()
    let mut config = Config::new(
        cli.api_user.unwrap_or_default(),
        cli.api_auth.unwrap_or_default(),
    )
    .with_env_overrides();
    config.api_url = cli.api_url;
    config.namespace = cli.namespace;
    config.validate()?;

    handle_command(cli.command, &config).await
}
