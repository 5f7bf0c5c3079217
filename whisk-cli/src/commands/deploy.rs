//! Deploy command handler

use anyhow::{Context, Result};
use colored::*;
use std::sync::Arc;
use whisk_runner::{ActionDeployer, Config};

pub async fn handle_deploy(
    config: &Config,
    action: &str,
    namespace: Option<String>,
    memory: Option<u32>,
    timeout: Option<u64>,
    force: bool,
) -> Result<()> {
    let deployer = ActionDeployer::from_config(Arc::new(config.client()), config);
    let spec = deployer.spec(
        action,
        namespace.unwrap_or_else(|| config.namespace.clone()),
        memory.unwrap_or(config.memory_mb),
        timeout.unwrap_or(config.timeout_ms),
    );

    let deployed = if force {
        deployer.deploy(&spec).await.map(|_| true)
    } else {
        deployer.ensure_deployed(&spec).await
    }
    .with_context(|| format!("Failed to deploy action {}/{}", spec.namespace, spec.name))?;

    if deployed {
        println!(
            "{} {}/{}",
            "✓ Deployed action".green().bold(),
            spec.namespace,
            spec.name
        );
    } else {
        println!(
            "{} {}/{}",
            "Action is up to date:".yellow(),
            spec.namespace,
            spec.name
        );
    }
    println!("  {} {}", "Fingerprint:".bold(), spec.fingerprint());

    Ok(())
}
