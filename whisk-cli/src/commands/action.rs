//! Action inspection

use anyhow::{Context, Result};
use colored::*;
use std::sync::Arc;
use whisk_runner::{ActionDeployer, Config};

pub async fn show_action(
    config: &Config,
    name: &str,
    namespace: Option<String>,
    memory: Option<u32>,
    timeout: Option<u64>,
) -> Result<()> {
    let client = config.client();
    let namespace = namespace.unwrap_or_else(|| config.namespace.clone());

    let detail = client
        .get_action_detail(&namespace, name)
        .await
        .with_context(|| format!("Failed to fetch action {}/{}", namespace, name))?;

    let spec = ActionDeployer::from_config(Arc::new(client), config).spec(
        name,
        &namespace,
        memory.unwrap_or(config.memory_mb),
        timeout.unwrap_or(config.timeout_ms),
    );

    println!("{}", "Action Details".bold().underline());
    println!("  {} {}/{}", "Name:".bold(), namespace, detail.name);
    if let Some(version) = &detail.version {
        println!("  {} {}", "Version:".bold(), version);
    }
    println!(
        "  {} {}",
        "Stored fingerprint:".bold(),
        detail.stored_fingerprint().unwrap_or("<none>")
    );
    println!("  {} {}", "Local fingerprint:".bold(), spec.fingerprint());

    if detail.is_stale_for(&spec) {
        println!("  {} {}", "Status:".bold(), "stale (will be redeployed)".yellow());
    } else {
        println!("  {} {}", "Status:".bold(), "current".green());
    }

    Ok(())
}
