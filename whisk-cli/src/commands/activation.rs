//! Activation inspection

use anyhow::{Context, Result};
use colored::*;
use whisk_runner::Config;

pub async fn show_activation(
    config: &Config,
    id: &str,
    namespace: Option<String>,
    json: bool,
) -> Result<()> {
    let client = config.client();
    let namespace = namespace.unwrap_or_else(|| config.namespace.clone());

    let detail = match client.get_activation_detail(&namespace, id).await {
        Ok(detail) => detail,
        Err(e) if e.is_not_found() => {
            println!(
                "{}",
                format!("Activation {} not found (it may still be running).", id).yellow()
            );
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to fetch activation {}", id)),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    let result = detail.response.into_result();
    let status = match result.status() {
        Some(s) if result.is_success() => s.green(),
        Some(s) if result.is_running() => s.cyan(),
        Some(s) => s.red(),
        None => "unknown".dimmed(),
    };

    println!("{}", "Activation Details".bold().underline());
    println!("  {} {}", "ID:".bold(), id);
    println!("  {} {}", "Process status:".bold(), status);
    if let Some(code) = result.return_code {
        println!("  {} {}", "Exit code:".bold(), code);
    }
    if let Some(stdout) = result.stdout.as_ref().and_then(|v| v.as_str()).filter(|s| !s.is_empty()) {
        println!();
        println!("{}", "stdout".bold());
        println!("{}", "─".repeat(80).dimmed());
        println!("{}", stdout.trim_end());
    }
    if let Some(stderr) = result.stderr_text() {
        println!();
        println!("{}", "stderr".bold());
        println!("{}", "─".repeat(80).dimmed());
        println!("{}", stderr.trim_end());
    }

    Ok(())
}
