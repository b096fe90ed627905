//! CLI command implementations

use crate::Transport;
use anyhow::{bail, Context, Result};
use jsbox_sandbox::{ExecuteOptions, ExecutionResult, SandboxConfig, SandboxService};
use jsbox_transport::McpHandler;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{error, info};

/// Exit status for failures outside the script itself
const INFRASTRUCTURE_FAILURE: i32 = 1;

fn load_config(config_path: &Path) -> Result<SandboxConfig> {
    SandboxConfig::load_from(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))
}

fn build_service(config_path: &Path) -> Result<SandboxService> {
    let config = load_config(config_path)?;
    let service = SandboxService::from_config(&config).context("Failed to set up sandbox")?;
    info!(runner = service.runner_name(), "Sandbox ready");
    Ok(service)
}

async fn read_script(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut code = String::new();
            tokio::io::stdin()
                .read_to_string(&mut code)
                .await
                .context("Failed to read script from stdin")?;
            Ok(code)
        }
    }
}

/// Run one script and print its output. Returns the process exit code.
pub async fn run_script(
    config_path: &Path,
    file: Option<&Path>,
    timeout_ms: Option<u64>,
    json: bool,
) -> Result<i32> {
    let service = build_service(config_path)?;
    let code = read_script(file).await?;

    let options = ExecuteOptions { timeout_ms };
    let result = match service.execute_script(&code, options).await {
        Ok(result) => result,
        Err(e) => {
            if json {
                println!("{}", serde_json::json!({ "error": e.to_string() }));
            } else {
                eprintln!("Error: {}", e);
            }
            return Ok(INFRASTRUCTURE_FAILURE);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let mut stdout = std::io::stdout();
        stdout.write_all(result.stdout.as_bytes())?;
        stdout.flush()?;

        let mut stderr = std::io::stderr();
        stderr.write_all(result.stderr.as_bytes())?;
        if let Some(error) = &result.error {
            writeln!(stderr, "Error: {}", error)?;
        }
    }

    Ok(exit_code_for(&result))
}

/// The script's own exit code, except that a sandbox setup failure counts
/// as an infrastructure failure
fn exit_code_for(result: &ExecutionResult) -> i32 {
    if result.exit_code == ExecutionResult::SETUP_FAILURE {
        INFRASTRUCTURE_FAILURE
    } else {
        result.exit_code
    }
}

/// Serve the MCP tool until the transport closes
pub async fn serve(config_path: &Path, transport: Transport, bind: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;
    let service =
        Arc::new(SandboxService::from_config(&config).context("Failed to set up sandbox")?);
    info!(runner = service.runner_name(), "Sandbox ready");

    let handler = Arc::new(McpHandler::new(service));

    let served = match transport {
        Transport::Stdio => jsbox_transport::serve_stdio(handler).await,
        Transport::Http => {
            let addr = bind.unwrap_or(config.server.http_bind_address);
            jsbox_transport::serve_http(&addr, handler).await
        }
    };
    if let Err(e) = &served {
        error!(error = %e, "MCP server failed");
    }
    served
}

/// Write a default config file
pub fn config_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        bail!(
            "Config file already exists at {} (use --force to overwrite)",
            config_path.display()
        );
    }

    SandboxConfig::default()
        .save_to(config_path)
        .context("Failed to write config")?;
    println!("Wrote default configuration to {}", config_path.display());
    Ok(())
}

/// Print the effective configuration
pub fn config_show(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let source = if config_path.exists() {
        config_path.display().to_string()
    } else {
        format!("{} (not found, using defaults)", config_path.display())
    };

    println!("# {}", source);
    print!("{}", config.to_toml()?);
    Ok(())
}
