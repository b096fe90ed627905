mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "jsbox")]
#[command(about = "Run untrusted JavaScript in an isolated QuickJS sandbox")]
#[command(version)]
pub struct Cli {
    /// Config file (default: ~/.config/jsbox/config.toml or $JSBOX_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a script file (or stdin) and print its output
    Run {
        /// Script to run; reads stdin when omitted
        file: Option<PathBuf>,

        /// Wall-clock limit in milliseconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Serve the run_javascript_code tool over MCP
    Serve {
        #[arg(long, value_enum, default_value_t = Transport::Stdio)]
        transport: Transport,

        /// Bind address for the HTTP transport (default from config)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    Stdio,
    Http,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose, cli.log_file.as_deref())?;

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => jsbox_sandbox::SandboxConfig::config_path()?,
    };

    match cli.command {
        Commands::Run {
            file,
            timeout,
            json,
        } => {
            let code = commands::run_script(&config_path, file.as_deref(), timeout, json).await?;
            Ok(ExitCode::from(exit_status(code)))
        }
        Commands::Serve { transport, bind } => {
            commands::serve(&config_path, transport, bind).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { action } => {
            match action {
                ConfigAction::Init { force } => commands::config_init(&config_path, force)?,
                ConfigAction::Show => commands::config_show(&config_path)?,
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Logs go to stderr (stdout carries script output and the stdio protocol),
/// plus an optional plain-text file.
fn init_tracing(verbose: bool, log_file: Option<&std::path::Path>) -> Result<Option<WorkerGuard>> {
    let log_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "jsbox={},jsbox_sandbox={},jsbox_transport={}",
            log_level, log_level, log_level
        ))
    });

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .context("--log-file must name a file")?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(filter)
        .init();

    Ok(guard)
}

/// Map a script exit code onto a process exit status
fn exit_status(code: i32) -> u8 {
    (code & 0xff) as u8
}
