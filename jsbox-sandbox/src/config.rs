//! Configuration management for jsbox

use crate::error::{SandboxError, SandboxResult};
use crate::limits::ExecutionLimits;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides the config file location
pub const CONFIG_ENV_VAR: &str = "JSBOX_CONFIG";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Interpreter backend configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Input and deadline limits
    #[serde(default)]
    pub limits: ExecutionLimits,
    /// Tool server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// Which interpreter host runs scripts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerBackend {
    /// QuickJS compiled to WASI, hosted in wasmtime
    #[default]
    Wasm,
    /// Native interpreter binary run as a child process
    Process,
}

impl std::str::FromStr for RunnerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wasm" => Ok(RunnerBackend::Wasm),
            "process" => Ok(RunnerBackend::Process),
            other => Err(format!("Invalid runner backend: {}", other)),
        }
    }
}

/// Runner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub backend: RunnerBackend,
    /// QuickJS WASI module (wasm backend)
    #[serde(default = "RunnerConfig::default_interpreter")]
    pub interpreter: String,
    /// Interpreter binary (process backend)
    #[serde(default = "RunnerConfig::default_program")]
    pub program: String,
    /// Arguments placed before the script file path (process backend)
    #[serde(default)]
    pub args: Vec<String>,
    /// Variables passed to the child; nothing is inherited from the host
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Parent directory for per-request scratch directories
    #[serde(default)]
    pub scratch_dir: Option<String>,
    /// Epoch tick period for wasm interruption checks
    #[serde(default = "RunnerConfig::default_epoch_tick_ms")]
    pub epoch_tick_ms: u64,
    /// How long teardown waits for a terminated worker
    #[serde(default = "RunnerConfig::default_termination_grace_ms")]
    pub termination_grace_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            backend: RunnerBackend::default(),
            interpreter: Self::default_interpreter(),
            program: Self::default_program(),
            args: Vec::new(),
            env: BTreeMap::new(),
            scratch_dir: None,
            epoch_tick_ms: Self::default_epoch_tick_ms(),
            termination_grace_ms: Self::default_termination_grace_ms(),
        }
    }
}

impl RunnerConfig {
    fn default_interpreter() -> String {
        "~/.local/share/jsbox/qjs-wasi.wasm".to_string()
    }

    fn default_program() -> String {
        "qjs".to_string()
    }

    fn default_epoch_tick_ms() -> u64 {
        10
    }

    fn default_termination_grace_ms() -> u64 {
        2_000
    }

    /// Expanded interpreter module path
    pub fn interpreter_path(&self) -> SandboxResult<PathBuf> {
        expand_path(&self.interpreter)
    }

    /// Expanded scratch root, if configured
    pub fn scratch_root(&self) -> SandboxResult<Option<PathBuf>> {
        self.scratch_dir.as_deref().map(expand_path).transpose()
    }

    pub fn epoch_tick(&self) -> Duration {
        Duration::from_millis(self.epoch_tick_ms)
    }

    pub fn termination_grace(&self) -> Duration {
        Duration::from_millis(self.termination_grace_ms)
    }
}

/// Tool server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address for the HTTP transport
    #[serde(default = "ServerConfig::default_http_bind_address")]
    pub http_bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_bind_address: Self::default_http_bind_address(),
        }
    }
}

impl ServerConfig {
    fn default_http_bind_address() -> String {
        "127.0.0.1:8085".to_string()
    }
}

impl SandboxConfig {
    /// Load configuration from the default location
    pub fn load() -> SandboxResult<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a file; a missing file yields defaults
    pub fn load_from(path: &Path) -> SandboxResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| SandboxError::Config(format!("Failed to read config: {}", e)))?;

        Self::parse(&content)
    }

    /// Parse and validate TOML text
    pub fn parse(content: &str) -> SandboxResult<Self> {
        let config: SandboxConfig = toml::from_str(content)
            .map_err(|e| SandboxError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> SandboxResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SandboxError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = self.to_toml()?;

        std::fs::write(path, content)
            .map_err(|e| SandboxError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn to_toml(&self) -> SandboxResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SandboxError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Get the configuration file path
    pub fn config_path() -> SandboxResult<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                return expand_path(&path);
            }
        }

        let home = dirs::home_dir().ok_or_else(|| {
            SandboxError::Config("Cannot determine home directory".to_string())
        })?;

        Ok(home.join(".config").join("jsbox").join("config.toml"))
    }

    pub fn validate(&self) -> SandboxResult<()> {
        let limits = &self.limits;
        if limits.default_timeout_ms == 0 || limits.max_timeout_ms == 0 {
            return Err(SandboxError::Config(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if limits.default_timeout_ms > limits.max_timeout_ms {
            return Err(SandboxError::Config(format!(
                "default_timeout_ms ({}) exceeds max_timeout_ms ({})",
                limits.default_timeout_ms, limits.max_timeout_ms
            )));
        }
        if limits.max_code_size == 0 {
            return Err(SandboxError::Config(
                "max_code_size must be greater than zero".to_string(),
            ));
        }
        if self.runner.epoch_tick_ms == 0 {
            return Err(SandboxError::Config(
                "epoch_tick_ms must be greater than zero".to_string(),
            ));
        }
        if self.runner.backend == RunnerBackend::Process && self.runner.program.is_empty() {
            return Err(SandboxError::Config(
                "process backend requires a program".to_string(),
            ));
        }
        Ok(())
    }
}

fn expand_path(path: &str) -> SandboxResult<PathBuf> {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| {
            SandboxError::Config("Cannot determine home directory".to_string())
        })?;
        Ok(home.join(rest))
    } else if path == "~" {
        dirs::home_dir()
            .ok_or_else(|| SandboxError::Config("Cannot determine home directory".to_string()))
    } else {
        Ok(PathBuf::from(path))
    }
}
