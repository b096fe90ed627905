//! Core types for sandbox execution

use serde::{Deserialize, Serialize};

/// Request to execute a script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// The code to execute
    pub code: String,

    /// Optional timeout in milliseconds (None = service default)
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ExecutionRequest {
    /// Create a simple execution request
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            timeout_ms: None,
        }
    }

    /// Set timeout in milliseconds
    pub fn with_timeout(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    pub fn options(&self) -> ExecuteOptions {
        ExecuteOptions {
            timeout_ms: self.timeout_ms,
        }
    }
}

/// Per-call options for [`crate::SandboxService::execute_script`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub timeout_ms: Option<u64>,
}

impl ExecuteOptions {
    pub fn with_timeout(ms: u64) -> Self {
        Self {
            timeout_ms: Some(ms),
        }
    }
}

/// Result of a single sandboxed run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Captured standard output
    pub stdout: String,

    /// Captured standard error
    pub stderr: String,

    /// Set when the sandbox reported a problem
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Exit code (0 = success, -1 = sandbox could not start)
    pub exit_code: i32,
}

impl ExecutionResult {
    /// Exit code reserved for setup and start failures
    pub const SETUP_FAILURE: i32 = -1;

    /// A run that never got as far as producing output
    pub fn setup_failure(error: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            error: Some(error.into()),
            exit_code: Self::SETUP_FAILURE,
        }
    }

    /// Build a result from captured output and the interpreter's exit code
    pub fn from_exit(stdout: String, stderr: String, exit_code: i32) -> Self {
        let error = (exit_code != 0).then(|| format!("script exited with code {}", exit_code));
        Self {
            stdout,
            stderr,
            error,
            exit_code,
        }
    }

    /// Check if execution succeeded
    pub fn success(&self) -> bool {
        self.exit_code == 0 && self.error.is_none()
    }
}
