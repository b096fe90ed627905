use thiserror::Error;

/// Failures surfaced by the execution coordinator
///
/// Script-level problems (a thrown exception, a non-zero exit) are not
/// errors: they come back inside [`crate::ExecutionResult`].
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("JavaScript code exceeds maximum length of {limit} characters")]
    SizeLimit { size: usize, limit: usize },

    #[error("{0}")]
    SandboxExecution(String),

    #[error("Execution timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Worker stopped with exit code {code}")]
    WorkerCrash { code: i32 },

    #[error("Failed to start worker: {0}")]
    WorkerStart(#[source] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Sandbox runtime error: {0}")]
    Runtime(String),
}

impl SandboxError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SandboxError::Timeout { .. })
    }

    /// Errors raised before any worker was spawned
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            SandboxError::InvalidInput(_) | SandboxError::SizeLimit { .. }
        )
    }
}

pub type SandboxResult<T> = Result<T, SandboxError>;
