//! Execution identity and terminal status

use crate::error::SandboxError;
use crate::types::ExecutionResult;
use serde::{Deserialize, Serialize};

/// Unique execution identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub uuid::Uuid);

impl ExecutionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// First eight hex digits, used for thread names
    pub fn short(&self) -> String {
        let mut s = self.0.simple().to_string();
        s.truncate(8);
        s
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a request settled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionStatus {
    Completed,
    ScriptFailed,
    Rejected,
    Failed,
    TimedOut,
    Crashed,
}

impl ExecutionStatus {
    pub fn of(outcome: &Result<ExecutionResult, SandboxError>) -> Self {
        match outcome {
            Ok(result) if result.success() => ExecutionStatus::Completed,
            Ok(_) => ExecutionStatus::ScriptFailed,
            Err(e) if e.is_input_error() => ExecutionStatus::Rejected,
            Err(e) if e.is_timeout() => ExecutionStatus::TimedOut,
            Err(SandboxError::WorkerCrash { .. }) => ExecutionStatus::Crashed,
            Err(_) => ExecutionStatus::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::ScriptFailed => "script_failed",
            ExecutionStatus::Rejected => "rejected",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::TimedOut => "timed_out",
            ExecutionStatus::Crashed => "crashed",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
