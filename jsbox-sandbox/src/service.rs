//! Sandbox service - main entry point

use crate::config::SandboxConfig;
use crate::error::{SandboxError, SandboxResult};
use crate::execution::{ExecutionId, ExecutionStatus};
use crate::limits::ExecutionLimits;
use crate::runtime::{build_runner, ScriptRunner};
use crate::types::{ExecuteOptions, ExecutionResult};
use crate::worker::{WorkerEvent, WorkerHost, WorkerMessage};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Anything that can run a script to a settled outcome
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    async fn execute_script(
        &self,
        code: &str,
        options: ExecuteOptions,
    ) -> SandboxResult<ExecutionResult>;

    /// Limits the executor enforces, for advertising to callers
    fn execution_limits(&self) -> ExecutionLimits {
        ExecutionLimits::default()
    }
}

/// Sandbox execution service
///
/// Every call validates its input, runs the script on a fresh worker under a
/// deadline and tears the worker down before returning.
pub struct SandboxService {
    runner: Arc<dyn ScriptRunner>,
    limits: ExecutionLimits,
    termination_grace: Duration,
}

impl SandboxService {
    pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_secs(2);

    /// Create a new sandbox service with the given runner
    pub fn new(runner: Arc<dyn ScriptRunner>, limits: ExecutionLimits) -> Self {
        Self {
            runner,
            limits,
            termination_grace: Self::DEFAULT_TERMINATION_GRACE,
        }
    }

    /// Build the configured runner and wrap it in a service
    pub fn from_config(config: &SandboxConfig) -> SandboxResult<Self> {
        config.validate()?;
        let runner = build_runner(&config.runner)?;
        Ok(Self::new(runner, config.limits.clone())
            .with_termination_grace(config.runner.termination_grace()))
    }

    pub fn with_termination_grace(mut self, grace: Duration) -> Self {
        self.termination_grace = grace;
        self
    }

    /// Get the runner name
    pub fn runner_name(&self) -> &str {
        self.runner.name()
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Execute a script and settle on the first decisive worker event or
    /// the deadline, whichever comes first.
    ///
    /// Teardown waits up to the termination grace period for the worker.
    /// A runner that ignores cancellation past that point (a WASI guest
    /// blocked inside a host call) is left to finish on its own, and its
    /// scratch directory is removed only when it does.
    pub async fn execute_script(
        &self,
        code: &str,
        options: ExecuteOptions,
    ) -> SandboxResult<ExecutionResult> {
        let id = ExecutionId::new();
        let outcome = self.execute_with_id(id, code, options).await;

        let status = ExecutionStatus::of(&outcome);
        match &outcome {
            Ok(result) => tracing::info!(
                execution_id = %id,
                status = %status,
                exit_code = result.exit_code,
                "Execution settled"
            ),
            Err(e) => tracing::info!(
                execution_id = %id,
                status = %status,
                error = %e,
                "Execution settled"
            ),
        }

        outcome
    }

    async fn execute_with_id(
        &self,
        id: ExecutionId,
        code: &str,
        options: ExecuteOptions,
    ) -> SandboxResult<ExecutionResult> {
        let deadline = self.validate(code, options)?;
        let timeout_ms = deadline.as_millis() as u64;

        tracing::info!(
            execution_id = %id,
            runner = self.runner.name(),
            code_len = code.len(),
            timeout_ms,
            "Executing script"
        );

        let (worker, mut events) =
            WorkerHost::spawn(id, Arc::clone(&self.runner), json!({ "code": code }))?;

        let outcome = settle(&mut events, deadline).await;

        // Teardown runs on every path so the scratch directory is gone
        // before the caller sees the outcome.
        drop(events);
        worker.terminate();
        if !worker.join(self.termination_grace).await {
            tracing::warn!(
                execution_id = %id,
                runner = self.runner.name(),
                grace_ms = self.termination_grace.as_millis() as u64,
                "Worker outlived termination grace; scratch cleanup deferred until it exits"
            );
        }

        outcome
    }

    fn validate(&self, code: &str, options: ExecuteOptions) -> SandboxResult<Duration> {
        if code.is_empty() {
            return Err(SandboxError::InvalidInput(
                "JavaScript code must be a non-empty string".to_string(),
            ));
        }

        if let Some(size) = self.limits.exceeds_code_size(code) {
            return Err(SandboxError::SizeLimit {
                size,
                limit: self.limits.max_code_size,
            });
        }

        self.limits
            .effective_timeout(options.timeout_ms)
            .ok_or_else(|| {
                SandboxError::InvalidInput("timeout must be greater than zero".to_string())
            })
    }
}

#[async_trait]
impl ScriptExecutor for SandboxService {
    async fn execute_script(
        &self,
        code: &str,
        options: ExecuteOptions,
    ) -> SandboxResult<ExecutionResult> {
        SandboxService::execute_script(self, code, options).await
    }

    fn execution_limits(&self) -> ExecutionLimits {
        self.limits.clone()
    }
}

/// First decisive event wins; nothing after it is observed.
async fn settle(
    events: &mut mpsc::UnboundedReceiver<WorkerEvent>,
    deadline: Duration,
) -> SandboxResult<ExecutionResult> {
    tokio::select! {
        biased;

        event = events.recv() => match event {
            Some(WorkerEvent::Message(WorkerMessage::Success(result))) => Ok(result),
            Some(WorkerEvent::Message(WorkerMessage::Failure(message))) => {
                Err(SandboxError::SandboxExecution(message))
            }
            Some(WorkerEvent::Exit(code)) => Err(SandboxError::WorkerCrash { code }),
            None => Err(SandboxError::WorkerCrash { code: -1 }),
        },
        _ = tokio::time::sleep(deadline) => Err(SandboxError::Timeout {
            timeout_ms: deadline.as_millis() as u64,
        }),
    }
}
