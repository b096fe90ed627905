//! Process-based runner
//!
//! Runs a native interpreter binary as `program args... <script file>` with
//! a cleared environment, null stdin and stdout/stderr redirected into the
//! per-run capture files. The script is written into the scratch directory
//! rather than passed on the command line, which keeps large scripts under
//! the per-argument limit of the OS.

use super::{finish_capture, CaptureDir, ScriptRunner};
use crate::config::RunnerConfig;
use crate::error::{SandboxError, SandboxResult};
use crate::types::ExecutionResult;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Native interpreter runner
pub struct ProcessRunner {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    scratch_root: Option<PathBuf>,
}

enum ChildOutcome {
    Exited(ExitStatus),
    Cancelled,
    Failed(String),
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: BTreeMap::new(),
            scratch_root: None,
        }
    }

    pub fn from_config(config: &RunnerConfig) -> SandboxResult<Self> {
        if config.program.is_empty() {
            return Err(SandboxError::Config(
                "process backend requires a program".to_string(),
            ));
        }
        Ok(Self {
            program: config.program.clone(),
            args: config.args.clone(),
            env: config.env.clone(),
            scratch_root: config.scratch_root()?,
        })
    }

    /// Set one variable in the child's otherwise empty environment
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Drive one child to exit (or cancellation) on a private current-thread
    /// runtime. The worker thread owns no runtime of its own.
    fn spawn_and_wait(
        &self,
        capture: &CaptureDir,
        code: &str,
        cancel: &CancellationToken,
    ) -> Result<ChildOutcome, String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| format!("Failed to start process supervisor: {}", e))?;
        runtime.block_on(self.supervise(capture, code, cancel))
    }

    async fn supervise(
        &self,
        capture: &CaptureDir,
        code: &str,
        cancel: &CancellationToken,
    ) -> Result<ChildOutcome, String> {
        let script = capture
            .write_script(code)
            .map_err(|e| format!("Failed to write script file: {}", e))?;
        let stdout = capture
            .stdout_file()
            .map_err(|e| format!("Failed to open stdout capture: {}", e))?;
        let stderr = capture
            .stderr_file()
            .map_err(|e| format!("Failed to open stderr capture: {}", e))?;

        // `Command` keeps its own copies of the handles; dropping it after
        // spawn leaves the child as the only writer.
        let mut child = {
            let mut command = Command::new(&self.program);
            command
                .args(&self.args)
                .arg(&script)
                .env_clear()
                .envs(&self.env)
                .current_dir(capture.path())
                .stdin(Stdio::null())
                .stdout(stdout)
                .stderr(stderr)
                .kill_on_drop(true);
            command
                .spawn()
                .map_err(|e| format!("Failed to start interpreter {}: {}", self.program, e))?
        };

        let waited = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            status = child.wait() => Some(status),
        };

        match waited {
            Some(Ok(status)) => Ok(ChildOutcome::Exited(status)),
            Some(Err(e)) => {
                stop_child(&mut child).await;
                Ok(ChildOutcome::Failed(format!(
                    "Failed to wait for interpreter: {}",
                    e
                )))
            }
            None => {
                stop_child(&mut child).await;
                Ok(ChildOutcome::Cancelled)
            }
        }
    }
}

/// Kill and reap, so the capture handles are released before reading
async fn stop_child(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::warn!(error = %e, "Failed to kill interpreter process");
    }
    if let Err(e) = child.wait().await {
        tracing::warn!(error = %e, "Failed to reap interpreter process");
    }
}

impl ScriptRunner for ProcessRunner {
    fn run(&self, code: &str, cancel: &CancellationToken) -> ExecutionResult {
        let capture = match CaptureDir::create(self.scratch_root.as_deref()) {
            Ok(capture) => capture,
            Err(e) => {
                return ExecutionResult::setup_failure(format!(
                    "Failed to create scratch directory: {}",
                    e
                ))
            }
        };

        let outcome = self.spawn_and_wait(&capture, code, cancel);
        let (stdout, stderr) = finish_capture(capture);

        match outcome {
            Err(error) => ExecutionResult::setup_failure(error),
            Ok(ChildOutcome::Exited(status)) => match status.code() {
                Some(exit_code) => ExecutionResult::from_exit(stdout, stderr, exit_code),
                None => ExecutionResult {
                    stdout,
                    stderr,
                    error: Some(format!("interpreter terminated by signal ({})", status)),
                    exit_code: ExecutionResult::SETUP_FAILURE,
                },
            },
            Ok(ChildOutcome::Cancelled) => ExecutionResult {
                stdout,
                stderr,
                error: Some("execution cancelled".to_string()),
                exit_code: ExecutionResult::SETUP_FAILURE,
            },
            Ok(ChildOutcome::Failed(error)) => ExecutionResult {
                stdout,
                stderr,
                error: Some(error),
                exit_code: ExecutionResult::SETUP_FAILURE,
            },
        }
    }

    fn name(&self) -> &str {
        "process"
    }
}
