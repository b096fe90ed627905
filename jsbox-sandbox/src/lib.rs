//! jsbox sandbox - isolated JavaScript execution
//!
//! Runs untrusted scripts in a fresh QuickJS instance (WASI under wasmtime,
//! or a native interpreter process) on a dedicated worker thread, under a
//! hard wall-clock deadline, with output captured through per-run scratch
//! files.

mod config;
mod error;
mod execution;
mod limits;
mod runtime;
mod service;
mod types;
mod worker;

pub use config::{RunnerBackend, RunnerConfig, SandboxConfig, ServerConfig, CONFIG_ENV_VAR};
pub use error::{SandboxError, SandboxResult};
pub use execution::{ExecutionId, ExecutionStatus};
pub use limits::ExecutionLimits;
pub use runtime::{build_runner, CaptureDir, ScriptRunner};
#[cfg(feature = "process")]
pub use runtime::ProcessRunner;
#[cfg(feature = "wasm")]
pub use runtime::QuickJsRunner;
pub use service::{SandboxService, ScriptExecutor};
pub use types::{ExecuteOptions, ExecutionRequest, ExecutionResult};
pub use worker::{WorkerEvent, WorkerHost, WorkerMessage};

/// Re-exported so custom runners can implement [`ScriptRunner`]
pub use tokio_util::sync::CancellationToken;
