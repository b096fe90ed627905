//! QuickJS-on-WASI runner using wasmtime
//!
//! The interpreter module is compiled once per runner. Each run gets a fresh
//! store and WASI context: argv `qjs -e <code>`, no environment, no stdin,
//! no preopened directories, and fd 1/2 bound to the capture files.

use super::{finish_capture, CaptureDir, ScriptRunner};
use crate::config::RunnerConfig;
use crate::error::{SandboxError, SandboxResult};
use crate::types::ExecutionResult;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wasmtime::{Config, Engine, Linker, Module, Store, UpdateDeadline};
use wasmtime_wasi::preview1::{add_to_linker_sync, WasiP1Ctx};
use wasmtime_wasi::{I32Exit, OutputFile, WasiCtxBuilder};

const CANCELLED: &str = "execution cancelled";

/// WASI QuickJS runner
pub struct QuickJsRunner {
    /// Wasmtime engine (shared across runs)
    engine: Engine,

    /// Compiled interpreter module
    module: Module,

    linker: Linker<WasiP1Ctx>,

    /// Parent of per-run scratch directories
    scratch_root: Option<PathBuf>,
}

enum RunOutcome {
    Exited(i32),
    StartFailed(String),
    Trapped(String),
}

impl QuickJsRunner {
    pub const DEFAULT_EPOCH_TICK: Duration = Duration::from_millis(10);

    /// Load the interpreter module from disk
    pub fn from_file(path: &Path) -> SandboxResult<Self> {
        Self::from_file_with_tick(path, Self::DEFAULT_EPOCH_TICK)
    }

    pub fn from_file_with_tick(path: &Path, tick: Duration) -> SandboxResult<Self> {
        let engine = new_engine()?;
        let module = Module::from_file(&engine, path).map_err(|e| {
            SandboxError::Runtime(format!(
                "Failed to load interpreter module {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::assemble(engine, module, tick)
    }

    /// Compile the interpreter module from bytes (binary or text format)
    pub fn from_binary(bytes: &[u8]) -> SandboxResult<Self> {
        Self::from_binary_with_tick(bytes, Self::DEFAULT_EPOCH_TICK)
    }

    pub fn from_binary_with_tick(bytes: &[u8], tick: Duration) -> SandboxResult<Self> {
        let engine = new_engine()?;
        let module = Module::new(&engine, bytes).map_err(|e| {
            SandboxError::Runtime(format!("Failed to compile interpreter module: {}", e))
        })?;
        Self::assemble(engine, module, tick)
    }

    pub fn from_config(config: &RunnerConfig) -> SandboxResult<Self> {
        let path = config.interpreter_path()?;
        let mut runner = Self::from_file_with_tick(&path, config.epoch_tick())?;
        runner.scratch_root = config.scratch_root()?;
        Ok(runner)
    }

    /// Place scratch directories under `root` instead of the system temp dir
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    fn assemble(engine: Engine, module: Module, tick: Duration) -> SandboxResult<Self> {
        let mut linker = Linker::new(&engine);
        add_to_linker_sync(&mut linker, |ctx: &mut WasiP1Ctx| ctx)
            .map_err(|e| SandboxError::Runtime(format!("Failed to link WASI: {}", e)))?;

        spawn_epoch_ticker(&engine, tick)?;

        Ok(Self {
            engine,
            module,
            linker,
            scratch_root: None,
        })
    }

    fn run_in(&self, capture: &CaptureDir, code: &str, cancel: &CancellationToken) -> RunOutcome {
        let stdout = match capture.stdout_file() {
            Ok(file) => file,
            Err(e) => return RunOutcome::StartFailed(format!("Failed to open stdout capture: {}", e)),
        };
        let stderr = match capture.stderr_file() {
            Ok(file) => file,
            Err(e) => return RunOutcome::StartFailed(format!("Failed to open stderr capture: {}", e)),
        };

        let mut builder = WasiCtxBuilder::new();
        builder
            .stdout(OutputFile::new(stdout))
            .stderr(OutputFile::new(stderr))
            .args(&["qjs", "-e", code]);
        let wasi_ctx = builder.build_p1();

        // The store owns the capture handles; they close when it drops at
        // the end of this function, before the caller reads the files.
        let mut store = Store::new(&self.engine, wasi_ctx);
        let token = cancel.clone();
        store.epoch_deadline_callback(move |_| {
            if token.is_cancelled() {
                Err(anyhow::anyhow!(CANCELLED))
            } else {
                Ok(UpdateDeadline::Continue(1))
            }
        });
        store.set_epoch_deadline(1);

        if cancel.is_cancelled() {
            return RunOutcome::Trapped(CANCELLED.to_string());
        }

        let instance = match self.linker.instantiate(&mut store, &self.module) {
            Ok(instance) => instance,
            Err(e) => return RunOutcome::StartFailed(format!("Failed to start interpreter: {}", e)),
        };

        let start = match instance.get_typed_func::<(), ()>(&mut store, "_start") {
            Ok(func) => func,
            Err(e) => {
                return RunOutcome::StartFailed(format!("Interpreter has no _start entry point: {}", e))
            }
        };

        match start.call(&mut store, ()) {
            Ok(()) => RunOutcome::Exited(0),
            Err(e) => {
                if let Some(exit) = e.downcast_ref::<I32Exit>() {
                    RunOutcome::Exited(exit.0)
                } else if cancel.is_cancelled() {
                    RunOutcome::Trapped(CANCELLED.to_string())
                } else {
                    RunOutcome::Trapped(format!("Interpreter trapped: {}", e))
                }
            }
        }
    }
}

impl ScriptRunner for QuickJsRunner {
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

        let outcome = self.run_in(&capture, code, cancel);
        let (stdout, stderr) = finish_capture(capture);

        match outcome {
            RunOutcome::Exited(exit_code) => ExecutionResult::from_exit(stdout, stderr, exit_code),
            RunOutcome::StartFailed(error) => ExecutionResult {
                stdout: String::new(),
                stderr,
                error: Some(error),
                exit_code: ExecutionResult::SETUP_FAILURE,
            },
            RunOutcome::Trapped(error) => ExecutionResult {
                stdout,
                stderr,
                error: Some(error),
                exit_code: ExecutionResult::SETUP_FAILURE,
            },
        }
    }

    fn name(&self) -> &str {
        "wasm"
    }
}

fn new_engine() -> SandboxResult<Engine> {
    let mut config = Config::new();
    config.epoch_interruption(true);
    Engine::new(&config).map_err(|e| SandboxError::Runtime(format!("Engine init failed: {}", e)))
}

/// Advance the engine epoch until the engine is dropped. Stores decide in
/// their deadline callback whether their run was cancelled.
fn spawn_epoch_ticker(engine: &Engine, tick: Duration) -> SandboxResult<()> {
    let weak = engine.weak();
    std::thread::Builder::new()
        .name("jsbox-epoch".to_string())
        .spawn(move || loop {
            std::thread::sleep(tick);
            match weak.upgrade() {
                Some(engine) => engine.increment_epoch(),
                None => break,
            }
        })
        .map(|_| ())
        .map_err(|e| SandboxError::Runtime(format!("Failed to start epoch ticker: {}", e)))
}
