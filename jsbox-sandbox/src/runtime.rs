//! Runner trait and implementations

#[cfg(feature = "process")]
mod process;
#[cfg(feature = "wasm")]
mod wasm;

use crate::config::{RunnerBackend, RunnerConfig};
use crate::error::SandboxResult;
use crate::types::ExecutionResult;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "process")]
pub use process::ProcessRunner;
#[cfg(feature = "wasm")]
pub use wasm::QuickJsRunner;

/// Runs one script to completion in a fresh interpreter instance.
///
/// Implementations block the calling thread and never fail: every problem
/// is folded into the returned [`ExecutionResult`]. They must stop promptly
/// once `cancel` fires.
pub trait ScriptRunner: Send + Sync {
    fn run(&self, code: &str, cancel: &CancellationToken) -> ExecutionResult;

    /// Get runner name
    fn name(&self) -> &str;
}

/// Build the runner selected by the configuration
pub fn build_runner(config: &RunnerConfig) -> SandboxResult<Arc<dyn ScriptRunner>> {
    match config.backend {
        RunnerBackend::Wasm => {
            #[cfg(feature = "wasm")]
            {
                let runner = QuickJsRunner::from_config(config)?;
                Ok(Arc::new(runner))
            }
            #[cfg(not(feature = "wasm"))]
            {
                Err(crate::error::SandboxError::Runtime(
                    "WASM runtime not enabled. Compile with --features wasm".to_string(),
                ))
            }
        }
        RunnerBackend::Process => {
            #[cfg(feature = "process")]
            {
                Ok(Arc::new(ProcessRunner::from_config(config)?))
            }
            #[cfg(not(feature = "process"))]
            {
                Err(crate::error::SandboxError::Runtime(
                    "Process runtime not enabled. Compile with --features process".to_string(),
                ))
            }
        }
    }
}

/// Per-run scratch directory holding the stdout/stderr capture files.
///
/// The directory is removed when the value is dropped, so every exit path
/// of a run releases it.
pub struct CaptureDir {
    dir: TempDir,
    stdout_path: PathBuf,
    stderr_path: PathBuf,
}

impl CaptureDir {
    pub const PREFIX: &'static str = "jsbox-";
    pub const SCRIPT_FILE: &'static str = "script.js";

    /// Create a uniquely named directory under `root` (system temp dir if None)
    pub fn create(root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(Self::PREFIX);
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };

        let stdout_path = dir.path().join("stdout.txt");
        let stderr_path = dir.path().join("stderr.txt");
        File::create(&stdout_path)?;
        File::create(&stderr_path)?;

        Ok(Self {
            dir,
            stdout_path,
            stderr_path,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write handle for the interpreter's fd 1
    pub fn stdout_file(&self) -> io::Result<File> {
        File::options().write(true).truncate(true).open(&self.stdout_path)
    }

    /// Write handle for the interpreter's fd 2
    pub fn stderr_file(&self) -> io::Result<File> {
        File::options().write(true).truncate(true).open(&self.stderr_path)
    }

    /// Write the script text next to the capture files and return its path
    pub fn write_script(&self, code: &str) -> io::Result<PathBuf> {
        let path = self.dir.path().join(Self::SCRIPT_FILE);
        let mut file = File::create(&path)?;
        file.write_all(code.as_bytes())?;
        file.sync_all()?;
        Ok(path)
    }

    /// Read both capture files. Callers must have dropped every write
    /// handle first.
    pub fn read_output(&self) -> io::Result<(String, String)> {
        Ok((
            read_lossy(&self.stdout_path)?,
            read_lossy(&self.stderr_path)?,
        ))
    }

    /// Remove the directory now, reporting failures instead of ignoring them
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}

fn read_lossy(path: &Path) -> io::Result<String> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Read captured output and remove the scratch directory
pub(crate) fn finish_capture(capture: CaptureDir) -> (String, String) {
    let output = match capture.read_output() {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read captured output");
            (String::new(), format!("failed to read captured output: {}", e))
        }
    };
    let path = capture.path().to_path_buf();
    if let Err(e) = capture.close() {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove scratch directory");
    }
    output
}
