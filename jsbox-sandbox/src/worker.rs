//! Worker host: one OS thread per script run
//!
//! The worker receives its payload at creation, runs the configured
//! [`ScriptRunner`] behind a panic boundary and reports back over a channel:
//! exactly one [`WorkerMessage`] followed by [`WorkerEvent::Exit`].

use crate::error::{SandboxError, SandboxResult};
use crate::execution::ExecutionId;
use crate::runtime::ScriptRunner;
use crate::types::ExecutionResult;
use serde_json::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Structured report from a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    /// The runner produced a result (which may describe a failed script)
    Success(ExecutionResult),
    /// The worker could not produce a result
    Failure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Message(WorkerMessage),
    /// The worker thread is about to finish with this code
    Exit(i32),
}

/// Handle to a running worker thread
pub struct WorkerHost {
    id: ExecutionId,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl WorkerHost {
    /// Start a worker for `payload` (`{"code": "..."}`)
    pub fn spawn(
        id: ExecutionId,
        runner: Arc<dyn ScriptRunner>,
        payload: Value,
    ) -> SandboxResult<(Self, mpsc::UnboundedReceiver<WorkerEvent>)> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = std::thread::Builder::new()
            .name(format!("script-worker-{}", id.short()))
            .spawn(move || worker_main(runner, payload, token, events_tx))
            .map_err(SandboxError::WorkerStart)?;

        tracing::debug!(execution_id = %id, "Worker started");

        Ok((
            Self {
                id,
                cancel,
                handle: Some(handle),
            },
            events_rx,
        ))
    }

    pub fn id(&self) -> ExecutionId {
        self.id
    }

    /// Ask the worker to stop. Safe to call any number of times.
    pub fn terminate(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!(execution_id = %self.id, "Terminating worker");
            self.cancel.cancel();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait up to `grace` for the thread to finish. Returns false if the
    /// worker was still running when the grace period ran out.
    pub async fn join(mut self, grace: Duration) -> bool {
        let Some(handle) = self.handle.take() else {
            return true;
        };
        let id = self.id;

        let joiner = tokio::task::spawn_blocking(move || handle.join());
        match tokio::time::timeout(grace, joiner).await {
            Ok(Ok(Ok(()))) => {
                tracing::debug!(execution_id = %id, "Worker joined");
                true
            }
            Ok(Ok(Err(_))) => {
                tracing::warn!(execution_id = %id, "Worker thread panicked outside the runner");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(execution_id = %id, error = %e, "Failed to join worker");
                false
            }
            Err(_) => {
                tracing::debug!(
                    execution_id = %id,
                    grace_ms = grace.as_millis() as u64,
                    "Worker did not stop within termination grace period"
                );
                false
            }
        }
    }
}

impl Drop for WorkerHost {
    fn drop(&mut self) {
        // An abandoned worker must not keep running.
        self.cancel.cancel();
    }
}

fn worker_main(
    runner: Arc<dyn ScriptRunner>,
    payload: Value,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<WorkerEvent>,
) {
    // Send errors mean the coordinator already settled; nothing to report to.
    let report = |message: WorkerMessage, code: i32| {
        let _ = events.send(WorkerEvent::Message(message));
        let _ = events.send(WorkerEvent::Exit(code));
    };

    let Some(code) = payload.get("code").and_then(Value::as_str) else {
        report(
            WorkerMessage::Failure("worker payload must contain a string `code` field".to_string()),
            1,
        );
        return;
    };

    match panic::catch_unwind(AssertUnwindSafe(|| runner.run(code, &cancel))) {
        Ok(result) => report(WorkerMessage::Success(result), 0),
        Err(panic) => report(WorkerMessage::Failure(panic_message(panic.as_ref())), 1),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
