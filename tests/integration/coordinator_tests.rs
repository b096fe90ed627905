//! Integration tests for the execution coordinator
//!
//! A real child process (`/bin/sh`) plays the interpreter so that
//! capture, cancellation and scratch cleanup are exercised end to end.
#![cfg(unix)]

use assert_matches::assert_matches;
use jsbox_sandbox::{ExecuteOptions, ExecutionLimits, SandboxError, SandboxService};
use jsbox_tests::common::{scratch_entries, setup_test_logging, sh_service, PanicAfterSetup};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_happy_path_captures_stdout() {
    setup_test_logging();
    let scratch = tempfile::tempdir().unwrap();
    let service = sh_service(scratch.path());

    let result = service
        .execute_script("echo hello", ExecuteOptions::default())
        .await
        .unwrap();

    assert_eq!(result.stdout, "hello\n");
    assert_eq!(result.stderr, "");
    assert_eq!(result.exit_code, 0);
    assert!(result.error.is_none());
    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn test_script_failure_is_reported_in_result() {
    let scratch = tempfile::tempdir().unwrap();
    let service = sh_service(scratch.path());

    let result = service
        .execute_script(
            "echo before; echo 'ReferenceError: nope' >&2; exit 3",
            ExecuteOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(result.stdout, "before\n");
    assert_eq!(result.stderr, "ReferenceError: nope\n");
    assert_eq!(result.exit_code, 3);
    assert!(result.error.is_some());
    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn test_script_near_size_cap_runs() {
    let scratch = tempfile::tempdir().unwrap();
    let service = sh_service(scratch.path());

    // Well past the per-argument limit of the OS, well under the code cap.
    let code = format!("true #{}\necho ok", "a".repeat(200_000));
    let result = service
        .execute_script(&code, ExecuteOptions::default())
        .await
        .unwrap();

    assert_eq!(result.stdout, "ok\n");
    assert_eq!(result.exit_code, 0);
    assert!(result.error.is_none());
    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn test_infinite_loop_times_out() {
    let scratch = tempfile::tempdir().unwrap();
    let service = sh_service(scratch.path());

    let started = Instant::now();
    let err = service
        .execute_script("while :; do :; done", ExecuteOptions::with_timeout(100))
        .await
        .unwrap_err();

    assert_matches!(err, SandboxError::Timeout { timeout_ms: 100 });
    assert!(started.elapsed() < Duration::from_secs(1));
    // The worker was joined, so its scratch directory is already gone.
    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn test_oversized_code_rejected_immediately() {
    let scratch = tempfile::tempdir().unwrap();
    let service = sh_service(scratch.path());
    let code = "a".repeat(1_000_001);

    let started = Instant::now();
    let err = service
        .execute_script(&code, ExecuteOptions::default())
        .await
        .unwrap_err();

    assert_matches!(err, SandboxError::SizeLimit { .. });
    assert_eq!(
        err.to_string(),
        "JavaScript code exceeds maximum length of 1000000 characters"
    );
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn test_empty_code_rejected() {
    let scratch = tempfile::tempdir().unwrap();
    let err = sh_service(scratch.path())
        .execute_script("", ExecuteOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "JavaScript code must be a non-empty string");
}

#[tokio::test]
async fn test_crash_cleans_up_and_settles_once() {
    let scratch = tempfile::tempdir().unwrap();
    let service = SandboxService::new(
        Arc::new(PanicAfterSetup {
            scratch: scratch.path().to_path_buf(),
        }),
        ExecutionLimits::default(),
    );

    let err = service
        .execute_script("x", ExecuteOptions::default())
        .await
        .unwrap_err();

    // The failure payload wins over the exit code that follows it.
    assert_matches!(err, SandboxError::SandboxExecution(ref msg) if msg.contains("crashed"));
    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn test_concurrent_executions_are_isolated() {
    let scratch = tempfile::tempdir().unwrap();
    let service = Arc::new(sh_service(scratch.path()));

    let first = service.execute_script(
        "echo one; sleep 0.2; echo one-done; echo err-one >&2",
        ExecuteOptions::default(),
    );
    let second = service.execute_script(
        "echo two; sleep 0.1; echo two-done",
        ExecuteOptions::default(),
    );
    let (first, second) = tokio::join!(first, second);

    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(first.stdout, "one\none-done\n");
    assert_eq!(first.stderr, "err-one\n");
    assert_eq!(second.stdout, "two\ntwo-done\n");
    assert_eq!(second.stderr, "");
    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn test_many_sequential_runs_leave_no_scratch() {
    let scratch = tempfile::tempdir().unwrap();
    let service = sh_service(scratch.path());

    let scripts = ["echo ok", "exit 2", "echo err >&2", "while :; do :; done"];
    for script in scripts {
        let _ = service
            .execute_script(script, ExecuteOptions::with_timeout(100))
            .await;
    }
    assert_eq!(scratch_entries(scratch.path()), 0);
}
