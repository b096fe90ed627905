//! Real JavaScript through the coordinator and the MCP tool
//!
//! The native backend uses `JSBOX_JS_INTERPRETER`, or `node`/`qjs` from
//! `PATH`. The wasm backend uses the QuickJS WASI module at
//! `JSBOX_QJS_WASM`. A test returns early when its interpreter is absent.

use assert_matches::assert_matches;
use jsbox_common::CallToolResult;
use jsbox_sandbox::{
    ExecuteOptions, ExecutionLimits, ProcessRunner, QuickJsRunner, SandboxError, SandboxService,
};
use jsbox_tests::common::{
    native_js_interpreter, quickjs_wasm_module, scratch_entries, setup_test_logging,
    McpTestClient,
};
use jsbox_transport::McpHandler;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn native_service(scratch: &Path) -> Option<SandboxService> {
    let program = native_js_interpreter()?;
    let mut runner =
        ProcessRunner::new(program.to_string_lossy(), vec![]).with_scratch_root(scratch);
    // Version-manager shims re-exec through `env`.
    if let Ok(path) = std::env::var("PATH") {
        runner = runner.with_env("PATH", path);
    }
    Some(SandboxService::new(Arc::new(runner), ExecutionLimits::default()))
}

fn wasm_service(scratch: &Path) -> Option<SandboxService> {
    let module = quickjs_wasm_module()?;
    let runner = QuickJsRunner::from_file(&module)
        .unwrap()
        .with_scratch_root(scratch);
    Some(SandboxService::new(Arc::new(runner), ExecutionLimits::default()))
}

async fn console_log_is_captured(service: &SandboxService, scratch: &Path) {
    let result = service
        .execute_script("console.log('hi')", ExecuteOptions::default())
        .await
        .unwrap();

    assert_eq!(result.stdout, "hi\n");
    assert_eq!(result.stderr, "");
    assert_eq!(result.exit_code, 0);
    assert!(result.error.is_none());
    assert_eq!(scratch_entries(scratch), 0);
}

async fn uncaught_throw_fails(service: &SandboxService, scratch: &Path) {
    let result = service
        .execute_script(
            "console.log('before'); throw new Error('boom')",
            ExecuteOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(result.stdout, "before\n");
    assert!(result.stderr.contains("boom"), "stderr: {}", result.stderr);
    assert_ne!(result.exit_code, 0);
    assert!(result.error.is_some());
    assert_eq!(scratch_entries(scratch), 0);
}

async fn busy_loop_times_out(service: &SandboxService, scratch: &Path) {
    let started = Instant::now();
    let err = service
        .execute_script("for (;;) {}", ExecuteOptions::with_timeout(100))
        .await
        .unwrap_err();

    assert_matches!(err, SandboxError::Timeout { timeout_ms: 100 });
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(scratch_entries(scratch), 0);
}

async fn tool_calls_report_javascript_outcomes(service: SandboxService) {
    let mut client = McpTestClient::start(Arc::new(McpHandler::new(Arc::new(service))));
    client.initialize().await;

    let response = client
        .call_tool(json!({ "javascript_code": "console.log(40 + 2)" }))
        .await;
    let result: CallToolResult = serde_json::from_value(response.result.unwrap()).unwrap();
    assert_eq!(result, CallToolResult::text("42\n", false));

    let response = client
        .call_tool(json!({ "javascript_code": "undefinedFunction()" }))
        .await;
    let result: CallToolResult = serde_json::from_value(response.result.unwrap()).unwrap();
    assert!(result.is_error);
    let text = result.joined_text();
    assert!(text.contains("--- stderr ---"), "text: {}", text);
    assert!(text.contains("undefinedFunction"), "text: {}", text);
    assert!(text.contains("--- error ---\nscript exited with code"), "text: {}", text);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_native_interpreter_runs_javascript() {
    setup_test_logging();
    let scratch = tempfile::tempdir().unwrap();
    let Some(service) = native_service(scratch.path()) else {
        eprintln!("no native JavaScript interpreter found, skipping");
        return;
    };

    console_log_is_captured(&service, scratch.path()).await;
    uncaught_throw_fails(&service, scratch.path()).await;
    busy_loop_times_out(&service, scratch.path()).await;
    tool_calls_report_javascript_outcomes(service).await;
}

#[tokio::test]
async fn test_quickjs_wasm_runs_javascript() {
    setup_test_logging();
    let scratch = tempfile::tempdir().unwrap();
    let Some(service) = wasm_service(scratch.path()) else {
        eprintln!("JSBOX_QJS_WASM not set, skipping");
        return;
    };

    console_log_is_captured(&service, scratch.path()).await;
    uncaught_throw_fails(&service, scratch.path()).await;
    busy_loop_times_out(&service, scratch.path()).await;
    tool_calls_report_javascript_outcomes(service).await;
}

#[tokio::test]
async fn test_large_javascript_source() {
    let scratch = tempfile::tempdir().unwrap();
    let Some(service) = native_service(scratch.path()) else {
        eprintln!("no native JavaScript interpreter found, skipping");
        return;
    };

    let code = format!("// {}\nconsole.log('done')", "x".repeat(500_000));
    let result = service
        .execute_script(&code, ExecuteOptions::default())
        .await
        .unwrap();
    assert_eq!(result.stdout, "done\n");
    assert_eq!(result.exit_code, 0);
}
