//! MCP tool server over stdio framing, backed by a real coordinator
#![cfg(unix)]

use jsbox_common::{error_codes, CallToolResult, ListToolsResult};
use jsbox_tests::common::{scratch_entries, setup_test_logging, sh_service, McpTestClient};
use jsbox_transport::McpHandler;
use serde_json::json;
use std::sync::Arc;

fn start(scratch: &std::path::Path) -> McpTestClient {
    setup_test_logging();
    McpTestClient::start(Arc::new(McpHandler::new(Arc::new(sh_service(scratch)))))
}

fn tool_result(response: jsbox_common::JsonRpcResponse) -> CallToolResult {
    assert!(response.error.is_none(), "unexpected error: {:?}", response.error);
    serde_json::from_value(response.result.unwrap()).unwrap()
}

#[tokio::test]
async fn test_initialize_and_list_tools() {
    let scratch = tempfile::tempdir().unwrap();
    let mut client = start(scratch.path());

    let init = client.initialize().await;
    let result = init.result.unwrap();
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert!(result["capabilities"]["tools"].is_object());

    let tools: ListToolsResult =
        serde_json::from_value(client.request("tools/list", None).await.result.unwrap()).unwrap();
    assert_eq!(tools.tools.len(), 1);
    assert_eq!(tools.tools[0].name, "run_javascript_code");

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_successful_call() {
    let scratch = tempfile::tempdir().unwrap();
    let mut client = start(scratch.path());
    client.initialize().await;

    let result = tool_result(
        client
            .call_tool(json!({ "javascript_code": "echo hello from the sandbox" }))
            .await,
    );
    assert_eq!(
        result,
        CallToolResult::text("hello from the sandbox\n", false)
    );

    client.close().await.unwrap();
    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn test_failing_script_is_flagged() {
    let scratch = tempfile::tempdir().unwrap();
    let mut client = start(scratch.path());

    let result = tool_result(
        client
            .call_tool(json!({ "javascript_code": "echo partial; echo 'Error: boom' >&2; exit 1" }))
            .await,
    );
    assert!(result.is_error);
    assert_eq!(
        result.joined_text(),
        "partial\n\n--- stderr ---\nError: boom\n\n--- error ---\nscript exited with code 1"
    );

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_timeout_becomes_flagged_result() {
    let scratch = tempfile::tempdir().unwrap();
    let mut client = start(scratch.path());

    let result = tool_result(
        client
            .call_tool(json!({ "javascript_code": "while :; do :; done", "timeout": 100 }))
            .await,
    );
    assert!(result.is_error);
    assert_eq!(
        result.joined_text(),
        "Error executing JavaScript: Execution timed out after 100ms"
    );

    client.close().await.unwrap();
    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn test_invalid_arguments_are_protocol_errors() {
    let scratch = tempfile::tempdir().unwrap();
    let mut client = start(scratch.path());

    for arguments in [
        json!({ "javascript_code": "" }),
        json!({ "timeout": 10 }),
        json!({ "javascript_code": "echo x", "timeout": 300_001 }),
    ] {
        let response = client.call_tool(arguments).await;
        assert_eq!(response.error.unwrap().code, error_codes::INVALID_PARAMS);
    }

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_size_limit_through_tool() {
    let scratch = tempfile::tempdir().unwrap();
    let mut client = start(scratch.path());

    let code = "x".repeat(1_000_001);
    let result = tool_result(client.call_tool(json!({ "javascript_code": code })).await);
    assert!(result.is_error);
    assert!(result
        .joined_text()
        .starts_with("Error executing JavaScript: JavaScript code exceeds maximum length"));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_protocol_errors() {
    let scratch = tempfile::tempdir().unwrap();
    let mut client = start(scratch.path());

    client.send_raw("{\"jsonrpc\": \"2.0\", \"id\": 1,").await;
    let response = client.next_response().await;
    assert_eq!(response.error.unwrap().code, error_codes::PARSE_ERROR);

    let response = client.request("prompts/get", None).await;
    assert_eq!(response.error.unwrap().code, error_codes::METHOD_NOT_FOUND);

    let response = client.request("ping", None).await;
    assert_eq!(response.result, Some(json!({})));

    client.close().await.unwrap();
}
