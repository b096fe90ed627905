//! MCP request dispatch shared by the stdio and HTTP transports

use crate::error::ProtocolError;
use crate::tool::{self, RunJavascriptArgs, TOOL_NAME};
use jsbox_common::{
    CallToolParams, Implementation, InitializeResult, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, RequestId, ServerCapabilities,
    ToolsCapability, PROTOCOL_VERSION,
};
use jsbox_sandbox::{ExecutionLimits, ScriptExecutor};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

const INSTRUCTIONS: &str = "Use run_javascript_code to execute JavaScript in an isolated \
                            interpreter and read back what it printed.";

/// Stateless MCP handler around a script executor
pub struct McpHandler {
    executor: Arc<dyn ScriptExecutor>,
    server_info: Implementation,
}

impl McpHandler {
    pub fn new(executor: Arc<dyn ScriptExecutor>) -> Self {
        Self {
            executor,
            server_info: Implementation::new("jsbox", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn server_info(&self) -> &Implementation {
        &self.server_info
    }

    /// Limits of the underlying executor
    pub fn limits(&self) -> ExecutionLimits {
        self.executor.execution_limits()
    }

    /// Handle one raw JSON message. Returns `None` when no reply is due.
    pub async fn handle_text(&self, text: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Malformed JSON-RPC message");
                return Some(JsonRpcResponse::failure(
                    RequestId::Null,
                    ProtocolError::from(e).to_rpc_error(),
                ));
            }
        };

        match serde_json::from_value::<JsonRpcMessage>(value) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                warn!(error = %e, "Message is not a JSON-RPC request");
                Some(JsonRpcResponse::failure(
                    RequestId::Null,
                    ProtocolError::InvalidRequest(e.to_string()).to_rpc_error(),
                ))
            }
        }
    }

    pub async fn handle_message(&self, message: JsonRpcMessage) -> Option<JsonRpcResponse> {
        match message {
            JsonRpcMessage::Request(request) => Some(self.handle_request(request).await),
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(notification);
                None
            }
            JsonRpcMessage::Response(response) => {
                warn!(id = %response.id, "Ignoring unsolicited response from client");
                None
            }
        }
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!(id = %request.id, method = %request.method, "Handling request");

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(),
            "ping" => Ok(json!({})),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params).await,
            other => Err(ProtocolError::MethodNotFound(other.to_string())),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => {
                debug!(id = %request.id, error = %e, "Request failed");
                JsonRpcResponse::failure(request.id, e.to_rpc_error())
            }
        }
    }

    fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "notifications/initialized" | "initialized" => info!("Client initialized"),
            "notifications/cancelled" => debug!("Client cancelled a request"),
            other => warn!(method = %other, "Unknown notification method"),
        }
    }

    fn handle_initialize(&self) -> Result<Value, ProtocolError> {
        info!(
            server = %self.server_info.name,
            version = %self.server_info.version,
            "Handling initialize request"
        );

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: self.server_info.clone(),
            instructions: Some(INSTRUCTIONS.to_string()),
        };

        to_value(result)
    }

    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, ProtocolError> {
        let params = params
            .ok_or_else(|| ProtocolError::InvalidParams("Missing params".to_string()))?;
        let params: CallToolParams = serde_json::from_value(params)
            .map_err(|e| ProtocolError::InvalidParams(format!("Invalid params: {}", e)))?;

        if params.name != TOOL_NAME {
            return Err(ProtocolError::InvalidParams(format!(
                "Unknown tool: {}",
                params.name
            )));
        }

        let args = RunJavascriptArgs::from_value(params.arguments, &self.limits())?;
        info!(tool = TOOL_NAME, "Calling tool");

        let result = tool::call(self.executor.as_ref(), &args).await;
        to_value(result)
    }

    fn handle_tools_list(&self) -> Result<Value, ProtocolError> {
        to_value(ListToolsResult {
            tools: vec![tool::tool_definition(&self.limits())],
        })
    }
}

fn to_value(value: impl serde::Serialize) -> Result<Value, ProtocolError> {
    serde_json::to_value(value).map_err(|e| ProtocolError::Internal(e.to_string()))
}
