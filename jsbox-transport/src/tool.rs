//! The `run_javascript_code` tool
//!
//! Argument validation, the coordinator call and the mapping from an
//! execution outcome to tool result text.

use crate::error::ProtocolError;
use jsbox_common::{CallToolResult, Tool};
use jsbox_sandbox::{ExecuteOptions, ExecutionLimits, ExecutionResult, ScriptExecutor};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

pub const TOOL_NAME: &str = "run_javascript_code";

const STDERR_SEPARATOR: &str = "\n--- stderr ---\n";
const ERROR_SEPARATOR: &str = "\n--- error ---\n";

/// Tool definition advertised by `tools/list`, built from the limits the
/// executor actually enforces
pub fn tool_definition(limits: &ExecutionLimits) -> Tool {
    Tool {
        name: TOOL_NAME.to_string(),
        description: "Execute JavaScript code in a sandboxed QuickJS interpreter. \
                      Output written with console.log is returned as text; \
                      there is no network or filesystem access."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "javascript_code": {
                    "type": "string",
                    "minLength": 1,
                    "maxLength": limits.max_code_size,
                    "description": "The JavaScript source to run"
                },
                "timeout": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": limits.max_timeout_ms,
                    "description": format!(
                        "Wall-clock limit in milliseconds (default {})",
                        limits.default_timeout_ms.min(limits.max_timeout_ms)
                    )
                }
            },
            "required": ["javascript_code"]
        }),
    }
}

/// Validated tool arguments
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunJavascriptArgs {
    #[serde(alias = "code")]
    pub javascript_code: String,
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl RunJavascriptArgs {
    pub fn from_value(
        arguments: Option<Value>,
        limits: &ExecutionLimits,
    ) -> Result<Self, ProtocolError> {
        let arguments = arguments
            .ok_or_else(|| ProtocolError::InvalidParams("Missing tool arguments".to_string()))?;

        let args: RunJavascriptArgs = serde_json::from_value(arguments)
            .map_err(|e| ProtocolError::InvalidParams(format!("Invalid arguments: {}", e)))?;

        if args.javascript_code.is_empty() {
            return Err(ProtocolError::InvalidParams(
                "javascript_code must be a non-empty string".to_string(),
            ));
        }

        if let Some(timeout) = args.timeout {
            if timeout == 0 || timeout > limits.max_timeout_ms {
                return Err(ProtocolError::InvalidParams(format!(
                    "timeout must be between 1 and {} milliseconds",
                    limits.max_timeout_ms
                )));
            }
        }

        Ok(args)
    }

    pub fn options(&self) -> ExecuteOptions {
        ExecuteOptions {
            timeout_ms: self.timeout,
        }
    }
}

/// Render an execution result as tool output
pub fn format_output(result: &ExecutionResult) -> CallToolResult {
    let mut text = result.stdout.clone();
    if !result.stderr.is_empty() {
        text.push_str(STDERR_SEPARATOR);
        text.push_str(&result.stderr);
    }
    if let Some(error) = &result.error {
        text.push_str(ERROR_SEPARATOR);
        text.push_str(error);
    }

    let is_error = result.error.is_some() || !result.stderr.is_empty() || result.exit_code != 0;
    CallToolResult::text(text, is_error)
}

/// Run validated arguments through the executor. Coordinator errors become
/// flagged tool results, never protocol errors.
pub async fn call(executor: &dyn ScriptExecutor, args: &RunJavascriptArgs) -> CallToolResult {
    debug!(
        code_len = args.javascript_code.len(),
        timeout = ?args.timeout,
        "Calling {}",
        TOOL_NAME
    );

    match executor
        .execute_script(&args.javascript_code, args.options())
        .await
    {
        Ok(result) => format_output(&result),
        Err(e) => CallToolResult::text(format!("Error executing JavaScript: {}", e), true),
    }
}
