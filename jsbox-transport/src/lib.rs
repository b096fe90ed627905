//! MCP tool server for jsbox
//!
//! Exposes a single tool, `run_javascript_code`, backed by any
//! [`jsbox_sandbox::ScriptExecutor`], over stdio or HTTP.

mod error;
mod handler;
pub mod http_server;
pub mod stdio_server;
pub mod tool;

pub use error::ProtocolError;
pub use handler::McpHandler;
pub use http_server::{create_router, serve_http, start_server};
pub use stdio_server::{serve_io, serve_stdio};
pub use tool::{format_output, tool_definition, RunJavascriptArgs, TOOL_NAME};
