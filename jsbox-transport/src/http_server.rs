//! HTTP transport for MCP clients
//!
//! `POST /mcp` takes one JSON-RPC message and answers with the JSON-RPC
//! response (202 with an empty body for notifications). `GET /health`
//! reports liveness.

use crate::handler::McpHandler;
use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use jsbox_sandbox::ExecutionLimits;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// Longest JSON encoding of a single char (an escaped surrogate pair)
const MAX_ENCODED_CHAR_BYTES: usize = 12;

/// Room for the JSON-RPC envelope around the script text
const ENVELOPE_ALLOWANCE: usize = 64 * 1024;

/// Create the HTTP router
pub fn create_router(handler: Arc<McpHandler>) -> Router {
    let body_limit = request_body_limit(&handler.limits());
    Router::new()
        .route("/mcp", post(handle_mcp_request))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(handler)
}

/// Any script the executor accepts must fit in one request body
fn request_body_limit(limits: &ExecutionLimits) -> usize {
    limits
        .max_code_size
        .saturating_mul(MAX_ENCODED_CHAR_BYTES)
        .saturating_add(ENVELOPE_ALLOWANCE)
}

/// Serve on an already bound listener until the future is dropped
pub async fn start_server(listener: tokio::net::TcpListener, handler: Arc<McpHandler>) -> Result<()> {
    let app = create_router(handler);

    let bind_addr = listener
        .local_addr()
        .context("Failed to obtain HTTP server bind address")?;
    info!("Starting MCP HTTP server on {}", bind_addr);

    axum::serve(listener, app)
        .await
        .context("MCP HTTP server error")?;

    Ok(())
}

/// Bind `addr` and serve
pub async fn serve_http(addr: &str, handler: Arc<McpHandler>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    start_server(listener, handler).await
}

// The body is taken as text so malformed JSON still gets a JSON-RPC
// parse error instead of an extractor rejection.
async fn handle_mcp_request(State(handler): State<Arc<McpHandler>>, body: String) -> Response {
    debug!(len = body.len(), "Received MCP POST request");

    match handler.handle_text(&body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn handle_health(State(handler): State<Arc<McpHandler>>) -> impl IntoResponse {
    let info = handler.server_info();
    Json(json!({
        "status": "ok",
        "server": info.name,
        "version": info.version,
    }))
}
