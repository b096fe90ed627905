//! Newline-delimited JSON-RPC over a byte stream (stdin/stdout by default)
//!
//! Requests are handled concurrently; responses are written in completion
//! order, one JSON document per line.

use crate::handler::McpHandler;
use anyhow::{Context, Result};
use jsbox_common::JsonRpcResponse;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Serve MCP on the process's stdin/stdout
pub async fn serve_stdio(handler: Arc<McpHandler>) -> Result<()> {
    info!("Serving MCP over stdio");
    serve_io(handler, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve MCP on any reader/writer pair until the reader reaches EOF
pub async fn serve_io<R, W>(handler: Arc<McpHandler>, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let (response_tx, mut response_rx) = mpsc::unbounded_channel::<JsonRpcResponse>();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from input stream")? else {
                    debug!("Input stream closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let handler = Arc::clone(&handler);
                let response_tx = response_tx.clone();
                tokio::spawn(async move {
                    if let Some(response) = handler.handle_text(&line).await {
                        let _ = response_tx.send(response);
                    }
                });
            }
            Some(response) = response_rx.recv() => {
                write_response(&mut writer, &response).await?;
            }
        }
    }

    // Flush replies for requests still in flight at EOF.
    drop(response_tx);
    while let Some(response) = response_rx.recv().await {
        write_response(&mut writer, &response).await?;
    }

    info!("MCP stdio session ended");
    Ok(())
}

async fn write_response<W>(writer: &mut W, response: &JsonRpcResponse) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(response).context("Failed to serialize response")?;
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .await
        .context("Failed to write response")?;
    writer.flush().await.context("Failed to flush response")?;
    Ok(())
}
