//! Line-oriented MCP client talking to `serve_io` over an in-memory pipe

use jsbox_common::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId};
use jsbox_transport::{serve_io, McpHandler, TOOL_NAME};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
};
use tokio::task::JoinHandle;

pub struct McpTestClient {
    writer: WriteHalf<DuplexStream>,
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    next_id: i64,
    session: JoinHandle<anyhow::Result<()>>,
}

impl McpTestClient {
    pub fn start(handler: Arc<McpHandler>) -> Self {
        let (client, server) = tokio::io::duplex(1 << 20);
        let (server_read, server_write) = tokio::io::split(server);
        let session = tokio::spawn(serve_io(handler, server_read, server_write));

        let (client_read, client_write) = tokio::io::split(client);
        Self {
            writer: client_write,
            lines: BufReader::new(client_read).lines(),
            next_id: 1,
            session,
        }
    }

    pub async fn send_raw(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    pub async fn next_response(&mut self) -> JsonRpcResponse {
        let line = self.lines.next_line().await.unwrap().expect("session closed");
        serde_json::from_str(&line).unwrap()
    }

    pub async fn request(&mut self, method: &str, params: Option<Value>) -> JsonRpcResponse {
        let id = RequestId::Number(self.next_id);
        self.next_id += 1;

        let request = JsonRpcRequest::new(id.clone(), method, params);
        self.send_raw(&serde_json::to_string(&request).unwrap()).await;

        let response = self.next_response().await;
        assert_eq!(response.id, id);
        response
    }

    pub async fn notify(&mut self, method: &str) {
        let notification = JsonRpcNotification {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params: None,
        };
        self.send_raw(&serde_json::to_string(&notification).unwrap())
            .await;
    }

    /// `initialize` followed by `notifications/initialized`
    pub async fn initialize(&mut self) -> JsonRpcResponse {
        let response = self
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": { "name": "jsbox-tests", "version": "0.0.0" }
                })),
            )
            .await;
        self.notify("notifications/initialized").await;
        response
    }

    pub async fn call_tool(&mut self, arguments: Value) -> JsonRpcResponse {
        self.request(
            "tools/call",
            Some(json!({ "name": TOOL_NAME, "arguments": arguments })),
        )
        .await
    }

    /// Close the input side and wait for the server loop to finish
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.writer.shutdown().await?;
        self.session.await?
    }
}
