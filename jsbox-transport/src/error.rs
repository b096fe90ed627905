use jsbox_common::JsonRpcError;
use thiserror::Error;

/// Request-level failures reported to the client as JSON-RPC errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("{0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProtocolError {
    pub fn to_rpc_error(&self) -> JsonRpcError {
        match self {
            ProtocolError::Parse(_) => JsonRpcError::parse_error(self.to_string()),
            ProtocolError::InvalidRequest(_) => JsonRpcError::invalid_request(self.to_string()),
            ProtocolError::MethodNotFound(method) => JsonRpcError::method_not_found(method),
            ProtocolError::InvalidParams(msg) => JsonRpcError::invalid_params(msg.clone()),
            ProtocolError::Internal(_) => JsonRpcError::internal(self.to_string()),
        }
    }
}
