//! Error types for the MCP agent.

use mcpbridge_mcp::protocol::JsonRpcError;
use std::time::Duration;

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Error types that can occur while talking to an MCP server.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// I/O on the server's pipes failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server process could not be started.
    #[error("Failed to spawn MCP server '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The server answered with a JSON-RPC error.
    #[error("MCP error {code}: {message}")]
    Rpc {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// The server flagged a tool result as an error.
    #[error("Tool '{name}' failed: {message}")]
    ToolFailed { name: String, message: String },

    /// No response arrived in time.
    #[error("Request '{method}' timed out after {after:?}")]
    Timeout { method: String, after: Duration },

    /// The server closed its end of the connection.
    #[error("Connection to MCP server closed")]
    ConnectionClosed,

    /// The server sent something that does not follow the protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A function-map call named a function the agent does not expose.
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Function arguments did not match the function's parameters.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

impl AgentError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Rpc { code, .. } => *code == JsonRpcError::INTERNAL_ERROR,
            _ => false,
        }
    }
}

impl From<JsonRpcError> for AgentError {
    fn from(error: JsonRpcError) -> Self {
        Self::Rpc {
            code: error.code,
            message: error.message,
            data: error.data,
        }
    }
}
