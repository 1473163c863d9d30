//! Transports carrying JSON-RPC messages to an MCP server.

mod stdio;

pub use stdio::StdioTransport;

use crate::error::AgentResult;

/// A bidirectional JSON-RPC channel to one MCP server.
#[async_trait::async_trait]
pub trait McpTransport: Send + Sync {
    /// Send a request and wait for its result.
    async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> AgentResult<serde_json::Value>;

    /// Send a notification; no response is expected.
    async fn notify(&self, method: &str, params: Option<serde_json::Value>) -> AgentResult<()>;

    /// Close the channel and release the server.
    async fn close(&self) -> AgentResult<()>;
}
