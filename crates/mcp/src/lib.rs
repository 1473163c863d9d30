// MCP (Model Context Protocol) server implementation
// Serves tools and resources to agent clients over JSON-RPC on stdio

pub mod protocol;
pub mod resources;
pub mod server;
pub mod tools;

pub use resources::{LocalFileResources, ResourceError, ResourceProvider};
pub use server::{McpServer, PromptTemplate};
