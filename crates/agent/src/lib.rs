//! # mcpbridge agent
//!
//! Client side of the MCP bridge: connects to an MCP server over stdio and
//! exposes its tools, resources, and prompts as plain functions an LLM agent
//! framework can register.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mcpbridge_agent::{AgentConfig, AgentResult, McpAssistantAgent};
//!
//! #[tokio::main]
//! async fn main() -> AgentResult<()> {
//!     let agent = McpAssistantAgent::connect(&AgentConfig::default()).await?;
//!
//!     // Tell the model what it can call
//!     println!("{}", agent.system_message_with_tools().await?);
//!
//!     // Forward the model's function calls
//!     let output = agent
//!         .invoke(
//!             "call_tool",
//!             serde_json::json!({"name": "write_file", "args": {"path": "a.txt", "content": "hi"}}),
//!         )
//!         .await?;
//!     println!("{}", output);
//!
//!     agent.shutdown().await
//! }
//! ```

pub mod agent;
pub mod client;
pub mod config;
pub mod error;
pub mod transport;
pub mod workflow;

pub use agent::{default_system_message, FunctionDefinition, McpAssistantAgent};
pub use client::McpClient;
pub use config::{AgentConfig, ServerCommand};
pub use error::{AgentError, AgentResult};
pub use transport::{McpTransport, StdioTransport};
pub use workflow::{run_config_workflow, WorkflowReport};
