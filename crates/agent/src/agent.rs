//! Assistant agent that proxies MCP operations to an LLM tool-calling layer.
//!
//! The agent exposes five functions (`list_tools`, `call_tool`,
//! `read_resource`, `list_resources`, `list_prompts`). Each returns a plain
//! string so it can be handed straight back to a model as a function result.
//! [`McpAssistantAgent::function_definitions`] describes them with JSON Schema
//! and [`McpAssistantAgent::invoke`] dispatches a call by name, which together
//! form the function map an agent framework registers.

use crate::client::McpClient;
use crate::config::AgentConfig;
use crate::error::{AgentError, AgentResult};
use crate::transport::StdioTransport;
use mcpbridge_mcp::protocol::Implementation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A function the agent exposes to the tool-calling layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

pub struct McpAssistantAgent {
    name: String,
    system_message: String,
    client: McpClient,
}

#[derive(Debug, Deserialize)]
struct CallToolArgs {
    name: String,
    #[serde(default, alias = "arguments")]
    args: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ReadResourceArgs {
    uri: String,
}

impl McpAssistantAgent {
    /// Spawn the configured server and connect to it.
    pub async fn connect(config: &AgentConfig) -> AgentResult<Self> {
        let transport = StdioTransport::spawn(&config.server, config.request_timeout())?;
        let client = McpClient::connect(
            Arc::new(transport),
            Implementation::new(&config.client_name, env!("CARGO_PKG_VERSION")),
        )
        .await?;

        let system_message = config
            .system_message
            .clone()
            .unwrap_or_else(default_system_message);

        Ok(Self::new(&config.name, system_message, client))
    }

    pub fn new(name: impl Into<String>, system_message: impl Into<String>, client: McpClient) -> Self {
        Self {
            name: name.into(),
            system_message: system_message.into(),
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn system_message(&self) -> &str {
        &self.system_message
    }

    pub fn client(&self) -> &McpClient {
        &self.client
    }

    /// JSON array of the server's tools (`name`, `description`, `inputSchema`).
    pub async fn list_tools(&self) -> AgentResult<String> {
        let tools = self.client.list_tools().await?;
        Ok(serde_json::to_string_pretty(&tools)?)
    }

    /// Call a tool and return its text output; failed calls are prefixed with `Error: `.
    pub async fn call_tool(&self, name: &str, args: serde_json::Value) -> AgentResult<String> {
        let result = self.client.call_tool(name, args).await?;
        let text = result.joined_text();
        if result.is_error() {
            tracing::warn!(tool = name, "Tool call returned an error");
            Ok(format!("Error: {}", text))
        } else {
            Ok(text)
        }
    }

    /// Read a resource and return its text content.
    pub async fn read_resource(&self, uri: &str) -> AgentResult<String> {
        let result = self.client.read_resource(uri).await?;
        Ok(result.joined_text())
    }

    /// JSON object listing concrete resources and resource templates.
    pub async fn list_resources(&self) -> AgentResult<String> {
        let resources = self.client.list_resources().await?;
        let templates = self.client.list_resource_templates().await?;
        Ok(serde_json::to_string_pretty(&serde_json::json!({
            "resources": resources,
            "resourceTemplates": templates,
        }))?)
    }

    /// JSON array of the server's prompts.
    pub async fn list_prompts(&self) -> AgentResult<String> {
        let prompts = self.client.list_prompts().await?;
        Ok(serde_json::to_string_pretty(&prompts)?)
    }

    /// Render a prompt and return the text of its messages, one per line.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: HashMap<String, String>,
    ) -> AgentResult<String> {
        let result = self.client.get_prompt(name, arguments).await?;
        Ok(result
            .messages
            .iter()
            .filter_map(|message| message.content.as_text())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// The system message followed by the live tool list.
    pub async fn system_message_with_tools(&self) -> AgentResult<String> {
        let tools = self.client.list_tools().await?;
        let mut message = self.system_message.clone();
        message.push_str("\n\nAvailable tools:\n");
        for tool in &tools {
            message.push_str(&format!("- {}: {}\n", tool.name, tool.description));
        }
        Ok(message)
    }

    /// Definitions for every function [`invoke`](Self::invoke) accepts.
    pub fn function_definitions() -> Vec<FunctionDefinition> {
        let no_args = serde_json::json!({ "type": "object", "properties": {} });
        vec![
            FunctionDefinition {
                name: "list_tools".to_string(),
                description: "List the tools available on the MCP server, with their argument schemas"
                    .to_string(),
                parameters: no_args.clone(),
            },
            FunctionDefinition {
                name: "call_tool".to_string(),
                description: "Call an MCP tool by name with arguments matching its schema"
                    .to_string(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "description": "The tool's name" },
                        "args": { "type": "object", "description": "Arguments matching the tool's input schema" }
                    },
                    "required": ["name", "args"]
                }),
            },
            FunctionDefinition {
                name: "read_resource".to_string(),
                description: "Read the content of a resource by URI (e.g. storage://local/config.txt)"
                    .to_string(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "uri": { "type": "string", "description": "Resource URI" }
                    },
                    "required": ["uri"]
                }),
            },
            FunctionDefinition {
                name: "list_resources".to_string(),
                description: "List resources and resource URI templates offered by the MCP server"
                    .to_string(),
                parameters: no_args.clone(),
            },
            FunctionDefinition {
                name: "list_prompts".to_string(),
                description: "List prompt templates offered by the MCP server".to_string(),
                parameters: no_args,
            },
        ]
    }

    /// Dispatch a function-map call by name.
    ///
    /// `args` may be a JSON object or a string containing one, since some
    /// models encode arguments as a string.
    pub async fn invoke(&self, function: &str, args: serde_json::Value) -> AgentResult<String> {
        let args = normalize_args(args)?;
        tracing::debug!(agent = %self.name, function, "Invoking function");

        match function {
            "list_tools" => self.list_tools().await,
            "list_resources" => self.list_resources().await,
            "list_prompts" => self.list_prompts().await,
            "call_tool" => {
                let call: CallToolArgs = parse_args(function, args)?;
                // The tool's own arguments may be string-encoded as well
                let tool_args = match call.args {
                    Some(tool_args) => normalize_args(tool_args)?,
                    None => serde_json::json!({}),
                };
                self.call_tool(&call.name, tool_args).await
            }
            "read_resource" => {
                let read: ReadResourceArgs = parse_args(function, args)?;
                self.read_resource(&read.uri).await
            }
            other => Err(AgentError::UnknownFunction(other.to_string())),
        }
    }

    pub async fn shutdown(&self) -> AgentResult<()> {
        self.client.shutdown().await
    }
}

fn normalize_args(args: serde_json::Value) -> AgentResult<serde_json::Value> {
    match args {
        serde_json::Value::Null => Ok(serde_json::json!({})),
        serde_json::Value::String(raw) if raw.trim().is_empty() => Ok(serde_json::json!({})),
        serde_json::Value::String(raw) => serde_json::from_str(&raw)
            .map_err(|e| AgentError::InvalidArguments(format!("Arguments are not valid JSON: {}", e))),
        other => Ok(other),
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(
    function: &str,
    args: serde_json::Value,
) -> AgentResult<T> {
    serde_json::from_value(args)
        .map_err(|e| AgentError::InvalidArguments(format!("{}: {}", function, e)))
}

/// Default system message explaining resources, tools, and the discovery workflow.
pub fn default_system_message() -> String {
    r#"You are an intelligent assistant with access to both Resources and Tools through the MCP (Model Context Protocol) interface:

Resources (for accessing content):
- Use read_resource for accessing file contents via URIs (e.g., "storage://local/config.txt")
- Resources represent actual data and content you can read
- Resource URIs follow the pattern: storage://local/{/path}

Tools (for performing operations):
- Discover available tools using list_tools
- Each tool has:
  * A unique name (e.g., "write_file")
  * A description of its purpose
  * A schema defining its required arguments
- To use a tool:
  1. First call list_tools to discover available tools and their parameters
  2. Then call_tool with:
     * name: The tool's name (e.g., "write_file")
     * args: An object matching the tool's parameter schema

Best Practices:
1. Always discover tools first - don't assume which tools are available
2. Use the exact parameter structure defined in each tool's schema
3. Tools are server-specific - different servers may provide different capabilities
4. Use Resources for reading content, Tools for actions and modifications

Example workflow:
1. List available tools to discover capabilities
2. Match tool parameters exactly to their schemas
3. Use tools and resources appropriately for your task"#
        .to_string()
}
