//! MCP client: initialize handshake and typed protocol calls.

use crate::error::{AgentError, AgentResult};
use crate::transport::McpTransport;
use mcpbridge_mcp::protocol::{
    CallToolParams, CallToolResult, ClientCapabilities, GetPromptParams, GetPromptResult,
    Implementation, InitializeParams, InitializeResult, ListPromptsResult,
    ListResourceTemplatesResult, ListResourcesResult, ListToolsResult, Prompt, ReadResourceParams,
    ReadResourceResult, Resource, ResourceTemplate, ToolSchema, PROTOCOL_VERSION,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Client for one initialized MCP server connection.
#[derive(Clone)]
pub struct McpClient {
    transport: Arc<dyn McpTransport>,
    server: Arc<InitializeResult>,
}

impl McpClient {
    /// Run the initialize handshake over `transport`.
    pub async fn connect(
        transport: Arc<dyn McpTransport>,
        client_info: Implementation,
    ) -> AgentResult<Self> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info,
        };

        let value = transport
            .request("initialize", Some(serde_json::to_value(params)?))
            .await?;
        let server: InitializeResult = serde_json::from_value(value)
            .map_err(|e| AgentError::Protocol(format!("Invalid initialize result: {}", e)))?;

        if server.protocol_version != PROTOCOL_VERSION {
            warn!(
                server_version = %server.protocol_version,
                client_version = PROTOCOL_VERSION,
                "MCP server negotiated a different protocol version"
            );
        }

        transport.notify("notifications/initialized", None).await?;

        info!(
            server = %server.server_info.name,
            version = %server.server_info.version,
            "Connected to MCP server"
        );

        Ok(Self {
            transport,
            server: Arc::new(server),
        })
    }

    /// What the server reported during initialization.
    pub fn server_info(&self) -> &InitializeResult {
        &self.server
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> AgentResult<T> {
        let value = self.transport.request(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| AgentError::Protocol(format!("Invalid {} result: {}", method, e)))
    }

    pub async fn ping(&self) -> AgentResult<()> {
        self.transport.request("ping", None).await?;
        Ok(())
    }

    pub async fn list_tools(&self) -> AgentResult<Vec<ToolSchema>> {
        let result: ListToolsResult = self.call("tools/list", None).await?;
        debug!(count = result.tools.len(), "Listed tools");
        Ok(result.tools)
    }

    /// Invoke a tool. `arguments` must be a JSON object or null.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> AgentResult<CallToolResult> {
        let arguments = match arguments {
            serde_json::Value::Object(_) => Some(arguments),
            serde_json::Value::Null => None,
            _ => {
                return Err(AgentError::InvalidArguments(format!(
                    "Tool '{}' requires JSON object arguments",
                    name
                )));
            }
        };

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let result: CallToolResult = self
            .call("tools/call", Some(serde_json::to_value(params)?))
            .await?;
        debug!(tool = name, is_error = result.is_error(), "Called tool");
        Ok(result)
    }

    pub async fn list_resources(&self) -> AgentResult<Vec<Resource>> {
        if self.server.capabilities.resources.is_none() {
            return Ok(Vec::new());
        }
        let result: ListResourcesResult = self.call("resources/list", None).await?;
        debug!(count = result.resources.len(), "Listed resources");
        Ok(result.resources)
    }

    pub async fn list_resource_templates(&self) -> AgentResult<Vec<ResourceTemplate>> {
        if self.server.capabilities.resources.is_none() {
            return Ok(Vec::new());
        }
        let result: ListResourceTemplatesResult =
            self.call("resources/templates/list", None).await?;
        debug!(count = result.resource_templates.len(), "Listed resource templates");
        Ok(result.resource_templates)
    }

    pub async fn read_resource(&self, uri: &str) -> AgentResult<ReadResourceResult> {
        let params = ReadResourceParams {
            uri: uri.to_string(),
        };
        let result: ReadResourceResult = self
            .call("resources/read", Some(serde_json::to_value(params)?))
            .await?;
        debug!(uri, contents = result.contents.len(), "Read resource");
        Ok(result)
    }

    pub async fn list_prompts(&self) -> AgentResult<Vec<Prompt>> {
        if self.server.capabilities.prompts.is_none() {
            return Ok(Vec::new());
        }
        let result: ListPromptsResult = self.call("prompts/list", None).await?;
        debug!(count = result.prompts.len(), "Listed prompts");
        Ok(result.prompts)
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: HashMap<String, String>,
    ) -> AgentResult<GetPromptResult> {
        let params = GetPromptParams {
            name: name.to_string(),
            arguments,
        };
        self.call("prompts/get", Some(serde_json::to_value(params)?))
            .await
    }

    /// Close the connection and stop the server.
    pub async fn shutdown(&self) -> AgentResult<()> {
        info!(server = %self.server.server_info.name, "Shutting down MCP connection");
        self.transport.close().await
    }
}
