// MCP server: JSON-RPC dispatch over newline-delimited stdio

use crate::protocol::*;
use crate::resources::ResourceProvider;
use crate::tools::ToolRegistry;
use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};

/// Upper bound for a single JSON-RPC line
const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// A prompt plus the text it expands to.
///
/// `{argument}` placeholders in `template` are replaced by the values passed
/// to `prompts/get`.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub prompt: Prompt,
    pub template: String,
}

impl PromptTemplate {
    pub fn render(&self, arguments: &HashMap<String, String>) -> Result<GetPromptResult, JsonRpcError> {
        let mut text = self.template.clone();
        for argument in &self.prompt.arguments {
            match arguments.get(&argument.name) {
                Some(value) => {
                    text = text.replace(&format!("{{{}}}", argument.name), value);
                }
                None if argument.required => {
                    return Err(JsonRpcError::invalid_params(format!(
                        "Missing required argument '{}' for prompt {}",
                        argument.name, self.prompt.name
                    )));
                }
                None => {}
            }
        }

        Ok(GetPromptResult {
            description: self.prompt.description.clone(),
            messages: vec![PromptMessage {
                role: "user".to_string(),
                content: ToolContent::text(text),
            }],
        })
    }
}

pub struct McpServer {
    info: Implementation,
    tools: ToolRegistry,
    resources: Option<Arc<dyn ResourceProvider>>,
    prompts: Vec<PromptTemplate>,
    instructions: Option<String>,
}

impl McpServer {
    pub fn new(info: Implementation, tools: ToolRegistry) -> Self {
        Self {
            info,
            tools,
            resources: None,
            prompts: Vec::new(),
            instructions: None,
        }
    }

    pub fn with_resources(mut self, provider: Arc<dyn ResourceProvider>) -> Self {
        self.resources = Some(provider);
        self
    }

    pub fn with_prompts(mut self, prompts: Vec<PromptTemplate>) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Serve on the process's stdin/stdout until the client disconnects
    pub async fn start(&self) -> Result<()> {
        tracing::info!(server = %self.info.name, "Server started, waiting for messages on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve one connection over arbitrary byte streams, returning at EOF
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_MESSAGE_BYTES));
        let mut sink = FramedWrite::new(writer, LinesCodec::new());

        while let Some(line) = lines.next().await {
            let response = match line {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => self.handle_message(&line).await,
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    tracing::warn!(limit = MAX_MESSAGE_BYTES, "Discarded oversized message");
                    Some(JsonRpcResponse::error(
                        serde_json::Value::Null,
                        JsonRpcError::parse_error(),
                    ))
                }
                Err(LinesCodecError::Io(e)) => return Err(e.into()),
            };

            if let Some(response) = response {
                sink.send(serde_json::to_string(&response)?).await?;
            }
        }

        tracing::info!(server = %self.info.name, "Client disconnected");
        Ok(())
    }

    /// Handle one raw JSON-RPC message; notifications produce no response
    pub async fn handle_message(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse message");
                return Some(JsonRpcResponse::error(
                    serde_json::Value::Null,
                    JsonRpcError::parse_error(),
                ));
            }
        };

        let id = value.get("id").cloned();
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(_) => {
                return Some(JsonRpcResponse::error(
                    id.unwrap_or(serde_json::Value::Null),
                    JsonRpcError::invalid_request(),
                ));
            }
        };

        if request.jsonrpc != JSONRPC_VERSION || request.method.is_empty() {
            return Some(JsonRpcResponse::error(
                request.id.unwrap_or(serde_json::Value::Null),
                JsonRpcError::invalid_request(),
            ));
        }

        let Some(id) = request.id else {
            self.handle_notification(&request.method);
            return None;
        };

        tracing::debug!(method = %request.method, id = %id, "Handling request");
        let response = match self.dispatch(&request.method, request.params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => {
                tracing::debug!(method = %request.method, code = error.code, "Request failed");
                JsonRpcResponse::error(id, error)
            }
        };
        Some(response)
    }

    fn handle_notification(&self, method: &str) {
        match method {
            "notifications/initialized" => tracing::info!("Client initialization complete"),
            "notifications/cancelled" => tracing::debug!("Client cancelled a request"),
            other => tracing::debug!(method = other, "Ignoring notification"),
        }
    }

    async fn dispatch(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        match method {
            "initialize" => to_result(self.initialize(params)),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => to_result(ListToolsResult {
                tools: self.tools.list_schemas(),
            }),
            "tools/call" => {
                let params: CallToolParams = parse_params(params)?;
                to_result(self.tools.call(&params.name, params.arguments).await)
            }
            "resources/list" => {
                let provider = self.resource_provider(method)?;
                to_result(ListResourcesResult {
                    resources: provider.list_resources().await,
                })
            }
            "resources/templates/list" => {
                let provider = self.resource_provider(method)?;
                to_result(ListResourceTemplatesResult {
                    resource_templates: provider.list_templates().await,
                })
            }
            "resources/read" => {
                let provider = self.resource_provider(method)?;
                let params: ReadResourceParams = parse_params(params)?;
                let result = provider
                    .read(&params.uri)
                    .await
                    .map_err(|e| e.into_rpc_error())?;
                to_result(result)
            }
            "prompts/list" => to_result(ListPromptsResult {
                prompts: self.prompts.iter().map(|p| p.prompt.clone()).collect(),
            }),
            "prompts/get" => {
                let params: GetPromptParams = parse_params(params)?;
                let template = self
                    .prompts
                    .iter()
                    .find(|p| p.prompt.name == params.name)
                    .ok_or_else(|| {
                        JsonRpcError::invalid_params(format!("Unknown prompt: {}", params.name))
                    })?;
                to_result(template.render(&params.arguments)?)
            }
            _ => Err(JsonRpcError::method_not_found(method)),
        }
    }

    fn initialize(&self, params: Option<serde_json::Value>) -> InitializeResult {
        match params.map(serde_json::from_value::<InitializeParams>) {
            Some(Ok(params)) => tracing::info!(
                client = %params.client_info.name,
                client_version = %params.client_info.version,
                protocol_version = %params.protocol_version,
                "Client connected"
            ),
            _ => tracing::warn!("Initialize request without valid params"),
        }

        InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
                resources: self.resources.as_ref().map(|_| ResourcesCapability::default()),
                prompts: (!self.prompts.is_empty()).then(PromptsCapability::default),
                experimental: None,
            },
            server_info: self.info.clone(),
            instructions: self.instructions.clone(),
        }
    }

    fn resource_provider(&self, method: &str) -> Result<&Arc<dyn ResourceProvider>, JsonRpcError> {
        self.resources
            .as_ref()
            .ok_or_else(|| JsonRpcError::method_not_found(method))
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<serde_json::Value>) -> Result<T, JsonRpcError> {
    let params = params.ok_or_else(|| JsonRpcError::invalid_params("Missing params"))?;
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))
}

fn to_result(value: impl Serialize) -> Result<serde_json::Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}
