// File tools backed by the local file store

use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{json_schema_object, json_schema_string, Tool};
use anyhow::{Context, Result};
use mcpbridge_core::LocalFileStore;
use serde::Deserialize;
use std::sync::Arc;

/// Tool to write text files under the store's base directory
pub struct WriteFileTool {
    store: Arc<LocalFileStore>,
}

impl WriteFileTool {
    pub fn new(store: Arc<LocalFileStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
}

#[async_trait::async_trait]
impl Tool for WriteFileTool {
    fn schema(&self) -> ToolSchema {
        let mut input_schema = json_schema_object(
            serde_json::json!({
                "path": json_schema_string("Path of the file, relative to the server's base directory"),
                "content": json_schema_string("Text to write; replaces any existing content")
            }),
            vec!["path", "content"],
        );
        input_schema["title"] = "WriteFileParams".into();
        input_schema["examples"] = serde_json::json!([
            { "path": "test.txt", "content": "Hello World" }
        ]);

        ToolSchema {
            name: "write_file".to_string(),
            description: "Write content to a file. Path is relative to server's base directory."
                .to_string(),
            input_schema,
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: WriteFileArgs = match serde_json::from_value(arguments) {
            Ok(args) => args,
            Err(e) => {
                tracing::error!(error = %e, "Validation error for tool write_file");
                return Ok(CallToolResult::error(format!(
                    "Invalid arguments for write_file: {}",
                    e
                )));
            }
        };

        let written = self
            .store
            .write(&args.path, &args.content)
            .await
            .context("Failed to write file")?;

        let json = serde_json::to_string_pretty(&written)?;
        Ok(CallToolResult::text(json))
    }
}
