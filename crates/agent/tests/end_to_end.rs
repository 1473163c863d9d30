// Agent ↔ server round trips over an in-memory duplex stream

use futures::future::join_all;
use mcpbridge_agent::{
    default_system_message, run_config_workflow, AgentError, McpAssistantAgent, McpClient,
    StdioTransport,
};
use mcpbridge_core::LocalFileStore;
use mcpbridge_mcp::protocol::{Implementation, JsonRpcError, Prompt, PromptArgument};
use mcpbridge_mcp::tools::{ToolRegistry, WriteFileTool};
use mcpbridge_mcp::{LocalFileResources, McpServer, PromptTemplate};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

async fn connect(temp_dir: &TempDir) -> McpAssistantAgent {
    connect_with_prompts(temp_dir, Vec::new()).await
}

async fn connect_with_prompts(temp_dir: &TempDir, prompts: Vec<PromptTemplate>) -> McpAssistantAgent {
    let store = Arc::new(LocalFileStore::new(temp_dir.path()).unwrap());
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(WriteFileTool::new(store.clone())));
    let server = McpServer::new(Implementation::new("local-file-server", "test"), tools)
        .with_resources(Arc::new(LocalFileResources::new(store)))
        .with_prompts(prompts);

    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_io);
    tokio::spawn(async move { server.serve(server_read, server_write).await });

    let (client_read, client_write) = tokio::io::split(client_io);
    let transport = StdioTransport::from_streams(client_read, client_write, Duration::from_secs(5));
    let client = McpClient::connect(Arc::new(transport), Implementation::new("e2e", "0"))
        .await
        .unwrap();

    McpAssistantAgent::new("mcp_assistant", default_system_message(), client)
}

#[tokio::test]
async fn test_handshake_reports_server() {
    let temp_dir = TempDir::new().unwrap();
    let agent = connect(&temp_dir).await;

    let info = agent.client().server_info();
    assert_eq!(info.server_info.name, "local-file-server");
    assert!(info.capabilities.resources.is_some());
    agent.client().ping().await.unwrap();
}

#[tokio::test]
async fn test_list_tools_describes_write_file() {
    let temp_dir = TempDir::new().unwrap();
    let agent = connect(&temp_dir).await;

    let tools: serde_json::Value = serde_json::from_str(&agent.list_tools().await.unwrap()).unwrap();
    assert_eq!(tools[0]["name"], "write_file");
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["path", "content"]));

    let prompt = agent.system_message_with_tools().await.unwrap();
    assert!(prompt.contains("Available tools:"));
    assert!(prompt.contains("- write_file: Write content to a file."));
}

#[tokio::test]
async fn test_call_tool_then_read_resource() {
    let temp_dir = TempDir::new().unwrap();
    let agent = connect(&temp_dir).await;

    let output = agent
        .call_tool("write_file", json!({"path": "config1.txt", "content": "1"}))
        .await
        .unwrap();
    let written: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(written["bytes_written"], 1);

    assert_eq!(
        agent.read_resource("storage://local/config1.txt").await.unwrap(),
        "1"
    );
}

#[tokio::test]
async fn test_tool_errors_come_back_as_text() {
    let temp_dir = TempDir::new().unwrap();
    let agent = connect(&temp_dir).await;

    let unknown = agent.call_tool("delete_file", json!({})).await.unwrap();
    assert_eq!(unknown, "Error: Unknown tool: delete_file");

    let invalid = agent
        .call_tool("write_file", json!({"path": "x.txt"}))
        .await
        .unwrap();
    assert!(invalid.starts_with("Error: Invalid arguments for write_file"));
}

#[tokio::test]
async fn test_missing_resource_is_rpc_error() {
    let temp_dir = TempDir::new().unwrap();
    let agent = connect(&temp_dir).await;

    let err = agent
        .read_resource("storage://local/absent.txt")
        .await
        .unwrap_err();
    match err {
        AgentError::Rpc { code, message, .. } => {
            assert_eq!(code, JsonRpcError::RESOURCE_NOT_FOUND);
            assert_eq!(message, "Resource not found: absent.txt");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = agent.read_resource("file:///etc/passwd").await.unwrap_err();
    assert!(matches!(err, AgentError::Rpc { code, .. } if code == JsonRpcError::INVALID_PARAMS));
}

#[tokio::test]
async fn test_parallel_reads() {
    let temp_dir = TempDir::new().unwrap();
    for n in 1..=3 {
        std::fs::write(temp_dir.path().join(format!("config{n}.txt")), n.to_string()).unwrap();
    }
    let agent = connect(&temp_dir).await;

    let uris: Vec<String> = (1..=3).map(|n| format!("storage://local/config{n}.txt")).collect();
    let contents = join_all(uris.iter().map(|uri| agent.read_resource(uri))).await;

    let contents: Vec<String> = contents.into_iter().map(Result::unwrap).collect();
    assert_eq!(contents, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_invoke_dispatches_function_map() {
    let temp_dir = TempDir::new().unwrap();
    let agent = connect(&temp_dir).await;

    agent
        .invoke(
            "call_tool",
            json!({"name": "write_file", "arguments": {"path": "notes/a.txt", "content": "alpha"}}),
        )
        .await
        .unwrap();

    let read = agent
        .invoke("read_resource", json!("{\"uri\": \"storage://local/notes/a.txt\"}"))
        .await
        .unwrap();
    assert_eq!(read, "alpha");

    let listing: serde_json::Value =
        serde_json::from_str(&agent.invoke("list_resources", json!({})).await.unwrap()).unwrap();
    assert_eq!(listing["resources"][0]["uri"], "storage://local/");
    assert_eq!(listing["resourceTemplates"][0]["uriTemplate"], "storage://local/{/path}");

    assert_eq!(agent.invoke("list_prompts", json!(null)).await.unwrap(), "[]");

    assert!(matches!(
        agent.invoke("run_shell", json!({})).await,
        Err(AgentError::UnknownFunction(name)) if name == "run_shell"
    ));
    assert!(matches!(
        agent.invoke("read_resource", json!({})).await,
        Err(AgentError::InvalidArguments(_))
    ));
}

#[tokio::test]
async fn test_invoke_decodes_string_encoded_tool_args() {
    let temp_dir = TempDir::new().unwrap();
    let agent = connect(&temp_dir).await;

    let output = agent
        .invoke(
            "call_tool",
            json!({"name": "write_file", "args": "{\"path\": \"encoded.txt\", \"content\": \"inner\"}"}),
        )
        .await
        .unwrap();
    assert!(!output.starts_with("Error:"), "{output}");
    assert_eq!(
        std::fs::read_to_string(temp_dir.path().join("encoded.txt")).unwrap(),
        "inner"
    );

    assert!(matches!(
        agent
            .invoke("call_tool", json!({"name": "write_file", "args": "not json"}))
            .await,
        Err(AgentError::InvalidArguments(_))
    ));
}

#[tokio::test]
async fn test_read_directory_resource() {
    let temp_dir = TempDir::new().unwrap();
    let agent = connect(&temp_dir).await;

    agent
        .call_tool("write_file", json!({"path": "notes/a.txt", "content": "a"}))
        .await
        .unwrap();
    agent
        .call_tool("write_file", json!({"path": "notes/b.txt", "content": "b"}))
        .await
        .unwrap();

    assert_eq!(
        agent.read_resource("storage://local/notes").await.unwrap(),
        "a.txt\nb.txt"
    );
    assert_eq!(agent.read_resource("storage://local/").await.unwrap(), "notes/");
}

#[tokio::test]
async fn test_prompts_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let summarize = PromptTemplate {
        prompt: Prompt {
            name: "summarize".to_string(),
            description: Some("Summarize a stored file".to_string()),
            arguments: vec![PromptArgument {
                name: "path".to_string(),
                description: None,
                required: true,
            }],
        },
        template: "Read storage://local/{path} and summarize it".to_string(),
    };
    let agent = connect_with_prompts(&temp_dir, vec![summarize]).await;

    assert!(agent.client().server_info().capabilities.prompts.is_some());
    let prompts: serde_json::Value =
        serde_json::from_str(&agent.list_prompts().await.unwrap()).unwrap();
    assert_eq!(prompts[0]["name"], "summarize");

    let text = agent
        .get_prompt(
            "summarize",
            HashMap::from([("path".to_string(), "config1.txt".to_string())]),
        )
        .await
        .unwrap();
    assert_eq!(text, "Read storage://local/config1.txt and summarize it");

    let err = agent.get_prompt("summarize", HashMap::new()).await.unwrap_err();
    assert!(matches!(err, AgentError::Rpc { code, .. } if code == JsonRpcError::INVALID_PARAMS));
}

#[tokio::test]
async fn test_prompts_capability_absent_without_prompts() {
    let temp_dir = TempDir::new().unwrap();
    let agent = connect(&temp_dir).await;

    assert!(agent.client().server_info().capabilities.prompts.is_none());
    assert!(agent.client().list_prompts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_config_workflow() {
    let temp_dir = TempDir::new().unwrap();
    let agent = connect(&temp_dir).await;

    let report = run_config_workflow(&agent, 3).await.unwrap();

    assert_eq!(report.written, vec!["config1.txt", "config2.txt", "config3.txt"]);
    assert_eq!(report.verified, report.written);
    assert_eq!(
        std::fs::read_to_string(temp_dir.path().join("summary.txt")).unwrap(),
        "Total config files created: 3"
    );
}

#[tokio::test]
async fn test_shutdown_closes_connection() {
    let temp_dir = TempDir::new().unwrap();
    let agent = connect(&temp_dir).await;

    agent.shutdown().await.unwrap();
    assert!(matches!(
        agent.list_tools().await,
        Err(AgentError::ConnectionClosed)
    ));
}
