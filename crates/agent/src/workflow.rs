//! Scripted config-file task: sequential writes, parallel reads, then a summary.

use crate::agent::McpAssistantAgent;
use crate::error::{AgentError, AgentResult};
use futures::future::join_all;
use mcpbridge_core::ResourceUri;
use serde::Serialize;

/// Outcome of [`run_config_workflow`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowReport {
    /// Files written, in order.
    pub written: Vec<String>,
    /// Files whose content read back as expected.
    pub verified: Vec<String>,
    /// Path of the summary file.
    pub summary_path: String,
    /// Content written to the summary file.
    pub summary: String,
}

/// Create `config1.txt`..`config{count}.txt`, read them back concurrently,
/// and record the total in `summary.txt`.
pub async fn run_config_workflow(
    agent: &McpAssistantAgent,
    count: usize,
) -> AgentResult<WorkflowReport> {
    let files: Vec<(String, String)> = (1..=count)
        .map(|n| (format!("config{}.txt", n), n.to_string()))
        .collect();

    // Writes run one after another
    let mut written = Vec::with_capacity(files.len());
    for (path, content) in &files {
        write_file(agent, path, content).await?;
        written.push(path.clone());
    }

    // Reads are independent of each other
    let reads = join_all(files.iter().map(|(path, _)| async move {
        let uri = ResourceUri::for_path(path.as_str()).to_string();
        agent.read_resource(&uri).await
    }))
    .await;

    let mut verified = Vec::with_capacity(files.len());
    for ((path, expected), read) in files.iter().zip(reads) {
        let content = read?;
        if content == *expected {
            verified.push(path.clone());
        } else {
            tracing::warn!(path = %path, expected = %expected, actual = %content, "Content mismatch");
        }
    }

    let summary_path = "summary.txt".to_string();
    let summary = format!("Total config files created: {}", written.len());
    write_file(agent, &summary_path, &summary).await?;

    tracing::info!(
        written = written.len(),
        verified = verified.len(),
        "Config workflow finished"
    );

    Ok(WorkflowReport {
        written,
        verified,
        summary_path,
        summary,
    })
}

async fn write_file(agent: &McpAssistantAgent, path: &str, content: &str) -> AgentResult<()> {
    let result = agent
        .client()
        .call_tool(
            "write_file",
            serde_json::json!({ "path": path, "content": content }),
        )
        .await?;

    if result.is_error() {
        return Err(AgentError::ToolFailed {
            name: "write_file".to_string(),
            message: result.joined_text(),
        });
    }
    Ok(())
}
