//! File workflow example.
//!
//! Launches the local file server, discovers its tools, then runs the
//! config-file task: three sequential writes, three parallel reads, and a
//! summary file.
//!
//! Run with: cargo run --example file_workflow
//! (expects `local-file-server` on PATH, e.g. after `cargo install --path crates/mcp`)

use mcpbridge_agent::{run_config_workflow, AgentConfig, AgentResult, McpAssistantAgent};

#[tokio::main]
async fn main() -> AgentResult<()> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    std::fs::create_dir_all("./data")?;

    let config = AgentConfig::default();
    let agent = McpAssistantAgent::connect(&config).await?;

    println!("Connected as {}", agent.name());
    println!(
        "Server: {}",
        agent.client().server_info().server_info.name
    );

    println!("\nSystem message sent to the model:\n");
    println!("{}", agent.system_message_with_tools().await?);

    println!("\nResources:");
    println!("{}", agent.list_resources().await?);

    println!("\nRunning config workflow...");
    let report = run_config_workflow(&agent, 3).await?;
    println!("  Written: {}", report.written.join(", "));
    println!("  Verified: {}", report.verified.join(", "));
    println!("  {}: {}", report.summary_path, report.summary);

    let summary = agent.read_resource("storage://local/summary.txt").await?;
    println!("\nRead back summary: {}", summary);

    agent.shutdown().await?;
    println!("\nFile workflow example completed successfully!");
    Ok(())
}
