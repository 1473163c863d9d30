use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mcpbridge_agent::{run_config_workflow, AgentConfig, McpAssistantAgent};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mcpbridge")]
#[command(about = "Drive an MCP server through the assistant agent's function map", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "mcpbridge.toml", env = "MCPBRIDGE_CONFIG")]
    config: PathBuf,

    /// Server executable (overrides the configuration file)
    #[arg(long)]
    server_command: Option<String>,

    /// Server argument; repeat for several (overrides the configuration file)
    #[arg(long = "server-arg", allow_hyphen_values = true)]
    server_args: Vec<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the server's tools
    Tools,
    /// Call a tool with JSON arguments
    Call {
        name: String,
        #[arg(default_value = "{}")]
        args: String,
    },
    /// Read a resource by URI
    Read { uri: String },
    /// List resources and resource templates
    Resources,
    /// List prompts
    Prompts,
    /// Render a prompt with JSON string arguments
    Prompt {
        name: String,
        #[arg(default_value = "{}")]
        args: String,
    },
    /// Print the system message including the live tool list
    SystemPrompt,
    /// Write config files, read them back in parallel, and write a summary
    Demo {
        #[arg(long, default_value_t = 3)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    let mut config = AgentConfig::load(&args.config)?;
    config.apply_overrides(args.server_command, args.server_args, args.timeout);

    let agent = McpAssistantAgent::connect(&config)
        .await
        .with_context(|| format!("Failed to connect to MCP server '{}'", config.server.command))?;

    let outcome = run(&agent, args.command).await;

    if let Err(e) = agent.shutdown().await {
        tracing::warn!(error = %e, "Failed to shut down MCP server cleanly");
    }

    println!("{}", outcome?);
    Ok(())
}

async fn run(agent: &McpAssistantAgent, command: Commands) -> Result<String> {
    let output = match command {
        Commands::Tools => agent.list_tools().await?,
        Commands::Call { name, args } => {
            let args: serde_json::Value =
                serde_json::from_str(&args).context("Tool arguments must be valid JSON")?;
            agent.call_tool(&name, args).await?
        }
        Commands::Read { uri } => agent.read_resource(&uri).await?,
        Commands::Resources => agent.list_resources().await?,
        Commands::Prompts => agent.list_prompts().await?,
        Commands::Prompt { name, args } => {
            let args: HashMap<String, String> = serde_json::from_str(&args)
                .context("Prompt arguments must be a JSON object of strings")?;
            agent.get_prompt(&name, args).await?
        }
        Commands::SystemPrompt => agent.system_message_with_tools().await?,
        Commands::Demo { count } => {
            let report = run_config_workflow(agent, count).await?;
            serde_json::to_string_pretty(&report)?
        }
    };
    Ok(output)
}
