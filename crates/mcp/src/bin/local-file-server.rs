// Standalone MCP server exposing a local directory as resources and tools

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use mcpbridge_core::LocalFileStore;
use mcpbridge_mcp::protocol::Implementation;
use mcpbridge_mcp::tools::{ToolRegistry, WriteFileTool};
use mcpbridge_mcp::{LocalFileResources, McpServer};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "local-file-server")]
#[command(about = "Local File System MCP Server", long_about = None)]
struct Args {
    /// Base directory for file operations
    #[arg(long, default_value = "./data", env = "MCPBRIDGE_DATA_DIR")]
    path: PathBuf,

    /// Logging level (RUST_LOG takes precedence when set)
    #[arg(long, value_enum, ignore_case = true, default_value = "INFO")]
    log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    #[value(name = "DEBUG")]
    Debug,
    #[value(name = "INFO")]
    Info,
    #[value(name = "WARNING")]
    Warning,
    #[value(name = "ERROR")]
    Error,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.directive().into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();

    if let Err(e) = run(args).await {
        tracing::error!("Fatal server error: {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    tracing::info!("Starting LocalFileServer with path: {}", args.path.display());

    let store = Arc::new(
        LocalFileStore::new(&args.path).context("Failed to initialize local file store")?,
    );
    tracing::info!(
        "LocalFileServer initialized with base path: {}",
        store.base_path().display()
    );

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(WriteFileTool::new(store.clone())));
    tracing::info!("Registered {} tools", registry.len());

    let server = McpServer::new(
        Implementation::new("local-file-server", env!("CARGO_PKG_VERSION")),
        registry,
    )
    .with_resources(Arc::new(LocalFileResources::new(store)))
    .with_instructions(
        "Read files through resources (storage://local/{/path}); write files with the write_file tool.",
    );

    server.start().await
}
