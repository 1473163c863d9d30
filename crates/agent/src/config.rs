//! Configuration for the MCP assistant agent.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Agent configuration, usually read from `mcpbridge.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent name shown to the surrounding framework.
    #[serde(default = "default_name")]
    pub name: String,

    /// System message override; the built-in message is used when absent.
    #[serde(default)]
    pub system_message: Option<String>,

    /// Name reported to the server during initialization.
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How to launch the MCP server.
    #[serde(default)]
    pub server: ServerCommand,
}

/// Command line for an MCP server speaking JSON-RPC on stdio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCommand {
    #[serde(default = "default_server_command")]
    pub command: String,

    #[serde(default = "default_server_args")]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

fn default_name() -> String {
    "mcp_assistant".to_string()
}

fn default_client_name() -> String {
    "mcpbridge".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_server_command() -> String {
    "local-file-server".to_string()
}

fn default_server_args() -> Vec<String> {
    vec!["--path".to_string(), "./data".to_string()]
}

impl Default for ServerCommand {
    fn default() -> Self {
        Self {
            command: default_server_command(),
            args: default_server_args(),
            env: HashMap::new(),
            cwd: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            system_message: None,
            client_name: default_client_name(),
            request_timeout_secs: default_request_timeout_secs(),
            server: ServerCommand::default(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a TOML file, falling back to defaults when it does not exist.
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            tracing::info!(
                path = %config_path.display(),
                "Configuration file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .context("Failed to read configuration file")?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse configuration file")?;

        if config.server.command.trim().is_empty() {
            anyhow::bail!("server.command must not be empty");
        }

        Ok(config)
    }

    /// Get the request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Apply command-line overrides on top of the loaded file.
    ///
    /// A new server command starts from an empty argument list; arguments
    /// given without a command replace the configured ones.
    pub fn apply_overrides(
        &mut self,
        server_command: Option<String>,
        server_args: Vec<String>,
        request_timeout_secs: Option<u64>,
    ) {
        if let Some(command) = server_command {
            self.server.command = command;
            self.server.args = server_args;
        } else if !server_args.is_empty() {
            self.server.args = server_args;
        }
        if let Some(timeout) = request_timeout_secs {
            self.request_timeout_secs = timeout;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = AgentConfig::load(&temp_dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.name, "mcp_assistant");
        assert_eq!(config.server.command, "local-file-server");
        assert_eq!(config.server.args, vec!["--path", "./data"]);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("mcpbridge.toml");
        std::fs::write(
            &path,
            r#"
name = "files"
request_timeout_secs = 5

[server]
command = "uv"
args = ["run", "-m", "server.local_file_server"]

[server.env]
LOG_LEVEL = "DEBUG"
"#,
        )
        .unwrap();

        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config.name, "files");
        assert_eq!(config.client_name, "mcpbridge");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.server.command, "uv");
        assert_eq!(config.server.args.len(), 3);
        assert_eq!(config.server.env.get("LOG_LEVEL").map(String::as_str), Some("DEBUG"));
        assert!(config.system_message.is_none());
    }

    #[test]
    fn test_invalid_file_reports_context() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        std::fs::write(&path, "name = [").unwrap();

        let err = AgentConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse configuration file"));
    }

    #[test]
    fn test_server_command_override_replaces_args() {
        let mut config = AgentConfig::default();
        config.apply_overrides(Some("python".to_string()), Vec::new(), None);

        assert_eq!(config.server.command, "python");
        assert!(config.server.args.is_empty());
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_server_args_override_keeps_command() {
        let mut config = AgentConfig::default();
        config.apply_overrides(
            None,
            vec!["--path".to_string(), "/srv/docs".to_string()],
            Some(0),
        );

        assert_eq!(config.server.command, "local-file-server");
        assert_eq!(config.server.args, vec!["--path", "/srv/docs"]);
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_no_overrides_leave_config_untouched() {
        let mut config = AgentConfig::default();
        config.apply_overrides(None, Vec::new(), None);

        assert_eq!(config.server, ServerCommand::default());
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_empty_command_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.toml");
        std::fs::write(&path, "[server]\ncommand = \"\"\n").unwrap();

        assert!(AgentConfig::load(&path).is_err());
    }
}
