// Resource providers: URI-addressed content served through resources/*

use crate::protocol::{JsonRpcError, ReadResourceResult, Resource, ResourceTemplate};
use mcpbridge_core::{
    LocalFileStore, ResourceUri, StorageError, UriError, RESOURCE_TEMPLATE, RESOURCE_URI_PREFIX,
};
use std::sync::Arc;

const TEXT_PLAIN: &str = "text/plain";

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("{0}")]
    InvalidUri(String),

    #[error("{0}")]
    AccessDenied(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl ResourceError {
    pub fn into_rpc_error(self) -> JsonRpcError {
        match self {
            Self::InvalidUri(msg) | Self::AccessDenied(msg) => JsonRpcError::invalid_params(msg),
            Self::NotFound(msg) => JsonRpcError::resource_not_found(msg),
            Self::Other(msg) => JsonRpcError::internal_error(msg),
        }
    }
}

impl From<UriError> for ResourceError {
    fn from(e: UriError) -> Self {
        Self::InvalidUri(e.to_string())
    }
}

impl From<StorageError> for ResourceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::OutsideBase(_) => Self::AccessDenied(e.to_string()),
            StorageError::NotFound(_) => Self::NotFound(e.to_string()),
            StorageError::InvalidPath(_) => Self::InvalidUri(e.to_string()),
            StorageError::Io { .. } => Self::Other(e.to_string()),
        }
    }
}

/// Source of readable resources for an MCP server
#[async_trait::async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn list_resources(&self) -> Vec<Resource>;

    async fn list_templates(&self) -> Vec<ResourceTemplate>;

    async fn read(&self, uri: &str) -> Result<ReadResourceResult, ResourceError>;
}

/// Exposes a [`LocalFileStore`] as `storage://local/` resources
pub struct LocalFileResources {
    store: Arc<LocalFileStore>,
}

impl LocalFileResources {
    pub fn new(store: Arc<LocalFileStore>) -> Self {
        Self { store }
    }

    async fn read_inner(&self, uri: &str) -> Result<ReadResourceResult, ResourceError> {
        let parsed = ResourceUri::parse(uri)?;

        // Directories, the root included, read as their listing
        let text = if parsed.is_root() || self.store.resolve(parsed.path())?.is_dir() {
            self.store.list(parsed.path()).await?.join("\n")
        } else {
            self.store.read_to_string(parsed.path()).await?
        };

        tracing::debug!(uri, "Successfully read resource");
        Ok(ReadResourceResult::text(uri, TEXT_PLAIN, text))
    }
}

#[async_trait::async_trait]
impl ResourceProvider for LocalFileResources {
    async fn list_resources(&self) -> Vec<Resource> {
        vec![Resource {
            uri: RESOURCE_URI_PREFIX.to_string(),
            name: "Local Document Store".to_string(),
            description: Some("A local document store".to_string()),
            mime_type: Some(TEXT_PLAIN.to_string()),
        }]
    }

    async fn list_templates(&self) -> Vec<ResourceTemplate> {
        vec![ResourceTemplate {
            uri_template: RESOURCE_TEMPLATE.to_string(),
            name: "Local Document Store".to_string(),
            description: Some("A local document store".to_string()),
            mime_type: Some(TEXT_PLAIN.to_string()),
        }]
    }

    async fn read(&self, uri: &str) -> Result<ReadResourceResult, ResourceError> {
        self.read_inner(uri).await.inspect_err(|e| {
            tracing::error!(uri, error = %e, "Error reading resource");
        })
    }
}
