// Core storage and addressing for the MCP bridge

pub mod storage;
pub mod uri;

pub use storage::{FileWrite, LocalFileStore, StorageError};
pub use uri::{ResourceUri, UriError, RESOURCE_TEMPLATE, RESOURCE_URI_PREFIX};
