// Resource URIs for the local document store (storage://local/{/path})

use std::fmt;

/// Prefix shared by every local storage resource URI
pub const RESOURCE_URI_PREFIX: &str = "storage://local/";

/// URI template advertised to clients
pub const RESOURCE_TEMPLATE: &str = "storage://local/{/path}";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UriError {
    #[error("Invalid URI format: {0}")]
    InvalidFormat(String),
}

/// A parsed `storage://local/` URI
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceUri {
    path: String,
}

impl ResourceUri {
    pub fn parse(uri: &str) -> Result<Self, UriError> {
        uri.strip_prefix(RESOURCE_URI_PREFIX)
            .map(|path| Self {
                path: path.to_string(),
            })
            .ok_or_else(|| UriError::InvalidFormat(uri.to_string()))
    }

    pub fn for_path(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            path: path.trim_start_matches('/').to_string(),
        }
    }

    /// Path relative to the store's base directory (may be empty for the root)
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", RESOURCE_URI_PREFIX, self.path)
    }
}

impl std::str::FromStr for ResourceUri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
