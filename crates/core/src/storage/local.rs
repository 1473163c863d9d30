use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Errors raised by the local file store
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Access denied: Path {0} is outside base directory")]
    OutsideBase(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    fn io(path: &str, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }
}

/// Outcome of a file write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileWrite {
    pub path: String,
    pub bytes_written: u64,
    pub modified_at: DateTime<Utc>,
}

/// File store rooted at a single base directory.
///
/// Every path handed to the store is relative to `base_path`; anything that
/// would resolve outside of it (absolute paths, `..` escapes, symlinks
/// pointing elsewhere) is refused before the filesystem is touched.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    base_path: PathBuf,
}

impl LocalFileStore {
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref();
        let display = base_path.display().to_string();

        if !base_path.exists() {
            std::fs::create_dir_all(base_path).map_err(|e| StorageError::io(&display, e))?;
            tracing::info!(path = %base_path.display(), "Created base directory");
        }

        let base_path = base_path
            .canonicalize()
            .map_err(|e| StorageError::io(&display, e))?;

        if !base_path.is_dir() {
            return Err(StorageError::InvalidPath(display));
        }

        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a relative path to an absolute one inside the base directory
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let mut resolved = self.base_path.clone();

        for component in Path::new(relative).components() {
            match component {
                Component::CurDir => {}
                Component::Normal(part) => resolved.push(part),
                Component::ParentDir => {
                    if resolved == self.base_path {
                        return Err(StorageError::OutsideBase(relative.to_string()));
                    }
                    resolved.pop();
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::OutsideBase(relative.to_string()));
                }
            }
        }

        // Symlinks can still point elsewhere; check the deepest ancestor present
        // on disk. `symlink_metadata` also sees dangling links.
        let existing = resolved
            .ancestors()
            .find(|candidate| std::fs::symlink_metadata(candidate).is_ok())
            .unwrap_or(self.base_path.as_path());

        match existing.canonicalize() {
            Ok(canonical) if canonical.starts_with(&self.base_path) => Ok(resolved),
            Ok(_) => Err(StorageError::OutsideBase(relative.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.check_dangling_link(existing, relative)?;
                Err(StorageError::InvalidPath(format!(
                    "{} is a dangling symlink",
                    relative
                )))
            }
            Err(e) => Err(StorageError::io(relative, e)),
        }
    }

    /// Refuse a dangling symlink whose target lies outside the base directory
    fn check_dangling_link(&self, link: &Path, relative: &str) -> Result<(), StorageError> {
        let target = std::fs::read_link(link).map_err(|e| StorageError::io(relative, e))?;
        let parent = link
            .parent()
            .unwrap_or(self.base_path.as_path())
            .canonicalize()
            .map_err(|e| StorageError::io(relative, e))?;

        if !normalize_lexically(&parent.join(target)).starts_with(&self.base_path) {
            return Err(StorageError::OutsideBase(relative.to_string()));
        }
        Ok(())
    }

    /// Read a file as UTF-8 text
    pub async fn read_to_string(&self, relative: &str) -> Result<String, StorageError> {
        let path = self.resolve(relative)?;

        if !path.exists() {
            return Err(StorageError::NotFound(relative.to_string()));
        }
        if path.is_dir() {
            return Err(StorageError::InvalidPath(format!("{} is a directory", relative)));
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| StorageError::io(relative, e))?;
        tracing::debug!(path = relative, bytes = content.len(), "Read file");
        Ok(content)
    }

    /// Write (create or truncate) a file, creating parent directories as needed
    pub async fn write(&self, relative: &str, content: &str) -> Result<FileWrite, StorageError> {
        let path = self.resolve(relative)?;
        if path == self.base_path {
            return Err(StorageError::InvalidPath(format!(
                "'{}' does not name a file",
                relative
            )));
        }
        if path.is_dir() {
            return Err(StorageError::InvalidPath(format!("{} is a directory", relative)));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(relative, e))?;
        }

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| StorageError::io(relative, e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| StorageError::io(relative, e))?;
        file.sync_all()
            .await
            .map_err(|e| StorageError::io(relative, e))?;

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| StorageError::io(relative, e))?;
        let modified_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        tracing::debug!(path = relative, bytes = metadata.len(), "Wrote file");

        Ok(FileWrite {
            path: relative.to_string(),
            bytes_written: metadata.len(),
            modified_at,
        })
    }

    /// List the entries of a directory, sorted, with `/` appended to subdirectories
    pub async fn list(&self, relative: &str) -> Result<Vec<String>, StorageError> {
        let path = self.resolve(relative)?;

        if !path.exists() {
            return Err(StorageError::NotFound(relative.to_string()));
        }
        if !path.is_dir() {
            return Err(StorageError::InvalidPath(format!(
                "{} is not a directory",
                relative
            )));
        }

        let mut dir = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| StorageError::io(relative, e))?;
        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StorageError::io(relative, e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            entries.push(format!("{}{}", name, if is_dir { "/" } else { "" }));
        }

        entries.sort();
        Ok(entries)
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
