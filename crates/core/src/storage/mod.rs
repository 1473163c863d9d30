pub mod local;

pub use local::{FileWrite, LocalFileStore, StorageError};
