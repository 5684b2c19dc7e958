//! Storage backend contract.
//!
//! The vault core is storage-agnostic: everything it knows about the outside
//! world goes through [`DataProvider`], a thin async interface any blob or
//! file store can satisfy. Two reference implementations ship with the crate:
//! [`MemoryProvider`] for tests and [`LocalProvider`] over `tokio::fs`.

pub mod local;
pub mod memory;

use std::time::SystemTime;
use thiserror::Error;

use crate::vault::path::{EntryType, ItemPath};

pub use local::LocalProvider;
pub use memory::MemoryProvider;

/// Errors surfaced by a storage backend.
///
/// These propagate through the vault core unchanged.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("'{path}' not found")]
    NotFound { path: String },

    #[error("'{path}' is not a directory")]
    NotADirectory { path: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A raw storage entry as reported by [`DataProvider::list_items`].
#[derive(Debug, Clone)]
pub struct Item {
    pub kind: EntryType,
    /// Entry name within its parent.
    pub name: String,
    /// Full storage path of the entry.
    pub full_name: ItemPath,
    pub last_mod: SystemTime,
    pub size: u64,
}

/// An asynchronous storage backend.
///
/// Paths are opaque strings owned by the backend; the vault core only ever
/// composes them with [`ItemPath::join`]. `remove_dir` removes an entry and
/// everything beneath it regardless of entry type (blob-store semantics).
///
/// Implemented for `Arc<P>` by forwarding, so one backend instance can serve
/// several vaults.
#[allow(async_fn_in_trait)]
pub trait DataProvider: Send + Sync {
    /// Whether an entry exists at `path`.
    async fn exists(&self, path: &ItemPath) -> Result<bool, ProviderError>;

    /// Read a file as UTF-8 text.
    async fn read_file_string(&self, path: &ItemPath) -> Result<String, ProviderError>;

    /// Write (or overwrite) a file. The parent directory must exist.
    async fn write_file(&self, path: &ItemPath, contents: &[u8]) -> Result<(), ProviderError>;

    /// Create a directory, with intermediate directories when `recursive`.
    async fn create_dir(&self, path: &ItemPath, recursive: bool) -> Result<(), ProviderError>;

    /// Remove a single file.
    async fn remove_file(&self, path: &ItemPath) -> Result<(), ProviderError>;

    /// Remove an entry and any children.
    async fn remove_dir(&self, path: &ItemPath) -> Result<(), ProviderError>;

    /// Move an entry to a new path. The target's parent must exist.
    async fn rename(&self, from: &ItemPath, to: &ItemPath) -> Result<(), ProviderError>;

    /// List the entries of a directory.
    async fn list_items(&self, path: &ItemPath) -> Result<Vec<Item>, ProviderError>;
}

impl<P: DataProvider> DataProvider for std::sync::Arc<P> {
    async fn exists(&self, path: &ItemPath) -> Result<bool, ProviderError> {
        (**self).exists(path).await
    }

    async fn read_file_string(&self, path: &ItemPath) -> Result<String, ProviderError> {
        (**self).read_file_string(path).await
    }

    async fn write_file(&self, path: &ItemPath, contents: &[u8]) -> Result<(), ProviderError> {
        (**self).write_file(path, contents).await
    }

    async fn create_dir(&self, path: &ItemPath, recursive: bool) -> Result<(), ProviderError> {
        (**self).create_dir(path, recursive).await
    }

    async fn remove_file(&self, path: &ItemPath) -> Result<(), ProviderError> {
        (**self).remove_file(path).await
    }

    async fn remove_dir(&self, path: &ItemPath) -> Result<(), ProviderError> {
        (**self).remove_dir(path).await
    }

    async fn rename(&self, from: &ItemPath, to: &ItemPath) -> Result<(), ProviderError> {
        (**self).rename(from, to).await
    }

    async fn list_items(&self, path: &ItemPath) -> Result<Vec<Item>, ProviderError> {
        (**self).list_items(path).await
    }
}
