//! Local filesystem backend over `tokio::fs`.
//!
//! [`ItemPath`] values are interpreted directly as OS paths, so vaults opened
//! through this provider should be addressed with absolute paths.

use std::path::Path;
use tokio::fs;

use super::{DataProvider, Item, ProviderError};
use crate::vault::path::{EntryType, ItemPath};

/// Storage backend over the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalProvider;

impl LocalProvider {
    pub fn new() -> Self {
        Self
    }
}

fn os_path(path: &ItemPath) -> &Path {
    Path::new(path.as_str())
}

impl DataProvider for LocalProvider {
    async fn exists(&self, path: &ItemPath) -> Result<bool, ProviderError> {
        Ok(fs::try_exists(os_path(path)).await?)
    }

    async fn read_file_string(&self, path: &ItemPath) -> Result<String, ProviderError> {
        Ok(fs::read_to_string(os_path(path)).await?)
    }

    async fn write_file(&self, path: &ItemPath, contents: &[u8]) -> Result<(), ProviderError> {
        Ok(fs::write(os_path(path), contents).await?)
    }

    async fn create_dir(&self, path: &ItemPath, recursive: bool) -> Result<(), ProviderError> {
        if recursive {
            Ok(fs::create_dir_all(os_path(path)).await?)
        } else {
            Ok(fs::create_dir(os_path(path)).await?)
        }
    }

    async fn remove_file(&self, path: &ItemPath) -> Result<(), ProviderError> {
        Ok(fs::remove_file(os_path(path)).await?)
    }

    async fn remove_dir(&self, path: &ItemPath) -> Result<(), ProviderError> {
        // Blob-store semantics: remove whatever lives at the path.
        let meta = fs::metadata(os_path(path)).await?;
        if meta.is_dir() {
            Ok(fs::remove_dir_all(os_path(path)).await?)
        } else {
            Ok(fs::remove_file(os_path(path)).await?)
        }
    }

    async fn rename(&self, from: &ItemPath, to: &ItemPath) -> Result<(), ProviderError> {
        Ok(fs::rename(os_path(from), os_path(to)).await?)
    }

    async fn list_items(&self, path: &ItemPath) -> Result<Vec<Item>, ProviderError> {
        let mut entries = fs::read_dir(os_path(path)).await?;
        let mut items = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let meta = entry.metadata().await?;
            items.push(Item {
                kind: if meta.is_dir() {
                    EntryType::Directory
                } else {
                    EntryType::File
                },
                full_name: path.join(&name),
                name,
                last_mod: meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
                size: meta.len(),
            });
        }
        Ok(items)
    }
}
