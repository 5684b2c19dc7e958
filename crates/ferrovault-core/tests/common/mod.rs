#![allow(dead_code)]

//! Shared helpers for the integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ferrovault_core::provider::{DataProvider, Item, MemoryProvider, ProviderError};
use ferrovault_core::{CreateOptions, DirId, ItemPath, Vault};

pub const PASSWORD: &str = "correct horse battery staple";

/// Small scrypt cost so tests stay fast; production default is 2^15.
pub const TEST_SCRYPT_COST: u32 = 1024;

pub fn vault_parent_dir() -> ItemPath {
    ItemPath::new("/vaults")
}

pub fn vault_root() -> ItemPath {
    vault_parent_dir().join("test-vault")
}

pub fn default_create_options<'a>() -> CreateOptions<'a> {
    CreateOptions::in_subdirectory("test-vault").with_scrypt_params(TEST_SCRYPT_COST, 8)
}

/// Create a fresh vault on a shared in-memory provider.
pub async fn create_test_vault() -> (Arc<MemoryProvider>, Vault<Arc<MemoryProvider>>) {
    let provider = Arc::new(MemoryProvider::new());
    let vault = Vault::create(
        Arc::clone(&provider),
        &vault_parent_dir(),
        PASSWORD,
        default_create_options(),
    )
    .await
    .expect("vault creation failed");
    (provider, vault)
}

/// Fabricate a file entry the way an external content pipeline would:
/// a `<encoded>.c9r` file, or a `.c9s` directory with `name.c9s` and
/// `contents.c9r` when the encoded name exceeds the threshold.
pub async fn add_file<P: DataProvider>(vault: &Vault<P>, parent: &DirId, name: &str) -> ItemPath {
    let encoded = vault.encrypt_item_name(name, parent).unwrap();
    let dir = vault.dir_path(parent).unwrap();
    if encoded.len() > vault.settings().shortening_threshold {
        let stem = ferrovault_core::fs::name::shorten_name(&encoded);
        let entry = dir.join(&format!("{stem}.c9s"));
        vault.provider().create_dir(&entry, true).await.unwrap();
        vault
            .provider()
            .write_file(&entry.join("name.c9s"), encoded.as_bytes())
            .await
            .unwrap();
        vault
            .provider()
            .write_file(&entry.join("contents.c9r"), b"ciphertext")
            .await
            .unwrap();
        entry
    } else {
        let entry = dir.join(&format!("{encoded}.c9r"));
        vault
            .provider()
            .write_file(&entry, b"ciphertext")
            .await
            .unwrap();
        entry
    }
}

/// Provider wrapper that tracks the maximum number of simultaneously
/// outstanding calls. Each call yields once before hitting the inner
/// provider so that calls issued in the same batch genuinely overlap.
pub struct CountingProvider {
    inner: MemoryProvider,
    current: AtomicUsize,
    max_seen: AtomicUsize,
}

impl CountingProvider {
    pub fn new() -> Self {
        Self {
            inner: MemoryProvider::new(),
            current: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_seen.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.max_seen.store(0, Ordering::SeqCst);
    }

    async fn tracked<T>(&self, operation: impl Future<Output = T>) -> T {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let result = operation.await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl Default for CountingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DataProvider for CountingProvider {
    async fn exists(&self, path: &ItemPath) -> Result<bool, ProviderError> {
        self.tracked(self.inner.exists(path)).await
    }

    async fn read_file_string(&self, path: &ItemPath) -> Result<String, ProviderError> {
        self.tracked(self.inner.read_file_string(path)).await
    }

    async fn write_file(&self, path: &ItemPath, contents: &[u8]) -> Result<(), ProviderError> {
        self.tracked(self.inner.write_file(path, contents)).await
    }

    async fn create_dir(&self, path: &ItemPath, recursive: bool) -> Result<(), ProviderError> {
        self.tracked(self.inner.create_dir(path, recursive)).await
    }

    async fn remove_file(&self, path: &ItemPath) -> Result<(), ProviderError> {
        self.tracked(self.inner.remove_file(path)).await
    }

    async fn remove_dir(&self, path: &ItemPath) -> Result<(), ProviderError> {
        self.tracked(self.inner.remove_dir(path)).await
    }

    async fn rename(&self, from: &ItemPath, to: &ItemPath) -> Result<(), ProviderError> {
        self.tracked(self.inner.rename(from, to)).await
    }

    async fn list_items(&self, path: &ItemPath) -> Result<Vec<Item>, ProviderError> {
        self.tracked(self.inner.list_items(path)).await
    }
}
