//! Vault lifecycle and namespace operations.
//!
//! [`Vault`] composes the key hierarchy, the two vault documents, the name
//! codec, and the directory mapper over a [`DataProvider`]. A vault instance
//! is logically immutable after `create`/`open`; all operations borrow it
//! concurrently without locking.
//!
//! # Concurrency
//!
//! Fan-out operations (`list_items`, `delete_dir`) honor
//! [`QueryOptions::concurrency`]: `-1` runs every task in one unbounded
//! batch, any positive `n` chunks tasks into sequential batches of at most
//! `n`, each batch fully parallel. Result assembly always preserves input
//! order.

pub mod config;
pub mod handles;
pub mod master_key;
pub mod path;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::error::{DecryptionTarget, VaultError};
use crate::fs::name::{self, ENCRYPTED_SUFFIX, SHORTENED_SUFFIX};
use crate::provider::{DataProvider, Item};

use config::{ConfigError, VaultConfigClaims, sign_vault_config, verify_vault_config};
use handles::{EncryptedDir, EncryptedFile, EncryptedItem};
use master_key::{MasterKeyError, MasterKeyFile, create_masterkey_file};
use path::{DirId, EntryType, ItemPath};

pub use crate::crypto::keys::MasterKey;
pub use config::{CipherCombo, DEFAULT_SHORTENING_THRESHOLD, VAULT_FORMAT};
pub use master_key::{DEFAULT_SCRYPT_BLOCK_SIZE, DEFAULT_SCRYPT_COST_PARAM, MASTERKEY_VERSION};

/// Name of the signed vault configuration document.
pub const VAULT_CONFIG_FILE: &str = "vault.cryptomator";
/// Name of the masterkey document.
pub const MASTERKEY_FILE: &str = "masterkey.cryptomator";
/// Name of the DirID-mapped data tree.
pub const DATA_DIR: &str = "d";

/// File inside a directory entry holding the raw child DirID.
pub(crate) const DIR_ID_FILE: &str = "dir.c9r";
/// Sidecar inside a shortened entry holding the full encoded name.
pub(crate) const NAME_FILE: &str = "name.c9s";
/// Encrypted body inside a shortened file entry.
pub(crate) const CONTENTS_FILE: &str = "contents.c9r";
/// Reserved backup file; never written, always skipped when listing.
const DIR_ID_BACKUP_FILE: &str = "dirid.c9r";

/// Progress step of [`Vault::create`], fired in enum order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CreationStep {
    DupeCheck = 0,
    KeyGen = 1,
    CreatingFiles = 2,
    CreatingRoot = 3,
}

/// Callback receiving [`CreationStep`] transitions.
pub type StepCallback<'a> = &'a (dyn Fn(CreationStep) + Send + Sync);
/// Callback receiving `(done, total)` completion counts.
pub type ProgressCallback<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);
/// Callback fired after key documents are fetched, before any cryptography.
pub type KeyLoadCallback<'a> = &'a (dyn Fn() + Send + Sync);

/// Immutable per-vault parameters.
#[derive(Debug, Clone, Copy)]
pub struct VaultSettings {
    pub format: i32,
    pub shortening_threshold: usize,
    pub scrypt_cost_param: u32,
    pub scrypt_block_size: u32,
}

/// Fan-out ceiling for batched operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// `-1` means unbounded; any positive `n` caps each batch at `n` tasks.
    pub concurrency: i32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self { concurrency: -1 }
    }
}

/// Layout selector for [`Vault::create`].
enum CreateMode {
    /// Create `dir/<name>` and lay the vault out inside it.
    Subdirectory(String),
    /// Lay the vault out directly inside `dir`.
    Here,
}

/// Options for [`Vault::create`].
pub struct CreateOptions<'a> {
    mode: CreateMode,
    shortening_threshold: usize,
    scrypt_cost_param: u32,
    scrypt_block_size: u32,
    query: QueryOptions,
    on_progress: Option<StepCallback<'a>>,
}

impl<'a> CreateOptions<'a> {
    /// Create the vault in a new subdirectory `name` of the target directory.
    pub fn in_subdirectory(name: impl Into<String>) -> Self {
        Self::with_mode(CreateMode::Subdirectory(name.into()))
    }

    /// Create the vault directly inside the target directory.
    pub fn here() -> Self {
        Self::with_mode(CreateMode::Here)
    }

    fn with_mode(mode: CreateMode) -> Self {
        Self {
            mode,
            shortening_threshold: DEFAULT_SHORTENING_THRESHOLD,
            scrypt_cost_param: DEFAULT_SCRYPT_COST_PARAM,
            scrypt_block_size: DEFAULT_SCRYPT_BLOCK_SIZE,
            query: QueryOptions::default(),
            on_progress: None,
        }
    }

    /// Override the filename shortening threshold (default 220). Lower
    /// values suit backends with tight path length limits.
    pub fn with_shortening_threshold(mut self, threshold: usize) -> Self {
        self.shortening_threshold = threshold;
        self
    }

    /// Override the scrypt parameters. The cost must be a power of two.
    pub fn with_scrypt_params(mut self, cost_param: u32, block_size: u32) -> Self {
        self.scrypt_cost_param = cost_param;
        self.scrypt_block_size = block_size;
        self
    }

    pub fn with_query_options(mut self, query: QueryOptions) -> Self {
        self.query = query;
        self
    }

    pub fn with_progress(mut self, callback: StepCallback<'a>) -> Self {
        self.on_progress = Some(callback);
        self
    }
}

/// Options for [`Vault::open`].
#[derive(Default)]
pub struct OpenOptions<'a> {
    name: Option<String>,
    vault_config_path: Option<ItemPath>,
    masterkey_path: Option<ItemPath>,
    query: QueryOptions,
    on_key_load: Option<KeyLoadCallback<'a>>,
}

impl<'a> OpenOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display name for the vault (defaults to the last path segment).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Custom location of `vault.cryptomator`.
    pub fn with_vault_config_path(mut self, path: ItemPath) -> Self {
        self.vault_config_path = Some(path);
        self
    }

    /// Custom location of `masterkey.cryptomator`.
    pub fn with_masterkey_path(mut self, path: ItemPath) -> Self {
        self.masterkey_path = Some(path);
        self
    }

    pub fn with_query_options(mut self, query: QueryOptions) -> Self {
        self.query = query;
        self
    }

    pub fn with_key_load(mut self, callback: KeyLoadCallback<'a>) -> Self {
        self.on_key_load = Some(callback);
        self
    }
}

/// Per-completion progress callbacks for [`Vault::list_items`].
#[derive(Default, Clone, Copy)]
pub struct ListProgress<'a> {
    /// Fired after each name decryption completes.
    pub on_name: Option<ProgressCallback<'a>>,
    /// Fired after each entry's type resolution completes.
    pub on_type: Option<ProgressCallback<'a>>,
}

/// An unlocked vault.
#[derive(Debug)]
pub struct Vault<P> {
    pub(crate) provider: P,
    pub(crate) storage_root: ItemPath,
    pub(crate) name: String,
    pub(crate) master_key: MasterKey,
    pub(crate) settings: VaultSettings,
    pub(crate) query_opts: QueryOptions,
}

impl<P: DataProvider> Vault<P> {
    /// Bootstrap a new vault.
    ///
    /// Progress steps fire in order: `DupeCheck` (target paths must be
    /// absent), `KeyGen` (keys, documents, signatures), `CreatingFiles`
    /// (both documents written concurrently), `CreatingRoot` (root mapped
    /// directory). Any failure after file creation begins triggers a
    /// best-effort parallel cleanup of the three artifacts before the
    /// original error propagates.
    #[instrument(level = "info", skip_all, fields(dir = %dir))]
    pub async fn create(
        provider: P,
        dir: &ItemPath,
        password: &str,
        options: CreateOptions<'_>,
    ) -> Result<Self, VaultError> {
        notify(options.on_progress, CreationStep::DupeCheck);
        let (storage_root, vault_name) = match &options.mode {
            CreateMode::Subdirectory(sub) => {
                let root = dir.join(sub);
                if provider.exists(&root).await? {
                    return Err(VaultError::AlreadyExists {
                        path: root.to_string(),
                    });
                }
                (root, sub.clone())
            }
            CreateMode::Here => {
                let masterkey = dir.join(MASTERKEY_FILE);
                let config = dir.join(VAULT_CONFIG_FILE);
                let data = dir.join(DATA_DIR);
                let (masterkey_exists, config_exists, data_exists) = tokio::try_join!(
                    provider.exists(&masterkey),
                    provider.exists(&config),
                    provider.exists(&data),
                )?;
                for (exists, path) in [
                    (masterkey_exists, &masterkey),
                    (config_exists, &config),
                    (data_exists, &data),
                ] {
                    if exists {
                        return Err(VaultError::AlreadyExists {
                            path: path.to_string(),
                        });
                    }
                }
                let name = dir.file_name().unwrap_or("vault").to_string();
                (dir.clone(), name)
            }
        };

        notify(options.on_progress, CreationStep::KeyGen);
        let master_key = MasterKey::random();
        let masterkey_doc = create_masterkey_file(
            &master_key,
            password,
            VAULT_FORMAT,
            options.scrypt_cost_param,
            options.scrypt_block_size,
        )
        .map_err(|e| VaultError::crypto(e.to_string()))?;
        let masterkey_json = masterkey_doc
            .to_json()
            .map_err(|e| VaultError::crypto(e.to_string()))?;
        let claims = VaultConfigClaims::new(options.shortening_threshold);
        let config_jwt = sign_vault_config(&claims, &master_key)
            .map_err(|e| VaultError::crypto(e.to_string()))?;

        let created_subdirectory = matches!(&options.mode, CreateMode::Subdirectory(_));
        let vault = Vault {
            provider,
            storage_root,
            name: vault_name,
            master_key,
            settings: VaultSettings {
                format: VAULT_FORMAT,
                shortening_threshold: options.shortening_threshold,
                scrypt_cost_param: options.scrypt_cost_param,
                scrypt_block_size: options.scrypt_block_size,
            },
            query_opts: options.query,
        };

        notify(options.on_progress, CreationStep::CreatingFiles);
        let result: Result<(), VaultError> = async {
            if created_subdirectory {
                vault.provider.create_dir(&vault.storage_root, true).await?;
            }
            let masterkey_path = vault.storage_root.join(MASTERKEY_FILE);
            let config_path = vault.storage_root.join(VAULT_CONFIG_FILE);
            tokio::try_join!(
                vault
                    .provider
                    .write_file(&masterkey_path, masterkey_json.as_bytes()),
                vault
                    .provider
                    .write_file(&config_path, config_jwt.as_bytes()),
            )?;

            notify(options.on_progress, CreationStep::CreatingRoot);
            let root_path = vault.dir_path(&DirId::root())?;
            vault.provider.create_dir(&root_path, true).await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                info!(vault = %vault.name, "vault created");
                Ok(vault)
            }
            Err(e) => {
                warn!(error = %e, "vault creation failed, removing partial artifacts");
                // Settle-all semantics: cleanup failures are swallowed, the
                // original error propagates.
                let masterkey_path = vault.storage_root.join(MASTERKEY_FILE);
                let config_path = vault.storage_root.join(VAULT_CONFIG_FILE);
                let data_path = vault.storage_root.join(DATA_DIR);
                let (masterkey, config, data) = tokio::join!(
                    vault.provider.remove_file(&masterkey_path),
                    vault.provider.remove_file(&config_path),
                    vault.provider.remove_dir(&data_path),
                );
                for cleanup in [masterkey, config, data] {
                    if let Err(cleanup_err) = cleanup {
                        debug!(error = %cleanup_err, "cleanup step failed");
                    }
                }
                Err(e)
            }
        }
    }

    /// Unlock an existing vault.
    ///
    /// Both documents load concurrently (from custom paths when given);
    /// `on_key_load` fires after the fetch, before any cryptography. A failed
    /// key unwrap surfaces as `Decryption(Vault)`, a failed JWT verification
    /// as `InvalidSignature(Vault)`.
    #[instrument(level = "info", skip_all, fields(dir = %dir))]
    pub async fn open(
        provider: P,
        dir: &ItemPath,
        password: &str,
        options: OpenOptions<'_>,
    ) -> Result<Self, VaultError> {
        let config_path = options
            .vault_config_path
            .unwrap_or_else(|| dir.join(VAULT_CONFIG_FILE));
        let masterkey_path = options
            .masterkey_path
            .unwrap_or_else(|| dir.join(MASTERKEY_FILE));

        let (config_jwt, masterkey_json) = tokio::try_join!(
            provider.read_file_string(&config_path),
            provider.read_file_string(&masterkey_path),
        )?;
        if let Some(on_key_load) = options.on_key_load {
            on_key_load();
        }

        let masterkey_doc =
            MasterKeyFile::from_json(&masterkey_json).map_err(masterkey_open_error)?;
        let master_key = masterkey_doc.unlock(password).map_err(masterkey_open_error)?;
        let claims = verify_vault_config(&config_jwt, &master_key).map_err(config_open_error)?;
        masterkey_doc
            .verify_version_mac(&master_key, claims.format)
            .map_err(masterkey_open_error)?;

        let name = options
            .name
            .unwrap_or_else(|| dir.file_name().unwrap_or("vault").to_string());
        info!(
            vault = %name,
            shortening_threshold = claims.shortening_threshold(),
            "vault opened"
        );

        Ok(Vault {
            provider,
            storage_root: dir.clone(),
            name,
            master_key,
            settings: VaultSettings {
                format: claims.format,
                shortening_threshold: claims.shortening_threshold(),
                scrypt_cost_param: masterkey_doc.scrypt_cost_param,
                scrypt_block_size: masterkey_doc.scrypt_block_size,
            },
            query_opts: options.query,
        })
    }

    /// Display name of the vault.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage-side directory holding the vault documents and `d/` tree.
    pub fn storage_root(&self) -> &ItemPath {
        &self.storage_root
    }

    pub fn settings(&self) -> &VaultSettings {
        &self.settings
    }

    pub fn query_options(&self) -> QueryOptions {
        self.query_opts
    }

    /// The unlocked master key pair.
    pub fn master_key(&self) -> &MasterKey {
        &self.master_key
    }

    /// The storage backend.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Map a DirID to its on-storage directory
    /// (`<root>/d/<hash[0..2]>/<hash[2..]>`).
    pub fn dir_path(&self, dir_id: &DirId) -> Result<ItemPath, VaultError> {
        let hash = name::hash_dir_id(dir_id, &self.master_key)
            .map_err(|e| VaultError::crypto(e.to_string()))?;
        let (prefix, rest) = hash.split_at(2);
        Ok(self.storage_root.join(DATA_DIR).join(prefix).join(rest))
    }

    /// Storage path of the root directory's contents.
    pub fn root_dir_path(&self) -> Result<ItemPath, VaultError> {
        self.dir_path(&DirId::root())
    }

    /// Fabricate the root directory handle.
    pub fn root_dir(&self) -> Result<EncryptedDir<'_, P>, VaultError> {
        let contents = self.root_dir_path()?;
        Ok(EncryptedDir::new(
            self,
            String::new(),
            contents,
            "root".to_string(),
            None,
            SystemTime::now(),
            false,
            Some(DirId::root()),
        ))
    }

    /// List the raw encrypted entries of a directory: every `.c9r`/`.c9s`
    /// entry except the reserved `dirid.c9r`.
    #[instrument(level = "debug", skip(self))]
    pub async fn list_encrypted(&self, dir_id: &DirId) -> Result<Vec<Item>, VaultError> {
        let path = self.dir_path(dir_id)?;
        let items = self.provider.list_items(&path).await?;
        Ok(items
            .into_iter()
            .filter(|item| {
                item.name != DIR_ID_BACKUP_FILE
                    && (item.name.ends_with(ENCRYPTED_SUFFIX)
                        || item.name.ends_with(SHORTENED_SUFFIX))
            })
            .collect())
    }

    /// Encrypt a cleartext name under a parent DirID.
    ///
    /// Returns the padded base64url encoding without a suffix.
    pub fn encrypt_item_name(&self, name: &str, parent: &DirId) -> Result<String, VaultError> {
        name::encrypt_name(name, parent, &self.master_key)
            .map_err(|e| VaultError::crypto(e.to_string()))
    }

    /// Decrypt the name of a listed entry.
    ///
    /// `.c9r` entries decode directly; `.c9s` entries read their `name.c9s`
    /// sidecar first; anything else passes through as plaintext.
    pub async fn decrypt_item_name(&self, item: &Item, parent: &DirId) -> Result<String, VaultError> {
        if item.name.ends_with(SHORTENED_SUFFIX) {
            let full_name = self
                .provider
                .read_file_string(&item.full_name.join(NAME_FILE))
                .await?;
            name::decrypt_name(full_name.trim(), parent, &self.master_key)
                .map_err(|_| VaultError::item_name_decryption(&item.name))
        } else if item.name.ends_with(ENCRYPTED_SUFFIX) {
            name::decrypt_name(&item.name, parent, &self.master_key)
                .map_err(|_| VaultError::item_name_decryption(&item.name))
        } else {
            Ok(item.name.clone())
        }
    }

    /// List a directory as decrypted handles.
    ///
    /// Names decrypt concurrently, then each entry's type is resolved: the
    /// raw entry type decides, except that a `.c9s` directory containing
    /// `contents.c9r` is a shortened *file*. Both phases honor the
    /// concurrency ceiling; entry order follows the provider listing.
    #[instrument(level = "debug", skip(self, progress))]
    pub async fn list_items<'v>(
        &'v self,
        dir_id: &DirId,
        progress: ListProgress<'_>,
    ) -> Result<Vec<EncryptedItem<'v, P>>, VaultError> {
        let raw = self.list_encrypted(dir_id).await?;
        let total = raw.len();

        let name_done = AtomicUsize::new(0);
        let on_name = progress.on_name;
        let name_tasks: Vec<_> = raw
            .iter()
            .map(|item| {
                let name_done = &name_done;
                async move {
                    let decrypted = self.decrypt_item_name(item, dir_id).await;
                    let done = name_done.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(cb) = on_name {
                        cb(done, total);
                    }
                    decrypted
                }
            })
            .collect();
        let names: Vec<String> = run_batched(name_tasks, self.query_opts.concurrency)
            .await
            .into_iter()
            .collect::<Result<_, _>>()?;

        let type_done = AtomicUsize::new(0);
        let on_type = progress.on_type;
        let type_tasks: Vec<_> = raw
            .iter()
            .zip(names)
            .map(|(item, decrypted_name)| {
                let type_done = &type_done;
                async move {
                    let resolved = self.resolve_item(item, decrypted_name, dir_id).await;
                    let done = type_done.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(cb) = on_type {
                        cb(done, total);
                    }
                    resolved
                }
            })
            .collect();
        run_batched(type_tasks, self.query_opts.concurrency)
            .await
            .into_iter()
            .collect()
    }

    /// Classify a raw entry as a file or directory handle.
    async fn resolve_item<'v>(
        &'v self,
        item: &Item,
        decrypted_name: String,
        parent: &DirId,
    ) -> Result<EncryptedItem<'v, P>, VaultError> {
        let shortened = item.name.ends_with(SHORTENED_SUFFIX);
        match item.kind {
            EntryType::File => Ok(EncryptedItem::File(EncryptedFile::new(
                self,
                item.name.clone(),
                item.full_name.clone(),
                decrypted_name,
                parent.clone(),
                item.last_mod,
                shortened,
            ))),
            EntryType::Directory => {
                let shortened_file = shortened
                    && self
                        .provider
                        .exists(&item.full_name.join(CONTENTS_FILE))
                        .await?;
                if shortened_file {
                    Ok(EncryptedItem::File(EncryptedFile::new(
                        self,
                        item.name.clone(),
                        item.full_name.clone(),
                        decrypted_name,
                        parent.clone(),
                        item.last_mod,
                        true,
                    )))
                } else {
                    Ok(EncryptedItem::Dir(EncryptedDir::new(
                        self,
                        item.name.clone(),
                        item.full_name.clone(),
                        decrypted_name,
                        Some(parent.clone()),
                        item.last_mod,
                        shortened,
                        None,
                    )))
                }
            }
        }
    }

    /// Create a directory named `name` under `parent`.
    ///
    /// `fixed_id` pins the new DirID (pass `""` for the root-style empty ID
    /// only if you know why); `None` generates a fresh UUIDv4. The entry
    /// directory and the DirID-mapped directory are created concurrently,
    /// then `dir.c9r` (and `name.c9s` for shortened entries) are written.
    /// On any failure both directories are removed best-effort before the
    /// error propagates.
    #[instrument(level = "debug", skip(self, parent))]
    pub async fn create_directory<'v>(
        &'v self,
        name: &str,
        parent: &EncryptedDir<'_, P>,
        fixed_id: Option<&str>,
    ) -> Result<EncryptedDir<'v, P>, VaultError> {
        let dir_id = match fixed_id {
            Some(id) => DirId::new(id),
            None => DirId::generate(),
        };
        let parent_id = parent.dir_id().await?;
        let encoded = self.encrypt_item_name(name, &parent_id)?;
        let shortened = encoded.len() > self.settings.shortening_threshold;

        let parent_path = self.dir_path(&parent_id)?;
        let stored_name = if shortened {
            format!("{}{SHORTENED_SUFFIX}", name::shorten_name(&encoded))
        } else {
            format!("{encoded}{ENCRYPTED_SUFFIX}")
        };
        let entry_path = parent_path.join(&stored_name);
        let mapped_path = self.dir_path(&dir_id)?;

        if self.provider.exists(&entry_path).await? {
            return Err(VaultError::AlreadyExists {
                path: entry_path.to_string(),
            });
        }

        let result: Result<(), VaultError> = async {
            tokio::try_join!(
                self.provider.create_dir(&entry_path, true),
                self.provider.create_dir(&mapped_path, true),
            )?;

            let dir_id_path = entry_path.join(DIR_ID_FILE);
            let write_dir_id = self
                .provider
                .write_file(&dir_id_path, dir_id.as_str().as_bytes());
            if shortened {
                let name_path = entry_path.join(NAME_FILE);
                tokio::try_join!(
                    write_dir_id,
                    self.provider.write_file(&name_path, encoded.as_bytes()),
                )?;
            } else {
                write_dir_id.await?;
            }
            Ok(())
        }
        .await;

        if let Err(e) = result {
            warn!(error = %e, entry = %entry_path, "directory creation failed, rolling back");
            let (entry_cleanup, mapped_cleanup) = tokio::join!(
                self.provider.remove_dir(&entry_path),
                self.provider.remove_dir(&mapped_path),
            );
            for cleanup in [entry_cleanup, mapped_cleanup] {
                if let Err(cleanup_err) = cleanup {
                    debug!(error = %cleanup_err, "rollback step failed");
                }
            }
            return Err(e);
        }

        Ok(EncryptedDir::new(
            self,
            stored_name,
            entry_path,
            name.to_string(),
            Some(parent_id),
            SystemTime::now(),
            shortened,
            Some(dir_id),
        ))
    }

    /// Remove a file from storage.
    pub async fn delete_file(&self, file: EncryptedFile<'_, P>) -> Result<(), VaultError> {
        file.delete().await
    }

    /// Recursively delete a directory tree.
    ///
    /// Two phases. **Discovery** walks a LIFO stack of DirIDs, accumulating
    /// every entry's storage path; `on_discover(paths_total, stack_remaining)`
    /// fires after each iteration and reaches `(n, 0)` before any deletion.
    /// **Deletion** then removes every accumulated path, honoring the
    /// concurrency ceiling; across batches deletion proceeds strictly
    /// in discovery order. Returns the number of removed paths.
    #[instrument(level = "debug", skip(self, dir, on_discover), fields(dir = %dir.storage_path()))]
    pub async fn delete_dir(
        &self,
        dir: &EncryptedDir<'_, P>,
        on_discover: Option<ProgressCallback<'_>>,
    ) -> Result<usize, VaultError> {
        let mut stack = vec![dir.dir_id().await?];
        let mut paths = vec![dir.storage_path().clone()];

        while let Some(dir_id) = stack.pop() {
            let children = self.list_items(&dir_id, ListProgress::default()).await?;
            for child in children {
                paths.push(child.storage_path().clone());
                if let EncryptedItem::Dir(child_dir) = child {
                    stack.push(child_dir.dir_id().await?);
                }
            }
            if let Some(cb) = on_discover {
                cb(paths.len(), stack.len());
            }
        }

        let total = paths.len();
        debug!(total, "deleting discovered paths");
        let removals: Vec<_> = paths
            .iter()
            .map(|path| self.provider.remove_dir(path))
            .collect();
        for removal in run_batched(removals, self.query_opts.concurrency).await {
            removal?;
        }
        Ok(total)
    }

    /// Move items into another directory, in parallel.
    pub async fn move_items(
        &self,
        items: Vec<EncryptedItem<'_, P>>,
        dest: &DirId,
    ) -> Result<(), VaultError> {
        let moves: Vec<_> = items.into_iter().map(|item| item.move_to(dest)).collect();
        for result in join_all(moves).await {
            result?;
        }
        Ok(())
    }
}

fn notify(callback: Option<StepCallback<'_>>, step: CreationStep) {
    if let Some(cb) = callback {
        cb(step);
    }
}

/// Await `tasks`, either all at once (`concurrency == -1`) or in sequential
/// batches of at most `concurrency` tasks. Output order matches input order.
async fn run_batched<F: Future>(tasks: Vec<F>, concurrency: i32) -> Vec<F::Output> {
    if concurrency < 0 {
        return join_all(tasks).await;
    }
    let batch_size = concurrency.max(1) as usize;
    let mut results = Vec::with_capacity(tasks.len());
    let mut remaining = tasks.into_iter();
    loop {
        let batch: Vec<F> = remaining.by_ref().take(batch_size).collect();
        if batch.is_empty() {
            break;
        }
        results.extend(join_all(batch).await);
    }
    results
}

fn masterkey_open_error(error: MasterKeyError) -> VaultError {
    match error {
        MasterKeyError::KeyUnwrap | MasterKeyError::VersionMacMismatch => {
            VaultError::vault_decryption()
        }
        other => VaultError::Document {
            what: "masterkey document",
            reason: other.to_string(),
        },
    }
}

fn config_open_error(error: ConfigError) -> VaultError {
    if error.is_signature_failure() {
        VaultError::InvalidSignature {
            target: DecryptionTarget::Vault,
        }
    } else {
        VaultError::Document {
            what: "vault config",
            reason: error.to_string(),
        }
    }
}
