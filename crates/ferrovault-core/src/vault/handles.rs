//! Handles for decrypted directory entries.
//!
//! [`EncryptedFile`] and [`EncryptedDir`] tie a logical name to its storage
//! path and parent directory ID. Handles reflect the state at construction
//! and hold no locks; mutation methods consume the handle because the
//! underlying storage path may change — relist to obtain fresh handles.

use std::sync::Mutex;
use std::time::SystemTime;
use tracing::debug;

use crate::error::VaultError;
use crate::fs::name::{self, ENCRYPTED_SUFFIX, SHORTENED_SUFFIX};
use crate::provider::DataProvider;
use crate::vault::path::{DirId, EntryType, ItemPath};
use crate::vault::{CONTENTS_FILE, DIR_ID_FILE, NAME_FILE, Vault};

/// A decrypted file entry.
#[derive(Debug)]
pub struct EncryptedFile<'v, P> {
    vault: &'v Vault<P>,
    stored_name: String,
    full_name: ItemPath,
    decrypted_name: String,
    parent_id: DirId,
    last_mod: SystemTime,
    shortened: bool,
}

impl<'v, P: DataProvider> EncryptedFile<'v, P> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        vault: &'v Vault<P>,
        stored_name: String,
        full_name: ItemPath,
        decrypted_name: String,
        parent_id: DirId,
        last_mod: SystemTime,
        shortened: bool,
    ) -> Self {
        Self {
            vault,
            stored_name,
            full_name,
            decrypted_name,
            parent_id,
            last_mod,
            shortened,
        }
    }

    /// The decrypted logical name.
    pub fn name(&self) -> &str {
        &self.decrypted_name
    }

    /// The on-storage entry name (`<encoded>.c9r` or `<hash>.c9s`).
    pub fn stored_name(&self) -> &str {
        &self.stored_name
    }

    /// Full storage path of the entry.
    pub fn storage_path(&self) -> &ItemPath {
        &self.full_name
    }

    pub fn parent_id(&self) -> &DirId {
        &self.parent_id
    }

    pub fn last_modified(&self) -> SystemTime {
        self.last_mod
    }

    /// Whether the entry lives under a `.c9s` shortened name.
    pub fn is_shortened(&self) -> bool {
        self.shortened
    }

    /// Storage path of the encrypted body (`contents.c9r` for shortened
    /// entries, the entry itself otherwise).
    pub fn contents_path(&self) -> ItemPath {
        if self.shortened {
            self.full_name.join(CONTENTS_FILE)
        } else {
            self.full_name.clone()
        }
    }

    /// Remove this file from storage.
    pub async fn delete(self) -> Result<(), VaultError> {
        debug!(path = %self.full_name, "deleting file");
        if self.shortened {
            // Shortened files are .c9s directories holding contents.c9r.
            self.vault.provider.remove_dir(&self.full_name).await?;
        } else {
            self.vault.provider.remove_file(&self.full_name).await?;
        }
        Ok(())
    }

    /// Give this file a new cleartext name within the same parent.
    pub async fn rename(self, new_name: &str) -> Result<(), VaultError> {
        let parent = self.parent_id.clone();
        relocate(
            self.vault,
            EntryType::File,
            &self.full_name,
            self.shortened,
            new_name,
            &parent,
        )
        .await
        .map(|_| ())
    }

    /// Move this file into another directory, re-encrypting its name under
    /// the destination's DirID.
    pub async fn move_to(self, dest: &DirId) -> Result<(), VaultError> {
        relocate(
            self.vault,
            EntryType::File,
            &self.full_name,
            self.shortened,
            &self.decrypted_name,
            dest,
        )
        .await
        .map(|_| ())
    }
}

/// A decrypted directory entry.
///
/// The root directory is fabricated rather than listed: its stored name is
/// empty, its decrypted name is `"root"`, it has no parent, and its DirID is
/// the empty string unconditionally.
#[derive(Debug)]
pub struct EncryptedDir<'v, P> {
    vault: &'v Vault<P>,
    stored_name: String,
    full_name: ItemPath,
    decrypted_name: String,
    parent_id: Option<DirId>,
    last_mod: SystemTime,
    shortened: bool,
    /// Lazily resolved DirID. Concurrent resolutions may race but are
    /// idempotent: dir.c9r never changes for a live entry.
    dir_id_cache: Mutex<Option<DirId>>,
}

impl<'v, P: DataProvider> EncryptedDir<'v, P> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        vault: &'v Vault<P>,
        stored_name: String,
        full_name: ItemPath,
        decrypted_name: String,
        parent_id: Option<DirId>,
        last_mod: SystemTime,
        shortened: bool,
        dir_id: Option<DirId>,
    ) -> Self {
        Self {
            vault,
            stored_name,
            full_name,
            decrypted_name,
            parent_id,
            last_mod,
            shortened,
            dir_id_cache: Mutex::new(dir_id),
        }
    }

    pub fn name(&self) -> &str {
        &self.decrypted_name
    }

    pub fn stored_name(&self) -> &str {
        &self.stored_name
    }

    /// Full storage path of the directory *entry* (not its mapped contents).
    pub fn storage_path(&self) -> &ItemPath {
        &self.full_name
    }

    pub fn parent_id(&self) -> Option<&DirId> {
        self.parent_id.as_ref()
    }

    pub fn last_modified(&self) -> SystemTime {
        self.last_mod
    }

    pub fn is_shortened(&self) -> bool {
        self.shortened
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Resolve this directory's DirID.
    ///
    /// The root returns the empty DirID without touching storage. Other
    /// directories return the cached value or read `dir.c9r` once.
    pub async fn dir_id(&self) -> Result<DirId, VaultError> {
        if self.parent_id.is_none() {
            return Ok(DirId::root());
        }
        if let Some(id) = self.cached_dir_id() {
            return Ok(id);
        }

        let raw = self
            .vault
            .provider
            .read_file_string(&self.full_name.join(DIR_ID_FILE))
            .await?;
        let id = DirId::new(raw.trim());
        *self.lock_cache() = Some(id.clone());
        Ok(id)
    }

    /// Drop the cached DirID so the next [`dir_id`](Self::dir_id) call
    /// re-reads storage.
    pub fn invalidate_dir_id_cache(&self) {
        *self.lock_cache() = None;
    }

    fn cached_dir_id(&self) -> Option<DirId> {
        self.lock_cache().clone()
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, Option<DirId>> {
        self.dir_id_cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Storage path of the DirID-mapped directory holding this directory's
    /// children.
    pub async fn contents_path(&self) -> Result<ItemPath, VaultError> {
        let id = self.dir_id().await?;
        self.vault.dir_path(&id)
    }

    /// Give this directory a new cleartext name within the same parent.
    ///
    /// Renaming the root is not meaningful and returns an error.
    pub async fn rename(self, new_name: &str) -> Result<(), VaultError> {
        let Some(parent) = self.parent_id.clone() else {
            return Err(VaultError::crypto("cannot rename the root directory"));
        };
        relocate(
            self.vault,
            EntryType::Directory,
            &self.full_name,
            self.shortened,
            new_name,
            &parent,
        )
        .await
        .map(|_| ())
    }

    /// Move this directory into another directory. The mapped contents stay
    /// in place; only the entry is re-encrypted and relocated.
    pub async fn move_to(self, dest: &DirId) -> Result<(), VaultError> {
        if self.parent_id.is_none() {
            return Err(VaultError::crypto("cannot move the root directory"));
        }
        relocate(
            self.vault,
            EntryType::Directory,
            &self.full_name,
            self.shortened,
            &self.decrypted_name,
            dest,
        )
        .await
        .map(|_| ())
    }
}

/// A listed entry: either a file or a directory.
pub enum EncryptedItem<'v, P> {
    File(EncryptedFile<'v, P>),
    Dir(EncryptedDir<'v, P>),
}

impl<'v, P: DataProvider> EncryptedItem<'v, P> {
    pub fn name(&self) -> &str {
        match self {
            EncryptedItem::File(f) => f.name(),
            EncryptedItem::Dir(d) => d.name(),
        }
    }

    pub fn storage_path(&self) -> &ItemPath {
        match self {
            EncryptedItem::File(f) => f.storage_path(),
            EncryptedItem::Dir(d) => d.storage_path(),
        }
    }

    pub fn entry_type(&self) -> EntryType {
        match self {
            EncryptedItem::File(_) => EntryType::File,
            EncryptedItem::Dir(_) => EntryType::Directory,
        }
    }

    pub fn is_shortened(&self) -> bool {
        match self {
            EncryptedItem::File(f) => f.is_shortened(),
            EncryptedItem::Dir(d) => d.is_shortened(),
        }
    }

    pub fn as_file(&self) -> Option<&EncryptedFile<'v, P>> {
        match self {
            EncryptedItem::File(f) => Some(f),
            EncryptedItem::Dir(_) => None,
        }
    }

    pub fn as_dir(&self) -> Option<&EncryptedDir<'v, P>> {
        match self {
            EncryptedItem::Dir(d) => Some(d),
            EncryptedItem::File(_) => None,
        }
    }

    pub fn into_file(self) -> Option<EncryptedFile<'v, P>> {
        match self {
            EncryptedItem::File(f) => Some(f),
            EncryptedItem::Dir(_) => None,
        }
    }

    pub fn into_dir(self) -> Option<EncryptedDir<'v, P>> {
        match self {
            EncryptedItem::Dir(d) => Some(d),
            EncryptedItem::File(_) => None,
        }
    }

    /// Move this item into another directory.
    pub async fn move_to(self, dest: &DirId) -> Result<(), VaultError> {
        match self {
            EncryptedItem::File(f) => f.move_to(dest).await,
            EncryptedItem::Dir(d) => d.move_to(dest).await,
        }
    }
}

/// Re-home an entry under a (possibly different) parent with a (possibly
/// different) cleartext name.
///
/// Re-encrypts the name under the destination DirID and crosses the
/// shortening threshold in either direction, creating or removing the
/// `name.c9s` sidecar as needed. Returns the new entry path.
async fn relocate<P: DataProvider>(
    vault: &Vault<P>,
    entry: EntryType,
    from: &ItemPath,
    from_shortened: bool,
    new_name: &str,
    dest: &DirId,
) -> Result<ItemPath, VaultError> {
    let encoded = vault.encrypt_item_name(new_name, dest)?;
    let to_shortened = encoded.len() > vault.settings.shortening_threshold;
    let dest_dir = vault.dir_path(dest)?;
    let provider = &vault.provider;

    let target = if to_shortened {
        dest_dir.join(&format!("{}{SHORTENED_SUFFIX}", name::shorten_name(&encoded)))
    } else {
        dest_dir.join(&format!("{encoded}{ENCRYPTED_SUFFIX}"))
    };
    debug!(%from, to = %target, ?entry, "relocating entry");

    match (entry, from_shortened, to_shortened) {
        (EntryType::File, false, false) => {
            provider.rename(from, &target).await?;
        }
        (EntryType::File, false, true) => {
            provider.create_dir(&target, true).await?;
            provider
                .write_file(&target.join(NAME_FILE), encoded.as_bytes())
                .await?;
            provider
                .rename(from, &target.join(CONTENTS_FILE))
                .await?;
        }
        (EntryType::File, true, false) => {
            provider
                .rename(&from.join(CONTENTS_FILE), &target)
                .await?;
            provider.remove_dir(from).await?;
        }
        (EntryType::File, true, true) => {
            provider.rename(from, &target).await?;
            provider
                .write_file(&target.join(NAME_FILE), encoded.as_bytes())
                .await?;
        }
        (EntryType::Directory, was_shortened, now_shortened) => {
            provider.rename(from, &target).await?;
            if now_shortened {
                provider
                    .write_file(&target.join(NAME_FILE), encoded.as_bytes())
                    .await?;
            } else if was_shortened {
                provider.remove_file(&target.join(NAME_FILE)).await?;
            }
        }
    }

    Ok(target)
}
