//! Client-side encrypted vault core, compatible with Cryptomator vault
//! format 8 (cipher combo `SIV_CTRMAC`).
//!
//! The crate covers the vault lifecycle (create/unlock with an
//! scrypt + AES-KW key hierarchy and a signed config document), deterministic
//! directory and name cryptography (AES-SIV with parent-ID associated data,
//! SHA-1/base32 directory mapping, `.c9s` long-name shortening), and the
//! namespace operations built on them: listing, creating, moving, and
//! recursively deleting entries.
//!
//! Storage is abstracted behind [`DataProvider`]; file *content* encryption
//! is out of scope and handled by external collaborators.
//!
//! ```no_run
//! use ferrovault_core::{CreateOptions, ItemPath, ListProgress, Vault};
//! use ferrovault_core::provider::LocalProvider;
//!
//! # async fn demo() -> Result<(), ferrovault_core::VaultError> {
//! let vault = Vault::create(
//!     LocalProvider::new(),
//!     &ItemPath::new("/data/vaults"),
//!     "correct horse battery staple",
//!     CreateOptions::in_subdirectory("notes"),
//! )
//! .await?;
//!
//! let root = vault.root_dir()?;
//! vault.create_directory("projects", &root, None).await?;
//! let items = vault
//!     .list_items(&ferrovault_core::DirId::root(), ListProgress::default())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod crypto;
pub mod error;
pub mod fs;
pub mod provider;
pub mod vault;

pub use crypto::keys::{EncryptionKey, MacKey, MasterKey};
pub use error::{DecryptionTarget, VaultError};
pub use provider::{DataProvider, Item, ProviderError};
pub use vault::handles::{EncryptedDir, EncryptedFile, EncryptedItem};
pub use vault::path::{DirId, EntryType, ItemPath};
pub use vault::{
    CreateOptions, CreationStep, DEFAULT_SHORTENING_THRESHOLD, ListProgress, OpenOptions,
    QueryOptions, VAULT_FORMAT, Vault, VaultSettings,
};
