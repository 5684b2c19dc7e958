//! Identifier and path newtypes.
//!
//! Storage paths are plain strings because providers may be blob stores with
//! no native path type; [`ItemPath`] keeps them from mixing with cleartext
//! names, and [`DirId`] keeps logical directory identifiers from mixing with
//! either.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque identifier for a logical directory. The root is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirId(String);

impl DirId {
    /// The root directory ID (empty string).
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh UUIDv4 identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DirId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// A storage-backend path, distinct from cleartext logical names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemPath(String);

impl ItemPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Append a path segment with a `/` separator.
    pub fn join(&self, segment: &str) -> Self {
        if self.0.is_empty() {
            Self(segment.to_string())
        } else if self.0.ends_with('/') {
            Self(format!("{}{segment}", self.0))
        } else {
            Self(format!("{}/{segment}", self.0))
        }
    }

    /// The last path segment, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemPath {
    fn from(path: &str) -> Self {
        Self(path.to_string())
    }
}

impl From<String> for ItemPath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

/// The type of a raw storage entry as reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    File,
    Directory,
}
