//! In-memory storage backend.
//!
//! A deterministic tree of nodes behind a single async mutex. Used by the
//! test suite and handy for ephemeral vaults; not intended for large data.

use std::collections::BTreeMap;
use std::time::SystemTime;
use tokio::sync::Mutex;

use super::{DataProvider, Item, ProviderError};
use crate::vault::path::{EntryType, ItemPath};

#[derive(Debug, Clone)]
enum Node {
    File {
        data: Vec<u8>,
        modified: SystemTime,
    },
    Dir {
        children: BTreeMap<String, Node>,
        modified: SystemTime,
    },
}

impl Node {
    fn empty_dir() -> Self {
        Node::Dir {
            children: BTreeMap::new(),
            modified: SystemTime::now(),
        }
    }

    fn find(&self, segments: &[&str]) -> Option<&Node> {
        let mut node = self;
        for segment in segments {
            match node {
                Node::Dir { children, .. } => node = children.get(*segment)?,
                Node::File { .. } => return None,
            }
        }
        Some(node)
    }

    fn find_mut(&mut self, segments: &[&str]) -> Option<&mut Node> {
        let mut node = self;
        for segment in segments {
            match node {
                Node::Dir { children, .. } => node = children.get_mut(*segment)?,
                Node::File { .. } => return None,
            }
        }
        Some(node)
    }

    /// The children map of the directory containing the last segment, plus
    /// that segment's name.
    fn parent_children_mut<'a>(
        &mut self,
        segments: &'a [&str],
        full_path: &ItemPath,
    ) -> Result<(&mut BTreeMap<String, Node>, &'a str), ProviderError> {
        let (name, parents) = segments.split_last().ok_or_else(|| ProviderError::Backend(
            "operation on storage root".to_string(),
        ))?;
        match self.find_mut(parents) {
            Some(Node::Dir { children, .. }) => Ok((children, name)),
            Some(Node::File { .. }) => Err(ProviderError::NotADirectory {
                path: full_path.to_string(),
            }),
            None => Err(ProviderError::NotFound {
                path: full_path.to_string(),
            }),
        }
    }
}

/// Storage backend backed by an in-memory node tree.
#[derive(Debug)]
pub struct MemoryProvider {
    root: Mutex<Node>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(Node::empty_dir()),
        }
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn segments(path: &ItemPath) -> Vec<&str> {
    path.as_str().split('/').filter(|s| !s.is_empty()).collect()
}

impl DataProvider for MemoryProvider {
    async fn exists(&self, path: &ItemPath) -> Result<bool, ProviderError> {
        let root = self.root.lock().await;
        Ok(root.find(&segments(path)).is_some())
    }

    async fn read_file_string(&self, path: &ItemPath) -> Result<String, ProviderError> {
        let root = self.root.lock().await;
        match root.find(&segments(path)) {
            Some(Node::File { data, .. }) => String::from_utf8(data.clone())
                .map_err(|e| ProviderError::Backend(format!("'{path}' is not UTF-8: {e}"))),
            Some(Node::Dir { .. }) => Err(ProviderError::Backend(format!(
                "'{path}' is a directory"
            ))),
            None => Err(ProviderError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    async fn write_file(&self, path: &ItemPath, contents: &[u8]) -> Result<(), ProviderError> {
        let mut root = self.root.lock().await;
        let segs = segments(path);
        let (children, name) = root.parent_children_mut(&segs, path)?;
        children.insert(
            name.to_string(),
            Node::File {
                data: contents.to_vec(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    async fn create_dir(&self, path: &ItemPath, recursive: bool) -> Result<(), ProviderError> {
        let mut root = self.root.lock().await;
        let segs = segments(path);
        if recursive {
            let mut node = &mut *root;
            for segment in &segs {
                match node {
                    Node::Dir { children, .. } => {
                        node = children
                            .entry((*segment).to_string())
                            .or_insert_with(Node::empty_dir);
                    }
                    Node::File { .. } => {
                        return Err(ProviderError::NotADirectory {
                            path: path.to_string(),
                        });
                    }
                }
            }
            Ok(())
        } else {
            let (children, name) = root.parent_children_mut(&segs, path)?;
            children
                .entry(name.to_string())
                .or_insert_with(Node::empty_dir);
            Ok(())
        }
    }

    async fn remove_file(&self, path: &ItemPath) -> Result<(), ProviderError> {
        let mut root = self.root.lock().await;
        let segs = segments(path);
        let (children, name) = root.parent_children_mut(&segs, path)?;
        match children.get(name) {
            Some(Node::File { .. }) => {
                children.remove(name);
                Ok(())
            }
            Some(Node::Dir { .. }) => Err(ProviderError::Backend(format!(
                "'{path}' is a directory"
            ))),
            None => Err(ProviderError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    async fn remove_dir(&self, path: &ItemPath) -> Result<(), ProviderError> {
        let mut root = self.root.lock().await;
        let segs = segments(path);
        let (children, name) = root.parent_children_mut(&segs, path)?;
        children
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ProviderError::NotFound {
                path: path.to_string(),
            })
    }

    async fn rename(&self, from: &ItemPath, to: &ItemPath) -> Result<(), ProviderError> {
        let mut root = self.root.lock().await;

        let from_segs = segments(from);
        let (children, name) = root.parent_children_mut(&from_segs, from)?;
        let node = children.remove(name).ok_or_else(|| ProviderError::NotFound {
            path: from.to_string(),
        })?;

        let to_segs = segments(to);
        match root.parent_children_mut(&to_segs, to) {
            Ok((children, name)) => {
                children.insert(name.to_string(), node);
                Ok(())
            }
            Err(e) => {
                // Put the detached node back so a failed rename is not a delete.
                let (children, name) = root
                    .parent_children_mut(&from_segs, from)
                    .expect("source parent existed moments ago");
                children.insert(name.to_string(), node);
                Err(e)
            }
        }
    }

    async fn list_items(&self, path: &ItemPath) -> Result<Vec<Item>, ProviderError> {
        let root = self.root.lock().await;
        match root.find(&segments(path)) {
            Some(Node::Dir { children, .. }) => Ok(children
                .iter()
                .map(|(name, node)| match node {
                    Node::File { data, modified } => Item {
                        kind: EntryType::File,
                        name: name.clone(),
                        full_name: path.join(name),
                        last_mod: *modified,
                        size: data.len() as u64,
                    },
                    Node::Dir { modified, .. } => Item {
                        kind: EntryType::Directory,
                        name: name.clone(),
                        full_name: path.join(name),
                        last_mod: *modified,
                        size: 0,
                    },
                })
                .collect()),
            Some(Node::File { .. }) => Err(ProviderError::NotADirectory {
                path: path.to_string(),
            }),
            None => Err(ProviderError::NotFound {
                path: path.to_string(),
            }),
        }
    }
}
