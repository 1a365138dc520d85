//! In-memory output filesystem and its flattener.
//!
//! The build engine writes its output into a [`MemoryFs`] instead of the real
//! disk. After a compilation the finalizer flattens the nested tree into a
//! manifest of relative paths; in watch mode the tree is cleared after every
//! cycle so stale files never leak into the next manifest.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::output::{Asset, AssetMap};
use crate::{Error, Result};

/// A node of the virtual output tree.
///
/// Children are kept in a `BTreeMap`, so every traversal visits them in
/// sorted name order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualNode {
    Directory(BTreeMap<String, VirtualNode>),
    File(Vec<u8>),
}

impl Default for VirtualNode {
    fn default() -> Self {
        VirtualNode::Directory(BTreeMap::new())
    }
}

impl VirtualNode {
    pub fn is_dir(&self) -> bool {
        matches!(self, VirtualNode::Directory(_))
    }

    /// Look up a node by `/`-separated path relative to this node.
    pub fn get(&self, path: &str) -> Option<&VirtualNode> {
        let mut node = self;
        for segment in segments(path) {
            match node {
                VirtualNode::Directory(children) => node = children.get(segment)?,
                VirtualNode::File(_) => return None,
            }
        }
        Some(node)
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty() && *s != ".")
}

/// Flatten a virtual tree into a manifest of relative paths.
///
/// Directories are walked recursively; every file whose accumulated path does
/// not end in `/` becomes an entry carrying its content and the mode bits
/// recorded for that path, if any. Pure and deterministic.
pub fn flatten(root: &VirtualNode, permissions: &BTreeMap<String, u32>) -> AssetMap {
    let mut output = AssetMap::new();
    flatten_into(root, "", permissions, &mut output);
    output
}

fn flatten_into(
    node: &VirtualNode,
    base: &str,
    permissions: &BTreeMap<String, u32>,
    output: &mut AssetMap,
) {
    match node {
        VirtualNode::Directory(children) => {
            for (name, child) in children {
                let path = format!("{base}/{name}");
                flatten_into(child, &path, permissions, output);
            }
        }
        VirtualNode::File(content) => {
            if base.is_empty() || base.ends_with('/') {
                return;
            }
            let relative = &base[1..];
            output.insert(
                relative.to_string(),
                Asset {
                    source: content.clone(),
                    permissions: permissions.get(relative).copied(),
                },
            );
        }
    }
}

/// Shared handle to the engine's in-memory output filesystem.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    root: Arc<RwLock<VirtualNode>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a file, creating parent directories as needed.
    pub fn write_file(&self, path: &str, content: impl Into<Vec<u8>>) -> Result<()> {
        let parts: Vec<&str> = segments(path).collect();
        let Some((file_name, dirs)) = parts.split_last() else {
            return Err(Error::InvalidOutputPath(path.to_string()));
        };
        if parts.contains(&"..") {
            return Err(Error::InvalidOutputPath(path.to_string()));
        }

        let mut root = self.root.write();
        let mut node = &mut *root;
        for dir in dirs {
            let VirtualNode::Directory(children) = node else {
                return Err(Error::InvalidOutputPath(path.to_string()));
            };
            node = children.entry((*dir).to_string()).or_default();
        }

        let VirtualNode::Directory(children) = node else {
            return Err(Error::InvalidOutputPath(path.to_string()));
        };
        if children.get(*file_name).is_some_and(VirtualNode::is_dir) {
            return Err(Error::InvalidOutputPath(path.to_string()));
        }
        children.insert((*file_name).to_string(), VirtualNode::File(content.into()));
        Ok(())
    }

    pub fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        match self.root.read().get(path)? {
            VirtualNode::File(content) => Some(content.clone()),
            VirtualNode::Directory(_) => None,
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.root.read().get(path).is_some()
    }

    /// Flatten the current tree; see [`flatten`].
    pub fn flatten(&self, permissions: &BTreeMap<String, u32>) -> AssetMap {
        flatten(&self.root.read(), permissions)
    }

    /// Copy of the current tree.
    pub fn snapshot(&self) -> VirtualNode {
        self.root.read().clone()
    }

    /// Drop every file and directory.
    pub fn clear(&self) {
        *self.root.write() = VirtualNode::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(children: Vec<(&str, VirtualNode)>) -> VirtualNode {
        VirtualNode::Directory(
            children
                .into_iter()
                .map(|(name, node)| (name.to_string(), node))
                .collect(),
        )
    }

    fn file(content: &str) -> VirtualNode {
        VirtualNode::File(content.as_bytes().to_vec())
    }

    #[test]
    fn test_flatten_nested_tree() {
        let tree = dir(vec![
            ("index.js", file("code")),
            (
                "build",
                dir(vec![(
                    "Release",
                    dir(vec![("addon.node", file("bin"))]),
                )]),
            ),
        ]);
        let mut permissions = BTreeMap::new();
        permissions.insert("build/Release/addon.node".to_string(), 0o755);

        let flat = flatten(&tree, &permissions);
        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["build/Release/addon.node", "index.js"]);
        assert_eq!(flat["build/Release/addon.node"].permissions, Some(0o755));
        assert_eq!(flat["index.js"].permissions, None);
        assert_eq!(flat["index.js"].source, b"code");
    }

    #[test]
    fn test_flatten_skips_trailing_separator_entries() {
        let tree = dir(vec![("", file("marker")), ("sub", dir(vec![("", file("x"))]))]);
        assert!(flatten(&tree, &BTreeMap::new()).is_empty());
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let tree = dir(vec![("a.js", file("a")), ("d", dir(vec![("b.js", file("b"))]))]);
        let permissions = BTreeMap::new();
        assert_eq!(flatten(&tree, &permissions), flatten(&tree, &permissions));
    }

    #[test]
    fn test_write_and_read() {
        let fs = MemoryFs::new();
        fs.write_file("/index.js", "module.exports = 1").unwrap();
        fs.write_file("/assets/data.bin", vec![1, 2, 3]).unwrap();

        assert_eq!(fs.read_file("/index.js").unwrap(), b"module.exports = 1");
        assert_eq!(fs.read_file("assets/data.bin").unwrap(), vec![1, 2, 3]);
        assert!(fs.exists("/assets"));
        assert!(fs.read_file("/assets").is_none());
        assert!(fs.read_file("/missing.js").is_none());
    }

    #[test]
    fn test_write_rejects_bad_paths() {
        let fs = MemoryFs::new();
        fs.write_file("/a.js", "x").unwrap();

        assert!(matches!(fs.write_file("/", "x"), Err(Error::InvalidOutputPath(_))));
        assert!(matches!(fs.write_file("/a.js/b.js", "x"), Err(Error::InvalidOutputPath(_))));
        assert!(matches!(fs.write_file("/../b.js", "x"), Err(Error::InvalidOutputPath(_))));

        fs.write_file("/dir/b.js", "x").unwrap();
        assert!(matches!(fs.write_file("/dir", "x"), Err(Error::InvalidOutputPath(_))));
    }

    #[test]
    fn test_clear() {
        let fs = MemoryFs::new();
        fs.write_file("/index.js", "x").unwrap();
        fs.clear();
        assert!(!fs.exists("/index.js"));
        assert_eq!(fs.snapshot(), VirtualNode::default());
    }
}
