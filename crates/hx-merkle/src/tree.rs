use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::MerkleError;
use crate::node::MerkleNode;

/// A content-addressed tree over a filesystem directory.
///
/// Owns the root node and the absolute root path. Not thread-safe; callers
/// serialize mutations (`update_file`).
#[derive(Debug)]
pub struct MerkleTree {
    root: MerkleNode,
    root_path: PathBuf,
}

impl MerkleTree {
    /// Walk `root_path` depth-first, hashing every regular file and
    /// directory. File reads are whole-file into memory.
    #[tracing::instrument(skip_all, fields(root = %root_path.as_ref().display()))]
    pub fn build(root_path: impl AsRef<Path>) -> Result<Self, MerkleError> {
        let root_path = root_path.as_ref().to_path_buf();
        let root = build_node(&root_path)?;
        Ok(Self { root, root_path })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn root_hash(&self) -> &str {
        &self.root.hash
    }

    /// Simultaneous walk against `other`, returning the absolute paths of
    /// every file that was added, removed, or whose contents differ.
    pub fn get_changes(&self, other: &MerkleTree) -> Vec<PathBuf> {
        let mut changes = Vec::new();
        compare_nodes(&self.root_path, &self.root, &other.root, &mut changes);
        changes
    }

    /// Re-hash a single file in place: create missing intermediate directory
    /// nodes with empty hashes as needed, replace or create the leaf with a
    /// freshly computed file hash, then recompute each ancestor directory's
    /// hash bottom-up. A no-op if `path` does not exist or is not under the
    /// tree's root.
    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    pub fn update_file(&mut self, path: &Path) -> Result<(), MerkleError> {
        if !path.exists() {
            return Ok(());
        }
        let Ok(relative) = path.strip_prefix(&self.root_path) else {
            return Ok(());
        };
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            return Ok(());
        }

        let bytes = std::fs::read(path).map_err(|e| MerkleError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let file_hash = MerkleNode::file_hash(&bytes);
        update_node(&mut self.root, &parts, &file_hash);
        Ok(())
    }

    /// The stored hash at the tree position corresponding to `path`, if present.
    pub fn get_node_hash(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root_path).ok()?;
        let mut node = &self.root;
        for component in relative.components() {
            let name = component.as_os_str().to_string_lossy();
            node = node.children.get(name.as_ref())?;
        }
        Some(node.hash.clone())
    }

    /// Absolute paths of every file reachable from the root, derived by
    /// walking the tree rather than the filesystem.
    pub fn get_all_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        collect_files(&self.root_path, &self.root, &mut files);
        files
    }

    /// Remove the leaf named by `path`, then recompute each ancestor
    /// directory's hash bottom-up. Mirrors `update_file`'s ancestor-rehash
    /// discipline in reverse. A no-op if `path` is not under the tree's root
    /// or not currently tracked.
    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    pub fn remove_file(&mut self, path: &Path) {
        let Ok(relative) = path.strip_prefix(&self.root_path) else {
            return;
        };
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            return;
        }
        remove_node(&mut self.root, &parts);
    }
}

fn build_node(path: &Path) -> Result<MerkleNode, MerkleError> {
    let metadata = std::fs::metadata(path).map_err(|e| MerkleError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    if metadata.is_file() {
        let bytes = std::fs::read(path).map_err(|e| MerkleError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        return Ok(MerkleNode {
            is_file: true,
            hash: MerkleNode::file_hash(&bytes),
            children: Default::default(),
        });
    }

    let mut children = std::collections::BTreeMap::new();
    let entries = std::fs::read_dir(path).map_err(|e| MerkleError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| MerkleError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let child = build_node(&entry.path())?;
        children.insert(name, child);
    }

    let hash = MerkleNode::directory_hash(children.values().map(|c| c.hash.as_str()));
    Ok(MerkleNode {
        is_file: false,
        hash,
        children,
    })
}

/// Insert/replace the leaf named by `parts` under `node`, then recompute
/// `node`'s own hash from its (possibly just-updated) children. Called
/// recursively, this re-hashes every ancestor on the way back up.
fn update_node(node: &mut MerkleNode, parts: &[String], file_hash: &str) {
    if parts.len() == 1 {
        let leaf = node
            .children
            .entry(parts[0].clone())
            .or_insert_with(MerkleNode::sentinel);
        leaf.is_file = true;
        leaf.hash = file_hash.to_string();
    } else {
        let child = node
            .children
            .entry(parts[0].clone())
            .or_insert_with(MerkleNode::sentinel);
        update_node(child, &parts[1..], file_hash);
    }
    node.rehash_directory();
}

/// Remove the leaf (or subtree) named by `parts` under `node`, then
/// recompute `node`'s own hash. Recursing back up re-hashes every ancestor.
fn remove_node(node: &mut MerkleNode, parts: &[String]) {
    if parts.len() == 1 {
        node.children.remove(&parts[0]);
    } else if let Some(child) = node.children.get_mut(&parts[0]) {
        remove_node(child, &parts[1..]);
    }
    node.rehash_directory();
}

fn compare_nodes(path: &Path, a: &MerkleNode, b: &MerkleNode, changes: &mut Vec<PathBuf>) {
    if a.hash == b.hash {
        return;
    }
    if a.is_file || b.is_file {
        changes.push(path.to_path_buf());
        return;
    }
    let names: BTreeSet<&String> = a.children.keys().chain(b.children.keys()).collect();
    for name in names {
        let child_path = path.join(name);
        match (a.children.get(name), b.children.get(name)) {
            (Some(x), Some(y)) => compare_nodes(&child_path, x, y, changes),
            (Some(x), None) => compare_nodes(&child_path, x, &MerkleNode::sentinel(), changes),
            (None, Some(y)) => compare_nodes(&child_path, &MerkleNode::sentinel(), y, changes),
            (None, None) => unreachable!("name came from the union of both child maps"),
        }
    }
}

fn collect_files(path: &Path, node: &MerkleNode, files: &mut Vec<PathBuf>) {
    if node.is_file {
        files.push(path.to_path_buf());
        return;
    }
    for (name, child) in &node.children {
        collect_files(&path.join(name), child, files);
    }
}
