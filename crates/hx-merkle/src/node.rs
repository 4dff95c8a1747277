use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

/// A node in a [`crate::MerkleTree`]: either a file leaf or a directory.
///
/// File nodes carry `hash = SHA-256(file bytes)` and no children. Directory
/// nodes carry `hash = SHA-256(concat(sorted(children_hashes_as_hex)))` and
/// their children keyed by basename. Nodes do not carry their own absolute
/// path; the owning tree holds the root path out-of-band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleNode {
    pub is_file: bool,
    pub hash: String,
    pub children: BTreeMap<String, MerkleNode>,
}

impl MerkleNode {
    /// A placeholder directory node with no children and an empty hash.
    ///
    /// Used both for intermediate directories created on demand by
    /// `update_file` (re-hashed bottom-up once their subtree settles) and as
    /// the "missing side" sentinel in `get_changes`'s simultaneous walk: an
    /// empty hash can never equal a real file or directory hash, so the
    /// comparison is guaranteed to diverge at the recursion leaf.
    pub fn sentinel() -> Self {
        Self {
            is_file: false,
            hash: String::new(),
            children: BTreeMap::new(),
        }
    }

    pub fn file_hash(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        to_hex(&hasher.finalize())
    }

    /// `SHA-256(concat(sorted(hashes)))`, sorted lexicographically as hex
    /// strings. Sorting by hash (not by child name) is what makes the
    /// result independent of the OS's directory-listing order.
    pub fn directory_hash<'a>(hashes: impl Iterator<Item = &'a str>) -> String {
        let mut sorted: Vec<&str> = hashes.collect();
        sorted.sort_unstable();
        let concatenated: String = sorted.concat();
        let mut hasher = Sha256::new();
        hasher.update(concatenated.as_bytes());
        to_hex(&hasher.finalize())
    }

    /// Recompute this node's hash from its current children. No-op on file nodes.
    pub fn rehash_directory(&mut self) {
        if self.is_file {
            return;
        }
        self.hash = Self::directory_hash(self.children.values().map(|c| c.hash.as_str()));
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_hash_independent_of_order() {
        let h1 = MerkleNode::directory_hash(["aa", "bb", "cc"].into_iter());
        let h2 = MerkleNode::directory_hash(["cc", "aa", "bb"].into_iter());
        assert_eq!(h1, h2);
    }

    #[test]
    fn sentinel_hash_never_matches_real_hash() {
        let real = MerkleNode::file_hash(b"hello");
        assert_ne!(real, MerkleNode::sentinel().hash);
    }

    #[test]
    fn file_hash_is_sha256_hex() {
        let h = MerkleNode::file_hash(b"");
        // SHA-256("") is a well-known constant.
        assert_eq!(
            h,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
        );
    }
}
