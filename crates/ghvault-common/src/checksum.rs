//! Checksum utilities for archive verification
//!
//! Glacier identifies payloads by their SHA-256 *tree hash*: the payload is split
//! into 1 MiB leaves, each leaf is hashed, and adjacent hashes are concatenated and
//! hashed again level by level until one root remains. A trailing odd node is
//! promoted unchanged to the next level.

use sha2::{Digest, Sha256};

/// Leaf size of a Glacier tree hash
pub const TREE_HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// Incremental tree hash computation.
///
/// Data may be fed in arbitrarily sized slices; leaves are cut at exact 1 MiB
/// boundaries of the overall stream.
#[derive(Clone, Default)]
pub struct TreeHasher {
    leaves: Vec<[u8; 32]>,
    current: Sha256,
    current_len: usize,
    total_len: u64,
}

impl TreeHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed more payload bytes
    pub fn update(&mut self, mut data: &[u8]) {
        self.total_len += data.len() as u64;

        while !data.is_empty() {
            let room = TREE_HASH_CHUNK_SIZE - self.current_len;
            let take = room.min(data.len());

            self.current.update(&data[..take]);
            self.current_len += take;
            data = &data[take..];

            if self.current_len == TREE_HASH_CHUNK_SIZE {
                let leaf = std::mem::take(&mut self.current).finalize();
                self.leaves.push(leaf.into());
                self.current_len = 0;
            }
        }
    }

    /// Number of bytes hashed so far
    pub fn total_len(&self) -> u64 {
        self.total_len
    }

    /// Finish and return the root hash
    pub fn finalize(mut self) -> [u8; 32] {
        if self.current_len > 0 || self.leaves.is_empty() {
            self.leaves.push(self.current.finalize().into());
        }

        combine_tree(self.leaves)
    }

    /// Finish and return the root hash hex-encoded
    pub fn finalize_hex(self) -> String {
        hex::encode(self.finalize())
    }
}

/// Reduce leaf hashes to the root of the tree
fn combine_tree(mut level: Vec<[u8; 32]>) -> [u8; 32] {
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => {
                    let mut hasher = Sha256::new();
                    hasher.update(left);
                    hasher.update(right);
                    hasher.finalize().into()
                },
                [single] => *single,
                _ => unreachable!("chunks(2) yields one or two elements"),
            })
            .collect();
    }

    level[0]
}

/// Compute the hex-encoded tree hash of an in-memory payload
pub fn tree_hash(data: &[u8]) -> String {
    let mut hasher = TreeHasher::new();
    hasher.update(data);
    hasher.finalize_hex()
}
