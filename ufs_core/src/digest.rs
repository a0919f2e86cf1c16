//! Content digests using BLAKE3.

use crate::arena::Arena;
use crate::block::Block;
use crate::file::File;
use serde::{Serialize, Serializer};
use std::fmt;

/// Digest size in bytes (BLAKE3 produces 256-bit hashes).
pub const DIGEST_SIZE: usize = 32;

/// A 32-byte BLAKE3 digest of a file's contents.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
    /// Hash raw bytes.
    pub fn of_bytes(data: &[u8]) -> Self {
        Digest(*blake3::hash(data).as_bytes())
    }

    /// Hash a file's byte stream block by block.
    pub fn of_file(file: &File, blocks: &Arena<Block>) -> Self {
        let mut hasher = blake3::Hasher::new();
        for (_, block) in file.chain(blocks) {
            hasher.update(block.bytes());
        }
        Digest(*hasher.finalize().as_bytes())
    }

    /// Convert to hex string (64 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}
