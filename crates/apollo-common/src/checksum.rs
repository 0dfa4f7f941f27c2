//! Checksum utilities for content-addressed artifacts

use crate::types::ChecksumAlgorithm;
use sha2::{Digest, Sha256, Sha512};

/// Incremental hasher fed block by block while a file is being streamed.
pub enum StreamingHasher {
    Sha256(Sha256),
    Sha512(Sha512),
}

impl StreamingHasher {
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Sha256 => StreamingHasher::Sha256(Sha256::new()),
            ChecksumAlgorithm::Sha512 => StreamingHasher::Sha512(Sha512::new()),
        }
    }

    pub fn update(&mut self, block: &[u8]) {
        match self {
            StreamingHasher::Sha256(hasher) => hasher.update(block),
            StreamingHasher::Sha512(hasher) => hasher.update(block),
        }
    }

    /// Consume the hasher and return the lowercase hex digest.
    pub fn finalize_hex(self) -> String {
        match self {
            StreamingHasher::Sha256(hasher) => hex::encode(hasher.finalize()),
            StreamingHasher::Sha512(hasher) => hex::encode(hasher.finalize()),
        }
    }
}
