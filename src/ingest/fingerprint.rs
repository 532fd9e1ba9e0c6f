use crate::store::ChunkMetadata;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// SHA-256 of the chunk text, lowercase hex.
///
/// Content-addressed: the same text from two different files has the same
/// fingerprint.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fingerprints already present in the store, plus those accepted during the
/// current run.
#[derive(Debug, Default)]
pub struct FingerprintSet {
    hashes: HashSet<String>,
}

impl FingerprintSet {
    /// Build from store metadata. Entries without a hash are ignored.
    pub fn from_metadata(metadata: &[ChunkMetadata]) -> Self {
        Self {
            hashes: metadata
                .iter()
                .filter(|m| !m.hash.is_empty())
                .map(|m| m.hash.clone())
                .collect(),
        }
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    /// Record a fingerprint; returns false when it was already known.
    pub fn insert(&mut self, hash: &str) -> bool {
        self.hashes.insert(hash.to_string())
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
