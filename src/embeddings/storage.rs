//! Embedding vectors are stored as little-endian f32 BLOBs.

use crate::error::{Result, CampusRagError};

/// Encode an embedding vector as a BLOB (raw little-endian bytes).
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`encode_embedding`].
///
/// Fails when the byte length is not a multiple of four.
pub fn decode_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(CampusRagError::Embedding(format!(
            "Invalid embedding BLOB length: {}",
            blob.len()
        )));
    }

    Ok(blob
        .chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect())
}
