pub mod provider;
pub mod sqlite;

use crate::error::Result;
use crate::ingest::DocumentChunk;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use provider::{StoreProvider, StoreStats, UploadReport};
pub use sqlite::SqliteKnowledgeStore;

/// Metadata persisted with every chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub file_name: String,
    pub hash: String,
}

/// Equality filter over chunk metadata; unset fields match anything.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    pub file_name: Option<String>,
    pub hash: Option<String>,
}

impl MetadataFilter {
    /// Matches every chunk
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_file_name(file_name: impl Into<String>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            hash: None,
        }
    }

    pub fn by_hash(hash: impl Into<String>) -> Self {
        Self {
            file_name: None,
            hash: Some(hash.into()),
        }
    }
}

/// A retrieved chunk with its cosine similarity to the query
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub content: String,
    pub file_name: String,
    pub hash: String,
    pub score: f32,
}

/// Durable chunk storage with vector retrieval.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Metadata of every stored chunk
    async fn get_all_metadata(&self) -> Result<Vec<ChunkMetadata>>;

    /// Embed and persist chunks; returns how many were written.
    async fn add_documents(&self, chunks: Vec<DocumentChunk>) -> Result<usize>;

    /// Remove chunks matching the filter; returns how many were removed.
    async fn delete_where(&self, filter: &MetadataFilter) -> Result<usize>;

    /// The `k` chunks most similar to `query`, best first.
    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    async fn count(&self) -> Result<usize>;
}
