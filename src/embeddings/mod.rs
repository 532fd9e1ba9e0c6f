pub mod openai;
pub mod storage;

use async_trait::async_trait;
use crate::error::Result;

pub use openai::OpenAIEmbedder;
pub use storage::{decode_embedding, encode_embedding};

/// Turns text into embedding vectors.
///
/// The knowledge store calls `embed_batch` when persisting chunks; the query
/// service calls `embed_query` for questions.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed many texts; the result has one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single question.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Model identifier, for logging.
    fn model(&self) -> &str;
}
