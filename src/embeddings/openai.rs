use crate::cache::QueryEmbeddingCache;
use crate::embeddings::Embedder;
use crate::error::{Result, CampusRagError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// OpenAI caps a single embeddings request at 2048 inputs.
const MAX_BATCH_SIZE: usize = 2048;

const MAX_RETRIES: usize = 3;

/// Request structure for OpenAI embeddings API
#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response structure from OpenAI embeddings API
#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// Individual embedding data in API response
#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Build the shared HTTP client used for OpenAI calls (30s timeout).
pub(crate) fn build_http_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| CampusRagError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// 429 and 5xx are worth retrying; everything else fails fast.
pub(crate) fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn check_dimensions(embeddings: &[Vec<f32>], expected: Option<usize>) -> Result<()> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match embeddings.iter().find(|e| e.len() != expected) {
        Some(bad) => Err(CampusRagError::Embedding(format!(
            "Expected {}-dimensional embeddings, got {} (check embeddings.dimensions)",
            expected,
            bad.len()
        ))),
        None => Ok(()),
    }
}

/// OpenAI embeddings client
///
/// Splits large inputs into API-sized batches, retries rate-limit and server
/// errors with exponential backoff, and optionally caches question vectors.
pub struct OpenAIEmbedder {
    client: Client,
    api_key: String,
    model: String,
    batch_size: usize,
    /// Expected vector length; responses of any other length are rejected
    dimensions: Option<usize>,
    cache: Option<Arc<QueryEmbeddingCache>>,
}

impl OpenAIEmbedder {
    /// * `api_key` - OpenAI API key
    /// * `model` - Model name (e.g., "text-embedding-3-small")
    /// * `batch_size` - Maximum number of texts per API request (capped at 2048)
    pub fn new(api_key: String, model: String, batch_size: usize) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            api_key,
            model,
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
            dimensions: None,
            cache: None,
        })
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Attach a question-embedding cache consulted by `embed_query`.
    pub fn with_cache(mut self, cache: Arc<QueryEmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// One API request with retry on 429/5xx and network errors.
    async fn request_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            let start = std::time::Instant::now();
            let outcome = self
                .client
                .post(EMBEDDINGS_URL)
                .bearer_auth(&self.api_key)
                .json(&EmbeddingRequest { model: &self.model, input: texts })
                .send()
                .await;

            let retry_reason = match outcome {
                Ok(response) if response.status().is_success() => {
                    let mut result: EmbeddingResponse = response.json().await.map_err(|e| {
                        CampusRagError::Embedding(format!("Failed to parse response: {}", e))
                    })?;
                    if result.data.len() != texts.len() {
                        return Err(CampusRagError::Embedding(format!(
                            "Expected {} embeddings, got {}",
                            texts.len(),
                            result.data.len()
                        )));
                    }
                    // The API does not promise response order
                    result.data.sort_by_key(|d| d.index);
                    let embeddings: Vec<Vec<f32>> = result.data.into_iter().map(|d| d.embedding).collect();
                    check_dimensions(&embeddings, self.dimensions)?;
                    log::debug!(
                        "Embedding API call for {} texts took {:?} (attempt {})",
                        texts.len(),
                        start.elapsed(),
                        attempt + 1
                    );
                    return Ok(embeddings);
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unable to read error response".to_string());
                    let err = CampusRagError::Embedding(format!("OpenAI API error {}: {}", status, body));
                    if !is_retryable(status) {
                        return Err(err);
                    }
                    err
                }
                Err(e) => CampusRagError::Embedding(format!("Network error: {}", e)),
            };

            if attempt >= MAX_RETRIES {
                return Err(retry_reason);
            }
            log::warn!("Retry {}/{} after error: {}", attempt + 1, MAX_RETRIES, retry_reason);
            tokio::time::sleep(delay).await;
            delay *= 2;
            attempt += 1;
        }
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            all_embeddings.extend(self.request_with_retry(batch).await?);

            // Small pause between full batches to stay under rate limits
            if batch.len() == self.batch_size {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }

        Ok(all_embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(text) {
                log::debug!("Cache hit for query: {}", text);
                return Ok(cached);
            }
        }

        let mut embeddings = self.request_with_retry(&[text.to_string()]).await?;
        let embedding = embeddings
            .pop()
            .ok_or_else(|| CampusRagError::Embedding("Empty response from OpenAI API".to_string()))?;

        if let Some(cache) = &self.cache {
            cache.put(text, embedding.clone());
        }

        Ok(embedding)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
