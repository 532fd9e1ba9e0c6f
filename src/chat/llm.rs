use crate::embeddings::openai::{build_http_client, is_retryable};
use crate::error::{CampusRagError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

const MAX_RETRIES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A hosted language model that completes a conversation.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    fn model(&self) -> &str;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// OpenAI chat completions client
pub struct OpenAIChatModel {
    client: Client,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAIChatModel {
    pub fn new(api_key: String, model: String, temperature: f32) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            api_key,
            model,
            temperature,
        })
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            let start = std::time::Instant::now();
            let outcome = self
                .client
                .post(CHAT_COMPLETIONS_URL)
                .bearer_auth(&self.api_key)
                .json(&CompletionRequest {
                    model: &self.model,
                    messages,
                    temperature: self.temperature,
                })
                .send()
                .await;

            let retry_reason = match outcome {
                Ok(response) if response.status().is_success() => {
                    let result: CompletionResponse = response
                        .json()
                        .await
                        .map_err(|e| CampusRagError::Llm(format!("Failed to parse response: {}", e)))?;
                    log::debug!("Chat completion took {:?} (attempt {})", start.elapsed(), attempt + 1);
                    return result
                        .choices
                        .into_iter()
                        .next()
                        .map(|c| c.message.content)
                        .ok_or_else(|| CampusRagError::Llm("Response contained no choices".to_string()));
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unable to read error response".to_string());
                    let err = CampusRagError::Llm(format!("OpenAI API error {}: {}", status, body));
                    if !is_retryable(status) {
                        return Err(err);
                    }
                    err
                }
                Err(e) => CampusRagError::Llm(format!("Network error: {}", e)),
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

    fn model(&self) -> &str {
        &self.model
    }
}
