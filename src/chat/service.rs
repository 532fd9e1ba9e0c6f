use super::llm::{ChatMessage, ChatModel};
use crate::config::ChatConfig;
use crate::embeddings::Embedder;
use crate::error::{CampusRagError, Result};
use crate::store::{ScoredChunk, StoreProvider};
use serde::Serialize;
use std::sync::Arc;

/// Exact reply the model is told to give when the context has no answer.
pub const NO_ANSWER_SENTINEL: &str = "NO_ANSWER";

/// Outcome of a question
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Answer {
    Grounded { text: String, sources: Vec<String> },
    NotFound,
}

impl Answer {
    /// User-facing text; `NotFound` renders as the configured fallback sentence.
    pub fn render(&self, no_answer_message: &str) -> String {
        match self {
            Answer::Grounded { text, .. } => text.clone(),
            Answer::NotFound => no_answer_message.to_string(),
        }
    }

    pub fn sources(&self) -> &[String] {
        match self {
            Answer::Grounded { sources, .. } => sources,
            Answer::NotFound => &[],
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Answer::Grounded { .. })
    }
}

/// Answers questions from the knowledge store through a hosted model.
pub struct QueryService {
    provider: Arc<StoreProvider>,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn ChatModel>,
    top_k: usize,
    language: String,
}

impl QueryService {
    pub fn new(
        provider: Arc<StoreProvider>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
        config: &ChatConfig,
    ) -> Self {
        Self {
            provider,
            embedder,
            model,
            top_k: config.top_k,
            language: config.language.clone(),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(CampusRagError::InvalidInput("question is empty".to_string()));
        }

        let query_vector = self.embedder.embed_query(question).await?;
        let context = self.provider.search(&query_vector, self.top_k).await?;
        if context.is_empty() {
            log::info!("No context retrieved for question");
            return Ok(Answer::NotFound);
        }

        let messages = vec![
            ChatMessage::system(system_prompt(&self.language)),
            ChatMessage::user(user_prompt(&context, question)),
        ];
        let reply = self.model.complete(&messages).await?;
        let reply = reply.trim();

        if reply.is_empty() || reply.trim_matches(|c: char| !c.is_alphanumeric() && c != '_') == NO_ANSWER_SENTINEL {
            log::info!("Model found no answer in {} context chunks", context.len());
            return Ok(Answer::NotFound);
        }

        let mut sources: Vec<String> = Vec::new();
        for chunk in &context {
            if !sources.contains(&chunk.file_name) {
                sources.push(chunk.file_name.clone());
            }
        }

        Ok(Answer::Grounded {
            text: reply.to_string(),
            sources,
        })
    }
}

fn system_prompt(language: &str) -> String {
    format!(
        "You are the virtual assistant of a university. Answer the question using only \
         the information in the provided context excerpts from the university's internal \
         documents. Always answer in {language}. Do not use outside knowledge. If the \
         context does not contain the answer, reply with exactly {sentinel} and nothing else.",
        language = language,
        sentinel = NO_ANSWER_SENTINEL
    )
}

fn user_prompt(context: &[ScoredChunk], question: &str) -> String {
    let mut prompt = String::from("Context:\n----------------\n");
    for (i, chunk) in context.iter().enumerate() {
        prompt.push_str(&format!("[{}] ({})\n{}\n\n", i + 1, chunk.file_name, chunk.content));
    }
    prompt.push_str("----------------\nQuestion: ");
    prompt.push_str(question);
    prompt
}
