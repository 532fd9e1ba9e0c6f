//! Wiring shared by the binaries: logging, API clients, store and services.

use crate::cache::QueryEmbeddingCache;
use crate::chat::{OpenAIChatModel, QueryService};
use crate::config::Config;
use crate::embeddings::{Embedder, OpenAIEmbedder};
use crate::error::{CampusRagError, Result};
use crate::store::StoreProvider;
use std::sync::Arc;

/// Initialize env_logger; `RUST_LOG` wins over the configured level.
pub fn init_logging(default_level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", default_level))
        .try_init();
}

fn api_key(env_var: &str) -> Result<String> {
    std::env::var(env_var).map_err(|_| {
        CampusRagError::Config(format!(
            "Environment variable {} not set. Set it in your .env file or as an environment variable.",
            env_var
        ))
    })
}

/// Embedder with an LRU question cache when `cache_capacity > 0`.
pub fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let embedder = OpenAIEmbedder::new(
        api_key(&config.embeddings.api_key_env)?,
        config.embeddings.model.clone(),
        config.embeddings.batch_size,
    )?
    .with_dimensions(config.embeddings.dimensions);

    let embedder = if config.embeddings.cache_capacity > 0 {
        embedder.with_cache(Arc::new(QueryEmbeddingCache::new(config.embeddings.cache_capacity)))
    } else {
        embedder
    };
    Ok(Arc::new(embedder))
}

pub fn build_chat_model(config: &Config) -> Result<OpenAIChatModel> {
    OpenAIChatModel::new(
        api_key(&config.chat.api_key_env)?,
        config.chat.model.clone(),
        config.chat.temperature,
    )
}

/// Everything a front end needs
pub struct Services {
    pub provider: Arc<StoreProvider>,
    pub query: Arc<QueryService>,
}

/// Create directories, open (or bootstrap) the store, build the query service.
pub async fn build_services(config: &Config) -> anyhow::Result<Services> {
    config.ensure_directories()?;

    let embedder = build_embedder(config)?;
    let provider = Arc::new(StoreProvider::open(config, Arc::clone(&embedder)).await?);
    let query = Arc::new(QueryService::new(
        Arc::clone(&provider),
        embedder,
        Arc::new(build_chat_model(config)?),
        &config.chat,
    ));

    Ok(Services { provider, query })
}
