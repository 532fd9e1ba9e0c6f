use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Filesystem layout and process-wide settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Uploads waiting for ingestion.
    #[serde(default = "default_pending_dir")]
    pub pending_dir: PathBuf,
    /// Originals that contributed content to the knowledge store.
    #[serde(default = "default_committed_dir")]
    pub committed_dir: PathBuf,
    /// Directory owned by the knowledge store.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Embeddings configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub batch_size: usize,
    pub dimensions: usize,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// Hosted chat model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Number of chunks handed to the model as context.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Natural language the assistant must answer in.
    #[serde(default = "default_language")]
    pub language: String,
    /// Sentence shown to users when the knowledge base has no answer.
    #[serde(default = "default_no_answer_message")]
    pub no_answer_message: String,
    #[serde(default = "default_chat_api_key_env")]
    pub api_key_env: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            temperature: default_temperature(),
            top_k: default_top_k(),
            language: default_language(),
            no_answer_message: default_no_answer_message(),
            api_key_env: default_chat_api_key_env(),
        }
    }
}

/// Chunk window configuration, in characters
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_admin_password_env")]
    pub admin_password_env: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            admin_password_env: default_admin_password_env(),
            allowed_origins: Vec::new(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_pending_dir() -> PathBuf {
    PathBuf::from("./new_docs")
}

fn default_committed_dir() -> PathBuf {
    PathBuf::from("./old_docs")
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("./knowledge_base")
}

fn default_history_file() -> PathBuf {
    PathBuf::from("./chat_history.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_top_k() -> usize {
    4
}

fn default_language() -> String {
    "Vietnamese".to_string()
}

fn default_no_answer_message() -> String {
    "Xin lỗi, tôi chưa có thông tin về vấn đề này trong tài liệu tham khảo.".to_string()
}

fn default_chat_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_http_port() -> u16 {
    5000
}

fn default_admin_password_env() -> String {
    "CAMPUS_RAG_ADMIN_PASSWORD".to_string()
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in CAMPUS_RAG_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("CAMPUS_RAG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml_str(&config_str)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;

        config.validate_environment()?;

        Ok(config)
    }

    /// Parse and validate configuration from TOML text (no environment checks).
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.embeddings.provider != "openai" {
            anyhow::bail!(
                "embeddings.provider {:?} is not supported (only \"openai\")",
                self.embeddings.provider
            );
        }

        if self.embeddings.dimensions == 0 {
            anyhow::bail!("embeddings.dimensions must be greater than 0");
        }

        if self.embeddings.batch_size == 0 {
            anyhow::bail!("embeddings.batch_size must be greater than 0");
        }

        if self.chat.top_k == 0 {
            anyhow::bail!("chat.top_k must be greater than 0");
        }

        if !(0.0..=2.0).contains(&self.chat.temperature) {
            anyhow::bail!("chat.temperature must be between 0.0 and 2.0");
        }

        if self.chunking.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be greater than 0");
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            anyhow::bail!("chunking.chunk_overlap must be less than chunking.chunk_size");
        }

        if self.app.pending_dir == self.app.committed_dir {
            anyhow::bail!("app.pending_dir and app.committed_dir must be different directories");
        }

        Ok(())
    }

    /// Check that the API key variables named in the config are set.
    /// Checks both the process environment and .env (already loaded in `load`).
    fn validate_environment(&self) -> Result<()> {
        std::env::var(&self.embeddings.api_key_env).with_context(|| {
            format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable with your OpenAI API key.",
                self.embeddings.api_key_env
            )
        })?;

        if self.chat.api_key_env != self.embeddings.api_key_env {
            std::env::var(&self.chat.api_key_env).with_context(|| {
                format!(
                    "Environment variable {} not set (chat.api_key_env).",
                    self.chat.api_key_env
                )
            })?;
        }

        Ok(())
    }

    pub fn pending_dir(&self) -> &Path {
        &self.app.pending_dir
    }

    pub fn committed_dir(&self) -> &Path {
        &self.app.committed_dir
    }

    pub fn store_dir(&self) -> &Path {
        &self.app.store_dir
    }

    /// Create the pending and committed directories if they are missing.
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(self.pending_dir())
            .with_context(|| format!("Failed to create {}", self.pending_dir().display()))?;
        std::fs::create_dir_all(self.committed_dir())
            .with_context(|| format!("Failed to create {}", self.committed_dir().display()))?;
        Ok(())
    }
}
