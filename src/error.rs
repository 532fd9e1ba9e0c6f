use thiserror::Error;

/// Main error type for Campus RAG
#[derive(Error, Debug)]
pub enum CampusRagError {
    /// Knowledge store (SQLite) errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding API errors
    #[error("Embedding API error: {0}")]
    Embedding(String),

    /// Chat completion API errors
    #[error("Language model error: {0}")]
    Llm(String),

    /// Text extraction failure for a recognized format
    #[error("Extraction error: {0}")]
    Extract(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Missing or wrong admin credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The store handle is being rebuilt or was never opened
    #[error("Knowledge store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Convenient Result type using CampusRagError
pub type Result<T> = std::result::Result<T, CampusRagError>;
