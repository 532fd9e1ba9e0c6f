pub mod bootstrap;
pub mod cache;
pub mod chat;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod history;
pub mod ingest;
pub mod search;
pub mod server;
pub mod store;

pub use config::Config;
pub use error::{CampusRagError, Result};
