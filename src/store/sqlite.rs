use super::{ChunkMetadata, KnowledgeStore, MetadataFilter, ScoredChunk};
use crate::db::{migrate, Db};
use crate::embeddings::{decode_embedding, encode_embedding, Embedder};
use crate::error::{CampusRagError, Result};
use crate::ingest::DocumentChunk;
use crate::search::top_k;
use async_trait::async_trait;
use rusqlite::params;
use rusqlite::types::Value;
use std::path::Path;
use std::sync::Arc;

/// Database file kept inside the store directory
pub const STORE_FILE: &str = "knowledge.db";

/// Knowledge store backed by one SQLite file in a directory of its own.
pub struct SqliteKnowledgeStore {
    db: Db,
    embedder: Arc<dyn Embedder>,
}

impl SqliteKnowledgeStore {
    /// Open the store in `dir`, creating an empty one when it does not exist.
    pub async fn open(dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let db = Db::new(dir.join(STORE_FILE));
        db.with_connection(|conn| migrate::run_migrations(conn)).await?;

        log::info!("Opened knowledge store at {}", dir.display());
        Ok(Self { db, embedder })
    }

    /// Names of applied schema migrations
    pub async fn applied_migrations(&self) -> Result<Vec<String>> {
        self.db
            .with_connection(|conn| migrate::get_applied_migrations(conn))
            .await
    }
}

#[async_trait]
impl KnowledgeStore for SqliteKnowledgeStore {
    async fn get_all_metadata(&self) -> Result<Vec<ChunkMetadata>> {
        self.db
            .with_connection(|conn| {
                let mut stmt = conn.prepare("SELECT file_name, hash FROM chunks ORDER BY rowid")?;
                let rows = stmt.query_map([], |row| {
                    Ok(ChunkMetadata {
                        file_name: row.get(0)?,
                        hash: row.get(1)?,
                    })
                })?;
                let mut metadata = Vec::new();
                for row in rows {
                    metadata.push(row?);
                }
                Ok(metadata)
            })
            .await
    }

    async fn add_documents(&self, chunks: Vec<DocumentChunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(CampusRagError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let created_at = chrono::Utc::now().to_rfc3339();
        let inserted = self
            .db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                let mut inserted = 0;
                {
                    // The unique hash index drops anything already stored
                    let mut stmt = tx.prepare(
                        "INSERT OR IGNORE INTO chunks (chunk_id, file_name, hash, content, embedding, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    )?;
                    for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
                        inserted += stmt.execute(params![
                            uuid::Uuid::new_v4().to_string(),
                            chunk.file_name,
                            chunk.content_hash,
                            chunk.content,
                            encode_embedding(embedding),
                            created_at,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(inserted)
            })
            .await?;

        log::debug!("Stored {} chunks with {}", inserted, self.embedder.model());
        Ok(inserted)
    }

    async fn delete_where(&self, filter: &MetadataFilter) -> Result<usize> {
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(file_name) = &filter.file_name {
            clauses.push("file_name = ?");
            values.push(Value::Text(file_name.clone()));
        }
        if let Some(hash) = &filter.hash {
            clauses.push("hash = ?");
            values.push(Value::Text(hash.clone()));
        }

        let sql = if clauses.is_empty() {
            "DELETE FROM chunks".to_string()
        } else {
            format!("DELETE FROM chunks WHERE {}", clauses.join(" AND "))
        };

        self.db
            .with_connection(move |conn| {
                let removed = conn.execute(&sql, rusqlite::params_from_iter(values))?;
                Ok(removed)
            })
            .await
    }

    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let candidates = self
            .db
            .with_connection(|conn| {
                let mut stmt =
                    conn.prepare("SELECT content, file_name, hash, embedding FROM chunks ORDER BY rowid")?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                })?;

                let mut candidates = Vec::new();
                for row in rows {
                    let (content, file_name, hash, blob) = row?;
                    candidates.push(((content, file_name, hash), decode_embedding(&blob)?));
                }
                Ok(candidates)
            })
            .await?;

        Ok(top_k(query, candidates, k)
            .into_iter()
            .map(|(score, (content, file_name, hash))| ScoredChunk {
                content,
                file_name,
                hash,
                score,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        self.db
            .with_connection(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
    }
}
