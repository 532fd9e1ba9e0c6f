use super::sqlite::SqliteKnowledgeStore;
use super::{KnowledgeStore, MetadataFilter, ScoredChunk};
use crate::config::Config;
use crate::embeddings::Embedder;
use crate::error::{CampusRagError, Result};
use crate::ingest::{discover_files, save_upload, IngestPipeline, IngestReport};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Written into the store directory once the archive has been fully indexed.
pub const INDEX_MARKER: &str = ".indexed";

/// Counts reported by `/stats` and the stats CLI
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub chunks: usize,
    pub indexed_files: usize,
    pub committed_files: usize,
    pub pending_files: usize,
}

/// An upload staged and ingested in one step
#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    /// Name the file was stored under in the pending directory
    pub file_name: String,
    pub report: IngestReport,
}

/// Owns the live knowledge store handle.
///
/// Ingestion, upload staging and reset are serialized by an internal gate.
/// Reset swaps the handle under the write lock, so readers never see a
/// half-deleted store.
pub struct StoreProvider {
    pending_dir: PathBuf,
    committed_dir: PathBuf,
    store_dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    pipeline: IngestPipeline,
    handle: RwLock<Option<Arc<SqliteKnowledgeStore>>>,
    gate: Mutex<()>,
}

impl StoreProvider {
    /// Open the configured store. Until the committed archive has been indexed
    /// once without error, every open indexes it again.
    pub async fn open(config: &Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let store_dir = config.store_dir().to_path_buf();
        let pipeline = IngestPipeline::new(config.chunking.clone());

        let store = SqliteKnowledgeStore::open(&store_dir, Arc::clone(&embedder)).await?;
        if !store_dir.join(INDEX_MARKER).is_file() {
            log::info!("Indexing archive {} into new store", config.committed_dir().display());
            pipeline.rebuild(config.committed_dir(), &store).await?;
            mark_indexed(&store_dir)?;
        }

        Ok(Self {
            pending_dir: config.pending_dir().to_path_buf(),
            committed_dir: config.committed_dir().to_path_buf(),
            store_dir,
            embedder,
            pipeline,
            handle: RwLock::new(Some(Arc::new(store))),
            gate: Mutex::new(()),
        })
    }

    pub fn pending_dir(&self) -> &Path {
        &self.pending_dir
    }

    pub fn committed_dir(&self) -> &Path {
        &self.committed_dir
    }

    /// The current store handle.
    pub async fn current(&self) -> Result<Arc<SqliteKnowledgeStore>> {
        self.handle.read().await.clone().ok_or_else(unavailable)
    }

    /// Similarity search holding the read lock, so a reset cannot delete the
    /// store mid-query.
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let guard = self.handle.read().await;
        let store = guard.as_ref().ok_or_else(unavailable)?;
        store.similarity_search(query, k).await
    }

    /// Ingest everything in the pending directory.
    pub async fn ingest(&self) -> Result<IngestReport> {
        let _gate = self.gate.lock().await;
        self.run_pipeline().await
    }

    /// Write an upload into the pending directory and ingest it. The gate is
    /// held across both steps, so a running ingestion never sees the file
    /// replaced underneath it.
    pub async fn stage_and_ingest(&self, raw_name: &str, bytes: &[u8]) -> Result<UploadReport> {
        let _gate = self.gate.lock().await;
        let file_name = save_upload(&self.pending_dir, raw_name, bytes)?;
        let report = self.run_pipeline().await?;
        Ok(UploadReport { file_name, report })
    }

    async fn run_pipeline(&self) -> Result<IngestReport> {
        let guard = self.handle.read().await;
        let store = guard.as_ref().ok_or_else(unavailable)?;
        self.pipeline
            .run(&self.pending_dir, &self.committed_dir, store.as_ref())
            .await
    }

    /// Delete the store and rebuild it from the committed archive.
    ///
    /// The pending directory is left alone. If the rebuild fails the fresh
    /// store stays bound with whatever was indexed before the failure, and
    /// the next open indexes the archive again.
    pub async fn reset(&self) -> Result<IngestReport> {
        let _gate = self.gate.lock().await;
        let mut guard = self.handle.write().await;

        if let Some(old) = guard.as_ref() {
            let cleared = old.delete_where(&MetadataFilter::all()).await?;
            log::info!("Cleared {} chunks from the old store", cleared);
        }
        // Release the old handle before its files go away
        drop(guard.take());

        if self.store_dir.exists() {
            std::fs::remove_dir_all(&self.store_dir)?;
        }
        std::fs::create_dir_all(&self.store_dir)?;
        log::warn!("Knowledge store at {} deleted", self.store_dir.display());

        let store = Arc::new(SqliteKnowledgeStore::open(&self.store_dir, Arc::clone(&self.embedder)).await?);
        let rebuilt = self.pipeline.rebuild(&self.committed_dir, store.as_ref()).await;
        *guard = Some(store);

        let report = rebuilt?;
        mark_indexed(&self.store_dir)?;
        log::info!("Reset complete: {} chunks re-indexed", report.chunks_added);
        Ok(report)
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let guard = self.handle.read().await;
        let store = guard.as_ref().ok_or_else(unavailable)?;

        let metadata = store.get_all_metadata().await?;
        let indexed_files: HashSet<&str> = metadata.iter().map(|m| m.file_name.as_str()).collect();

        Ok(StoreStats {
            chunks: metadata.len(),
            indexed_files: indexed_files.len(),
            committed_files: discover_files(&self.committed_dir)?.len(),
            pending_files: discover_files(&self.pending_dir)?.len(),
        })
    }
}

fn unavailable() -> CampusRagError {
    CampusRagError::StoreUnavailable("store is not open".to_string())
}

fn mark_indexed(store_dir: &Path) -> Result<()> {
    std::fs::write(store_dir.join(INDEX_MARKER), chrono::Utc::now().to_rfc3339())?;
    Ok(())
}
