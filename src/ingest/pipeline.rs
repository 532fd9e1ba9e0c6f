use super::chunker::{chunk_document, DocumentChunk};
use super::extract::ExtractorRegistry;
use super::fingerprint::FingerprintSet;
use super::staging::{archive_file, discard_file, discover_files, StagedFile};
use crate::config::ChunkingConfig;
use crate::error::{CampusRagError, Result};
use crate::store::KnowledgeStore;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    /// Pending directory missing or empty
    NothingToDo,
    Completed,
}

/// Outcome of one ingestion or rebuild run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub status: IngestStatus,
    pub files_seen: usize,
    pub chunks_seen: usize,
    pub chunks_added: usize,
    pub files_archived: usize,
    /// Archived files that replaced an archived file of the same name
    pub archive_overwrites: usize,
    pub deleted_unreadable: usize,
    pub deleted_duplicate: usize,
    pub lifecycle_errors: usize,
}

impl IngestReport {
    fn new(status: IngestStatus) -> Self {
        Self {
            status,
            files_seen: 0,
            chunks_seen: 0,
            chunks_added: 0,
            files_archived: 0,
            archive_overwrites: 0,
            deleted_unreadable: 0,
            deleted_duplicate: 0,
            lifecycle_errors: 0,
        }
    }
}

/// Extraction, chunking and dedup over a directory of documents.
pub struct IngestPipeline {
    registry: Arc<ExtractorRegistry>,
    chunking: ChunkingConfig,
}

/// Per-file result of the extract and chunk pass
struct FileChunks {
    file: StagedFile,
    chunks: Vec<DocumentChunk>,
}

impl IngestPipeline {
    pub fn new(chunking: ChunkingConfig) -> Self {
        Self {
            registry: Arc::new(ExtractorRegistry::new()),
            chunking,
        }
    }

    /// Ingest everything staged in `pending_dir`.
    ///
    /// Files that contribute at least one new chunk move to `committed_dir`;
    /// files with no extractable text or only already-known content are
    /// deleted. Store failures are returned as errors with no rollback of
    /// chunks already written or files already moved.
    pub async fn run(
        &self,
        pending_dir: &Path,
        committed_dir: &Path,
        store: &dyn KnowledgeStore,
    ) -> Result<IngestReport> {
        let start = Instant::now();
        let files = discover_files(pending_dir)?;
        if files.is_empty() {
            log::info!("No new documents in {}", pending_dir.display());
            return Ok(IngestReport::new(IngestStatus::NothingToDo));
        }

        let mut report = IngestReport::new(IngestStatus::Completed);
        report.files_seen = files.len();

        let (with_chunks, unreadable): (Vec<FileChunks>, Vec<FileChunks>) = self
            .chunk_files(files)
            .await?
            .into_iter()
            .partition(|item| !item.chunks.is_empty());

        report.deleted_unreadable = unreadable.len();
        report.chunks_seen = with_chunks.iter().map(|i| i.chunks.len()).sum();
        let unreadable: Vec<StagedFile> = unreadable.into_iter().map(|i| i.file).collect();
        report.lifecycle_errors += blocking(move || {
            let mut errors = 0;
            for file in &unreadable {
                log::warn!("No text extracted from {}, deleting", file.relative_path);
                if !remove(file) {
                    errors += 1;
                }
            }
            errors
        })
        .await?;

        let (retained, contributing) = filter_new_chunks(store, &with_chunks).await?;

        if !retained.is_empty() {
            let retained_count = retained.len();
            report.chunks_added = store.add_documents(retained).await?;
            if report.chunks_added != retained_count {
                log::warn!(
                    "Store accepted {} of {} new chunks",
                    report.chunks_added,
                    retained_count
                );
            }
        }

        let (keep, known_only): (Vec<StagedFile>, Vec<StagedFile>) = with_chunks
            .into_iter()
            .map(|item| item.file)
            .partition(|file| contributing.contains(&file.relative_path));
        report.deleted_duplicate = known_only.len();

        let committed_dir = committed_dir.to_path_buf();
        let moves = blocking(move || settle(keep, known_only, &committed_dir)).await?;
        report.files_archived = moves.archived;
        report.archive_overwrites = moves.overwrites;
        report.lifecycle_errors += moves.errors;

        log::info!(
            "Ingestion finished in {:?}: {} files, {} new chunks, {} archived, {} unreadable, {} duplicate",
            start.elapsed(),
            report.files_seen,
            report.chunks_added,
            report.files_archived,
            report.deleted_unreadable,
            report.deleted_duplicate
        );
        if report.lifecycle_errors > 0 {
            log::warn!("{} file moves or deletions failed", report.lifecycle_errors);
        }
        Ok(report)
    }

    /// Re-index the committed archive into `store` without moving or deleting
    /// any file. Used after a reset and to bootstrap a fresh store.
    pub async fn rebuild(
        &self,
        committed_dir: &Path,
        store: &dyn KnowledgeStore,
    ) -> Result<IngestReport> {
        let files = discover_files(committed_dir)?;
        if files.is_empty() {
            log::info!("Archive {} is empty, nothing to rebuild", committed_dir.display());
            return Ok(IngestReport::new(IngestStatus::NothingToDo));
        }

        let mut report = IngestReport::new(IngestStatus::Completed);
        report.files_seen = files.len();

        let with_chunks: Vec<FileChunks> = self
            .chunk_files(files)
            .await?
            .into_iter()
            .filter(|item| !item.chunks.is_empty())
            .collect();
        report.chunks_seen = with_chunks.iter().map(|i| i.chunks.len()).sum();

        let (retained, _) = filter_new_chunks(store, &with_chunks).await?;
        report.chunks_added = store.add_documents(retained).await?;

        log::info!(
            "Rebuilt store from {}: {} files, {} chunks",
            committed_dir.display(),
            report.files_seen,
            report.chunks_added
        );
        Ok(report)
    }

    /// Extract and chunk every file off the async runtime; PDF parsing can
    /// block for up to a minute per file.
    async fn chunk_files(&self, files: Vec<StagedFile>) -> Result<Vec<FileChunks>> {
        let registry = Arc::clone(&self.registry);
        let chunking = self.chunking.clone();
        blocking(move || {
            files
                .into_iter()
                .map(|file| {
                    let chunks = registry
                        .extract(&file.absolute_path)
                        .iter()
                        .flat_map(|text| chunk_document(text, &chunking))
                        .collect();
                    FileChunks { file, chunks }
                })
                .collect()
        })
        .await
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CampusRagError::Io(std::io::Error::other(format!("ingestion task failed: {}", e))))
}

#[derive(Default)]
struct Moves {
    archived: usize,
    overwrites: usize,
    errors: usize,
}

/// Archive contributing files and delete the rest.
fn settle(keep: Vec<StagedFile>, known_only: Vec<StagedFile>, committed_dir: &Path) -> Moves {
    let mut moves = Moves::default();
    let mut archived_now: HashSet<String> = HashSet::new();

    for file in &keep {
        let replaces = committed_dir.join(&file.file_name).is_file();
        match archive_file(file, committed_dir) {
            Ok(dest) => {
                if replaces {
                    let when = if archived_now.contains(&file.file_name) {
                        "earlier in this run"
                    } else {
                        "previously"
                    };
                    log::warn!(
                        "{} replaced the {} archived {}; chunks of the replaced file stay indexed",
                        file.relative_path,
                        file.file_name,
                        when
                    );
                    moves.overwrites += 1;
                }
                log::debug!("Archived {} -> {}", file.relative_path, dest.display());
                archived_now.insert(file.file_name.clone());
                moves.archived += 1;
            }
            Err(e) => {
                log::error!("Failed to archive {}: {}", file.relative_path, e);
                moves.errors += 1;
            }
        }
    }

    for file in &known_only {
        log::info!("{} only contains known content, deleting", file.relative_path);
        if !remove(file) {
            moves.errors += 1;
        }
    }
    moves
}

/// Keep chunks whose fingerprint is neither stored nor seen earlier in this
/// batch. Also returns the relative paths of files that kept at least one.
async fn filter_new_chunks(
    store: &dyn KnowledgeStore,
    items: &[FileChunks],
) -> Result<(Vec<DocumentChunk>, HashSet<String>)> {
    let mut retained = Vec::new();
    let mut contributing = HashSet::new();
    if items.is_empty() {
        return Ok((retained, contributing));
    }

    let mut known = FingerprintSet::from_metadata(&store.get_all_metadata().await?);
    log::debug!("Loaded {} existing fingerprints", known.len());

    for item in items {
        for chunk in &item.chunks {
            if known.insert(&chunk.content_hash) {
                retained.push(chunk.clone());
                contributing.insert(item.file.relative_path.clone());
            }
        }
    }

    Ok((retained, contributing))
}

/// Delete a staged file; false if the deletion failed.
fn remove(file: &StagedFile) -> bool {
    match discard_file(file) {
        Ok(()) => true,
        Err(e) => {
            log::error!("Failed to delete {}: {}", file.relative_path, e);
            false
        }
    }
}
