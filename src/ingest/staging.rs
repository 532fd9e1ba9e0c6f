//! Files waiting in the pending directory, and their moves out of it.

use crate::error::{CampusRagError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A file found under a document directory
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    /// Base name; the key used in chunk metadata and in the archive
    pub file_name: String,
}

/// Recursively list every regular file under `root`, sorted by relative path.
///
/// A missing directory is treated as empty.
pub fn discover_files(root: &Path) -> Result<Vec<StagedFile>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let relative_path = path
            .strip_prefix(root)
            .map_err(|_| {
                CampusRagError::Config(format!(
                    "Failed to compute relative path for: {}",
                    path.display()
                ))
            })?
            .to_string_lossy()
            .to_string();

        files.push(StagedFile {
            relative_path,
            absolute_path: path.to_path_buf(),
            file_name: super::extract::file_name_of(path),
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    log::debug!("Discovered {} files in {}", files.len(), root.display());
    Ok(files)
}

/// Move a file into the archive as `committed_dir/<file_name>`, replacing any
/// archived file of the same name.
pub fn archive_file(file: &StagedFile, committed_dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(committed_dir)?;
    let dest = committed_dir.join(&file.file_name);
    if dest.is_file() {
        fs::remove_file(&dest)?;
    }

    if fs::rename(&file.absolute_path, &dest).is_err() {
        // Cross-device moves need a copy
        fs::copy(&file.absolute_path, &dest)?;
        fs::remove_file(&file.absolute_path)?;
    }
    Ok(dest)
}

/// Permanently delete a staged file.
pub fn discard_file(file: &StagedFile) -> io::Result<()> {
    fs::remove_file(&file.absolute_path)
}

/// Validate a bare file name: no separators, not `.` or `..`, nothing empty.
pub fn validate_file_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains('/')
        || trimmed.contains('\\')
        || trimmed.chars().any(char::is_control)
    {
        return Err(CampusRagError::InvalidInput(format!(
            "Invalid file name: {:?}",
            name
        )));
    }
    Ok(trimmed)
}

/// Reduce a client-supplied upload name to its last path component.
pub fn sanitize_upload_name(raw: &str) -> Result<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("");
    validate_file_name(base).map(str::to_string)
}

/// Write an uploaded file into the pending directory; returns the name it
/// was stored under.
pub fn save_upload(pending_dir: &Path, raw_name: &str, bytes: &[u8]) -> Result<String> {
    let name = sanitize_upload_name(raw_name)?;
    fs::create_dir_all(pending_dir)?;
    let dest = pending_dir.join(&name);
    fs::write(&dest, bytes)?;
    log::info!("Staged upload {} ({} bytes)", name, bytes.len());
    Ok(name)
}
