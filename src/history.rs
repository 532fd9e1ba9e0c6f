//! Chat transcript persisted as a JSON array.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "bot")]
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    #[serde(alias = "text")]
    pub content: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub timestamp: String,
}

/// Append-only chat log written back to disk after every change.
///
/// A missing file starts an empty log. A file that does not parse is moved
/// aside to `<name>.bak` before the log starts empty, so it is never
/// overwritten. Failed writes are logged and otherwise ignored.
pub struct ChatHistory {
    path: PathBuf,
    entries: Vec<HistoryEntry>,
}

impl ChatHistory {
    pub fn open(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                let backup = backup_path(path);
                log::warn!(
                    "Unreadable chat history {} ({}), moving it to {}",
                    path.display(),
                    e,
                    backup.display()
                );
                if let Err(e) = std::fs::rename(path, &backup) {
                    log::error!("Failed to move chat history aside: {}", e);
                }
                Vec::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                log::warn!("Failed to read chat history {}: {}", path.display(), e);
                Vec::new()
            }
        };

        Self {
            path: path.to_path_buf(),
            entries,
        }
    }

    pub fn add_message(&mut self, role: Role, content: &str, sources: Vec<String>) {
        self.entries.push(HistoryEntry {
            role,
            content: content.to_string(),
            sources,
            timestamp: chrono::Local::now().to_rfc3339(),
        });
        self.save();
    }

    /// The last `limit` entries, oldest first.
    pub fn recent(&self, limit: usize) -> &[HistoryEntry] {
        let start = self.entries.len().saturating_sub(limit);
        &self.entries[start..]
    }

    pub fn all(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.save();
    }

    fn save(&self) {
        let json = match serde_json::to_string_pretty(&self.entries) {
            Ok(json) => json,
            Err(e) => {
                log::error!("Failed to serialize chat history: {}", e);
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = std::fs::create_dir_all(parent);
            }
        }
        if let Err(e) = std::fs::write(&self.path, json) {
            log::error!("Failed to save chat history {}: {}", self.path.display(), e);
        }
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_starts_empty() {
        let temp = TempDir::new().unwrap();
        let history = ChatHistory::open(&temp.path().join("chat_history.json"));
        assert!(history.is_empty());
    }

    #[test]
    fn test_add_persists_and_reloads() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chat_history.json");
        {
            let mut history = ChatHistory::open(&path);
            history.add_message(Role::User, "Học phí bao nhiêu?", Vec::new());
            history.add_message(Role::Assistant, "20 triệu", vec!["hocphi.pdf".to_string()]);
        }

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("Học phí bao nhiêu?"));
        assert!(raw.contains("\"role\": \"assistant\""));

        let history = ChatHistory::open(&path);
        assert_eq!(history.len(), 2);
        assert_eq!(history.all()[1].sources, vec!["hocphi.pdf".to_string()]);
    }

    #[test]
    fn test_recent_returns_tail() {
        let temp = TempDir::new().unwrap();
        let mut history = ChatHistory::open(&temp.path().join("h.json"));
        for i in 0..12 {
            history.add_message(Role::User, &format!("q{}", i), Vec::new());
        }
        let recent = history.recent(10);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].content, "q2");
        assert_eq!(history.recent(100).len(), 12);
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("h.json");
        std::fs::write(&path, "{not json").unwrap();

        let mut history = ChatHistory::open(&path);
        assert!(history.is_empty());
        history.add_message(Role::User, "new", Vec::new());

        let backup = temp.path().join("h.json.bak");
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "{not json");
    }

    #[test]
    fn test_reads_bot_role_and_text_field() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chat_history.json");
        std::fs::write(
            &path,
            r#"[
  {"role": "user", "content": "Học phí?", "sources": [], "timestamp": "2024-05-01T10:00:00"},
  {"role": "bot", "content": "20 triệu", "sources": [], "timestamp": "2024-05-01T10:00:05"},
  {"role": "bot", "text": "Xin chào"}
]"#,
        )
        .unwrap();

        let mut history = ChatHistory::open(&path);
        assert_eq!(history.len(), 3);
        assert_eq!(history.all()[1].role, Role::Assistant);
        assert_eq!(history.all()[2].content, "Xin chào");
        assert_eq!(history.all()[2].timestamp, "");

        history.add_message(Role::User, "Ký túc xá?", Vec::new());
        let reloaded = ChatHistory::open(&path);
        assert_eq!(reloaded.len(), 4);
        assert_eq!(reloaded.all()[1].content, "20 triệu");
        assert!(!temp.path().join("chat_history.json.bak").exists());
    }

    #[test]
    fn test_clear() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("h.json");
        let mut history = ChatHistory::open(&path);
        history.add_message(Role::User, "x", Vec::new());
        history.clear();
        assert!(history.is_empty());
        assert!(ChatHistory::open(&path).is_empty());
    }
}
