use super::extract::ExtractedText;
use super::fingerprint::content_hash;
use crate::config::ChunkingConfig;

/// One retrieval unit: a window of extracted text and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub content: String,
    pub file_name: String,
    /// Lowercase hex SHA-256 of `content`
    pub content_hash: String,
}

impl DocumentChunk {
    pub fn new(content: String, file_name: String) -> Self {
        let content_hash = content_hash(&content);
        Self {
            content,
            file_name,
            content_hash,
        }
    }
}

/// Split extracted text into chunks that inherit its file name.
pub fn chunk_document(extracted: &ExtractedText, config: &ChunkingConfig) -> Vec<DocumentChunk> {
    split_text(&extracted.text, config.chunk_size, config.chunk_overlap)
        .into_iter()
        .map(|content| DocumentChunk::new(content, extracted.file_name.clone()))
        .collect()
}

/// Split text into overlapping windows of at most `chunk_size` characters.
///
/// Sizes count Unicode scalar values, not bytes. A window ends at the last
/// paragraph break, line break, sentence end or whitespace found in its final
/// 20%, in that order of preference, or at a hard cut when none exists. The
/// next window starts `chunk_overlap` characters before the previous end.
/// Chunks are trimmed and empty ones dropped.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.trim().is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= chunk_size {
        return vec![text.trim().to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let hard_end = (start + chunk_size).min(chars.len());
        let end = if hard_end < chars.len() {
            find_break(&chars, start, hard_end, chunk_size)
        } else {
            hard_end
        };

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end >= chars.len() {
            break;
        }

        // Prevent an infinite loop if overlap swallows the whole window
        let next = end.saturating_sub(chunk_overlap);
        start = if next > start { next } else { end };
    }

    chunks
}

/// Best cut position in `chars[start..hard_end]`, exclusive end index.
fn find_break(chars: &[char], start: usize, hard_end: usize, chunk_size: usize) -> usize {
    let floor = hard_end.saturating_sub(chunk_size / 5).max(start + 1);
    let window = floor..hard_end;

    let paragraph = window
        .clone()
        .rev()
        .find(|&i| chars[i] == '\n' && i > 0 && chars[i - 1] == '\n')
        .map(|i| i + 1);
    let line = || window.clone().rev().find(|&i| chars[i] == '\n').map(|i| i + 1);
    let sentence = || {
        window
            .clone()
            .rev()
            .find(|&i| i > 0 && chars[i].is_whitespace() && matches!(chars[i - 1], '.' | '!' | '?'))
    };
    let whitespace = || window.clone().rev().find(|&i| chars[i].is_whitespace());

    paragraph
        .or_else(line)
        .or_else(sentence)
        .or_else(whitespace)
        .unwrap_or(hard_end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_whitespace_text() {
        assert!(split_text("", 1000, 200).is_empty());
        assert!(split_text("  \n\t ", 1000, 200).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        assert_eq!(split_text("  Hello PTIT \n", 1000, 200), vec!["Hello PTIT"]);

        let exact = "a".repeat(1000);
        assert_eq!(split_text(&exact, 1000, 200), vec![exact.clone()]);
    }

    #[test]
    fn test_hard_cut_windows_and_overlap() {
        let text: String = ('a'..='z').cycle().take(2500).collect();
        let chunks = split_text(&text, 1000, 200);

        // 0..1000, 800..1800, 1600..2500
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 1000));
        assert_eq!(chunks[0].chars().count(), 1000);
        let tail: String = chunks[0].chars().skip(800).collect();
        let head: String = chunks[1].chars().take(200).collect();
        assert_eq!(tail, head);
        assert!(text.ends_with(chunks[2].as_str()));
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        let first = "x".repeat(900);
        let second = "y".repeat(500);
        let text = format!("{}\n\n{}", first, second);
        let chunks = split_text(&text, 1000, 200);

        assert_eq!(chunks[0], first);
        assert!(chunks.iter().all(|c| c.chars().count() <= 1000));
    }

    #[test]
    fn test_prefers_sentence_over_whitespace() {
        let mut text = String::new();
        while text.chars().count() < 950 {
            text.push_str("word ");
        }
        text.push_str("end. more words follow here and keep going past the window");
        text.push_str(&" tail".repeat(100));

        let chunks = split_text(&text, 1000, 200);
        assert!(chunks[0].ends_with("end."));
    }

    #[test]
    fn test_multibyte_characters_counted_as_chars() {
        let text = "đ".repeat(1500);
        let chunks = split_text(&text, 1000, 200);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 1000);
        assert_eq!(chunks[1].chars().count(), 700);
    }

    #[test]
    fn test_deterministic() {
        let text = "Điều 1. Phạm vi.\n\nĐiều 2. Đối tượng áp dụng. ".repeat(80);
        assert_eq!(split_text(&text, 1000, 200), split_text(&text, 1000, 200));
    }

    #[test]
    fn test_overlap_not_smaller_than_window_still_terminates() {
        let text = "b".repeat(50);
        let chunks = split_text(&text, 10, 10);
        assert_eq!(chunks.len(), 5);
    }

    #[test]
    fn test_chunk_document_attaches_file_name_and_hash() {
        let extracted = ExtractedText {
            text: "Hello PTIT".to_string(),
            file_name: "a.txt".to_string(),
        };
        let chunks = chunk_document(&extracted, &ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].file_name, "a.txt");
        assert_eq!(chunks[0].content_hash, content_hash("Hello PTIT"));
    }
}
