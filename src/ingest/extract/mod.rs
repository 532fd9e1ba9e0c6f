pub mod html;
pub mod markdown;
pub mod office;
pub mod pdf;
pub mod plaintext;
pub mod tabular;

use crate::error::Result;
use std::path::Path;

/// Text pulled out of one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    pub file_name: String,
}

/// Trait for format-specific text extractors
pub trait Extractor: Send + Sync {
    /// Check if this extractor handles the given (lowercase) extension
    fn can_extract(&self, extension: &str) -> bool;

    /// Turn raw file bytes into plain text
    fn extract(&self, bytes: &[u8], extension: &str) -> Result<String>;
}

/// Extractor registry that selects the appropriate reader by extension
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// Create a registry with all built-in extractors
    pub fn new() -> Self {
        let mut registry = Self {
            extractors: Vec::new(),
        };

        registry.register(Box::new(plaintext::PlainTextExtractor));
        registry.register(Box::new(html::HtmlExtractor));
        registry.register(Box::new(markdown::MarkdownExtractor));
        registry.register(Box::new(tabular::TabularExtractor));
        registry.register(Box::new(pdf::PdfExtractor));
        registry.register(Box::new(office::OfficeExtractor));

        registry
    }

    pub fn register(&mut self, extractor: Box<dyn Extractor>) {
        self.extractors.push(extractor);
    }

    /// Find an extractor that can handle the given extension
    pub fn find_extractor(&self, extension: &str) -> Option<&dyn Extractor> {
        self.extractors
            .iter()
            .find(|e| e.can_extract(extension))
            .map(|e| e.as_ref())
    }

    pub fn is_supported(&self, extension: &str) -> bool {
        self.find_extractor(&extension.to_lowercase()).is_some()
    }

    /// Extract text from a file on disk.
    ///
    /// Never fails: unknown extensions are skipped, and read or parse
    /// failures are logged and reported as "no text". Whitespace-only
    /// output also counts as no text.
    pub fn extract(&self, path: &Path) -> Vec<ExtractedText> {
        let file_name = file_name_of(path);
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        let Some(extractor) = self.find_extractor(&extension) else {
            log::info!("Skipping {}: unsupported extension '{}'", file_name, extension);
            return Vec::new();
        };

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Failed to read {}: {}", path.display(), e);
                return Vec::new();
            }
        };

        match extractor.extract(&bytes, &extension) {
            Ok(text) if text.trim().is_empty() => {
                log::info!("No text extracted from {}", file_name);
                Vec::new()
            }
            Ok(text) => vec![ExtractedText { text, file_name }],
            Err(e) => {
                log::warn!("Failed to extract {}: {}", file_name, e);
                Vec::new()
            }
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_registry_extensions() {
        let registry = ExtractorRegistry::new();

        for ext in ["txt", "md", "csv", "tsv", "pdf", "docx", "pptx", "xlsx", "html", "json"] {
            assert!(registry.is_supported(ext), "{} should be supported", ext);
        }
        assert!(registry.is_supported("TXT"));
        assert!(!registry.is_supported("xyz"));
        assert!(!registry.is_supported(""));
    }

    #[test]
    fn test_extract_plain_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.txt");
        fs::write(&path, "Hello PTIT").unwrap();

        let out = ExtractorRegistry::new().extract(&path);
        assert_eq!(
            out,
            vec![ExtractedText {
                text: "Hello PTIT".to_string(),
                file_name: "a.txt".to_string()
            }]
        );
    }

    #[test]
    fn test_unknown_extension_yields_nothing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.xyz");
        fs::write(&path, "some content").unwrap();

        assert!(ExtractorRegistry::new().extract(&path).is_empty());
    }

    #[test]
    fn test_corrupt_file_yields_nothing() {
        let temp = TempDir::new().unwrap();
        let pdf = temp.path().join("broken.pdf");
        fs::write(&pdf, b"not a pdf at all").unwrap();
        let docx = temp.path().join("broken.docx");
        fs::write(&docx, b"not a zip").unwrap();

        let registry = ExtractorRegistry::new();
        assert!(registry.extract(&pdf).is_empty());
        assert!(registry.extract(&docx).is_empty());
    }

    #[test]
    fn test_whitespace_only_yields_nothing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("blank.txt");
        fs::write(&path, "  \n\t \n").unwrap();

        assert!(ExtractorRegistry::new().extract(&path).is_empty());
    }

    #[test]
    fn test_missing_file_yields_nothing() {
        let temp = TempDir::new().unwrap();
        assert!(ExtractorRegistry::new()
            .extract(&temp.path().join("gone.txt"))
            .is_empty());
    }
}
