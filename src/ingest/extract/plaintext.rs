use super::Extractor;
use crate::error::{CampusRagError, Result};

/// Reads UTF-8 text files as-is.
pub struct PlainTextExtractor;

impl Extractor for PlainTextExtractor {
    fn can_extract(&self, extension: &str) -> bool {
        matches!(
            extension,
            "txt" | "text" | "log" | "json" | "xml" | "yaml" | "yml"
        )
    }

    fn extract(&self, bytes: &[u8], _extension: &str) -> Result<String> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| CampusRagError::Extract(format!("Invalid UTF-8: {}", e)))?;
        Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        let out = PlainTextExtractor.extract("Học phí năm 2024".as_bytes(), "txt").unwrap();
        assert_eq!(out, "Học phí năm 2024");
    }

    #[test]
    fn test_bom_stripped() {
        let out = PlainTextExtractor.extract("\u{feff}hello".as_bytes(), "txt").unwrap();
        assert_eq!(out, "hello");
    }

    #[test]
    fn test_invalid_utf8_is_error() {
        let result = PlainTextExtractor.extract(&[0xff, 0xfe, 0x00, 0x41], "txt");
        assert!(matches!(result, Err(CampusRagError::Extract(_))));
    }

    #[test]
    fn test_json_kept_verbatim() {
        let out = PlainTextExtractor.extract(br#"{"a": "<b>"}"#, "json").unwrap();
        assert_eq!(out, r#"{"a": "<b>"}"#);
    }
}
