use super::Extractor;
use crate::error::{CampusRagError, Result};
use pulldown_cmark::{Event, Parser as CmarkParser, TagEnd};

/// Markdown reader: keeps the prose, drops the markup.
pub struct MarkdownExtractor;

impl Extractor for MarkdownExtractor {
    fn can_extract(&self, extension: &str) -> bool {
        matches!(extension, "md" | "markdown")
    }

    fn extract(&self, bytes: &[u8], _extension: &str) -> Result<String> {
        let content = std::str::from_utf8(bytes)
            .map_err(|e| CampusRagError::Extract(format!("Invalid UTF-8: {}", e)))?;
        Ok(markdown_to_text(content))
    }
}

fn markdown_to_text(content: &str) -> String {
    let mut out = String::with_capacity(content.len());

    for event in CmarkParser::new(content) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak => out.push(' '),
            Event::HardBreak => out.push('\n'),
            Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::Heading(_))
            | Event::End(TagEnd::CodeBlock)
            | Event::End(TagEnd::BlockQuote(_)) => out.push_str("\n\n"),
            Event::End(TagEnd::Item) | Event::End(TagEnd::TableRow) => out.push('\n'),
            Event::End(TagEnd::TableCell) => out.push_str(" | "),
            _ => {}
        }
    }

    out.trim().to_string()
}
