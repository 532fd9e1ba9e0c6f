use super::Extractor;
use crate::error::{CampusRagError, Result};
use scraper::{ElementRef, Html, Node, Selector};

/// Visible text of HTML pages: title plus body, without scripts or styles.
pub struct HtmlExtractor;

impl Extractor for HtmlExtractor {
    fn can_extract(&self, extension: &str) -> bool {
        matches!(extension, "html" | "htm")
    }

    fn extract(&self, bytes: &[u8], _extension: &str) -> Result<String> {
        let html = String::from_utf8_lossy(bytes);
        let document = Html::parse_document(&html);

        let title = selector("head > title")?;
        let body = selector("body")?;

        let mut out = String::new();
        if let Some(title) = document.select(&title).next() {
            out.push_str(&title.text().collect::<String>());
            out.push('\n');
        }
        if let Some(body) = document.select(&body).next() {
            collect_text(body, &mut out);
        }

        Ok(out
            .lines()
            .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| CampusRagError::Extract(format!("Bad selector {}: {:?}", css, e)))
}

fn collect_text(root: ElementRef<'_>, out: &mut String) {
    for node in root.descendants() {
        match node.value() {
            Node::Element(element) if is_block(element.name()) => out.push('\n'),
            Node::Text(text) => {
                let hidden = node.ancestors().any(|a| {
                    a.value()
                        .as_element()
                        .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript" | "template"))
                });
                if !hidden {
                    out.push_str(text);
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div" | "br" | "li" | "tr" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
            | "section" | "article" | "table" | "ul" | "ol" | "blockquote" | "pre"
    )
}
