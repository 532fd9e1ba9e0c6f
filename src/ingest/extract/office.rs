//! Office Open XML (docx, pptx, xlsx) text extraction.
//!
//! Each format is a zip of XML parts; text lives in `<w:t>`, `<a:t>` and
//! the workbook's shared strings table respectively.

use super::Extractor;
use crate::error::{CampusRagError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};

/// Zip bomb guard for a single XML part.
const MAX_XML_ENTRY_BYTES: u64 = 32 * 1024 * 1024;

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

pub struct OfficeExtractor;

impl Extractor for OfficeExtractor {
    fn can_extract(&self, extension: &str) -> bool {
        matches!(extension, "docx" | "pptx" | "xlsx")
    }

    fn extract(&self, bytes: &[u8], extension: &str) -> Result<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| CampusRagError::Extract(format!("Not an Office archive: {}", e)))?;

        match extension {
            "docx" => {
                let xml = read_entry(&mut archive, "word/document.xml")?;
                collect_text_runs(&xml)
            }
            "pptx" => extract_slides(&mut archive),
            _ => extract_workbook(&mut archive),
        }
    }
}

fn read_entry(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>> {
    let entry = archive
        .by_name(name)
        .map_err(|e| CampusRagError::Extract(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| CampusRagError::Extract(format!("{}: {}", name, e)))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(CampusRagError::Extract(format!("{} exceeds size limit", name)));
    }
    Ok(out)
}

/// Part names like `ppt/slides/slide12.xml`, ordered by their number.
fn numbered_parts(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

fn extract_slides(archive: &mut Archive<'_>) -> Result<String> {
    let mut slides = Vec::new();
    for name in numbered_parts(archive, "ppt/slides/slide") {
        let xml = read_entry(archive, &name)?;
        let text = collect_text_runs(&xml)?;
        if !text.is_empty() {
            slides.push(text);
        }
    }
    Ok(slides.join("\n\n"))
}

fn extract_workbook(archive: &mut Archive<'_>) -> Result<String> {
    let shared = match read_entry(archive, "xl/sharedStrings.xml") {
        Ok(xml) => read_shared_strings(&xml)?,
        Err(_) => Vec::new(),
    };

    let mut sheets = Vec::new();
    for name in numbered_parts(archive, "xl/worksheets/sheet") {
        let xml = read_entry(archive, &name)?;
        let rows = read_sheet_rows(&xml, &shared)?;
        if !rows.is_empty() {
            sheets.push(rows.join("\n"));
        }
    }
    Ok(sheets.join("\n\n"))
}

/// Text of every `<*:t>` element; a paragraph (`<*:p>`) ends a line.
fn collect_text_runs(xml: &[u8]) -> Result<String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => out.push_str(&String::from_utf8_lossy(t.as_ref())),
            Ok(Event::GeneralRef(r)) if in_text => out.push_str(&resolve_entity(&r)),
            Ok(Event::Eof) => break,
            Err(e) => return Err(CampusRagError::Extract(format!("XML error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(out.trim().to_string())
}

fn read_shared_strings(xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => current.push_str(&String::from_utf8_lossy(t.as_ref())),
            Ok(Event::GeneralRef(r)) if in_text => current.push_str(&resolve_entity(&r)),
            Ok(Event::Eof) => break,
            Err(e) => return Err(CampusRagError::Extract(format!("XML error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

/// One ` | `-joined line per worksheet row.
fn read_sheet_rows(xml: &[u8], shared: &[String]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rows = Vec::new();
    let mut cells: Vec<String> = Vec::new();
    let mut value = String::new();
    let mut in_value = false;
    let mut shared_cell = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    shared_cell = e.attributes().flatten().any(|a| {
                        a.key.as_ref() == b"t" && a.value.as_ref() == b"s"
                    });
                }
                b"v" | b"t" => {
                    in_value = true;
                    value.clear();
                }
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => {
                    in_value = false;
                    let raw = value.trim();
                    let cell = if shared_cell {
                        raw.parse::<usize>()
                            .ok()
                            .and_then(|i| shared.get(i).cloned())
                            .unwrap_or_default()
                    } else {
                        raw.to_string()
                    };
                    if !cell.trim().is_empty() {
                        cells.push(cell.trim().to_string());
                    }
                }
                b"row" => {
                    if !cells.is_empty() {
                        rows.push(cells.join(" | "));
                    }
                    cells.clear();
                }
                _ => {}
            },
            Ok(Event::Text(t)) if in_value => value.push_str(&String::from_utf8_lossy(t.as_ref())),
            Ok(Event::GeneralRef(r)) if in_value => value.push_str(&resolve_entity(&r)),
            Ok(Event::Eof) => break,
            Err(e) => return Err(CampusRagError::Extract(format!("XML error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(rows)
}

/// Expand `&name;` / `&#NN;` references reported between text events.
fn resolve_entity(name: &[u8]) -> String {
    let name = String::from_utf8_lossy(name);
    match name.as_ref() {
        "amp" => "&".to_string(),
        "lt" => "<".to_string(),
        "gt" => ">".to_string(),
        "quot" => "\"".to_string(),
        "apos" => "'".to_string(),
        other => {
            let code = if let Some(hex) = other.strip_prefix("#x").or_else(|| other.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()
            } else {
                other.strip_prefix('#').and_then(|dec| dec.parse::<u32>().ok())
            };
            code.and_then(char::from_u32)
                .map(|c| c.to_string())
                .unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_zip(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            for (name, body) in parts {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(body.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_docx_paragraphs() {
        let doc = r#"<?xml version="1.0"?><w:document xmlns:w="w"><w:body>
<w:p><w:r><w:t>Quy chế </w:t></w:r><w:r><w:t>đào tạo</w:t></w:r></w:p>
<w:p><w:r><w:t>R&amp;D</w:t></w:r></w:p></w:body></w:document>"#;
        let bytes = build_zip(&[("word/document.xml", doc)]);
        let out = OfficeExtractor.extract(&bytes, "docx").unwrap();
        assert_eq!(out, "Quy chế đào tạo\nR&D");
    }

    #[test]
    fn test_pptx_slides_in_order() {
        let slide = |text: &str| {
            format!(r#"<p:sld xmlns:a="a" xmlns:p="p"><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:sld>"#, text)
        };
        let s1 = slide("Một");
        let s2 = slide("Hai");
        let s10 = slide("Mười");
        let bytes = build_zip(&[
            ("ppt/slides/slide10.xml", s10.as_str()),
            ("ppt/slides/slide2.xml", s2.as_str()),
            ("ppt/slides/slide1.xml", s1.as_str()),
        ]);
        let out = OfficeExtractor.extract(&bytes, "pptx").unwrap();
        assert_eq!(out, "Một\n\nHai\n\nMười");
    }

    #[test]
    fn test_xlsx_rows() {
        let shared = r#"<sst><si><t>Ngành</t></si><si><t>CNTT</t></si></sst>"#;
        let sheet = r#"<worksheet><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>2024</v></c></row>
<row r="2"><c r="A2" t="s"><v>1</v></c><c r="B2"><v>26.5</v></c></row>
</sheetData></worksheet>"#;
        let bytes = build_zip(&[
            ("xl/sharedStrings.xml", shared),
            ("xl/worksheets/sheet1.xml", sheet),
        ]);
        let out = OfficeExtractor.extract(&bytes, "xlsx").unwrap();
        assert_eq!(out, "Ngành | 2024\nCNTT | 26.5");
    }

    #[test]
    fn test_missing_document_part_is_error() {
        let bytes = build_zip(&[("other.xml", "<a/>")]);
        assert!(OfficeExtractor.extract(&bytes, "docx").is_err());
    }

    #[test]
    fn test_not_a_zip_is_error() {
        assert!(OfficeExtractor.extract(b"plain bytes", "xlsx").is_err());
    }
}
