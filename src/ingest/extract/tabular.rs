use super::Extractor;
use crate::error::{CampusRagError, Result};

/// CSV/TSV reader: one line per row, cells joined with ` | `.
pub struct TabularExtractor;

impl Extractor for TabularExtractor {
    fn can_extract(&self, extension: &str) -> bool {
        matches!(extension, "csv" | "tsv")
    }

    fn extract(&self, bytes: &[u8], extension: &str) -> Result<String> {
        let delimiter = if extension == "tsv" { b'\t' } else { b',' };
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes);

        let mut lines = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| CampusRagError::Extract(format!("CSV error: {}", e)))?;
            let cells: Vec<&str> = record.iter().map(str::trim).collect();
            if cells.iter().all(|c| c.is_empty()) {
                continue;
            }
            lines.push(cells.join(" | "));
        }

        Ok(lines.join("\n"))
    }
}
