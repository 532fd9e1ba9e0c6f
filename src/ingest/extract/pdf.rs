use super::Extractor;
use crate::error::{CampusRagError, Result};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Upper bound on a single PDF; some font tables make pdf-extract spin.
const PDF_TIMEOUT: Duration = Duration::from_secs(60);

/// PDF reader backed by pdf-extract.
pub struct PdfExtractor;

impl Extractor for PdfExtractor {
    fn can_extract(&self, extension: &str) -> bool {
        extension == "pdf"
    }

    fn extract(&self, bytes: &[u8], _extension: &str) -> Result<String> {
        // A worker thread turns a pdf-extract panic or hang into an error
        let data = bytes.to_vec();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let result = pdf_extract::extract_text_from_mem(&data).map_err(|e| e.to_string());
            let _ = tx.send(result);
        });

        match rx.recv_timeout(PDF_TIMEOUT) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(CampusRagError::Extract(format!("PDF error: {}", e))),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(CampusRagError::Extract(format!(
                "PDF extraction timed out after {}s",
                PDF_TIMEOUT.as_secs()
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(CampusRagError::Extract(
                "PDF extraction thread crashed".to_string(),
            )),
        }
    }
}
