pub mod chunker;
pub mod extract;
pub mod fingerprint;
pub mod pipeline;
pub mod staging;

pub use chunker::{chunk_document, split_text, DocumentChunk};
pub use extract::{ExtractedText, Extractor, ExtractorRegistry};
pub use fingerprint::{content_hash, FingerprintSet};
pub use pipeline::{IngestPipeline, IngestReport, IngestStatus};
pub use staging::{discover_files, save_upload, validate_file_name, StagedFile};
