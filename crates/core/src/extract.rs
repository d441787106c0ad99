//! Text extraction: turns uploaded file bytes into plain text.

use crate::document::ImageRef;
use crate::error::UploadError;

/// The result of extracting an uploaded file.
#[derive(Debug, Clone, Default)]
pub struct ExtractedContent {
    pub text: String,
    pub page_count: Option<u32>,
    pub images: Vec<ImageRef>,
}

/// Extracts plain text from one family of file formats.
///
/// Extraction is synchronous and CPU-bound; callers run it on a blocking
/// thread. Failures are never retried.
pub trait TextExtractor: Send + Sync {
    /// A short format label ("markdown", "pdf").
    fn format(&self) -> &str;

    /// Lower-case file extensions (without the dot) this extractor handles.
    fn extensions(&self) -> &[&str];

    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<ExtractedContent, UploadError>;

    fn handles(&self, extension: &str) -> bool {
        self.extensions()
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }
}
