//! Text extractors for uploaded files (Markdown, PDF).

use rpgforge_core::error::UploadError;
use rpgforge_core::extract::{ExtractedContent, TextExtractor};
use tracing::{debug, warn};

/// Markdown is stored as-is after UTF-8 validation.
pub struct MarkdownExtractor;

impl TextExtractor for MarkdownExtractor {
    fn format(&self) -> &str {
        "markdown"
    }

    fn extensions(&self) -> &[&str] {
        &["md", "markdown"]
    }

    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<ExtractedContent, UploadError> {
        let text = std::str::from_utf8(bytes).map_err(|e| UploadError::Corrupt {
            filename: filename.to_string(),
            format: self.format().to_string(),
            reason: format!("invalid UTF-8: {e}"),
        })?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        Ok(ExtractedContent {
            text: text.to_string(),
            page_count: None,
            images: Vec::new(),
        })
    }
}

/// PDF text via `pdf-extract`, one `--- Page N ---` marker per page.
///
/// Embedded images are not extracted.
pub struct PdfExtractor;

impl PdfExtractor {
    fn join_pages(pages: &[String]) -> String {
        let mut text = String::new();
        for (i, page) in pages.iter().enumerate() {
            if i > 0 {
                text.push('\n');
            }
            text.push_str(&format!("--- Page {} ---\n", i + 1));
            text.push_str(page.trim_end());
            text.push('\n');
        }
        text
    }
}

impl TextExtractor for PdfExtractor {
    fn format(&self) -> &str {
        "pdf"
    }

    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }

    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<ExtractedContent, UploadError> {
        let corrupt = |reason: String| UploadError::Corrupt {
            filename: filename.to_string(),
            format: "pdf".to_string(),
            reason,
        };

        // The parser panics on some malformed inputs instead of returning an error.
        let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
            .map_err(|_| corrupt("parser aborted on malformed input".into()))?
            .map_err(|e| corrupt(e.to_string()))?;

        debug!(filename, pages = pages.len(), "PDF text extracted");

        Ok(ExtractedContent {
            text: Self::join_pages(&pages),
            page_count: Some(pages.len() as u32),
            images: Vec::new(),
        })
    }
}

/// The set of extractors the server accepts uploads for.
pub struct Extractors {
    extractors: Vec<Box<dyn TextExtractor>>,
}

impl Default for Extractors {
    fn default() -> Self {
        Self {
            extractors: vec![Box::new(PdfExtractor), Box::new(MarkdownExtractor)],
        }
    }
}

impl Extractors {
    /// Lower-case file extensions with a registered extractor.
    pub fn supported_extensions(&self) -> Vec<&str> {
        self.extractors
            .iter()
            .flat_map(|e| e.extensions().iter().copied())
            .collect()
    }

    pub fn for_filename(&self, filename: &str) -> Result<&dyn TextExtractor, UploadError> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        self.extractors
            .iter()
            .find(|e| e.handles(&extension))
            .map(|e| &**e)
            .ok_or(UploadError::UnsupportedFormat { extension })
    }

    /// Validate and extract an upload.
    ///
    /// Checks run cheapest first: extension, size, emptiness, then the parser.
    pub fn extract(
        &self,
        filename: &str,
        bytes: &[u8],
        max_bytes: usize,
    ) -> Result<ExtractedContent, UploadError> {
        let extractor = self.for_filename(filename)?;

        if bytes.len() > max_bytes {
            return Err(UploadError::TooLarge {
                filename: filename.to_string(),
                size: bytes.len(),
                max: max_bytes,
            });
        }
        if bytes.is_empty() {
            return Err(UploadError::Empty(filename.to_string()));
        }

        let content = extractor.extract(filename, bytes)?;
        if content.text.trim().is_empty() && extractor.format() == "markdown" {
            return Err(UploadError::Empty(filename.to_string()));
        }
        if content.text.trim().is_empty() {
            warn!(filename, "No extractable text found");
        }
        Ok(content)
    }
}
