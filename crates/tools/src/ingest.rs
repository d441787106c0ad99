//! Document ingest, shared by `POST /upload` and the `upload_document` tool.
//!
//! Extraction and sectioning run on the blocking pool; the document becomes
//! visible to searches only after it is stored and indexed.

use rpgforge_context::analyzer::extract_code_blocks;
use rpgforge_context::sections::{SectionIndex, index};
use rpgforge_core::document::{Document, DocumentId, DocumentType};
use rpgforge_core::error::{ToolError, UploadError};
use rpgforge_core::store::DocumentStore;
use rpgforge_store::Extractors;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// What an upload produced.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub document_id: DocumentId,
    pub filename: String,
    pub status: &'static str,
    pub document_type: DocumentType,
    pub size: usize,
    pub pages: Option<u32>,
    pub sections: usize,
    pub code_examples: usize,
}

impl IngestReport {
    pub fn to_text(&self) -> String {
        format!(
            "Document '{}' processed successfully:\n- ID: {}\n- Type: {}\n- Pages/Size: {}\n- Sections: {}\n- Code examples found: {}\n",
            self.filename,
            self.document_id,
            self.document_type,
            self.pages
                .map(|p| format!("{p} pages"))
                .unwrap_or_else(|| format!("{} bytes", self.size)),
            self.sections,
            self.code_examples,
        )
    }
}

pub struct DocumentIngestor {
    documents: Arc<dyn DocumentStore>,
    index: Arc<SectionIndex>,
    extractors: Arc<Extractors>,
    max_upload_bytes: usize,
}

impl DocumentIngestor {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        index: Arc<SectionIndex>,
        extractors: Arc<Extractors>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            documents,
            index,
            extractors,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub fn supported_extensions(&self) -> Vec<String> {
        self.extractors
            .supported_extensions()
            .into_iter()
            .map(|e| format!(".{e}"))
            .collect()
    }

    /// Extract, index and store one uploaded file. Every call creates a new
    /// document, even for content seen before.
    pub async fn ingest(
        &self,
        filename: &str,
        document_type: DocumentType,
        description: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<IngestReport, ToolError> {
        let extractors = Arc::clone(&self.extractors);
        let max = self.max_upload_bytes;
        let name = filename.to_string();

        let (document, sections, code_examples, bytes) = tokio::task::spawn_blocking(move || {
            let content = extractors.extract(&name, &bytes, max)?;
            let mut document = Document::new(name, content.text, document_type)
                .with_description(description.unwrap_or_default());
            document.size_bytes = bytes.len();
            document.page_count = content.page_count;
            document.images = content.images;

            let sections = index(&document);
            let code_examples = extract_code_blocks(&document.raw_text).len();
            Ok::<_, UploadError>((document, sections, code_examples, bytes))
        })
        .await
        .map_err(|e| UploadError::Corrupt {
            filename: filename.to_string(),
            format: "upload".into(),
            reason: format!("extraction task failed: {e}"),
        })??;

        let report = IngestReport {
            document_id: document.id.clone(),
            filename: document.filename.clone(),
            status: "processed",
            document_type: document.document_type,
            size: document.size_bytes,
            pages: document.page_count,
            sections: sections.len(),
            code_examples,
        };

        // Sections must be visible before the document is, so a concurrent
        // reader never sees a stored document with an empty index entry.
        self.index.insert(&document, sections, code_examples).await;
        if let Err(e) = self.documents.put(document.clone(), Some(&bytes)).await {
            self.index.remove(&document.id).await;
            return Err(e.into());
        }

        info!(
            document_id = %report.document_id,
            filename = %report.filename,
            document_type = %report.document_type,
            sections = report.sections,
            code_examples = report.code_examples,
            "Document ingested"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpgforge_context::sections::SectionQuery;
    use rpgforge_store::InMemoryDocumentStore;

    fn ingestor(max: usize) -> (DocumentIngestor, Arc<dyn DocumentStore>, Arc<SectionIndex>) {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let index = Arc::new(SectionIndex::new());
        let ingestor = DocumentIngestor::new(
            Arc::clone(&store),
            Arc::clone(&index),
            Arc::new(Extractors::default()),
            max,
        );
        (ingestor, store, index)
    }

    #[tokio::test]
    async fn markdown_upload_is_stored_and_indexed() {
        let (ingestor, store, index) = ingestor(1024 * 1024);
        let text = "# Standards\n\n## Introduction\nRead me.\n\n## Naming Conventions\nDCL-S counter INT(10);\n";
        let report = ingestor
            .ingest(
                "standards.md",
                DocumentType::Standards,
                Some("Shop rules".into()),
                text.as_bytes().to_vec(),
            )
            .await
            .unwrap();

        assert_eq!(report.status, "processed");
        assert_eq!(report.sections, 3);
        assert_eq!(report.code_examples, 1);
        assert!(report.pages.is_none());

        let stored = store.get(&report.document_id).await.unwrap();
        assert_eq!(stored.description, "Shop rules");
        assert_eq!(stored.size_bytes, text.len());

        let titles: Vec<String> = index
            .find(&SectionQuery::default())
            .await
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["Standards", "Introduction", "Naming Conventions"]);
    }

    #[tokio::test]
    async fn identical_uploads_create_distinct_documents() {
        let (ingestor, store, _) = ingestor(1024);
        let a = ingestor
            .ingest("a.md", DocumentType::Reference, None, b"# A\nbody".to_vec())
            .await
            .unwrap();
        let b = ingestor
            .ingest("a.md", DocumentType::Reference, None, b"# A\nbody".to_vec())
            .await
            .unwrap();
        assert_ne!(a.document_id, b.document_id);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn rejected_upload_leaves_no_trace() {
        let (ingestor, store, index) = ingestor(8);
        let err = ingestor
            .ingest("big.md", DocumentType::Reference, None, b"# far too long".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Upload(UploadError::TooLarge { .. })));

        let err = ingestor
            .ingest("notes.docx", DocumentType::Reference, None, b"x".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Upload(UploadError::UnsupportedFormat { .. })));

        assert_eq!(store.count().await.unwrap(), 0);
        assert!(index.is_empty().await);
    }

    /// Records what the index held when `put` ran, and optionally fails it.
    struct WatchingStore {
        inner: InMemoryDocumentStore,
        index: Arc<SectionIndex>,
        seen_at_put: std::sync::Mutex<Option<(usize, usize)>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl DocumentStore for WatchingStore {
        fn name(&self) -> &str {
            "watching"
        }

        async fn put(
            &self,
            document: Document,
            original: Option<&[u8]>,
        ) -> Result<DocumentId, rpgforge_core::error::StoreError> {
            let counts = (
                self.index.section_count(&document.id).await,
                self.index.code_example_count(&document.id).await,
            );
            *self.seen_at_put.lock().unwrap() = Some(counts);
            if self.fail {
                return Err(rpgforge_core::error::StoreError::Io("disk full".into()));
            }
            self.inner.put(document, original).await
        }

        async fn get(&self, id: &DocumentId) -> Result<Document, rpgforge_core::error::StoreError> {
            self.inner.get(id).await
        }

        async fn list(
            &self,
            filter: Option<DocumentType>,
        ) -> Result<Vec<Document>, rpgforge_core::error::StoreError> {
            self.inner.list(filter).await
        }

        async fn count(&self) -> Result<usize, rpgforge_core::error::StoreError> {
            self.inner.count().await
        }
    }

    fn watched(fail: bool) -> (DocumentIngestor, Arc<WatchingStore>, Arc<SectionIndex>) {
        let index = Arc::new(SectionIndex::new());
        let store = Arc::new(WatchingStore {
            inner: InMemoryDocumentStore::new(),
            index: Arc::clone(&index),
            seen_at_put: std::sync::Mutex::new(None),
            fail,
        });
        let ingestor = DocumentIngestor::new(
            store.clone(),
            Arc::clone(&index),
            Arc::new(Extractors::default()),
            1024,
        );
        (ingestor, store, index)
    }

    #[tokio::test]
    async fn sections_are_indexed_before_the_document_is_stored() {
        let (ingestor, store, index) = watched(false);
        let report = ingestor
            .ingest(
                "rules.md",
                DocumentType::Standards,
                None,
                b"## Naming\nDCL-S total PACKED(9:2);\n## Errors\nUse MONITOR.\n".to_vec(),
            )
            .await
            .unwrap();

        assert_eq!(*store.seen_at_put.lock().unwrap(), Some((2, 1)));
        assert_eq!(index.section_count(&report.document_id).await, 2);
        assert_eq!(index.code_example_count(&report.document_id).await, 1);
    }

    #[tokio::test]
    async fn failed_store_write_rolls_back_the_index() {
        let (ingestor, store, index) = watched(true);
        let err = ingestor
            .ingest("rules.md", DocumentType::Standards, None, b"## Naming\nbody".to_vec())
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::Store(_)));
        assert_eq!(*store.seen_at_put.lock().unwrap(), Some((1, 0)));
        assert!(index.is_empty().await);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[test]
    fn report_text_mentions_pages_or_size() {
        let report = IngestReport {
            document_id: DocumentId::from("d1"),
            filename: "guide.pdf".into(),
            status: "processed",
            document_type: DocumentType::ConversionGuide,
            size: 2048,
            pages: Some(12),
            sections: 4,
            code_examples: 2,
        };
        let text = report.to_text();
        assert!(text.contains("12 pages"));
        assert!(text.contains("conversion_guide"));
    }
}
