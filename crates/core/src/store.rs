//! Storage traits: the document registry and the artifact archive.
//!
//! Both stores are shared between concurrent requests. Implementations must
//! allow concurrent reads and serialize writes internally.
//!
//! Implementations: file-backed (JSONL index + per-entry files), in-memory.

use async_trait::async_trait;
use chrono::Duration;
use crate::artifact::{Artifact, ArtifactSummary, ArtifactType};
use crate::document::{Document, DocumentId, DocumentType};
use crate::error::StoreError;

/// Registry of uploaded documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// The backend name (e.g., "file", "memory").
    fn name(&self) -> &str;

    /// Store a new document. Fails with `DuplicateId` on an id collision.
    ///
    /// `original` holds the raw uploaded bytes, when available, so backends
    /// can keep the source file next to the extracted text.
    async fn put(&self, document: Document, original: Option<&[u8]>) -> Result<DocumentId, StoreError>;

    /// Get a document by id.
    async fn get(&self, id: &DocumentId) -> Result<Document, StoreError>;

    /// List documents in upload order, optionally filtered by type.
    async fn list(&self, filter: Option<DocumentType>) -> Result<Vec<Document>, StoreError>;

    /// Total document count.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Persist anything still buffered. Called on shutdown.
    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Archive of generated artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// The backend name (e.g., "file", "memory").
    fn name(&self) -> &str;

    /// Store a new artifact. Fails with `DuplicateId` on an id collision.
    async fn create(&self, artifact: Artifact) -> Result<String, StoreError>;

    /// Get an artifact by id.
    async fn get(&self, id: &str) -> Result<Artifact, StoreError>;

    /// List artifacts newest first, optionally filtered by type.
    async fn list(&self, filter: Option<ArtifactType>) -> Result<Vec<ArtifactSummary>, StoreError>;

    /// Remove artifacts created more than `older_than` ago. Returns how many were removed.
    async fn sweep(&self, older_than: Duration) -> Result<usize, StoreError>;

    /// Total artifact count.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Persist anything still buffered. Called on shutdown.
    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
