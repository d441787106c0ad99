//! In-memory stores: useful for testing and `--ephemeral` runs.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rpgforge_core::artifact::{Artifact, ArtifactSummary, ArtifactType};
use rpgforge_core::document::{Document, DocumentId, DocumentType};
use rpgforge_core::error::StoreError;
use rpgforge_core::store::{ArtifactStore, DocumentStore};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Documents kept in a Vec, in upload order. Original bytes are discarded.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<Vec<Document>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(&self, document: Document, _original: Option<&[u8]>) -> Result<DocumentId, StoreError> {
        let mut documents = self.documents.write().await;
        if documents.iter().any(|d| d.id == document.id) {
            return Err(StoreError::DuplicateId(document.id.to_string()));
        }
        let id = document.id.clone();
        documents.push(document);
        Ok(id)
    }

    async fn get(&self, id: &DocumentId) -> Result<Document, StoreError> {
        self.documents
            .read()
            .await
            .iter()
            .find(|d| &d.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("document {id}")))
    }

    async fn list(&self, filter: Option<DocumentType>) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .documents
            .read()
            .await
            .iter()
            .filter(|d| filter.is_none_or(|t| d.document_type == t))
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.documents.read().await.len())
    }
}

#[derive(Default)]
pub struct InMemoryArtifactStore {
    artifacts: Arc<RwLock<Vec<Artifact>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create(&self, artifact: Artifact) -> Result<String, StoreError> {
        let mut artifacts = self.artifacts.write().await;
        if artifacts.iter().any(|a| a.id == artifact.id) {
            return Err(StoreError::DuplicateId(artifact.id));
        }
        let id = artifact.id.clone();
        artifacts.push(artifact);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Artifact, StoreError> {
        self.artifacts
            .read()
            .await
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("artifact {id}")))
    }

    async fn list(&self, filter: Option<ArtifactType>) -> Result<Vec<ArtifactSummary>, StoreError> {
        let mut summaries: Vec<ArtifactSummary> = self
            .artifacts
            .read()
            .await
            .iter()
            .filter(|a| filter.is_none_or(|t| a.artifact_type == t))
            .map(Artifact::summary)
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn sweep(&self, older_than: Duration) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - older_than;
        let mut artifacts = self.artifacts.write().await;
        let before = artifacts.len();
        artifacts.retain(|a| a.created_at >= cutoff);
        Ok(before - artifacts.len())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.artifacts.read().await.len())
    }
}
