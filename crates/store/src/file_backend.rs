//! File-based stores: per-entry files plus a JSON-lines index.
//!
//! Layout under the storage root:
//!
//! ```text
//! documents/index.jsonl              one DocumentRecord per line
//! documents/<id>/<filename>          original upload bytes
//! documents/<id>/text.txt            extracted text
//! artifacts/index.jsonl              one ArtifactRecord per line
//! artifacts/artifact_<id>_<type>.txt artifact content
//! ```
//!
//! Everything is loaded into memory on creation. Index lines that fail to
//! parse, or whose payload file is missing, are skipped with a warning.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rpgforge_core::artifact::{Artifact, ArtifactSummary, ArtifactType};
use rpgforge_core::document::{Document, DocumentId, DocumentType, ImageRef};
use rpgforge_core::error::StoreError;
use rpgforge_core::store::{ArtifactStore, DocumentStore};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const INDEX_FILE: &str = "index.jsonl";
const TEXT_FILE: &str = "text.txt";

fn io_err(context: &str, path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Io(format!("{context} {}: {e}", path.display()))
}

/// Read a JSONL file, skipping blank and unparseable lines.
fn read_index<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<T>(line) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping corrupted index line");
                None
            }
        })
        .collect()
}

async fn append_line<T: Serialize>(path: &Path, record: &T) -> Result<(), StoreError> {
    let mut line = serde_json::to_string(record)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    line.push('\n');

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| io_err("Failed to open", path, e))?;
    file.write_all(line.as_bytes())
        .await
        .map_err(|e| io_err("Failed to append to", path, e))?;
    file.flush()
        .await
        .map_err(|e| io_err("Failed to flush", path, e))
}

/// Replace a JSONL file atomically (write a sibling, then rename).
async fn rewrite_index<T: Serialize>(path: &Path, records: &[T]) -> Result<(), StoreError> {
    let mut content = String::new();
    for record in records {
        let line = serde_json::to_string(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        content.push_str(&line);
        content.push('\n');
    }

    let tmp = path.with_extension("jsonl.tmp");
    tokio::fs::write(&tmp, content)
        .await
        .map_err(|e| io_err("Failed to write", &tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| io_err("Failed to replace", path, e))
}

/// Reduce an uploaded filename to a single safe path component.
pub(crate) fn safe_file_name(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() || cleaned == TEXT_FILE {
        "upload.bin".to_string()
    } else {
        cleaned.to_string()
    }
}

// --- Documents ---

/// Index metadata for a document; the text lives in `text.txt`.
#[derive(Debug, Serialize, Deserialize)]
struct DocumentRecord {
    id: DocumentId,
    filename: String,
    document_type: DocumentType,
    #[serde(default)]
    description: String,
    upload_time: DateTime<Utc>,
    #[serde(default)]
    size_bytes: usize,
    #[serde(default)]
    page_count: Option<u32>,
    #[serde(default)]
    images: Vec<ImageRef>,
}

impl DocumentRecord {
    fn of(document: &Document) -> Self {
        Self {
            id: document.id.clone(),
            filename: document.filename.clone(),
            document_type: document.document_type,
            description: document.description.clone(),
            upload_time: document.upload_time,
            size_bytes: document.size_bytes,
            page_count: document.page_count,
            images: document.images.clone(),
        }
    }

    fn into_document(self, raw_text: String) -> Document {
        Document {
            id: self.id,
            filename: self.filename,
            raw_text,
            document_type: self.document_type,
            description: self.description,
            upload_time: self.upload_time,
            size_bytes: self.size_bytes,
            page_count: self.page_count,
            images: self.images,
        }
    }
}

/// A file-backed document registry.
pub struct FileDocumentStore {
    dir: PathBuf,
    documents: Arc<RwLock<Vec<Document>>>,
}

impl FileDocumentStore {
    /// Open the registry under `<root>/documents`, loading existing entries.
    pub fn new(root: &Path) -> Self {
        let dir = root.join("documents");
        let documents = Self::load_from_disk(&dir);
        debug!(path = %dir.display(), count = documents.len(), "Document store loaded");
        Self {
            dir,
            documents: Arc::new(RwLock::new(documents)),
        }
    }

    fn load_from_disk(dir: &Path) -> Vec<Document> {
        let records: Vec<DocumentRecord> = read_index(&dir.join(INDEX_FILE));
        let mut seen = std::collections::HashSet::new();

        records
            .into_iter()
            .filter_map(|record| {
                if !seen.insert(record.id.clone()) {
                    warn!(id = %record.id, "Skipping duplicate document id in index");
                    return None;
                }
                let text_path = dir.join(record.id.as_str()).join(TEXT_FILE);
                match std::fs::read_to_string(&text_path) {
                    Ok(text) => Some(record.into_document(text)),
                    Err(e) => {
                        warn!(id = %record.id, error = %e, "Skipping document with missing text");
                        None
                    }
                }
            })
            .collect()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn put(&self, document: Document, original: Option<&[u8]>) -> Result<DocumentId, StoreError> {
        // Held across the file writes so index appends never interleave.
        let mut documents = self.documents.write().await;
        if documents.iter().any(|d| d.id == document.id) {
            return Err(StoreError::DuplicateId(document.id.to_string()));
        }

        let entry_dir = self.dir.join(document.id.as_str());
        tokio::fs::create_dir_all(&entry_dir)
            .await
            .map_err(|e| io_err("Failed to create", &entry_dir, e))?;

        if let Some(bytes) = original {
            let original_path = entry_dir.join(safe_file_name(&document.filename));
            tokio::fs::write(&original_path, bytes)
                .await
                .map_err(|e| io_err("Failed to write", &original_path, e))?;
        }

        let text_path = entry_dir.join(TEXT_FILE);
        tokio::fs::write(&text_path, &document.raw_text)
            .await
            .map_err(|e| io_err("Failed to write", &text_path, e))?;

        append_line(&self.dir.join(INDEX_FILE), &DocumentRecord::of(&document)).await?;

        info!(
            id = %document.id,
            filename = %document.filename,
            document_type = %document.document_type,
            "Document stored"
        );
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
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .filter(|d| filter.is_none_or(|t| d.document_type == t))
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.documents.read().await.len())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let documents = self.documents.read().await;
        if documents.is_empty() {
            return Ok(());
        }
        let records: Vec<DocumentRecord> = documents.iter().map(DocumentRecord::of).collect();
        rewrite_index(&self.dir.join(INDEX_FILE), &records).await
    }
}

// --- Artifacts ---

/// Index metadata for an artifact; the content lives in its own file.
#[derive(Debug, Serialize, Deserialize)]
struct ArtifactRecord {
    id: String,
    artifact_type: ArtifactType,
    created_at: DateTime<Utc>,
    source_tool: String,
}

impl ArtifactRecord {
    fn of(artifact: &Artifact) -> Self {
        Self {
            id: artifact.id.clone(),
            artifact_type: artifact.artifact_type,
            created_at: artifact.created_at,
            source_tool: artifact.source_tool.clone(),
        }
    }
}

/// A file-backed artifact archive.
pub struct FileArtifactStore {
    dir: PathBuf,
    artifacts: Arc<RwLock<Vec<Artifact>>>,
}

impl FileArtifactStore {
    /// Open the archive under `<root>/artifacts`, loading existing entries.
    pub fn new(root: &Path) -> Self {
        let dir = root.join("artifacts");
        let artifacts = Self::load_from_disk(&dir);
        debug!(path = %dir.display(), count = artifacts.len(), "Artifact store loaded");
        Self {
            dir,
            artifacts: Arc::new(RwLock::new(artifacts)),
        }
    }

    fn load_from_disk(dir: &Path) -> Vec<Artifact> {
        let records: Vec<ArtifactRecord> = read_index(&dir.join(INDEX_FILE));

        records
            .into_iter()
            .filter_map(|record| {
                let mut artifact = Artifact {
                    id: record.id,
                    artifact_type: record.artifact_type,
                    content: String::new(),
                    created_at: record.created_at,
                    source_tool: record.source_tool,
                };
                match std::fs::read_to_string(dir.join(artifact.filename())) {
                    Ok(content) => {
                        artifact.content = content;
                        Some(artifact)
                    }
                    Err(e) => {
                        warn!(id = %artifact.id, error = %e, "Skipping artifact with missing content");
                        None
                    }
                }
            })
            .collect()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn write_index(&self, artifacts: &[Artifact]) -> Result<(), StoreError> {
        let records: Vec<ArtifactRecord> = artifacts.iter().map(ArtifactRecord::of).collect();
        rewrite_index(&self.dir.join(INDEX_FILE), &records).await
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn create(&self, artifact: Artifact) -> Result<String, StoreError> {
        let mut artifacts = self.artifacts.write().await;
        if artifacts.iter().any(|a| a.id == artifact.id) {
            return Err(StoreError::DuplicateId(artifact.id));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_err("Failed to create", &self.dir, e))?;

        let path = self.dir.join(artifact.filename());
        tokio::fs::write(&path, &artifact.content)
            .await
            .map_err(|e| io_err("Failed to write", &path, e))?;
        append_line(&self.dir.join(INDEX_FILE), &ArtifactRecord::of(&artifact)).await?;

        info!(
            id = %artifact.id,
            artifact_type = %artifact.artifact_type,
            source_tool = %artifact.source_tool,
            "Artifact stored"
        );
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
        let artifacts = self.artifacts.read().await;
        let mut summaries: Vec<ArtifactSummary> = artifacts
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

        let (expired, kept): (Vec<Artifact>, Vec<Artifact>) =
            artifacts.drain(..).partition(|a| a.created_at < cutoff);
        *artifacts = kept;

        if expired.is_empty() {
            return Ok(0);
        }

        for artifact in &expired {
            let path = self.dir.join(artifact.filename());
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(id = %artifact.id, error = %e, "Failed to remove expired artifact file");
            }
        }
        self.write_index(&artifacts).await?;

        info!(removed = expired.len(), "Expired artifacts swept");
        Ok(expired.len())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.artifacts.read().await.len())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let artifacts = self.artifacts.read().await;
        if artifacts.is_empty() {
            return Ok(());
        }
        self.write_index(&artifacts).await
    }
}
