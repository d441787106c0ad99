//! REST endpoints: uploads, document metadata and artifacts.

use crate::SharedState;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use rpgforge_core::artifact::{Artifact, ArtifactSummary, ArtifactType};
use rpgforge_core::document::{DocumentId, DocumentType, SectionContentType};
use rpgforge_core::error::{StoreError, ToolError, UploadError};
use rpgforge_tools::{DocumentListing, IngestReport};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// An error answered as `{"error": "..."}` with a matching status code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

impl From<ToolError> for ApiError {
    fn from(err: ToolError) -> Self {
        let status = match &err {
            ToolError::Upload(UploadError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ToolError::Upload(_) | ToolError::InvalidArguments { .. } | ToolError::UnknownTool(_) => {
                StatusCode::BAD_REQUEST
            }
            ToolError::NotFound(_) => StatusCode::NOT_FOUND,
            ToolError::Authentication(_) | ToolError::ExecutionFailed { .. } => StatusCode::BAD_GATEWAY,
            ToolError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ToolError::from(err).into()
    }
}

// ── Upload ────────────────────────────────────────────────────────────────

/// `POST /upload`: multipart with `file`, optional `document_type`
/// (default `reference`) and `description`.
pub async fn upload_handler(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<IngestReport>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut document_type = DocumentType::Reference;
    let mut description = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError {
        status: e.status(),
        message: e.body_text(),
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|n| !n.trim().is_empty())
                    .ok_or_else(|| ApiError::bad_request("'file' field has no filename"))?;
                let bytes = field.bytes().await.map_err(|e| ApiError {
                    status: e.status(),
                    message: e.body_text(),
                })?;
                file = Some((filename, bytes.to_vec()));
            }
            "document_type" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                if !value.trim().is_empty() {
                    document_type = value.parse().map_err(ApiError::bad_request)?;
                }
            }
            "description" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                description = Some(value);
            }
            other => warn!(field = other, "Ignoring unknown upload field"),
        }
    }

    let (filename, bytes) = file.ok_or_else(|| ApiError::bad_request("missing 'file' field"))?;
    info!(filename = %filename, size = bytes.len(), document_type = %document_type, "Upload received");

    let report = state
        .dispatcher
        .ingestor()
        .ingest(&filename, document_type, description, bytes)
        .await?;
    Ok(Json(report))
}

// ── Documents ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct DocumentFilter {
    #[serde(default)]
    document_type: Option<String>,
}

#[derive(Serialize)]
pub struct DocumentListResponse {
    count: usize,
    documents: Vec<DocumentListing>,
}

pub async fn list_documents_handler(
    State(state): State<SharedState>,
    Query(filter): Query<DocumentFilter>,
) -> Result<Json<DocumentListResponse>, ApiError> {
    let filter =
        DocumentType::parse_filter(filter.document_type.as_deref()).map_err(ApiError::bad_request)?;
    let documents = state.dispatcher.document_listing(filter).await?;
    Ok(Json(DocumentListResponse {
        count: documents.len(),
        documents,
    }))
}

#[derive(Serialize)]
struct SectionOutline {
    title: String,
    content_type: SectionContentType,
    order_index: usize,
}

#[derive(Serialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    listing: DocumentListing,
    sections: Vec<SectionOutline>,
}

pub async fn get_document_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentDetail>, ApiError> {
    let dispatcher = &state.dispatcher;
    let document = dispatcher.documents().get(&DocumentId::from(id.as_str())).await?;

    let sections: Vec<SectionOutline> = dispatcher
        .index()
        .find(&rpgforge_context::sections::SectionQuery {
            document_id: Some(document.id.clone()),
            ..Default::default()
        })
        .await
        .into_iter()
        .map(|s| SectionOutline {
            title: s.title,
            content_type: s.content_type,
            order_index: s.order_index,
        })
        .collect();

    Ok(Json(DocumentDetail {
        listing: DocumentListing {
            summary: document.summary(),
            section_count: sections.len(),
            code_example_count: dispatcher.index().code_example_count(&document.id).await,
        },
        sections,
    }))
}

// ── Artifacts ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ArtifactFilter {
    #[serde(default)]
    artifact_type: Option<String>,
}

#[derive(Serialize)]
pub struct ArtifactListResponse {
    count: usize,
    artifacts: Vec<ArtifactSummary>,
}

pub async fn list_artifacts_handler(
    State(state): State<SharedState>,
    Query(filter): Query<ArtifactFilter>,
) -> Result<Json<ArtifactListResponse>, ApiError> {
    let filter = match filter.artifact_type.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(value) => Some(value.parse::<ArtifactType>().map_err(ApiError::bad_request)?),
    };
    let artifacts = state.dispatcher.artifacts().list(filter).await?;
    Ok(Json(ArtifactListResponse {
        count: artifacts.len(),
        artifacts,
    }))
}

pub async fn get_artifact_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Artifact>, ApiError> {
    Ok(Json(state.dispatcher.artifacts().get(&id).await?))
}
