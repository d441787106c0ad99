//! HTTP gateway for rpgforge.
//!
//! - `POST /mcp`: MCP JSON-RPC 2.0 (tools/list, tools/call, ...)
//! - `POST /upload`: multipart document upload
//! - `GET /documents[/{id}]`: document metadata
//! - `GET /artifacts[/{id}]`: generated artifacts
//! - `GET /health`, `GET /`: status and server info
//!
//! Built on Axum. Stores are constructed once in [`AppState::from_config`]
//! and shared by every request.

pub mod api;
pub mod mcp;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    response::Json,
    routing::{get, post},
};
use rpgforge_config::AppConfig;
use rpgforge_context::sections::SectionIndex;
use rpgforge_core::error::StoreError;
use rpgforge_core::provider::Provider;
use rpgforge_core::store::{ArtifactStore, DocumentStore};
use rpgforge_store::{
    Extractors, FileArtifactStore, FileDocumentStore, InMemoryArtifactStore, InMemoryDocumentStore,
};
use rpgforge_tools::{DispatchSettings, DocumentIngestor, ToolDispatcher};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

pub const SERVER_NAME: &str = "rpgforge";

/// Multipart framing and base64 in `upload_document` calls add to the raw file size.
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// Shared application state for the gateway.
pub struct AppState {
    pub config: AppConfig,
    pub dispatcher: Arc<ToolDispatcher>,
    /// `None` when running with in-memory stores.
    pub storage_dir: Option<PathBuf>,
    pub started_at: Instant,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        config: AppConfig,
        documents: Arc<dyn DocumentStore>,
        artifacts: Arc<dyn ArtifactStore>,
        index: Arc<SectionIndex>,
        provider: Option<Arc<dyn Provider>>,
        storage_dir: Option<PathBuf>,
    ) -> Self {
        let ingestor = Arc::new(DocumentIngestor::new(
            Arc::clone(&documents),
            Arc::clone(&index),
            Arc::new(Extractors::default()),
            config.storage.max_upload_bytes,
        ));
        let dispatcher = Arc::new(ToolDispatcher::new(
            documents,
            artifacts,
            index,
            ingestor,
            provider,
            DispatchSettings::from_config(&config),
        ));
        Self {
            config,
            dispatcher,
            storage_dir,
            started_at: Instant::now(),
        }
    }

    /// Open the stores, rebuild the section index and connect the
    /// completion backend. Without credentials the server still starts;
    /// generative tools then fail with a configuration error.
    pub async fn from_config(config: &AppConfig, ephemeral: bool) -> Result<Self, StoreError> {
        let storage_dir = (!ephemeral).then(|| config.storage.root_dir());
        let (documents, artifacts): (Arc<dyn DocumentStore>, Arc<dyn ArtifactStore>) =
            match &storage_dir {
                Some(root) => (
                    Arc::new(FileDocumentStore::new(root)),
                    Arc::new(FileArtifactStore::new(root)),
                ),
                None => (
                    Arc::new(InMemoryDocumentStore::new()),
                    Arc::new(InMemoryArtifactStore::new()),
                ),
            };

        let stored = documents.list(None).await?;
        let index = Arc::new(SectionIndex::build(&stored));

        let provider = match rpgforge_providers::build_from_config(config) {
            Ok(provider) => Some(provider),
            Err(e) => {
                warn!(error = %e, "Completion backend unavailable; generative tools disabled");
                None
            }
        };

        Ok(Self::new(
            config.clone(),
            documents,
            artifacts,
            index,
            provider,
            storage_dir,
        ))
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let body_limit = state
        .config
        .storage
        .max_upload_bytes
        .saturating_mul(4)
        / 3
        + BODY_LIMIT_SLACK;

    let cors = CorsLayer::new()
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/mcp", post(mcp::mcp_handler))
        .route("/upload", post(api::upload_handler))
        .route("/documents", get(api::list_documents_handler))
        .route("/documents/{id}", get(api::get_document_handler))
        .route("/artifacts", get(api::list_artifacts_handler))
        .route("/artifacts/{id}", get(api::get_artifact_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway and serve until Ctrl-C, then flush both stores.
pub async fn start(config: AppConfig, ephemeral: bool) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state: SharedState = Arc::new(AppState::from_config(&config, ephemeral).await?);

    let sweeper = spawn_sweeper(&state);
    let app = build_router(Arc::clone(&state));

    info!(
        addr = %addr,
        storage = %state
            .storage_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "memory".into()),
        documents = state.dispatcher.documents().count().await?,
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    state.dispatcher.documents().flush().await?;
    state.dispatcher.artifacts().flush().await?;
    info!("Gateway stopped; stores flushed");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

/// Remove artifacts older than `retention_days`. Returns how many went.
pub async fn sweep_artifacts(
    artifacts: &dyn ArtifactStore,
    retention_days: u32,
) -> Result<usize, StoreError> {
    let removed = artifacts
        .sweep(chrono::Duration::days(i64::from(retention_days)))
        .await?;
    if removed > 0 {
        info!(removed, retention_days, "Expired artifacts swept");
    }
    Ok(removed)
}

fn spawn_sweeper(state: &SharedState) -> Option<tokio::task::JoinHandle<()>> {
    let retention_days = state.config.storage.artifact_retention_days;
    if retention_days == 0 {
        return None;
    }
    let artifacts = Arc::clone(state.dispatcher.artifacts());
    let period = std::time::Duration::from_secs(state.config.storage.sweep_interval_secs.max(1));

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = sweep_artifacts(artifacts.as_ref(), retention_days).await {
                warn!(error = %e, "Artifact sweep failed");
            }
        }
    }))
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    server: &'static str,
    version: &'static str,
    storage_dir: Option<String>,
    deployment: String,
    backend: Option<String>,
    context_ceiling_tokens: usize,
    documents_processed: usize,
    artifacts_created: usize,
    uptime_secs: u64,
}

async fn health_handler(State(state): State<SharedState>) -> Result<Json<HealthResponse>, api::ApiError> {
    let dispatcher = &state.dispatcher;
    Ok(Json(HealthResponse {
        status: "healthy",
        server: SERVER_NAME,
        version: env!("CARGO_PKG_VERSION"),
        storage_dir: state.storage_dir.as_ref().map(|p| p.display().to_string()),
        deployment: state.config.llm.deployment.clone(),
        backend: dispatcher.provider_name().map(str::to_string),
        context_ceiling_tokens: state.config.context.ceiling_tokens,
        documents_processed: dispatcher.documents().count().await?,
        artifacts_created: dispatcher.artifacts().count().await?,
        uptime_secs: state.uptime_secs(),
    }))
}

async fn root_handler(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "MCP server for DB2 SQL and RPG code generation grounded in uploaded standards",
        "protocol": "MCP JSON-RPC 2.0 over HTTP",
        "tools": rpgforge_tools::tool_names(),
        "endpoints": {
            "mcp": "POST /mcp",
            "upload": "POST /upload",
            "documents": "GET /documents",
            "document": "GET /documents/{id}",
            "artifacts": "GET /artifacts",
            "artifact": "GET /artifacts/{id}",
            "health": "GET /health"
        },
        "supported_formats": state.dispatcher.ingestor().supported_extensions(),
        "max_upload_bytes": state.config.storage.max_upload_bytes,
    }))
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use rpgforge_core::artifact::{Artifact, ArtifactType};
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (status, json) = get_json(build_router(test_support::state()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["server"], "rpgforge");
        assert_eq!(json["deployment"], "gpt-4o");
        assert_eq!(json["documents_processed"], 0);
        assert!(json["backend"].is_null());
        assert!(json["storage_dir"].is_null());
    }

    #[tokio::test]
    async fn root_lists_tools_and_formats() {
        let (status, json) = get_json(build_router(test_support::state()), "/").await;
        assert_eq!(status, StatusCode::OK);
        let tools = json["tools"].as_array().unwrap();
        assert_eq!(tools.len(), rpgforge_tools::TOOL_SPECS.len());
        assert!(tools.iter().any(|t| t == "convert_rpg_to_freeform"));
        let formats = json["supported_formats"].as_array().unwrap();
        assert!(formats.iter().any(|f| f == ".pdf"));
        assert!(formats.iter().any(|f| f == ".md"));
    }

    #[tokio::test]
    async fn file_backed_state_reindexes_stored_documents() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.root = Some(dir.path().to_path_buf());

        let first = AppState::from_config(&config, false).await.unwrap();
        first
            .dispatcher
            .ingestor()
            .ingest(
                "guide.md",
                rpgforge_core::document::DocumentType::ConversionGuide,
                None,
                b"## MOVE\nUse EVAL.\n\n## GOTO\nUse LEAVE or ITER.".to_vec(),
            )
            .await
            .unwrap();
        first.dispatcher.documents().flush().await.unwrap();

        let reopened = AppState::from_config(&config, false).await.unwrap();
        assert_eq!(reopened.dispatcher.documents().count().await.unwrap(), 1);
        assert_eq!(reopened.dispatcher.index().len().await, 2);
        assert_eq!(reopened.storage_dir.as_deref(), Some(dir.path()));
    }

    #[tokio::test]
    async fn sweep_removes_only_old_artifacts() {
        let state = test_support::state();
        let artifacts = state.dispatcher.artifacts();
        let mut old = Artifact::new(ArtifactType::Module, "old", "create_artifact");
        old.created_at = chrono::Utc::now() - chrono::Duration::days(40);
        artifacts.create(old).await.unwrap();
        artifacts
            .create(Artifact::new(ArtifactType::Module, "new", "create_artifact"))
            .await
            .unwrap();

        assert_eq!(sweep_artifacts(artifacts.as_ref(), 30).await.unwrap(), 1);
        assert_eq!(artifacts.count().await.unwrap(), 1);
    }
}
