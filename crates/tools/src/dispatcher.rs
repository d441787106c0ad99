//! Tool dispatch: validates a call, answers it from the stores or the
//! completion backend, and persists artifacts.
//!
//! Generative calls follow one path:
//!
//! ```text
//! parse args → gather reference sections → rank → fit under the ceiling
//!   → ConversationContext → provider (retry + timeout) → artifact
//! ```
//!
//! Nothing is written unless the completion succeeded.

use crate::args::ToolInvocation;
use crate::ingest::DocumentIngestor;
use crate::prompts::PromptPlan;
use crate::specs::{self, ArtifactRule, ToolKind};
use base64::Engine;
use rpgforge_config::AppConfig;
use rpgforge_context::analyzer::extract_code_blocks;
use rpgforge_context::budget::{ContextBudgeter, ContextPart, FitOutcome};
use rpgforge_context::conversation::ConversationContext;
use rpgforge_context::search::search_documents;
use rpgforge_context::sections::{LabeledSection, SectionIndex, SectionQuery, rank};
use rpgforge_context::token::{MESSAGE_OVERHEAD_TOKENS, estimate_message_tokens};
use rpgforge_core::artifact::{Artifact, ArtifactType};
use rpgforge_core::document::{DocumentSummary, DocumentType, Section, SectionContentType};
use rpgforge_core::error::{ProviderError, ToolError};
use rpgforge_core::message::{Message, Role};
use rpgforge_core::provider::{Provider, ProviderRequest, Usage};
use rpgforge_core::store::{ArtifactStore, DocumentStore};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Label of the request payload part; it must survive budgeting intact.
const REQUEST_LABEL: &str = "request";
const ANALYSIS_LABEL: &str = "static analysis";
/// First budget rank used for reference sections.
const REFERENCE_RANK: u32 = 2;
/// Code examples printed by `extract_code_examples`.
const MAX_EXAMPLES_SHOWN: usize = 10;

/// Budget and backend settings for generative calls.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub deployment: String,
    pub temperature: f32,
    pub max_response_tokens: u32,
    pub ceiling_tokens: usize,
    pub min_part_tokens: usize,
    pub max_reference_sections: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl DispatchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            deployment: config.llm.deployment.clone(),
            temperature: config.llm.temperature,
            max_response_tokens: config.llm.max_response_tokens,
            ceiling_tokens: config.context.ceiling_tokens,
            min_part_tokens: config.context.min_part_tokens,
            max_reference_sections: config.context.max_reference_sections,
        }
    }

    /// Tokens available for all prompt messages.
    fn prompt_tokens(&self) -> usize {
        self.ceiling_tokens
            .saturating_sub(self.max_response_tokens as usize)
    }
}

/// The answer to one tool call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolOutput {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    /// Reference sections that reached the prompt.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    /// Parts that were cut short to fit.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub truncated: Vec<String>,
    /// Parts that did not fit at all.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<String>,
}

impl ToolOutput {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    fn with_data(mut self, data: impl Serialize) -> Self {
        self.data = serde_json::to_value(data).ok();
        self
    }
}

/// Document metadata plus what the server derived from it.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentListing {
    #[serde(flatten)]
    pub summary: DocumentSummary,
    pub section_count: usize,
    pub code_example_count: usize,
}

#[derive(Serialize)]
struct GenerationData<'a> {
    model: &'a str,
    usage: Option<&'a Usage>,
    used_tokens: usize,
    limit_tokens: usize,
}

#[derive(Serialize)]
struct SectionTitle<'a> {
    document_id: &'a str,
    filename: &'a str,
    title: &'a str,
    content_type: SectionContentType,
    order_index: usize,
}

#[derive(Serialize)]
struct CodeExample<'a> {
    source: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    language: &'static str,
    code: &'a str,
}

pub struct ToolDispatcher {
    documents: Arc<dyn DocumentStore>,
    artifacts: Arc<dyn ArtifactStore>,
    index: Arc<SectionIndex>,
    ingestor: Arc<DocumentIngestor>,
    provider: Option<Arc<dyn Provider>>,
    settings: DispatchSettings,
    budgeter: ContextBudgeter,
}

impl ToolDispatcher {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        artifacts: Arc<dyn ArtifactStore>,
        index: Arc<SectionIndex>,
        ingestor: Arc<DocumentIngestor>,
        provider: Option<Arc<dyn Provider>>,
        settings: DispatchSettings,
    ) -> Self {
        let budgeter = ContextBudgeter::new(settings.min_part_tokens);
        Self {
            documents,
            artifacts,
            index,
            ingestor,
            provider,
            settings,
            budgeter,
        }
    }

    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.documents
    }

    pub fn artifacts(&self) -> &Arc<dyn ArtifactStore> {
        &self.artifacts
    }

    pub fn index(&self) -> &Arc<SectionIndex> {
        &self.index
    }

    pub fn ingestor(&self) -> &Arc<DocumentIngestor> {
        &self.ingestor
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Name of the completion backend, if one is configured.
    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_deref().map(|p| p.name())
    }

    /// Run one tool call.
    ///
    /// Unknown tools and malformed arguments are rejected before any store
    /// or the completion backend is touched.
    pub async fn dispatch(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolOutput, ToolError> {
        let invocation = ToolInvocation::parse(tool_name, arguments)?;
        debug!(tool = tool_name, "Dispatching tool call");

        if let Some(plan) = PromptPlan::for_invocation(&invocation) {
            return self.generate(&invocation, plan).await;
        }

        match invocation {
            ToolInvocation::UploadDocument(a) => {
                let bytes = match (a.content, a.content_base64) {
                    (Some(text), _) => text.into_bytes(),
                    (None, Some(encoded)) => base64::engine::general_purpose::STANDARD
                        .decode(encoded.trim())
                        .map_err(|e| {
                            ToolError::invalid(tool_name, format!("'content_base64' is not valid base64: {e}"))
                        })?,
                    (None, None) => Vec::new(),
                };
                let report = self
                    .ingestor
                    .ingest(&a.filename, a.document_type, a.description, bytes)
                    .await?;
                Ok(ToolOutput::text(report.to_text()).with_data(&report))
            }
            ToolInvocation::SearchReferences(a) => {
                let documents = self.documents.list(a.document_type).await?;
                let hits = search_documents(&documents, &a.query, a.max_results);
                if hits.is_empty() {
                    return Ok(ToolOutput::text(format!("No results found for query: '{}'", a.query)));
                }
                let mut text = format!("Found {} relevant documents for '{}':\n\n", hits.len(), a.query);
                for (i, hit) in hits.iter().enumerate() {
                    let _ = writeln!(text, "{}. {} ({})", i + 1, hit.filename, hit.document_type);
                    let _ = writeln!(text, "   Description: {}", hit.description);
                    for excerpt in &hit.excerpts {
                        let _ = writeln!(text, "   - {excerpt}");
                    }
                    text.push('\n');
                }
                Ok(ToolOutput::text(text).with_data(&hits))
            }
            ToolInvocation::ExtractCodeExamples(a) => {
                let documents = self.documents.list(None).await?;
                let topic = a.topic.as_deref().map(str::to_lowercase).unwrap_or_default();
                let found: Vec<(String, _)> = documents
                    .iter()
                    .flat_map(|d| {
                        extract_code_blocks(&d.raw_text)
                            .into_iter()
                            .map(move |b| (d.filename.clone(), b))
                    })
                    .filter(|(_, b)| b.matches_code_type(a.code_type.as_str()))
                    .filter(|(_, b)| topic.is_empty() || b.code.to_lowercase().contains(&topic))
                    .collect();

                if found.is_empty() {
                    return Ok(ToolOutput::text(format!(
                        "No code examples found for type: {}, topic: {}",
                        a.code_type.as_str(),
                        a.topic.as_deref().unwrap_or_default()
                    )));
                }

                let shown: Vec<CodeExample<'_>> = found
                    .iter()
                    .take(MAX_EXAMPLES_SHOWN)
                    .map(|(source, b)| CodeExample {
                        source,
                        kind: b.kind.label(),
                        language: b.language,
                        code: &b.code,
                    })
                    .collect();
                let mut text = format!("Found {} code examples:\n\n", found.len());
                for (i, ex) in shown.iter().enumerate() {
                    let _ = write!(
                        text,
                        "{}. {} from {}:\n```{}\n{}\n```\n\n",
                        i + 1,
                        ex.kind,
                        ex.source,
                        ex.language,
                        ex.code
                    );
                }
                Ok(ToolOutput::text(text).with_data(&shown))
            }
            ToolInvocation::FindSections(a) => {
                let query = SectionQuery {
                    title: a.title,
                    document_id: a.document_id,
                    content_type: a.content_type,
                    document_name: a.document_name,
                    document_type: a.document_type,
                };
                let sections = self.index.find_labeled(&query).await;
                if sections.is_empty() {
                    return Ok(ToolOutput::text("No matching sections found").with_data(Vec::<()>::new()));
                }

                let mut text = format!("Found {} sections:\n\n", sections.len());
                for (i, s) in sections.iter().enumerate() {
                    let _ = writeln!(
                        text,
                        "{}. {} ({}) in {} [{}]",
                        i + 1,
                        s.section.title,
                        s.section.content_type.as_str(),
                        s.filename,
                        s.section.document_id
                    );
                    if a.include_body && !s.section.body_text.is_empty() {
                        let _ = writeln!(text, "{}\n", s.section.body_text);
                    }
                }

                let output = ToolOutput::text(text);
                if a.include_body {
                    Ok(output.with_data(&sections))
                } else {
                    let titles: Vec<SectionTitle<'_>> = sections
                        .iter()
                        .map(|s| SectionTitle {
                            document_id: s.section.document_id.as_str(),
                            filename: &s.filename,
                            title: &s.section.title,
                            content_type: s.section.content_type,
                            order_index: s.section.order_index,
                        })
                        .collect();
                    Ok(output.with_data(&titles))
                }
            }
            ToolInvocation::ListDocuments(a) => {
                let listing = self.document_listing(a.document_type).await?;
                if listing.is_empty() {
                    return Ok(ToolOutput::text("No documents found").with_data(&listing));
                }
                let mut text = format!("Available Documents ({} total):\n\n", listing.len());
                for (i, d) in listing.iter().enumerate() {
                    let s = &d.summary;
                    let _ = writeln!(text, "{}. {} [{}]", i + 1, s.filename, s.id);
                    let _ = writeln!(text, "   Type: {}", s.document_type);
                    let _ = writeln!(text, "   Description: {}", s.description);
                    let _ = writeln!(text, "   Uploaded: {}", s.upload_time.to_rfc3339());
                    if let Some(pages) = s.page_count {
                        let _ = writeln!(text, "   Pages: {pages}");
                    }
                    let _ = writeln!(text, "   Sections: {}", d.section_count);
                    let _ = writeln!(text, "   Code Examples: {}", d.code_example_count);
                    text.push('\n');
                }
                Ok(ToolOutput::text(text).with_data(&listing))
            }
            ToolInvocation::ListArtifacts(a) => {
                let artifacts = self.artifacts.list(a.artifact_type).await?;
                if artifacts.is_empty() {
                    return Ok(ToolOutput::text("No artifacts found").with_data(&artifacts));
                }
                let mut text = format!("Artifacts ({} total):\n\n", artifacts.len());
                for (i, art) in artifacts.iter().enumerate() {
                    let _ = writeln!(
                        text,
                        "{}. {} ({}, {} chars, from {}, {})",
                        i + 1,
                        art.id,
                        art.artifact_type,
                        art.size,
                        art.source_tool,
                        art.created_at.to_rfc3339()
                    );
                }
                Ok(ToolOutput::text(text).with_data(&artifacts))
            }
            ToolInvocation::GetArtifact(a) => {
                let artifact = self.artifacts.get(a.artifact_id.trim()).await?;
                Ok(ToolOutput {
                    text: artifact.content.clone(),
                    artifact_id: Some(artifact.id.clone()),
                    ..Default::default()
                }
                .with_data(artifact.summary()))
            }
            generative => Err(ToolError::invalid(
                generative.tool_name(),
                "no prompt is defined for this tool",
            )),
        }
    }

    /// Summaries of stored documents, optionally filtered by type.
    pub async fn document_listing(
        &self,
        filter: Option<DocumentType>,
    ) -> Result<Vec<DocumentListing>, ToolError> {
        let documents = self.documents.list(filter).await?;
        let mut listing = Vec::with_capacity(documents.len());
        for d in &documents {
            listing.push(DocumentListing {
                summary: d.summary(),
                section_count: self.index.section_count(&d.id).await,
                code_example_count: self.index.code_example_count(&d.id).await,
            });
        }
        Ok(listing)
    }

    /// Reference candidates for a generative call: indexed sections of the
    /// wanted document types, plus whole documents that have no sections.
    async fn gather_references(
        &self,
        reference_types: &[DocumentType],
        query: &str,
    ) -> Result<Vec<LabeledSection>, ToolError> {
        let mut candidates = Vec::new();
        let mut whole_documents = Vec::new();

        for &document_type in reference_types {
            candidates.extend(
                self.index
                    .find_labeled(&SectionQuery {
                        document_type: Some(document_type),
                        ..Default::default()
                    })
                    .await,
            );

            for doc in self.documents.list(Some(document_type)).await? {
                if self.index.section_count(&doc.id).await > 0 || doc.raw_text.trim().is_empty() {
                    continue;
                }
                whole_documents.push(LabeledSection {
                    filename: doc.filename.clone(),
                    document_type: doc.document_type,
                    section: Section {
                        document_id: doc.id.clone(),
                        title: doc.filename.clone(),
                        content_type: SectionContentType::Text,
                        body_text: doc.raw_text,
                        order_index: 0,
                    },
                });
            }
        }

        candidates.extend(whole_documents);
        Ok(rank(query, candidates, self.settings.max_reference_sections))
    }

    async fn generate(
        &self,
        invocation: &ToolInvocation,
        plan: PromptPlan,
    ) -> Result<ToolOutput, ToolError> {
        let tool_name = invocation.tool_name();
        let Some(ToolKind::Generative {
            reference_types,
            artifact,
        }) = specs::lookup(tool_name).map(|s| s.kind)
        else {
            return Err(ToolError::UnknownTool(tool_name.to_string()));
        };

        let Some(provider) = self.provider.as_ref() else {
            return Err(ToolError::ExecutionFailed {
                tool_name: tool_name.to_string(),
                source: ProviderError::NotConfigured(
                    "set AZURE_OPENAI_ENDPOINT and AZURE_OPENAI_API_KEY".into(),
                ),
            });
        };

        let references = if plan.with_references {
            self.gather_references(reference_types, &plan.query).await?
        } else {
            Vec::new()
        };

        let mut parts = vec![ContextPart::new(0, REQUEST_LABEL, plan.payload.as_str())];
        if let Some(analysis) = &plan.analysis {
            parts.push(ContextPart::new(1, ANALYSIS_LABEL, analysis.as_str()));
        }
        for (i, r) in references.iter().enumerate() {
            parts.push(ContextPart::new(
                REFERENCE_RANK + i as u32,
                format!("{} > {}", r.filename, r.section.title),
                format!(
                    "Reference from {} ({}), section \"{}\":\n{}",
                    r.filename, r.document_type, r.section.title, r.section.body_text
                ),
            ));
        }

        let system = Message::system(plan.system.as_str());
        let limit = self
            .settings
            .prompt_tokens()
            .saturating_sub(estimate_message_tokens(&system) + MESSAGE_OVERHEAD_TOKENS);
        let fit = self.budgeter.fit(&parts, limit);

        if !fit.is_included(REQUEST_LABEL) || fit.truncated().iter().any(|l| l == REQUEST_LABEL) {
            return Err(ToolError::invalid(
                tool_name,
                format!("request does not fit the model context ({limit} tokens available)"),
            ));
        }

        let mut context = ConversationContext::new(self.settings.prompt_tokens());
        context.push(Role::System, plan.system);
        context.push(Role::User, fit.compose());

        let request = ProviderRequest {
            model: self.settings.deployment.clone(),
            messages: context.to_messages(),
            temperature: self.settings.temperature,
            max_tokens: Some(self.settings.max_response_tokens),
        };

        let response = provider.complete(request).await.map_err(|e| {
            warn!(tool = tool_name, error = %e, "Completion failed");
            match e {
                ProviderError::AuthenticationFailed(message) => ToolError::Authentication(message),
                other => ToolError::ExecutionFailed {
                    tool_name: tool_name.to_string(),
                    source: other,
                },
            }
        })?;

        let artifact_type = match artifact {
            ArtifactRule::None => None,
            ArtifactRule::Fixed(t) => Some(t),
            ArtifactRule::FromArguments => match invocation {
                ToolInvocation::CreateArtifact(a) => Some(ArtifactType::from(a.artifact_type)),
                _ => None,
            },
        };

        let mut text = response.message.content.clone();
        let artifact_id = match artifact_type {
            Some(t) => {
                let artifact = Artifact::new(t, response.message.content.as_str(), tool_name);
                let filename = artifact.filename();
                let id = self.artifacts.create(artifact).await?;
                let _ = write!(text, "\n\nArtifact saved: {id} ({filename})");
                Some(id)
            }
            None => None,
        };

        let output = self.finish_output(text, artifact_id, &fit, response.usage.as_ref(), &response.model);
        info!(
            tool = tool_name,
            references = output.references.len(),
            truncated = output.truncated.len(),
            dropped = output.dropped.len(),
            used_tokens = fit.used_tokens,
            artifact_id = output.artifact_id.as_deref().unwrap_or("-"),
            "Generative tool completed"
        );
        Ok(output)
    }

    fn finish_output(
        &self,
        text: String,
        artifact_id: Option<String>,
        fit: &FitOutcome,
        usage: Option<&Usage>,
        model: &str,
    ) -> ToolOutput {
        ToolOutput {
            text,
            artifact_id,
            references: fit
                .parts
                .iter()
                .filter(|p| p.priority >= REFERENCE_RANK)
                .map(|p| p.label.clone())
                .collect(),
            truncated: fit.truncated(),
            dropped: fit.dropped.clone(),
            data: None,
        }
        .with_data(GenerationData {
            model,
            usage,
            used_tokens: fit.used_tokens,
            limit_tokens: fit.limit_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rpgforge_context::token::estimate_messages_tokens;
    use rpgforge_core::provider::ProviderResponse;
    use rpgforge_store::{Extractors, InMemoryArtifactStore, InMemoryDocumentStore};
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every call with a fixed reply or error and records requests.
    struct ScriptedProvider {
        reply: Result<String, ProviderError>,
        calls: AtomicUsize,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing(error: ProviderError) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(error),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_user_message(&self) -> String {
            let requests = self.requests.lock().unwrap();
            let request = requests.last().expect("no request recorded");
            request
                .messages
                .iter()
                .rfind(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(text) => Ok(ProviderResponse {
                    message: Message::assistant(text.as_str()),
                    usage: None,
                    model: request.model,
                }),
                Err(e) => Err(e.clone()),
            }
        }
    }

    fn settings() -> DispatchSettings {
        DispatchSettings {
            deployment: "gpt-4o".into(),
            temperature: 0.2,
            max_response_tokens: 1000,
            ceiling_tokens: 6000,
            min_part_tokens: 256,
            max_reference_sections: 8,
        }
    }

    fn dispatcher(provider: Option<Arc<dyn Provider>>) -> ToolDispatcher {
        let documents: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let artifacts: Arc<dyn ArtifactStore> = Arc::new(InMemoryArtifactStore::new());
        let index = Arc::new(SectionIndex::new());
        let ingestor = Arc::new(DocumentIngestor::new(
            Arc::clone(&documents),
            Arc::clone(&index),
            Arc::new(Extractors::default()),
            1024 * 1024,
        ));
        ToolDispatcher::new(documents, artifacts, index, ingestor, provider, settings())
    }

    async fn upload(d: &ToolDispatcher, filename: &str, document_type: &str, content: &str) -> String {
        let out = d
            .dispatch(
                "upload_document",
                json!({"filename": filename, "document_type": document_type, "content": content}),
            )
            .await
            .unwrap();
        out.data.unwrap()["document_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn unknown_tool_never_reaches_the_backend() {
        let provider = ScriptedProvider::ok("unused");
        let d = dispatcher(Some(provider.clone()));
        let err = d.dispatch("unknown_tool", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn invalid_arguments_never_reach_the_backend() {
        let provider = ScriptedProvider::ok("unused");
        let d = dispatcher(Some(provider.clone()));
        let err = d
            .dispatch("review_code", json!({"code": "SELECT 1", "code_type": "sql", "extra": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
        assert_eq!(provider.calls(), 0);
        assert_eq!(d.artifacts().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn generate_code_persists_an_artifact() {
        let provider = ScriptedProvider::ok("DCL-S total PACKED(9:2);");
        let d = dispatcher(Some(provider.clone()));
        let out = d
            .dispatch("generate_code", json!({"requirements": "sum order lines", "code_type": "rpg"}))
            .await
            .unwrap();

        let id = out.artifact_id.clone().unwrap();
        assert!(out.text.starts_with("DCL-S total PACKED(9:2);"));
        assert!(out.text.contains(&id));
        let artifact = d.artifacts().get(&id).await.unwrap();
        assert_eq!(artifact.artifact_type, ArtifactType::GeneratedCode);
        assert_eq!(artifact.content, "DCL-S total PACKED(9:2);");
        assert_eq!(artifact.source_tool, "generate_code");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn create_artifact_uses_requested_type() {
        let d = dispatcher(Some(ScriptedProvider::ok("CREATE PROCEDURE p() BEGIN END;")));
        let out = d
            .dispatch(
                "create_artifact",
                json!({"artifact_type": "procedure", "specifications": "close stale orders"}),
            )
            .await
            .unwrap();
        let artifact = d.artifacts().get(&out.artifact_id.unwrap()).await.unwrap();
        assert_eq!(artifact.artifact_type, ArtifactType::Procedure);
    }

    #[tokio::test]
    async fn review_does_not_create_artifacts() {
        let d = dispatcher(Some(ScriptedProvider::ok("Looks fine.")));
        let out = d
            .dispatch("review_code", json!({"code": "SELECT a FROM t WHERE b = 1", "code_type": "sql"}))
            .await
            .unwrap();
        assert!(out.artifact_id.is_none());
        assert_eq!(out.text, "Looks fine.");
        assert_eq!(d.artifacts().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn authentication_failure_is_surfaced_and_stores_nothing() {
        let provider = ScriptedProvider::failing(ProviderError::AuthenticationFailed("401".into()));
        let d = dispatcher(Some(provider.clone()));
        let err = d
            .dispatch("generate_code", json!({"requirements": "x", "code_type": "sql"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Authentication(_)));
        assert_eq!(d.artifacts().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn backend_failure_stores_no_artifact() {
        let provider = ScriptedProvider::failing(ProviderError::Timeout("after 120s".into()));
        let d = dispatcher(Some(provider.clone()));
        let err = d
            .dispatch("convert_rpg_to_freeform", json!({"code": "     C                   MOVE      A             B"}))
            .await
            .unwrap_err();
        match err {
            ToolError::ExecutionFailed { tool_name, source } => {
                assert_eq!(tool_name, "convert_rpg_to_freeform");
                assert!(matches!(source, ProviderError::Timeout(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(d.artifacts().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_backend_is_an_execution_failure() {
        let d = dispatcher(None);
        let err = d
            .dispatch("explain_code", json!({"code": "DCL-S x INT(10);"}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ToolError::ExecutionFailed { source: ProviderError::NotConfigured(_), .. }
        ));
        // Local tools still work without a backend.
        assert!(d.dispatch("list_documents", json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn review_prompt_includes_static_findings() {
        let provider = ScriptedProvider::ok("ok");
        let d = dispatcher(Some(provider.clone()));
        d.dispatch("review_code", json!({"code": "SELECT * FROM orders", "code_type": "db2"}))
            .await
            .unwrap();
        let prompt = provider.last_user_message();
        assert!(prompt.contains("SELECT * FROM orders"));
        assert!(prompt.contains("Static analysis"));
        assert!(prompt.contains("Missing WHERE clause"));
    }

    #[tokio::test]
    async fn references_come_from_the_tools_document_types() {
        let provider = ScriptedProvider::ok("ok");
        let d = dispatcher(Some(provider.clone()));
        upload(&d, "naming.md", "standards", "## Naming Conventions\nPrefix order tables with ORD.").await;
        upload(&d, "faq.md", "reference", "## Orders\nNothing to see about order tables.").await;

        let out = d
            .dispatch("generate_code", json!({"requirements": "create order tables", "code_type": "sql"}))
            .await
            .unwrap();
        assert_eq!(out.references, vec!["naming.md > Naming Conventions".to_string()]);
        let prompt = provider.last_user_message();
        assert!(prompt.contains("Prefix order tables with ORD."));
        assert!(!prompt.contains("Nothing to see"));
    }

    #[tokio::test]
    async fn documents_without_headings_are_used_whole() {
        let provider = ScriptedProvider::ok("ok");
        let d = dispatcher(Some(provider.clone()));
        upload(&d, "rules.md", "best_practices", "Always close cursors after use.").await;

        let out = d
            .dispatch("review_code", json!({"code": "EXEC SQL OPEN c1;", "code_type": "rpg"}))
            .await
            .unwrap();
        assert_eq!(out.references, vec!["rules.md > rules.md".to_string()]);
        assert!(provider.last_user_message().contains("Always close cursors"));
    }

    #[tokio::test]
    async fn explain_without_references_sends_none() {
        let provider = ScriptedProvider::ok("ok");
        let d = dispatcher(Some(provider.clone()));
        upload(&d, "ref.md", "reference", "## Data types\nINT(10) is a 4-byte integer.").await;
        let out = d
            .dispatch(
                "explain_code",
                json!({"code": "DCL-S x INT(10);", "include_references": false}),
            )
            .await
            .unwrap();
        assert!(out.references.is_empty());
        assert!(!provider.last_user_message().contains("4-byte integer"));
    }

    #[tokio::test]
    async fn oversized_reference_is_truncated_to_the_ceiling() {
        let provider = ScriptedProvider::ok("ok");
        let d = dispatcher(Some(provider.clone()));
        let huge = format!("## Naming\n{}", "naming rule text ".repeat(10_000));
        upload(&d, "huge.md", "standards", &huge).await;

        let out = d
            .dispatch("generate_code", json!({"requirements": "naming", "code_type": "rpg"}))
            .await
            .unwrap();
        assert_eq!(out.truncated, vec!["huge.md > Naming".to_string()]);

        let requests = provider.requests.lock().unwrap();
        let sent = estimate_messages_tokens(&requests[0].messages);
        assert!(sent <= settings().ceiling_tokens - settings().max_response_tokens as usize);
        assert_eq!(requests[0].max_tokens, Some(1000));
    }

    #[tokio::test]
    async fn oversized_request_is_rejected_before_the_call() {
        let provider = ScriptedProvider::ok("ok");
        let d = dispatcher(Some(provider.clone()));
        let code = "DCL-S x INT(10);\n".repeat(5_000);
        let err = d
            .dispatch("review_code", json!({"code": code, "code_type": "rpg"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn listing_reports_the_count_recorded_at_ingest() {
        let d = dispatcher(None);
        let id = upload(
            &d,
            "samples.md",
            "examples",
            "## Declarations\nDCL-S a INT(10);\nDCL-S b CHAR(5);\n",
        )
        .await;
        let listed = d.dispatch("list_documents", json!({})).await.unwrap();
        assert_eq!(listed.data.unwrap()[0]["code_example_count"], 2);

        // The listing reads the index entry, not the document text.
        let document = d
            .documents()
            .get(&rpgforge_core::document::DocumentId::from(id.as_str()))
            .await
            .unwrap();
        let sections = rpgforge_context::sections::index(&document);
        d.index().insert(&document, sections, 5).await;
        let listed = d.document_listing(None).await.unwrap();
        assert_eq!(listed[0].code_example_count, 5);
        assert_eq!(listed[0].section_count, 1);
    }

    #[tokio::test]
    async fn local_tools_answer_from_the_stores() {
        let d = dispatcher(None);
        let id = upload(
            &d,
            "examples.md",
            "examples",
            "## Cursor loop\nEXEC SQL DECLARE c1 CURSOR FOR SELECT id FROM orders;\n\n## Notes\nUse MONITOR. Always use monitor blocks.",
        )
        .await;

        let listed = d.dispatch("list_documents", json!({"document_type": "examples"})).await.unwrap();
        let data = listed.data.unwrap();
        assert_eq!(data[0]["id"], id.as_str());
        assert_eq!(data[0]["section_count"], 2);
        assert!(listed.text.contains("examples.md"));

        let none = d.dispatch("list_documents", json!({"document_type": "standards"})).await.unwrap();
        assert_eq!(none.text, "No documents found");

        let found = d.dispatch("search_references", json!({"query": "monitor"})).await.unwrap();
        assert!(found.text.starts_with("Found 1 relevant documents"));

        let sections = d
            .dispatch("find_sections", json!({"title": "cursor", "include_body": true}))
            .await
            .unwrap();
        assert!(sections.text.contains("Cursor loop (code)"));
        assert!(sections.text.contains("DECLARE c1"));

        let examples = d
            .dispatch("extract_code_examples", json!({"code_type": "rpg", "topic": "cursor"}))
            .await
            .unwrap();
        assert!(examples.text.contains("RPG from examples.md"));

        let missing = d.dispatch("get_artifact", json!({"artifact_id": "nope"})).await.unwrap_err();
        assert!(matches!(missing, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn base64_upload_and_artifact_round_trip() {
        let d = dispatcher(Some(ScriptedProvider::ok("**FREE\nDCL-S a CHAR(1);")));
        let encoded = base64::engine::general_purpose::STANDARD.encode("# Guide\nMOVE becomes EVAL.");
        let out = d
            .dispatch(
                "upload_document",
                json!({"filename": "guide.md", "document_type": "conversion_guide", "content_base64": encoded}),
            )
            .await
            .unwrap();
        assert!(out.text.contains("processed successfully"));

        let bad = d
            .dispatch(
                "upload_document",
                json!({"filename": "g.md", "document_type": "reference", "content_base64": "%%%"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(bad, ToolError::InvalidArguments { .. }));

        let converted = d
            .dispatch("convert_rpg_to_freeform", json!({"code": "     C                   MOVE      A             B"}))
            .await
            .unwrap();
        let id = converted.artifact_id.unwrap();
        assert_eq!(converted.references, vec!["guide.md > Guide".to_string()]);

        let fetched = d.dispatch("get_artifact", json!({"artifact_id": id})).await.unwrap();
        assert_eq!(fetched.text, "**FREE\nDCL-S a CHAR(1);");

        let listed = d
            .dispatch("list_artifacts", json!({"artifact_type": "converted_source"}))
            .await
            .unwrap();
        assert!(listed.text.contains("converted_source"));
    }
}
