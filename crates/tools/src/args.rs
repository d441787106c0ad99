//! Typed tool arguments.
//!
//! Every tool has a struct that rejects unknown fields; [`ToolInvocation`]
//! is the tagged union over the fixed tool set. Arguments are parsed and
//! validated here, before the dispatcher touches a store or the model.

use rpgforge_core::artifact::ArtifactType;
use rpgforge_core::document::{DocumentId, DocumentType, SectionContentType};
use rpgforge_core::error::ToolError;
use serde::{Deserialize, Deserializer};

/// Upper bound for `max_results`-style arguments.
const MAX_RESULTS_CAP: usize = 50;

fn default_true() -> bool {
    true
}

fn default_max_results() -> usize {
    5
}

fn default_style_guide() -> String {
    "company_standards".to_string()
}

/// `"all"`, empty or missing mean "no filter".
fn document_type_filter<'de, D>(deserializer: D) -> Result<Option<DocumentType>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    DocumentType::parse_filter(value.as_deref()).map_err(serde::de::Error::custom)
}

fn artifact_type_filter<'de, D>(deserializer: D) -> Result<Option<ArtifactType>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(other) => other.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Languages the generative tools accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeType {
    Sql,
    Db2,
    Rpg,
    Procedure,
}

impl CodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sql => "sql",
            Self::Db2 => "db2",
            Self::Rpg => "rpg",
            Self::Procedure => "procedure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExampleCodeType {
    #[default]
    All,
    Sql,
    Db2,
    Rpg,
    Procedure,
}

impl ExampleCodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Sql => "sql",
            Self::Db2 => "db2",
            Self::Rpg => "rpg",
            Self::Procedure => "procedure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewLevel {
    Basic,
    #[default]
    Detailed,
    Comprehensive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplanationLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

/// The artifact kinds `create_artifact` may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatableArtifact {
    Module,
    Procedure,
    Package,
    CompleteProgram,
}

impl CreatableArtifact {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Procedure => "procedure",
            Self::Package => "package",
            Self::CompleteProgram => "complete program",
        }
    }
}

impl From<CreatableArtifact> for ArtifactType {
    fn from(value: CreatableArtifact) -> Self {
        match value {
            CreatableArtifact::Module => ArtifactType::Module,
            CreatableArtifact::Procedure => ArtifactType::Procedure,
            CreatableArtifact::Package => ArtifactType::Package,
            CreatableArtifact::CompleteProgram => ArtifactType::CompleteProgram,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadDocumentArgs {
    pub filename: String,
    pub document_type: DocumentType,
    #[serde(default)]
    pub description: Option<String>,
    /// Text content (Markdown).
    #[serde(default)]
    pub content: Option<String>,
    /// Raw file bytes, base64-encoded (PDF or Markdown).
    #[serde(default)]
    pub content_base64: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchReferencesArgs {
    pub query: String,
    #[serde(default, deserialize_with = "document_type_filter")]
    pub document_type: Option<DocumentType>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractCodeExamplesArgs {
    #[serde(default)]
    pub code_type: ExampleCodeType,
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FindSectionsArgs {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub document_id: Option<DocumentId>,
    #[serde(default)]
    pub content_type: Option<SectionContentType>,
    #[serde(default)]
    pub document_name: Option<String>,
    #[serde(default, deserialize_with = "document_type_filter")]
    pub document_type: Option<DocumentType>,
    /// Include section bodies, not just titles.
    #[serde(default)]
    pub include_body: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListDocumentsArgs {
    #[serde(default, deserialize_with = "document_type_filter")]
    pub document_type: Option<DocumentType>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListArtifactsArgs {
    #[serde(default, deserialize_with = "artifact_type_filter")]
    pub artifact_type: Option<ArtifactType>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetArtifactArgs {
    pub artifact_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateCodeArgs {
    pub requirements: String,
    pub code_type: CodeType,
    #[serde(default = "default_style_guide")]
    pub style_guide: String,
    #[serde(default = "default_true")]
    pub include_comments: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewCodeArgs {
    pub code: String,
    pub code_type: CodeType,
    #[serde(default)]
    pub review_level: ReviewLevel,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExplainCodeArgs {
    pub code: String,
    #[serde(default)]
    pub explanation_level: ExplanationLevel,
    #[serde(default = "default_true")]
    pub include_references: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateArtifactArgs {
    pub artifact_type: CreatableArtifact,
    pub specifications: String,
    #[serde(default = "default_true")]
    pub include_documentation: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConvertRpgArgs {
    pub code: String,
    #[serde(default = "default_true")]
    pub preserve_comments: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyzeRpgArgs {
    pub code: String,
    #[serde(default)]
    pub focus: Option<String>,
}

/// A validated call to one of the known tools.
#[derive(Debug, Clone)]
pub enum ToolInvocation {
    UploadDocument(UploadDocumentArgs),
    SearchReferences(SearchReferencesArgs),
    ExtractCodeExamples(ExtractCodeExamplesArgs),
    FindSections(FindSectionsArgs),
    ListDocuments(ListDocumentsArgs),
    ListArtifacts(ListArtifactsArgs),
    GetArtifact(GetArtifactArgs),
    GenerateCode(GenerateCodeArgs),
    ReviewCode(ReviewCodeArgs),
    ExplainCode(ExplainCodeArgs),
    CreateArtifact(CreateArtifactArgs),
    ConvertRpgToFreeform(ConvertRpgArgs),
    AnalyzeRpgSyntax(AnalyzeRpgArgs),
}

fn decode<T: for<'de> Deserialize<'de>>(tool: &str, arguments: serde_json::Value) -> Result<T, ToolError> {
    let arguments = match arguments {
        serde_json::Value::Null => serde_json::Value::Object(Default::default()),
        obj @ serde_json::Value::Object(_) => obj,
        other => {
            return Err(ToolError::invalid(
                tool,
                format!("arguments must be a JSON object, got {other}"),
            ));
        }
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::invalid(tool, e.to_string()))
}

fn require_text(tool: &str, field: &str, value: &str) -> Result<(), ToolError> {
    if value.trim().is_empty() {
        return Err(ToolError::invalid(tool, format!("'{field}' must not be empty")));
    }
    Ok(())
}

impl ToolInvocation {
    /// Parse and validate the arguments for `tool`.
    pub fn parse(tool: &str, arguments: serde_json::Value) -> Result<Self, ToolError> {
        let invocation = match tool {
            "upload_document" => Self::UploadDocument(decode(tool, arguments)?),
            "search_references" => Self::SearchReferences(decode(tool, arguments)?),
            "extract_code_examples" => Self::ExtractCodeExamples(decode(tool, arguments)?),
            "find_sections" => Self::FindSections(decode(tool, arguments)?),
            "list_documents" => Self::ListDocuments(decode(tool, arguments)?),
            "list_artifacts" => Self::ListArtifacts(decode(tool, arguments)?),
            "get_artifact" => Self::GetArtifact(decode(tool, arguments)?),
            "generate_code" => Self::GenerateCode(decode(tool, arguments)?),
            "review_code" => Self::ReviewCode(decode(tool, arguments)?),
            "explain_code" => Self::ExplainCode(decode(tool, arguments)?),
            "create_artifact" => Self::CreateArtifact(decode(tool, arguments)?),
            "convert_rpg_to_freeform" => Self::ConvertRpgToFreeform(decode(tool, arguments)?),
            "analyze_rpg_syntax" => Self::AnalyzeRpgSyntax(decode(tool, arguments)?),
            other => return Err(ToolError::UnknownTool(other.to_string())),
        };
        invocation.validate()?;
        Ok(invocation)
    }

    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::UploadDocument(_) => "upload_document",
            Self::SearchReferences(_) => "search_references",
            Self::ExtractCodeExamples(_) => "extract_code_examples",
            Self::FindSections(_) => "find_sections",
            Self::ListDocuments(_) => "list_documents",
            Self::ListArtifacts(_) => "list_artifacts",
            Self::GetArtifact(_) => "get_artifact",
            Self::GenerateCode(_) => "generate_code",
            Self::ReviewCode(_) => "review_code",
            Self::ExplainCode(_) => "explain_code",
            Self::CreateArtifact(_) => "create_artifact",
            Self::ConvertRpgToFreeform(_) => "convert_rpg_to_freeform",
            Self::AnalyzeRpgSyntax(_) => "analyze_rpg_syntax",
        }
    }

    /// Checks serde cannot express: non-empty text, mutually exclusive fields, ranges.
    fn validate(&self) -> Result<(), ToolError> {
        let tool = self.tool_name();
        match self {
            Self::UploadDocument(a) => {
                require_text(tool, "filename", &a.filename)?;
                match (&a.content, &a.content_base64) {
                    (Some(_), None) | (None, Some(_)) => Ok(()),
                    (Some(_), Some(_)) => Err(ToolError::invalid(
                        tool,
                        "provide either 'content' or 'content_base64', not both",
                    )),
                    (None, None) => Err(ToolError::invalid(
                        tool,
                        "one of 'content' or 'content_base64' is required",
                    )),
                }
            }
            Self::SearchReferences(a) => {
                require_text(tool, "query", &a.query)?;
                if a.max_results == 0 || a.max_results > MAX_RESULTS_CAP {
                    return Err(ToolError::invalid(
                        tool,
                        format!("'max_results' must be between 1 and {MAX_RESULTS_CAP}"),
                    ));
                }
                Ok(())
            }
            Self::GetArtifact(a) => require_text(tool, "artifact_id", &a.artifact_id),
            Self::GenerateCode(a) => require_text(tool, "requirements", &a.requirements),
            Self::ReviewCode(a) => require_text(tool, "code", &a.code),
            Self::ExplainCode(a) => require_text(tool, "code", &a.code),
            Self::CreateArtifact(a) => require_text(tool, "specifications", &a.specifications),
            Self::ConvertRpgToFreeform(a) => require_text(tool, "code", &a.code),
            Self::AnalyzeRpgSyntax(a) => require_text(tool, "code", &a.code),
            Self::ExtractCodeExamples(_)
            | Self::FindSections(_)
            | Self::ListDocuments(_)
            | Self::ListArtifacts(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reason(err: ToolError) -> String {
        match err {
            ToolError::InvalidArguments { reason, .. } => reason,
            other => panic!("expected InvalidArguments, got {other:?}"),
        }
    }

    #[test]
    fn unknown_tool_is_reported() {
        let err = ToolInvocation::parse("unknown_tool", json!({})).unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(name) if name == "unknown_tool"));
    }

    #[test]
    fn missing_required_field() {
        let err = ToolInvocation::parse("review_code", json!({"code": "SELECT 1"})).unwrap_err();
        assert!(reason(err).contains("code_type"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = ToolInvocation::parse(
            "explain_code",
            json!({"code": "DCL-S x INT(10);", "verbosity": "high"}),
        )
        .unwrap_err();
        assert!(reason(err).contains("verbosity"));
    }

    #[test]
    fn empty_text_is_rejected() {
        let err = ToolInvocation::parse(
            "generate_code",
            json!({"requirements": "   ", "code_type": "rpg"}),
        )
        .unwrap_err();
        assert!(reason(err).contains("requirements"));
    }

    #[test]
    fn enum_values_are_checked() {
        let err = ToolInvocation::parse("review_code", json!({"code": "x", "code_type": "cobol"}))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn defaults_are_applied() {
        match ToolInvocation::parse("generate_code", json!({"requirements": "r", "code_type": "sql"}))
            .unwrap()
        {
            ToolInvocation::GenerateCode(a) => {
                assert_eq!(a.style_guide, "company_standards");
                assert!(a.include_comments);
                assert_eq!(a.code_type, CodeType::Sql);
            }
            other => panic!("unexpected {other:?}"),
        }

        match ToolInvocation::parse("search_references", json!({"query": "monitor"})).unwrap() {
            ToolInvocation::SearchReferences(a) => {
                assert_eq!(a.max_results, 5);
                assert!(a.document_type.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn document_type_filter_accepts_all() {
        match ToolInvocation::parse("list_documents", json!({"document_type": "all"})).unwrap() {
            ToolInvocation::ListDocuments(a) => assert!(a.document_type.is_none()),
            other => panic!("unexpected {other:?}"),
        }
        match ToolInvocation::parse("list_documents", json!({"document_type": "examples"})).unwrap() {
            ToolInvocation::ListDocuments(a) => {
                assert_eq!(a.document_type, Some(DocumentType::Examples))
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(ToolInvocation::parse("list_documents", json!({"document_type": "novels"})).is_err());
    }

    #[test]
    fn null_arguments_mean_empty_object() {
        assert!(ToolInvocation::parse("list_artifacts", serde_json::Value::Null).is_ok());
        assert!(ToolInvocation::parse("list_artifacts", json!([1, 2])).is_err());
    }

    #[test]
    fn upload_needs_exactly_one_content_field() {
        let base = json!({"filename": "a.md", "document_type": "standards"});
        assert!(reason(ToolInvocation::parse("upload_document", base).unwrap_err()).contains("required"));

        let both = json!({
            "filename": "a.md",
            "document_type": "standards",
            "content": "# A",
            "content_base64": "IyBB"
        });
        assert!(reason(ToolInvocation::parse("upload_document", both).unwrap_err()).contains("not both"));
    }

    #[test]
    fn max_results_is_bounded() {
        let err = ToolInvocation::parse("search_references", json!({"query": "x", "max_results": 0}))
            .unwrap_err();
        assert!(reason(err).contains("max_results"));
    }

    #[test]
    fn create_artifact_maps_to_artifact_type() {
        match ToolInvocation::parse(
            "create_artifact",
            json!({"artifact_type": "complete_program", "specifications": "order entry"}),
        )
        .unwrap()
        {
            ToolInvocation::CreateArtifact(a) => {
                assert_eq!(ArtifactType::from(a.artifact_type), ArtifactType::CompleteProgram)
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
