//! The fixed tool table advertised through `tools/list`.

use rpgforge_core::artifact::ArtifactType;
use rpgforge_core::document::DocumentType;
use rpgforge_core::provider::ToolDefinition;
use serde_json::{Value, json};

/// Which artifact, if any, a generative tool persists on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactRule {
    None,
    Fixed(ArtifactType),
    /// The caller picks the type through `artifact_type`.
    FromArguments,
}

/// How a tool is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Answered from the document and artifact stores.
    Local,
    /// Answered by the completion backend, grounded in these document types.
    Generative {
        reference_types: &'static [DocumentType],
        artifact: ArtifactRule,
    },
}

pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: fn() -> Value,
    pub kind: ToolKind,
}

impl ToolSpec {
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: (self.schema)(),
        }
    }

    pub fn is_generative(&self) -> bool {
        matches!(self.kind, ToolKind::Generative { .. })
    }
}

const DOCUMENT_TYPES: &[&str] = &[
    "standards",
    "procedures",
    "best_practices",
    "reference",
    "examples",
    "conversion_guide",
];
const CODE_TYPES: &[&str] = &["sql", "db2", "rpg", "procedure"];

fn document_type_filter() -> Value {
    let mut values = vec!["all"];
    values.extend_from_slice(DOCUMENT_TYPES);
    json!({
        "type": "string",
        "enum": values,
        "description": "Filter by document type",
        "default": "all"
    })
}

fn upload_document_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "filename": { "type": "string", "description": "Name of the file, with a .pdf, .md or .markdown extension" },
            "document_type": { "type": "string", "enum": DOCUMENT_TYPES, "description": "Type of document being uploaded" },
            "description": { "type": "string", "description": "Brief description of the document content" },
            "content": { "type": "string", "description": "Markdown text of the document" },
            "content_base64": { "type": "string", "description": "Base64-encoded file bytes (PDF or Markdown)" }
        },
        "required": ["filename", "document_type"]
    })
}

fn search_references_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": { "type": "string", "description": "Search query for finding relevant documentation" },
            "document_type": document_type_filter(),
            "max_results": { "type": "integer", "description": "Maximum number of results to return", "default": 5, "minimum": 1, "maximum": 50 }
        },
        "required": ["query"]
    })
}

fn extract_code_examples_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "code_type": { "type": "string", "enum": ["all", "sql", "db2", "rpg", "procedure"], "description": "Type of code to extract", "default": "all" },
            "topic": { "type": "string", "description": "Specific topic or functionality to find examples for" }
        }
    })
}

fn find_sections_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "title": { "type": "string", "description": "Case-insensitive substring of the section title" },
            "document_id": { "type": "string", "description": "Limit to one document" },
            "content_type": { "type": "string", "enum": ["text", "code", "table"] },
            "document_name": { "type": "string", "description": "Case-insensitive substring of the document filename" },
            "document_type": document_type_filter(),
            "include_body": { "type": "boolean", "description": "Return section bodies as well as titles", "default": false }
        }
    })
}

fn list_documents_schema() -> Value {
    json!({
        "type": "object",
        "properties": { "document_type": document_type_filter() }
    })
}

fn list_artifacts_schema() -> Value {
    let mut values = vec!["all"];
    values.extend(ArtifactType::ALL.iter().map(|t| t.as_str()));
    json!({
        "type": "object",
        "properties": {
            "artifact_type": { "type": "string", "enum": values, "default": "all" }
        }
    })
}

fn get_artifact_schema() -> Value {
    json!({
        "type": "object",
        "properties": { "artifact_id": { "type": "string", "description": "Id returned when the artifact was created" } },
        "required": ["artifact_id"]
    })
}

fn generate_code_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "requirements": { "type": "string", "description": "Detailed requirements for the code to be generated" },
            "code_type": { "type": "string", "enum": CODE_TYPES, "description": "Type of code to generate" },
            "style_guide": { "type": "string", "description": "Specific style guide or standards to follow", "default": "company_standards" },
            "include_comments": { "type": "boolean", "description": "Include detailed comments in generated code", "default": true }
        },
        "required": ["requirements", "code_type"]
    })
}

fn review_code_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "code": { "type": "string", "description": "Code to be reviewed" },
            "code_type": { "type": "string", "enum": CODE_TYPES, "description": "Type of code being reviewed" },
            "review_level": { "type": "string", "enum": ["basic", "detailed", "comprehensive"], "default": "detailed" }
        },
        "required": ["code", "code_type"]
    })
}

fn explain_code_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "code": { "type": "string", "description": "Code to be explained" },
            "explanation_level": { "type": "string", "enum": ["beginner", "intermediate", "advanced"], "default": "intermediate" },
            "include_references": { "type": "boolean", "description": "Cite the documentation sources used", "default": true }
        },
        "required": ["code"]
    })
}

fn create_artifact_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "artifact_type": { "type": "string", "enum": ["module", "procedure", "package", "complete_program"], "description": "Type of artifact to create" },
            "specifications": { "type": "string", "description": "Detailed specifications for the artifact" },
            "include_documentation": { "type": "boolean", "description": "Include comprehensive documentation", "default": true }
        },
        "required": ["artifact_type", "specifications"]
    })
}

fn convert_rpg_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "code": { "type": "string", "description": "Fixed-form or mixed RPG source" },
            "preserve_comments": { "type": "boolean", "default": true }
        },
        "required": ["code"]
    })
}

fn analyze_rpg_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "code": { "type": "string", "description": "RPG source to analyze" },
            "focus": { "type": "string", "description": "Aspect to concentrate on, e.g. 'error handling' or 'file access'" }
        },
        "required": ["code"]
    })
}

pub static TOOL_SPECS: &[ToolSpec] = &[
    ToolSpec {
        name: "upload_document",
        description: "Upload PDF or Markdown documents containing coding standards and references",
        schema: upload_document_schema,
        kind: ToolKind::Local,
    },
    ToolSpec {
        name: "search_references",
        description: "Search through uploaded documents for specific topics or code patterns",
        schema: search_references_schema,
        kind: ToolKind::Local,
    },
    ToolSpec {
        name: "extract_code_examples",
        description: "Extract code examples and patterns from reference documents",
        schema: extract_code_examples_schema,
        kind: ToolKind::Local,
    },
    ToolSpec {
        name: "find_sections",
        description: "Find titled sections of uploaded documents by title, document or content type",
        schema: find_sections_schema,
        kind: ToolKind::Local,
    },
    ToolSpec {
        name: "list_documents",
        description: "List all uploaded reference documents with metadata",
        schema: list_documents_schema,
        kind: ToolKind::Local,
    },
    ToolSpec {
        name: "list_artifacts",
        description: "List generated artifacts",
        schema: list_artifacts_schema,
        kind: ToolKind::Local,
    },
    ToolSpec {
        name: "get_artifact",
        description: "Fetch the full content of a generated artifact",
        schema: get_artifact_schema,
        kind: ToolKind::Local,
    },
    ToolSpec {
        name: "generate_code",
        description: "Generate new code based on requirements and reference standards",
        schema: generate_code_schema,
        kind: ToolKind::Generative {
            reference_types: &[
                DocumentType::Standards,
                DocumentType::BestPractices,
                DocumentType::Examples,
            ],
            artifact: ArtifactRule::Fixed(ArtifactType::GeneratedCode),
        },
    },
    ToolSpec {
        name: "review_code",
        description: "Review existing code against uploaded standards and best practices",
        schema: review_code_schema,
        kind: ToolKind::Generative {
            reference_types: &[DocumentType::Standards, DocumentType::BestPractices],
            artifact: ArtifactRule::None,
        },
    },
    ToolSpec {
        name: "explain_code",
        description: "Explain code functionality and structure using reference documentation",
        schema: explain_code_schema,
        kind: ToolKind::Generative {
            reference_types: &[
                DocumentType::Reference,
                DocumentType::Standards,
                DocumentType::Examples,
            ],
            artifact: ArtifactRule::None,
        },
    },
    ToolSpec {
        name: "create_artifact",
        description: "Create large code artifacts (files, modules) with proper structure",
        schema: create_artifact_schema,
        kind: ToolKind::Generative {
            reference_types: &[
                DocumentType::Standards,
                DocumentType::BestPractices,
                DocumentType::Examples,
                DocumentType::Procedures,
            ],
            artifact: ArtifactRule::FromArguments,
        },
    },
    ToolSpec {
        name: "convert_rpg_to_freeform",
        description: "Convert fixed-form RPG to fully free-form RPG following the uploaded conversion guides",
        schema: convert_rpg_schema,
        kind: ToolKind::Generative {
            reference_types: &[
                DocumentType::ConversionGuide,
                DocumentType::Standards,
                DocumentType::Examples,
            ],
            artifact: ArtifactRule::Fixed(ArtifactType::ConvertedSource),
        },
    },
    ToolSpec {
        name: "analyze_rpg_syntax",
        description: "Analyze RPG source structure, legacy constructs and modernization opportunities",
        schema: analyze_rpg_schema,
        kind: ToolKind::Generative {
            reference_types: &[DocumentType::ConversionGuide, DocumentType::Reference],
            artifact: ArtifactRule::None,
        },
    },
];

pub fn lookup(name: &str) -> Option<&'static ToolSpec> {
    TOOL_SPECS.iter().find(|s| s.name == name)
}

/// Definitions for `tools/list`, in table order.
pub fn definitions() -> Vec<ToolDefinition> {
    TOOL_SPECS.iter().map(ToolSpec::definition).collect()
}

pub fn tool_names() -> Vec<&'static str> {
    TOOL_SPECS.iter().map(|s| s.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::ToolInvocation;

    #[test]
    fn names_are_unique() {
        let mut names = tool_names();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), TOOL_SPECS.len());
    }

    #[test]
    fn every_tool_parses_its_own_required_fields() {
        for spec in TOOL_SPECS {
            let schema = (spec.schema)();
            assert_eq!(schema["type"], "object", "{}", spec.name);
            // Unknown-tool rejection must never fire for a listed tool.
            let err = ToolInvocation::parse(spec.name, json!({})).err();
            assert!(
                !matches!(err, Some(rpgforge_core::error::ToolError::UnknownTool(_))),
                "{}",
                spec.name
            );
        }
    }

    #[test]
    fn generative_tools_have_reference_types() {
        for spec in TOOL_SPECS {
            if let ToolKind::Generative { reference_types, .. } = spec.kind {
                assert!(!reference_types.is_empty(), "{}", spec.name);
            }
        }
        assert!(lookup("generate_code").unwrap().is_generative());
        assert!(!lookup("list_documents").unwrap().is_generative());
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn definitions_use_mcp_shape() {
        let defs = definitions();
        assert_eq!(defs.len(), TOOL_SPECS.len());
        let json = serde_json::to_value(&defs[0]).unwrap();
        assert!(json.get("inputSchema").is_some());
    }
}
