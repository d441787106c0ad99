//! Reference documents and the sections derived from them.
//!
//! A `Document` is created once per upload event and never mutated. Sections
//! are derived from its text by the indexer and can always be recomputed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What kind of reference material a document holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Standards,
    Procedures,
    BestPractices,
    Reference,
    Examples,
    ConversionGuide,
}

impl DocumentType {
    pub const ALL: [DocumentType; 6] = [
        DocumentType::Standards,
        DocumentType::Procedures,
        DocumentType::BestPractices,
        DocumentType::Reference,
        DocumentType::Examples,
        DocumentType::ConversionGuide,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standards => "standards",
            Self::Procedures => "procedures",
            Self::BestPractices => "best_practices",
            Self::Reference => "reference",
            Self::Examples => "examples",
            Self::ConversionGuide => "conversion_guide",
        }
    }

    /// Parse an optional type filter where `"all"` (or nothing) means no filter.
    pub fn parse_filter(value: Option<&str>) -> Result<Option<Self>, String> {
        match value.map(str::trim) {
            None | Some("") | Some("all") => Ok(None),
            Some(other) => other.parse().map(Some),
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown document type '{s}'"))
    }
}

/// An image found while extracting a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRef {
    pub filename: String,
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// An uploaded reference document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,

    /// Original upload filename
    pub filename: String,

    /// Extracted plain text
    pub raw_text: String,

    pub document_type: DocumentType,

    #[serde(default)]
    pub description: String,

    pub upload_time: DateTime<Utc>,

    /// Size of the uploaded file in bytes
    #[serde(default)]
    pub size_bytes: usize,

    /// Page count (PDF only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageRef>,
}

impl Document {
    /// Build a freshly uploaded document with a new id.
    pub fn new(
        filename: impl Into<String>,
        raw_text: impl Into<String>,
        document_type: DocumentType,
    ) -> Self {
        let raw_text = raw_text.into();
        Self {
            id: DocumentId::new(),
            filename: filename.into(),
            size_bytes: raw_text.len(),
            raw_text,
            document_type,
            description: String::new(),
            upload_time: Utc::now(),
            page_count: None,
            images: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Metadata view without the body.
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id.clone(),
            filename: self.filename.clone(),
            document_type: self.document_type,
            description: self.description.clone(),
            upload_time: self.upload_time,
            size_bytes: self.size_bytes,
            page_count: self.page_count,
            image_count: self.images.len(),
        }
    }
}

/// Document metadata returned by list operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub filename: String,
    pub document_type: DocumentType,
    pub description: String,
    pub upload_time: DateTime<Utc>,
    pub size_bytes: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    pub image_count: usize,
}

/// How the body of a section reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionContentType {
    Text,
    Code,
    Table,
}

impl SectionContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Code => "code",
            Self::Table => "table",
        }
    }
}

impl FromStr for SectionContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "code" => Ok(Self::Code),
            "table" => Ok(Self::Table),
            other => Err(format!("unknown section content type '{other}'")),
        }
    }
}

/// A titled subdivision of a document's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Back-reference to the owning document
    pub document_id: DocumentId,
    pub title: String,
    pub content_type: SectionContentType,
    pub body_text: String,
    /// Position within the document, strictly increasing
    pub order_index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_type_parses_case_insensitively() {
        assert_eq!("Standards".parse::<DocumentType>().unwrap(), DocumentType::Standards);
        assert_eq!(
            "conversion_guide".parse::<DocumentType>().unwrap(),
            DocumentType::ConversionGuide
        );
        assert!("manuals".parse::<DocumentType>().is_err());
    }

    #[test]
    fn all_means_no_filter() {
        assert_eq!(DocumentType::parse_filter(Some("all")).unwrap(), None);
        assert_eq!(DocumentType::parse_filter(None).unwrap(), None);
        assert_eq!(
            DocumentType::parse_filter(Some("examples")).unwrap(),
            Some(DocumentType::Examples)
        );
    }

    #[test]
    fn each_upload_gets_a_fresh_id() {
        let a = Document::new("guide.md", "# Intro", DocumentType::Reference);
        let b = Document::new("guide.md", "# Intro", DocumentType::Reference);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn summary_omits_body() {
        let doc = Document::new("naming.md", "## Naming\nUse prefixes.", DocumentType::Standards)
            .with_description("Naming rules");
        let json = serde_json::to_string(&doc.summary()).unwrap();
        assert!(json.contains("naming.md"));
        assert!(json.contains("standards"));
        assert!(!json.contains("Use prefixes"));
    }
}
