//! Artifacts: persisted, immutable outputs of generative tool calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// The kind of artifact a tool produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    Module,
    Procedure,
    Package,
    CompleteProgram,
    GeneratedCode,
    ConvertedSource,
}

impl ArtifactType {
    pub const ALL: [ArtifactType; 6] = [
        ArtifactType::Module,
        ArtifactType::Procedure,
        ArtifactType::Package,
        ArtifactType::CompleteProgram,
        ArtifactType::GeneratedCode,
        ArtifactType::ConvertedSource,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Procedure => "procedure",
            Self::Package => "package",
            Self::CompleteProgram => "complete_program",
            Self::GeneratedCode => "generated_code",
            Self::ConvertedSource => "converted_source",
        }
    }
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown artifact type '{s}'"))
    }
}

/// A generated output kept on disk until the retention sweep removes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub artifact_type: ArtifactType,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Name of the tool that produced it
    pub source_tool: String,
}

impl Artifact {
    pub fn new(artifact_type: ArtifactType, content: impl Into<String>, source_tool: &str) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            artifact_type,
            content: content.into(),
            created_at: Utc::now(),
            source_tool: source_tool.to_string(),
        }
    }

    /// On-disk filename, e.g. `artifact_3f2a..._module.txt`.
    pub fn filename(&self) -> String {
        format!("artifact_{}_{}.txt", self.id, self.artifact_type)
    }

    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            id: self.id.clone(),
            artifact_type: self.artifact_type,
            filename: self.filename(),
            size: self.content.len(),
            created_at: self.created_at,
            source_tool: self.source_tool.clone(),
        }
    }
}

/// Artifact metadata returned by list operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub id: String,
    pub artifact_type: ArtifactType,
    pub filename: String,
    pub size: usize,
    pub created_at: DateTime<Utc>,
    pub source_tool: String,
}
