//! # rpgforge Core
//!
//! Domain types, traits, and error definitions for the rpgforge MCP server.
//! This crate has **zero framework dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! Every subsystem with more than one implementation (completion backend,
//! document store, artifact store, text extractor) is a trait here.

pub mod artifact;
pub mod document;
pub mod error;
pub mod extract;
pub mod message;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use artifact::{Artifact, ArtifactSummary, ArtifactType};
pub use document::{
    Document, DocumentId, DocumentSummary, DocumentType, ImageRef, Section, SectionContentType,
};
pub use error::{Error, ProviderError, Result, StoreError, ToolError, UploadError};
pub use extract::{ExtractedContent, TextExtractor};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use store::{ArtifactStore, DocumentStore};
