//! Storage and extraction implementations for rpgforge.
//!
//! Stores implement the `DocumentStore` / `ArtifactStore` traits from
//! `rpgforge-core`; extractors implement `TextExtractor`.

pub mod extract;
pub mod file_backend;
pub mod in_memory;

pub use extract::{Extractors, MarkdownExtractor, PdfExtractor};
pub use file_backend::{FileArtifactStore, FileDocumentStore};
pub use in_memory::{InMemoryArtifactStore, InMemoryDocumentStore};
