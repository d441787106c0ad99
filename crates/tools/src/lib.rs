//! MCP tools for rpgforge.
//!
//! The tool set is fixed: [`specs::TOOL_SPECS`] describes it for
//! `tools/list`, [`args::ToolInvocation`] validates calls, and
//! [`ToolDispatcher`] answers them, either from the document and artifact
//! stores or through the completion backend.

pub mod args;
pub mod dispatcher;
pub mod ingest;
pub mod prompts;
pub mod specs;

pub use args::ToolInvocation;
pub use dispatcher::{DispatchSettings, DocumentListing, ToolDispatcher, ToolOutput};
pub use ingest::{DocumentIngestor, IngestReport};
pub use specs::{TOOL_SPECS, ToolKind, ToolSpec, definitions, lookup, tool_names};
