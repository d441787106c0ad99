//! Context assembly for rpgforge tool calls.
//!
//! Everything between "a tool was called" and "a prompt goes to the model":
//! splitting documents into sections, picking the relevant ones, and fitting
//! them under the token ceiling.

pub mod analyzer;
pub mod budget;
pub mod conversation;
pub mod search;
pub mod sections;
pub mod token;

pub use analyzer::{CodeBlock, CodeKind, QualityReport, RpgFormat, RpgProfile};
pub use budget::{ContextBudgeter, ContextPart, FitOutcome, FittedPart};
pub use conversation::ConversationContext;
pub use search::{SearchHit, search_documents};
pub use sections::{LabeledSection, SectionIndex, SectionQuery, index, rank};
pub use token::estimate_tokens;
