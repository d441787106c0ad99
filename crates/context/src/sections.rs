//! Section indexing: splits document text into titled sections and looks
//! them up by title, document and content type.
//!
//! Headings are Markdown ATX lines (`#` .. `######`, outside fenced code).
//! Text extracted from PDFs has no markup, so PDF documents additionally
//! treat numbered lines (`2.1 Scope`) and short ALL-CAPS lines as headings.
//! Text before the first heading does not belong to any section.

use crate::analyzer::extract_code_blocks;
use once_cell::sync::Lazy;
use regex::Regex;
use rpgforge_core::document::{Document, DocumentId, DocumentType, Section, SectionContentType};
use serde::Serialize;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::debug;

static ATX_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}#{1,6}[ \t]+(.+?)(?:[ \t]+#+)?[ \t]*$").unwrap());

static NUMBERED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}(?:\.\d{1,2})*\.?[ \t]+[A-Z]").unwrap());

/// Statement openers that mark a line as code rather than prose or a heading.
const CODE_KEYWORDS: &[&str] = &[
    "DCL-", "CTL-OPT", "END-", "EXEC SQL", "SELECT ", "INSERT ", "UPDATE ", "DELETE ",
    "CREATE ", "IF ", "ELSE", "ENDIF", "FOR ", "ENDFOR", "DOW ", "DOU ", "ENDDO", "MONITOR",
    "ON-ERROR", "ENDMON", "BEGSR", "ENDSR", "EXSR ", "CHAIN", "SETLL", "READ", "WRITE ",
    "RETURN", "EVAL ", "CALLP",
];

fn looks_like_code(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return false;
    }
    trimmed.ends_with(';')
        || trimmed.starts_with("//")
        || trimmed.starts_with("--")
        || trimmed.starts_with("**FREE")
        || CODE_KEYWORDS.iter().any(|k| trimmed.starts_with(k))
}

/// Heading text of an ATX line, if it is one.
fn atx_heading(line: &str) -> Option<&str> {
    ATX_HEADING
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|t| !t.is_empty())
}

/// Heading text of a heuristic PDF heading line, if it is one.
fn pdf_heading(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let chars = trimmed.chars().count();
    if !(3..=80).contains(&chars) || looks_like_code(trimmed) {
        return None;
    }

    if NUMBERED_HEADING.is_match(trimmed) {
        return Some(trimmed);
    }

    let letters = trimmed.chars().filter(|c| c.is_alphabetic()).count();
    let has_lower = trimmed.chars().any(|c| c.is_lowercase());
    if letters >= 3 && !has_lower && !trimmed.starts_with("---") {
        return Some(trimmed);
    }
    None
}

fn fence_marker(line: &str) -> Option<char> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("```") {
        Some('`')
    } else if trimmed.starts_with("~~~") {
        Some('~')
    } else {
        None
    }
}

/// Split text into `(title, body)` pairs, one per heading, in order.
pub fn split_sections(text: &str, pdf_heuristics: bool) -> Vec<(String, String)> {
    let mut sections = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;
    let mut open_fence: Option<char> = None;

    for line in text.lines() {
        if let Some(marker) = fence_marker(line) {
            match open_fence {
                None => open_fence = Some(marker),
                Some(open) if open == marker => open_fence = None,
                Some(_) => {}
            }
        } else if open_fence.is_none() {
            let heading = atx_heading(line).or_else(|| {
                if pdf_heuristics {
                    pdf_heading(line)
                } else {
                    None
                }
            });
            if let Some(title) = heading {
                if let Some(done) = current.take() {
                    sections.push(finish(done));
                }
                current = Some((title.to_string(), Vec::new()));
                continue;
            }
        }

        if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }

    if let Some(done) = current.take() {
        sections.push(finish(done));
    }
    sections
}

fn finish((title, lines): (String, Vec<&str>)) -> (String, String) {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    let body = match (start, end) {
        (Some(s), Some(e)) => lines[s..=e].join("\n"),
        _ => String::new(),
    };
    (title, body)
}

/// Classify a section body as code, table or prose.
pub fn classify(body: &str) -> SectionContentType {
    if body.lines().any(|l| fence_marker(l).is_some()) {
        return SectionContentType::Code;
    }

    let lines: Vec<&str> = body.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return SectionContentType::Text;
    }

    let table_lines = lines.iter().filter(|l| l.trim_start().starts_with('|')).count();
    if table_lines * 2 > lines.len() {
        return SectionContentType::Table;
    }

    let code_lines = lines.iter().filter(|l| looks_like_code(l)).count();
    if code_lines * 2 > lines.len() {
        return SectionContentType::Code;
    }

    SectionContentType::Text
}

/// Split a document into sections with `order_index` 0, 1, 2, ...
pub fn index(document: &Document) -> Vec<Section> {
    let pdf = document.page_count.is_some()
        || document.filename.to_ascii_lowercase().ends_with(".pdf");

    split_sections(&document.raw_text, pdf)
        .into_iter()
        .enumerate()
        .map(|(order_index, (title, body_text))| Section {
            document_id: document.id.clone(),
            content_type: classify(&body_text),
            title,
            body_text,
            order_index,
        })
        .collect()
}

/// A section together with the document it came from.
#[derive(Debug, Clone, Serialize)]
pub struct LabeledSection {
    pub filename: String,
    pub document_type: DocumentType,
    #[serde(flatten)]
    pub section: Section,
}

/// Filters for [`SectionIndex::find`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SectionQuery {
    /// Case-insensitive substring of the section title.
    pub title: Option<String>,
    pub document_id: Option<DocumentId>,
    pub content_type: Option<SectionContentType>,
    /// Case-insensitive substring of the document filename.
    pub document_name: Option<String>,
    pub document_type: Option<DocumentType>,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

struct IndexedDocument {
    document_id: DocumentId,
    filename: String,
    document_type: DocumentType,
    sections: Vec<Section>,
    code_examples: usize,
}

impl IndexedDocument {
    fn matches_document(&self, query: &SectionQuery) -> bool {
        query.document_id.as_ref().is_none_or(|id| &self.document_id == id)
            && query.document_type.is_none_or(|t| self.document_type == t)
            && query
                .document_name
                .as_deref()
                .is_none_or(|name| contains_ci(&self.filename, name))
    }
}

fn matches_section(section: &Section, query: &SectionQuery) -> bool {
    query.content_type.is_none_or(|t| section.content_type == t)
        && query
            .title
            .as_deref()
            .is_none_or(|title| contains_ci(&section.title, title))
}

/// Sections of every stored document, in upload order.
///
/// Rebuilt from the document store at startup; updated on every upload.
#[derive(Default)]
pub struct SectionIndex {
    documents: RwLock<Vec<IndexedDocument>>,
}

impl SectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every document, in the given order.
    pub fn build(documents: &[Document]) -> Self {
        let entries = documents
            .iter()
            .map(|d| IndexedDocument {
                document_id: d.id.clone(),
                filename: d.filename.clone(),
                document_type: d.document_type,
                sections: index(d),
                code_examples: extract_code_blocks(&d.raw_text).len(),
            })
            .collect::<Vec<_>>();
        debug!(
            documents = entries.len(),
            sections = entries.iter().map(|e| e.sections.len()).sum::<usize>(),
            "Section index built"
        );
        Self {
            documents: RwLock::new(entries),
        }
    }

    /// Add (or replace) a document's sections and its code-example count.
    pub async fn insert(&self, document: &Document, sections: Vec<Section>, code_examples: usize) {
        let mut documents = self.documents.write().await;
        let entry = IndexedDocument {
            document_id: document.id.clone(),
            filename: document.filename.clone(),
            document_type: document.document_type,
            sections,
            code_examples,
        };
        match documents.iter_mut().find(|e| e.document_id == document.id) {
            Some(existing) => *existing = entry,
            None => documents.push(entry),
        }
    }

    /// Drop a document's sections. Returns whether it was indexed.
    pub async fn remove(&self, document_id: &DocumentId) -> bool {
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|e| &e.document_id != document_id);
        documents.len() < before
    }

    /// Sections matching every set filter.
    pub async fn find(&self, query: &SectionQuery) -> Vec<Section> {
        self.find_labeled(query)
            .await
            .into_iter()
            .map(|l| l.section)
            .collect()
    }

    /// Like [`find`](Self::find), keeping the source document's name and type.
    pub async fn find_labeled(&self, query: &SectionQuery) -> Vec<LabeledSection> {
        let documents = self.documents.read().await;
        documents
            .iter()
            .filter(|d| d.matches_document(query))
            .flat_map(|d| {
                d.sections
                    .iter()
                    .filter(|s| matches_section(s, query))
                    .map(|s| LabeledSection {
                        filename: d.filename.clone(),
                        document_type: d.document_type,
                        section: s.clone(),
                    })
            })
            .collect()
    }

    pub async fn section_count(&self, document_id: &DocumentId) -> usize {
        self.documents
            .read()
            .await
            .iter()
            .find(|e| &e.document_id == document_id)
            .map_or(0, |e| e.sections.len())
    }

    /// Code examples counted when the document was indexed.
    pub async fn code_example_count(&self, document_id: &DocumentId) -> usize {
        self.documents
            .read()
            .await
            .iter()
            .find(|e| &e.document_id == document_id)
            .map_or(0, |e| e.code_examples)
    }

    /// Total sections across all documents.
    pub async fn len(&self) -> usize {
        self.documents
            .read()
            .await
            .iter()
            .map(|e| e.sections.len())
            .sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "into", "are", "use", "using", "code",
    "all", "any", "not", "should", "must", "will", "can", "has", "have", "its", "was", "were",
];

/// Lower-cased query terms worth matching on, deduplicated, in query order.
fn query_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= 3 && !STOPWORDS.contains(&t.as_str()))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Title hits count three times as much as body hits.
const TITLE_WEIGHT: usize = 3;
/// Body hits per term stop counting past this, so long sections don't win on bulk.
const BODY_HIT_CAP: usize = 10;

fn score(terms: &[String], section: &Section) -> usize {
    let title = section.title.to_lowercase();
    let body = section.body_text.to_lowercase();
    terms
        .iter()
        .map(|t| {
            title.matches(t.as_str()).count() * TITLE_WEIGHT
                + body.matches(t.as_str()).count().min(BODY_HIT_CAP)
        })
        .sum()
}

/// Order candidates by keyword overlap with `query_text`, best first.
///
/// Ties keep their input order. Sections with no overlap are kept after the
/// scored ones; `limit` caps the result.
pub fn rank(query_text: &str, candidates: Vec<LabeledSection>, limit: usize) -> Vec<LabeledSection> {
    let terms = query_terms(query_text);
    let mut scored: Vec<(usize, LabeledSection)> = candidates
        .into_iter()
        .map(|c| (score(&terms, &c.section), c))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().take(limit).map(|(_, c)| c).collect()
}
