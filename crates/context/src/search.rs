//! Plain-text reference search over stored documents.

use rpgforge_core::document::{Document, DocumentId, DocumentType};
use serde::Serialize;

/// Excerpts reported per matching document.
const MAX_EXCERPTS: usize = 2;
/// Characters kept per excerpt.
const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub document_id: DocumentId,
    pub filename: String,
    pub document_type: DocumentType,
    pub description: String,
    pub excerpts: Vec<String>,
}

fn excerpt(sentence: &str) -> String {
    let trimmed = sentence.trim();
    let mut text: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    text.push_str("...");
    text
}

/// Case-insensitive substring search. Documents are reported in the order
/// given, each with up to two sentence excerpts containing the query.
///
/// An empty or whitespace-only query matches nothing.
pub fn search_documents(documents: &[Document], query: &str, max_results: usize) -> Vec<SearchHit> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    documents
        .iter()
        .filter_map(|doc| {
            let haystack = doc.raw_text.to_lowercase();
            if !haystack.contains(&needle) {
                return None;
            }
            let excerpts = haystack
                .split('.')
                .filter(|sentence| sentence.contains(&needle))
                .take(MAX_EXCERPTS)
                .map(excerpt)
                .collect();
            Some(SearchHit {
                document_id: doc.id.clone(),
                filename: doc.filename.clone(),
                document_type: doc.document_type,
                description: doc.description.clone(),
                excerpts,
            })
        })
        .take(max_results)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> Vec<Document> {
        vec![
            Document::new(
                "standards.md",
                "Use MONITOR blocks. Every program needs a MONITOR around I/O. Avoid GOTO. Monitor groups nest.",
                DocumentType::Standards,
            )
            .with_description("Shop standards"),
            Document::new("guide.md", "Convert C specs to free form.", DocumentType::ConversionGuide),
            Document::new("more.md", "monitor everything.", DocumentType::Examples),
        ]
    }

    #[test]
    fn finds_case_insensitively_with_two_excerpts() {
        let hits = search_documents(&docs(), "Monitor", 5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].filename, "standards.md");
        assert_eq!(hits[0].description, "Shop standards");
        assert_eq!(
            hits[0].excerpts,
            vec![
                "use monitor blocks...".to_string(),
                "every program needs a monitor around i/o...".to_string(),
            ]
        );
    }

    #[test]
    fn respects_max_results() {
        assert_eq!(search_documents(&docs(), "monitor", 1).len(), 1);
    }

    #[test]
    fn excerpts_are_capped() {
        let long = format!("{} needle {}", "x".repeat(300), "y".repeat(300));
        let doc = Document::new("long.md", long, DocumentType::Reference);
        let hits = search_documents(&[doc], "needle", 5);
        assert_eq!(hits[0].excerpts[0].chars().count(), EXCERPT_CHARS + 3);
    }

    #[test]
    fn empty_query_matches_nothing() {
        assert!(search_documents(&docs(), "  ", 5).is_empty());
        assert!(search_documents(&docs(), "nonexistent phrase", 5).is_empty());
    }
}
