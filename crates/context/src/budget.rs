//! Context budgeting: decides which prompt parts reach the model and how
//! much of each.
//!
//! Parts carry a priority rank: **lower value = more important**. They are
//! visited in ascending rank (ties keep input order). A part that fits goes
//! in whole. A part that does not fit is cut from the tail when at least
//! `min_part_tokens` remain; otherwise it is dropped and later, smaller
//! parts are still tried.
//!
//! # Determinism
//!
//! The outcome depends only on the parts, their order and the limit.

use crate::token::{bytes_for_tokens, estimate_tokens, truncate_at_char_boundary};
use serde::Serialize;
use tracing::debug;

/// Appended to a part that was cut short. Counted against the budget.
pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated due to length limitations...]";

/// Joins included parts in [`FitOutcome::compose`].
pub const PART_SEPARATOR: &str = "\n\n";

/// Budget charged for each separator; `estimate_tokens` is subadditive, so
/// this bounds the composed text.
const SEPARATOR_TOKENS: usize = 1;

pub const DEFAULT_MIN_PART_TOKENS: usize = 256;

/// One candidate piece of prompt text.
#[derive(Debug, Clone)]
pub struct ContextPart {
    pub priority: u32,
    pub label: String,
    pub text: String,
}

impl ContextPart {
    pub fn new(priority: u32, label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            priority,
            label: label.into(),
            text: text.into(),
        }
    }
}

/// A part as it was admitted into the prompt.
#[derive(Debug, Clone, Serialize)]
pub struct FittedPart {
    pub priority: u32,
    pub label: String,
    pub text: String,
    pub tokens: usize,
    pub truncated: bool,
}

/// The result of [`ContextBudgeter::fit`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct FitOutcome {
    /// Included parts, in visit order.
    pub parts: Vec<FittedPart>,
    /// Labels of parts that did not fit at all.
    pub dropped: Vec<String>,
    /// Budget charged, separators included. Never above `limit_tokens`.
    pub used_tokens: usize,
    pub limit_tokens: usize,
}

impl FitOutcome {
    /// The included parts joined by blank lines.
    pub fn compose(&self) -> String {
        self.parts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(PART_SEPARATOR)
    }

    /// Labels of parts that were cut short.
    pub fn truncated(&self) -> Vec<String> {
        self.parts
            .iter()
            .filter(|p| p.truncated)
            .map(|p| p.label.clone())
            .collect()
    }

    pub fn is_included(&self, label: &str) -> bool {
        self.parts.iter().any(|p| p.label == label)
    }
}

/// Greedy, priority-ordered fitting of prompt parts under a token limit.
#[derive(Debug, Clone, Copy)]
pub struct ContextBudgeter {
    min_part_tokens: usize,
}

impl Default for ContextBudgeter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_PART_TOKENS)
    }
}

impl ContextBudgeter {
    /// `min_part_tokens` is the smallest remaining budget worth truncating
    /// a part into; below it the part is dropped instead.
    pub fn new(min_part_tokens: usize) -> Self {
        // A truncated part must have room for at least the marker plus some text.
        let floor = estimate_tokens(TRUNCATION_MARKER) + 1;
        Self {
            min_part_tokens: min_part_tokens.max(floor),
        }
    }

    pub fn min_part_tokens(&self) -> usize {
        self.min_part_tokens
    }

    pub fn fit(&self, parts: &[ContextPart], limit_tokens: usize) -> FitOutcome {
        let mut order: Vec<&ContextPart> = parts.iter().collect();
        order.sort_by_key(|p| p.priority);

        let mut outcome = FitOutcome {
            limit_tokens,
            ..Default::default()
        };

        for part in order {
            if part.text.is_empty() {
                continue;
            }

            let separator = if outcome.parts.is_empty() { 0 } else { SEPARATOR_TOKENS };
            let remaining = limit_tokens.saturating_sub(outcome.used_tokens + separator);
            let tokens = estimate_tokens(&part.text);

            if tokens <= remaining {
                outcome.used_tokens += separator + tokens;
                outcome.parts.push(FittedPart {
                    priority: part.priority,
                    label: part.label.clone(),
                    text: part.text.clone(),
                    tokens,
                    truncated: false,
                });
                continue;
            }

            if remaining >= self.min_part_tokens {
                let keep = bytes_for_tokens(remaining - estimate_tokens(TRUNCATION_MARKER));
                let mut text = truncate_at_char_boundary(&part.text, keep).to_string();
                text.push_str(TRUNCATION_MARKER);
                let tokens = estimate_tokens(&text);

                debug!(
                    label = %part.label,
                    original_tokens = estimate_tokens(&part.text),
                    kept_tokens = tokens,
                    "Context part truncated"
                );
                outcome.used_tokens += separator + tokens;
                outcome.parts.push(FittedPart {
                    priority: part.priority,
                    label: part.label.clone(),
                    text,
                    tokens,
                    truncated: true,
                });
                continue;
            }

            debug!(label = %part.label, tokens, remaining, "Context part dropped");
            outcome.dropped.push(part.label.clone());
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budgeter() -> ContextBudgeter {
        ContextBudgeter::default()
    }

    #[test]
    fn everything_fits_when_small() {
        let parts = vec![
            ContextPart::new(0, "request", "generate a procedure"),
            ContextPart::new(2, "naming", "use prefixes"),
        ];
        let outcome = budgeter().fit(&parts, 1000);
        assert_eq!(outcome.parts.len(), 2);
        assert!(outcome.dropped.is_empty());
        assert_eq!(outcome.compose(), "generate a procedure\n\nuse prefixes");
    }

    #[test]
    fn higher_priority_part_is_kept_over_lower() {
        let parts = vec![
            ContextPart::new(1, "A", "A".repeat(50_000)),
            ContextPart::new(2, "B", "B".repeat(50_000)),
        ];
        let outcome = budgeter().fit(&parts, 1000);
        let composed = outcome.compose();

        assert!(estimate_tokens(&composed) <= 1000);
        assert!(outcome.used_tokens <= 1000);
        assert!(composed.starts_with("AAAA"));
        assert!(!composed.contains('B'));
        assert_eq!(outcome.truncated(), vec!["A".to_string()]);
        assert_eq!(outcome.dropped, vec!["B".to_string()]);
    }

    #[test]
    fn visits_by_rank_not_input_order() {
        let parts = vec![
            ContextPart::new(5, "low", "L".repeat(4000)),
            ContextPart::new(0, "high", "H".repeat(2000)),
        ];
        let outcome = budgeter().fit(&parts, 600);
        assert_eq!(outcome.parts[0].label, "high");
        assert!(!outcome.parts[0].truncated);
        assert!(outcome.is_included("high"));
    }

    #[test]
    fn ties_keep_input_order() {
        let parts = vec![
            ContextPart::new(2, "first", "one"),
            ContextPart::new(2, "second", "two"),
            ContextPart::new(2, "third", "three"),
        ];
        let labels: Vec<String> = budgeter()
            .fit(&parts, 100)
            .parts
            .into_iter()
            .map(|p| p.label)
            .collect();
        assert_eq!(labels, vec!["first", "second", "third"]);
    }

    #[test]
    fn small_later_parts_still_fit_after_a_drop() {
        let parts = vec![
            ContextPart::new(0, "payload", "P".repeat(3000)), // 750 tokens
            ContextPart::new(1, "big", "X".repeat(4000)),     // 1000 tokens, 249 left
            ContextPart::new(2, "small", "S".repeat(40)),     // 10 tokens
        ];
        let outcome = budgeter().fit(&parts, 1000);
        assert_eq!(outcome.dropped, vec!["big".to_string()]);
        assert!(outcome.is_included("small"));
        assert!(outcome.used_tokens <= 1000);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let parts = vec![ContextPart::new(0, "multibyte", "é".repeat(5000))];
        let outcome = budgeter().fit(&parts, 300);
        let text = &outcome.parts[0].text;
        assert!(text.ends_with(TRUNCATION_MARKER));
        assert!(estimate_tokens(&outcome.compose()) <= 300);
    }

    #[test]
    fn never_exceeds_the_limit() {
        let sizes = [0usize, 1, 3, 4, 5, 63, 64, 255, 1024, 1025, 4096, 9999, 40_000];
        let min = budgeter().min_part_tokens();
        for limit in [min, min + 1, 300, 511, 1000, 4096, 128_000] {
            for rotate in 0..sizes.len() {
                let parts: Vec<ContextPart> = sizes
                    .iter()
                    .cycle()
                    .skip(rotate)
                    .take(sizes.len())
                    .enumerate()
                    .map(|(i, &n)| ContextPart::new((i % 4) as u32, format!("p{i}"), "x".repeat(n)))
                    .collect();
                let outcome = budgeter().fit(&parts, limit);
                assert!(outcome.used_tokens <= limit, "limit {limit}, rotate {rotate}");
                assert!(
                    estimate_tokens(&outcome.compose()) <= limit,
                    "limit {limit}, rotate {rotate}"
                );
            }
        }
    }

    #[test]
    fn is_deterministic() {
        let parts = vec![
            ContextPart::new(1, "a", "alpha ".repeat(900)),
            ContextPart::new(0, "b", "beta ".repeat(300)),
            ContextPart::new(1, "c", "gamma ".repeat(700)),
        ];
        let first = budgeter().fit(&parts, 1200);
        let second = budgeter().fit(&parts, 1200);
        assert_eq!(first.compose(), second.compose());
        assert_eq!(first.dropped, second.dropped);
    }

    #[test]
    fn tiny_min_part_is_raised_to_fit_the_marker() {
        let b = ContextBudgeter::new(1);
        assert!(b.min_part_tokens() > estimate_tokens(TRUNCATION_MARKER));
        let outcome = b.fit(&[ContextPart::new(0, "x", "x".repeat(1000))], 20);
        assert!(outcome.used_tokens <= 20);
    }
}
