//! Token estimation utilities.
//!
//! Uses a byte-based heuristic: ~4 bytes per token, rounded up. The ceiling
//! only has to be respected with high probability, so no real tokenizer is
//! embedded.

use rpgforge_core::message::Message;

/// Per-message overhead for role name and delimiters in the wire format.
pub const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 bytes. Rounds up. Subadditive:
/// `estimate_tokens(a + b) <= estimate_tokens(a) + estimate_tokens(b)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Largest byte count that is guaranteed to stay within `tokens`.
pub fn bytes_for_tokens(tokens: usize) -> usize {
    tokens.saturating_mul(4)
}

pub fn estimate_message_tokens(message: &Message) -> usize {
    MESSAGE_OVERHEAD_TOKENS + estimate_tokens(&message.content)
}

pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

/// Cut `text` to at most `max_bytes`, backing off to a char boundary.
pub fn truncate_at_char_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
