//! Conversation context: role-tagged fragments under a token budget.
//!
//! Append-only with oldest-first eviction. The first system fragment is
//! pinned and never evicted.

use crate::budget::TRUNCATION_MARKER;
use crate::token::{
    MESSAGE_OVERHEAD_TOKENS, bytes_for_tokens, estimate_message_tokens, estimate_tokens,
    truncate_at_char_boundary,
};
use rpgforge_core::message::{Message, Role};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ConversationContext {
    budget_tokens: usize,
    fragments: Vec<Message>,
    pinned: Option<usize>,
}

impl ConversationContext {
    pub fn new(budget_tokens: usize) -> Self {
        Self {
            budget_tokens,
            fragments: Vec::new(),
            pinned: None,
        }
    }

    pub fn budget_tokens(&self) -> usize {
        self.budget_tokens
    }

    /// Estimated tokens of all fragments, message overhead included.
    pub fn tokens(&self) -> usize {
        self.fragments.iter().map(estimate_message_tokens).sum()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Append a fragment, then evict the oldest unpinned fragments until the
    /// context fits again. Returns how many fragments were evicted.
    ///
    /// If the new fragment alone still does not fit, its text is cut from
    /// the tail; if not even the message overhead fits, it is discarded.
    pub fn push(&mut self, role: Role, text: impl Into<String>) -> usize {
        if role == Role::System && self.pinned.is_none() {
            self.pinned = Some(self.fragments.len());
        }
        self.fragments.push(Message::new(role, text));

        let mut evicted = 0;
        while self.tokens() > self.budget_tokens {
            let newest = self.fragments.len() - 1;
            let victim = (0..newest).find(|&i| Some(i) != self.pinned);
            match victim {
                Some(i) => {
                    self.fragments.remove(i);
                    if let Some(p) = self.pinned.as_mut() {
                        if *p > i {
                            *p -= 1;
                        }
                    }
                    evicted += 1;
                }
                None => {
                    self.shrink_newest();
                    break;
                }
            }
        }

        if evicted > 0 {
            debug!(evicted, tokens = self.tokens(), "Conversation fragments evicted");
        }
        evicted
    }

    fn shrink_newest(&mut self) {
        let others: usize = self.fragments[..self.fragments.len() - 1]
            .iter()
            .map(estimate_message_tokens)
            .sum();
        let available = self
            .budget_tokens
            .saturating_sub(others + MESSAGE_OVERHEAD_TOKENS);
        let marker = estimate_tokens(TRUNCATION_MARKER);

        let newest = self.fragments.len() - 1;
        if available <= marker {
            let dropped = self.fragments.remove(newest);
            if self.pinned == Some(newest) {
                self.pinned = None;
            }
            debug!(role = %dropped.role, "Fragment does not fit; discarded");
            return;
        }

        let message = &mut self.fragments[newest];
        let mut text =
            truncate_at_char_boundary(&message.content, bytes_for_tokens(available - marker))
                .to_string();
        text.push_str(TRUNCATION_MARKER);
        message.content = text;
    }

    pub fn messages(&self) -> &[Message] {
        &self.fragments
    }

    /// The fragments as provider messages, in order.
    pub fn to_messages(&self) -> Vec<Message> {
        self.fragments.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_everything_within_budget() {
        let mut ctx = ConversationContext::new(100);
        ctx.push(Role::System, "You write RPG.");
        ctx.push(Role::User, "Write a procedure.");
        assert_eq!(ctx.len(), 2);
        assert!(ctx.tokens() <= 100);
        assert_eq!(ctx.to_messages()[0].role, Role::System);
    }

    #[test]
    fn evicts_oldest_but_never_the_pinned_system_fragment() {
        let mut ctx = ConversationContext::new(40);
        ctx.push(Role::System, "sys"); // 1 + 4
        ctx.push(Role::User, "a".repeat(40)); // 10 + 4
        ctx.push(Role::Assistant, "b".repeat(40)); // 10 + 4
        assert_eq!(ctx.len(), 3);

        let evicted = ctx.push(Role::User, "c".repeat(40));
        assert_eq!(evicted, 1);
        let messages = ctx.to_messages();
        assert_eq!(messages[0].content, "sys");
        assert!(messages[1].content.starts_with('b'));
        assert!(messages[2].content.starts_with('c'));
        assert!(ctx.tokens() <= 40);
    }

    #[test]
    fn later_system_fragments_are_not_pinned() {
        let mut ctx = ConversationContext::new(30);
        ctx.push(Role::System, "first");
        ctx.push(Role::System, "x".repeat(40));
        ctx.push(Role::User, "y".repeat(40));
        let messages = ctx.to_messages();
        assert_eq!(messages[0].content, "first");
        assert!(messages.iter().all(|m| !m.content.starts_with('x')));
    }

    #[test]
    fn oversized_fragment_is_truncated_to_fit() {
        let mut ctx = ConversationContext::new(200);
        ctx.push(Role::System, "sys");
        ctx.push(Role::User, "z".repeat(10_000));
        assert_eq!(ctx.len(), 2);
        assert!(ctx.tokens() <= 200);
        assert!(ctx.messages()[1].content.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn fragment_is_discarded_when_nothing_fits() {
        let mut ctx = ConversationContext::new(8);
        ctx.push(Role::System, "sys"); // 5 tokens
        ctx.push(Role::User, "too long for what is left");
        assert_eq!(ctx.len(), 1);
        assert!(ctx.tokens() <= 8);
    }
}
