//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~3.5 characters per token, tuned for
//! mixed-language text. Counting is by Unicode scalar value so CJK text is
//! not over-counted the way a byte length would.

use strata_core::message::Message;

/// Characters per token.
pub const CHARS_PER_TOKEN: f64 = 3.5;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 3.5 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    let chars = text.chars().count() as f64;
    (chars / CHARS_PER_TOKEN).ceil() as usize
}

/// Estimate tokens for a single message's content.
pub fn estimate_message_tokens(message: &Message) -> usize {
    estimate_tokens(&message.content)
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}
