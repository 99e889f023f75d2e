//! Multi-factor importance scoring for conversation messages.
//!
//! Every message gets a score in `[0, 1]` computed from its position in
//! history, its content, its role, and its tag. Scores are recomputed on
//! every window build because they depend on the message's position
//! relative to the rest of history.
//!
//! | Factor | Effect |
//! |--------|--------|
//! | Base | 0.5 |
//! | Recency | + (i / n) × 0.3 |
//! | Age | − (n − i) × decay_rate |
//! | Tool result marker | + 0.2 |
//! | Tool call marker | + 0.15 |
//! | Scheduled-job suggestion | + 0.2 |
//! | High-importance keyword (any) | + 0.1 |
//! | > 200 tokens / > 500 tokens | + 0.1 / + 0.1 more |
//! | < 10 tokens | − 0.15 |
//! | User question | + 0.05 |
//! | Tagged "analysis" | + 0.15 |
//! | Pinned | = 1.0 |

use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use strata_core::message::{Message, Role};

use crate::token;

/// `[TOOL:<name> <args>]`
pub(crate) static TOOL_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[TOOL:\s*([A-Za-z0-9_.-]+)(?:\s+([^\]]*))?\]").expect("tool call pattern")
});

/// `[TOOL_RESULT ...]` or `<tool_result>`
pub(crate) static TOOL_RESULT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[TOOL_RESULT\b|<tool_result>").expect("tool result pattern")
});

/// `[CRON_SUGGEST ...]` / `[CRON_SUGGESTION ...]`
pub(crate) static CRON_SUGGEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[CRON_SUGGEST(?:ION)?\b").expect("cron suggestion pattern")
});

/// Decision, memory, error, credential, deadline, and architecture vocabulary.
pub(crate) static KEYWORD_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(decided|decision|agreed|conclusion|we will go with)\b",
        r"(?i)\b(remember|don'?t forget|keep in mind|note to self)\b",
        r"(?i)\b(error|exception|failed|failure|crash(ed)?|bug)\b",
        r"(?i)\b(password|passphrase|api[ _-]?key|secret|credentials?|access token)\b",
        r"(?i)\b(deadline|due (date|by|on)|urgent|asap)\b",
        r"(?i)\b(architecture|schema|migration|refactor|design doc)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("keyword pattern"))
    .collect()
});

const BASE_IMPORTANCE: f64 = 0.5;
const RECENCY_WEIGHT: f64 = 0.3;

/// Whether any high-importance keyword pattern matches.
pub(crate) fn has_keyword(text: &str) -> bool {
    KEYWORD_PATTERNS.iter().any(|re| re.is_match(text))
}

/// A message together with its per-build sizing and score.
#[derive(Debug, Clone)]
pub struct ScoredMessage<'a> {
    pub message: &'a Message,
    /// Position in the scored history.
    pub index: usize,
    pub tokens: usize,
    pub importance: f64,
    pub pinned: bool,
}

/// Score one message at position `index` of a history of length `total`.
pub fn importance(
    message: &Message,
    tokens: usize,
    index: usize,
    total: usize,
    decay_rate: f64,
    pinned: bool,
) -> f64 {
    if pinned {
        return 1.0;
    }

    let n = total.max(1) as f64;
    let i = index as f64;
    let mut score = BASE_IMPORTANCE;
    score += (i / n) * RECENCY_WEIGHT;
    score -= (n - i) * decay_rate;

    let content = message.content.as_str();
    if TOOL_RESULT_RE.is_match(content) {
        score += 0.2;
    }
    if TOOL_CALL_RE.is_match(content) {
        score += 0.15;
    }
    if CRON_SUGGEST_RE.is_match(content) {
        score += 0.2;
    }
    if has_keyword(content) {
        score += 0.1;
    }

    if tokens > 200 {
        score += 0.1;
    }
    if tokens > 500 {
        score += 0.1;
    }
    if tokens < 10 {
        score -= 0.15;
    }

    if message.role == Role::User && content.contains('?') {
        score += 0.05;
    }
    if message.has_tag("analysis") {
        score += 0.15;
    }

    score.clamp(0.0, 1.0)
}

/// Score a whole history against a pin set.
pub fn score_history<'a>(
    history: &'a [Message],
    pins: &HashSet<String>,
    decay_rate: f64,
) -> Vec<ScoredMessage<'a>> {
    let total = history.len();
    history
        .iter()
        .enumerate()
        .map(|(index, message)| {
            let tokens = token::estimate_message_tokens(message);
            let pinned = pins.contains(&message.id);
            ScoredMessage {
                message,
                index,
                tokens,
                importance: importance(message, tokens, index, total, decay_rate, pinned),
                pinned,
            }
        })
        .collect()
}
