//! Heuristic digest of messages dropped from a window.
//!
//! No model call: each dropped message contributes at most one bullet,
//! taken from the first extractor that finds something:
//!
//! 1. the first sentence ending in `?` (user messages only)
//! 2. the argument of a tool-call marker
//! 3. the first sentence containing a high-importance keyword

use std::collections::HashSet;
use strata_core::message::{Message, Role};

use crate::scoring::{self, TOOL_CALL_RE};

/// Maximum bullets in a digest.
pub const MAX_POINTS: usize = 10;

/// Bullets longer than this are cut.
const MAX_POINT_CHARS: usize = 160;

/// Build the inline summary for `dropped` messages.
pub fn summarize_dropped(dropped: &[&Message]) -> String {
    let mut seen = HashSet::new();
    let mut points = Vec::new();

    for message in dropped {
        let Some(point) = extract_point(message) else {
            continue;
        };
        if seen.insert(point.to_lowercase()) {
            points.push(point);
            if points.len() == MAX_POINTS {
                break;
            }
        }
    }

    if points.is_empty() {
        return format!("[{} earlier messages omitted]", dropped.len());
    }

    let mut out = format!(
        "[Summary of {} earlier messages omitted from context]\n",
        dropped.len()
    );
    for point in &points {
        out.push_str("- ");
        out.push_str(point);
        out.push('\n');
    }
    out.truncate(out.trim_end().len());
    out
}

fn extract_point(message: &Message) -> Option<String> {
    let content = message.content.as_str();

    if message.role == Role::User
        && let Some(question) = sentences(content).find(|s| s.ends_with('?'))
    {
        return Some(format!("User asked: {}", clip(question)));
    }

    if let Some(caps) = TOOL_CALL_RE.captures(content) {
        let name = caps.get(1).map_or("", |m| m.as_str());
        let point = match caps.get(2).map(|m| m.as_str().trim()) {
            Some(args) if !args.is_empty() => format!("Used {name}: {}", clip(args)),
            _ => format!("Used {name}"),
        };
        return Some(point);
    }

    sentences(content)
        .find(|s| scoring::has_keyword(s))
        .map(|s| clip(s).to_string())
}

/// Split into trimmed, non-empty sentences. Terminators stay attached.
fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn clip(text: &str) -> &str {
    match text.char_indices().nth(MAX_POINT_CHARS) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}
