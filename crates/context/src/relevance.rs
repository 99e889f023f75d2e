//! Query-driven slicing of long-term memory notes.
//!
//! Notes are split at markdown headers and each section is scored against
//! the user's message:
//!
//! | Signal | Score |
//! |--------|-------|
//! | Query keyword anywhere in section | + 2 each |
//! | Query keyword in the section header | + 5 each |
//! | Date within 7 days of today | + 3 |
//! | Date within 30 days of today | + 1 |
//!
//! Sections are then admitted greedily by score under a character budget,
//! and emitted in their original order.

use chrono::NaiveDate;
use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Appended to a section cut short by the budget.
pub const TRUNCATION_MARKER: &str = "…(truncated)";

/// A section is only truncated into at least this many characters.
const MIN_TRUNCATED_CHARS: usize = 200;

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("date pattern")
});

#[derive(Debug, Default)]
struct Section {
    header: String,
    text: String,
}

impl Section {
    fn chars(&self) -> usize {
        self.text.chars().count()
    }
}

/// Keep the sections of `notes` most relevant to `query`, within
/// `char_budget` characters.
pub fn select_relevant_memory(
    notes: &str,
    query: &str,
    today: NaiveDate,
    char_budget: usize,
) -> String {
    let sections = split_sections(notes);
    if sections.is_empty() {
        return String::new();
    }

    let keywords = query_keywords(query);
    let scores: Vec<u32> = sections
        .iter()
        .map(|s| score_section(s, &keywords, today))
        .collect();

    let mut order: Vec<usize> = (0..sections.len()).collect();
    order.sort_by(|&a, &b| scores[b].cmp(&scores[a]));

    let mut chosen: Vec<Option<String>> = vec![None; sections.len()];
    let mut used = 0usize;
    let mut omitted = 0usize;

    for idx in order {
        let section = &sections[idx];
        let size = section.chars();
        let remaining = char_budget.saturating_sub(used);

        if size <= remaining {
            chosen[idx] = Some(section.text.trim_end().to_string());
            used += size;
        } else if scores[idx] > 0 && remaining >= MIN_TRUNCATED_CHARS {
            chosen[idx] = Some(truncate(&section.text, remaining));
            used = char_budget;
        } else {
            omitted += 1;
        }
    }

    let mut out: Vec<String> = chosen.into_iter().flatten().collect();
    if omitted > 0 {
        out.push(format!("({omitted} sections omitted)"));
    }
    out.join("\n\n")
}

/// Split at lines starting with `#`. Leading text becomes its own section.
fn split_sections(notes: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current = Section::default();

    for line in notes.lines() {
        if line.starts_with('#') {
            if !current.text.trim().is_empty() {
                sections.push(std::mem::take(&mut current));
            } else {
                current = Section::default();
            }
            current.header = line.trim_start_matches('#').trim().to_lowercase();
        }
        current.text.push_str(line);
        current.text.push('\n');
    }
    if !current.text.trim().is_empty() {
        sections.push(current);
    }
    sections
}

fn query_keywords(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

fn score_section(section: &Section, keywords: &[String], today: NaiveDate) -> u32 {
    let body = section.text.to_lowercase();
    let mut score = 0;

    for keyword in keywords {
        if body.contains(keyword.as_str()) {
            score += 2;
        }
        if section.header.contains(keyword.as_str()) {
            score += 5;
        }
    }

    let closest = DATE_RE
        .captures_iter(&section.text)
        .filter_map(|caps| {
            let year = caps[1].parse().ok()?;
            let month = caps[2].parse().ok()?;
            let day = caps[3].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        })
        .map(|date| (today - date).num_days().abs())
        .min();

    match closest {
        Some(days) if days <= 7 => score += 3,
        Some(days) if days <= 30 => score += 1,
        _ => {}
    }

    score
}

fn truncate(text: &str, max_chars: usize) -> String {
    let keep = max_chars.saturating_sub(TRUNCATION_MARKER.chars().count() + 1);
    let cut: String = text.chars().take(keep).collect();
    format!("{}\n{TRUNCATION_MARKER}", cut.trim_end())
}
