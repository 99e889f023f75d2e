//! Built-in context-window sizes for common model families.
//!
//! Lookup is forgiving about how model ids are spelled: the provider
//! prefix is stripped (`openai/gpt-4o` → `gpt-4o`), then the longest table
//! key that is a prefix of the id wins (`gpt-4o-mini-2024-07-18` matches
//! `gpt-4o`), then the longest key contained anywhere in the id. Unknown
//! ids fall back to [`DEFAULT_CONTEXT_LIMIT`].

use std::collections::HashMap;

/// Context window assumed for unrecognized models.
pub const DEFAULT_CONTEXT_LIMIT: usize = 128_000;

/// Substring matches only consider keys at least this long.
const MIN_SUBSTRING_KEY: usize = 4;

const BUILTIN_LIMITS: &[(&str, usize)] = &[
    // ── OpenAI ─────────────────────────────────────────────────
    ("gpt-5", 400_000),
    ("gpt-4.1", 1_047_576),
    ("gpt-4o", 128_000),
    ("gpt-4-turbo", 128_000),
    ("o1", 200_000),
    ("o3", 200_000),
    ("o4-mini", 200_000),
    // ── Anthropic ──────────────────────────────────────────────
    ("claude", 200_000),
    // ── Google ─────────────────────────────────────────────────
    ("gemini", 1_048_576),
    ("gemini-1.5-pro", 2_097_152),
    // ── Open-weight families ───────────────────────────────────
    ("llama", 128_000),
    ("meta-llama", 128_000),
    ("mistral", 128_000),
    ("deepseek", 128_000),
    ("qwen", 128_000),
];

/// Context window size for `model` from the built-in table.
pub fn model_context_limit(model: &str) -> usize {
    lookup(BUILTIN_LIMITS.iter().map(|(k, v)| (*k, *v)), model).unwrap_or(DEFAULT_CONTEXT_LIMIT)
}

/// Built-in table plus configured overrides.
#[derive(Debug, Clone, Default)]
pub struct ContextLimits {
    overrides: HashMap<String, usize>,
}

impl ContextLimits {
    /// Only the built-in table.
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Add overrides; they are consulted before the built-in table.
    pub fn with_overrides(mut self, overrides: &HashMap<String, usize>) -> Self {
        for (model, limit) in overrides {
            self.overrides.insert(model.to_lowercase(), *limit);
        }
        self
    }

    /// Add or replace one override.
    pub fn set(&mut self, model: impl Into<String>, limit: usize) {
        self.overrides.insert(model.into().to_lowercase(), limit);
    }

    /// Resolve the context window for a model.
    pub fn limit_for(&self, model: &str) -> usize {
        lookup(self.overrides.iter().map(|(k, v)| (k.as_str(), *v)), model)
            .unwrap_or_else(|| model_context_limit(model))
    }
}

fn lookup<'a>(table: impl Iterator<Item = (&'a str, usize)> + Clone, model: &str) -> Option<usize> {
    let model_lower = model.trim().to_lowercase();
    let bare = model_lower.rsplit('/').next().unwrap_or(&model_lower);

    // 1. Longest prefix match on the bare id (also the full id, for
    //    keys that carry their own provider prefix).
    let prefix = table
        .clone()
        .filter(|(key, _)| bare.starts_with(key) || model_lower.starts_with(key))
        .max_by_key(|(key, _)| key.len());
    if let Some((_, limit)) = prefix {
        return Some(limit);
    }

    // 2. Longest key contained anywhere in the id.
    table
        .filter(|(key, _)| key.len() >= MIN_SUBSTRING_KEY && model_lower.contains(key))
        .max_by_key(|(key, _)| key.len())
        .map(|(_, limit)| limit)
}
