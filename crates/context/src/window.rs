//! Window Builder: per-turn message admission under a token budget.
//!
//! The history is split into a guaranteed tail (the last
//! `min_messages_to_keep` messages, always admitted) and a candidate pool.
//! Pinned candidates are admitted next, then the rest greedily by
//! importance. The result is re-sorted chronologically.
//!
//! # Determinism
//!
//! Building is a pure function of (history, pins, budget). Scores are
//! recomputed on every call and ties keep list order.

use std::collections::HashSet;

use serde::Serialize;
use strata_config::WindowConfig;
use strata_core::message::Message;
use tracing::{debug, info, warn};

use crate::digest;
use crate::models::ContextLimits;
use crate::scoring::{self, ScoredMessage};
use crate::token;

/// Windows larger than this get the looser retention policy.
const LARGE_WINDOW: usize = 100_000;

/// Reply reservation never exceeds this.
const MAX_REPLY_RESERVATION: usize = 16_384;

// ── Types ─────────────────────────────────────────────────────────────────

/// Token budget configuration for the window builder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetConfig {
    /// Total tokens the conversation window may use.
    pub max_context_tokens: usize,
    /// Tokens held back for the model's reply.
    pub reserved_for_reply: usize,
    /// Histories longer than this get a digest of dropped messages.
    pub summarize_threshold: usize,
    /// Per-position importance decay.
    pub decay_rate: f64,
    /// Most-recent messages that are always admitted.
    pub min_messages_to_keep: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 80_000,
            reserved_for_reply: 8_192,
            summarize_threshold: 30,
            decay_rate: 0.002,
            min_messages_to_keep: 6,
        }
    }
}

impl BudgetConfig {
    /// Budget from the `[window]` config section.
    pub fn from_settings(settings: &WindowConfig) -> Self {
        Self {
            max_context_tokens: settings.max_context_tokens,
            reserved_for_reply: settings.reserved_for_reply,
            summarize_threshold: settings.summarize_threshold,
            decay_rate: settings.decay_rate,
            min_messages_to_keep: settings.min_messages_to_keep,
        }
    }

    /// Derive a budget from a model's context window size.
    ///
    /// 60% of the window for conversation, 8% (capped at 16K) for the
    /// reply. Windows over 100K keep more history before summarizing.
    pub fn for_context_window(window: usize) -> Self {
        let (summarize_threshold, min_messages_to_keep) = if window > LARGE_WINDOW {
            (60, 10)
        } else {
            (30, 6)
        };
        Self {
            max_context_tokens: window * 6 / 10,
            reserved_for_reply: (window * 8 / 100).min(MAX_REPLY_RESERVATION),
            summarize_threshold,
            min_messages_to_keep,
            ..Self::default()
        }
    }
}

/// The admitted conversation window for one turn.
#[derive(Debug, Clone, Serialize)]
pub struct ContextWindow {
    /// Admitted messages in chronological order.
    pub messages: Vec<Message>,
    /// Inline digest of dropped messages, if one was produced.
    pub summary: Option<String>,
    /// Admitted message tokens plus digest tokens.
    pub total_tokens: usize,
    /// Messages left out of the window.
    pub dropped_count: usize,
    /// The guaranteed tail and pinned set alone exceeded the budget.
    pub over_budget: bool,
}

impl ContextWindow {
    /// IDs of the admitted messages, in window order.
    pub fn admitted_ids(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.id.as_str()).collect()
    }

    fn everything(history: &[Message]) -> Self {
        Self {
            messages: history.to_vec(),
            summary: None,
            total_tokens: token::estimate_messages_tokens(history),
            dropped_count: 0,
            over_budget: false,
        }
    }
}

// ── Builder ───────────────────────────────────────────────────────────────

/// Selects the subset of history that fits the budget.
///
/// One instance per conversation; it owns the pin set.
#[derive(Debug, Clone, Default)]
pub struct WindowBuilder {
    config: BudgetConfig,
    pins: HashSet<String>,
}

impl WindowBuilder {
    pub fn new(config: BudgetConfig) -> Self {
        Self {
            config,
            pins: HashSet::new(),
        }
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: BudgetConfig) {
        self.config = config;
    }

    /// Mark a message as mandatory. Returns false if it was already pinned.
    pub fn pin(&mut self, id: impl Into<String>) -> bool {
        self.pins.insert(id.into())
    }

    /// Returns false if the message was not pinned.
    pub fn unpin(&mut self, id: &str) -> bool {
        self.pins.remove(id)
    }

    pub fn is_pinned(&self, id: &str) -> bool {
        self.pins.contains(id)
    }

    pub fn pins(&self) -> &HashSet<String> {
        &self.pins
    }

    /// Re-derive the budget from the built-in model table.
    pub fn configure_for_model(&mut self, model: &str) -> usize {
        self.configure_for_model_with(&ContextLimits::with_defaults(), model)
    }

    /// Re-derive the budget from `limits`. Returns the model's window size.
    ///
    /// The decay rate is a scoring preference, not a size, so it is kept.
    pub fn configure_for_model_with(&mut self, limits: &ContextLimits, model: &str) -> usize {
        let window = limits.limit_for(model);
        let decay_rate = self.config.decay_rate;
        self.config = BudgetConfig {
            decay_rate,
            ..BudgetConfig::for_context_window(window)
        };
        info!(
            model,
            window,
            max_context_tokens = self.config.max_context_tokens,
            reserved_for_reply = self.config.reserved_for_reply,
            "Window budget configured for model"
        );
        window
    }

    /// Tokens available to conversation messages after the reply
    /// reservation and the system prompt. Clamped at zero.
    pub fn available_budget(&self, system_tokens: usize) -> usize {
        let deductions = self.config.reserved_for_reply + system_tokens;
        match self.config.max_context_tokens.checked_sub(deductions) {
            Some(budget) => budget,
            None => {
                warn!(
                    max_context_tokens = self.config.max_context_tokens,
                    reserved_for_reply = self.config.reserved_for_reply,
                    system_tokens,
                    "Context budget underflow, clamping to zero; only the recent tail will be kept"
                );
                0
            }
        }
    }

    /// Build a window using this builder's pin set.
    pub fn build(&self, history: &[Message], reserved_system_tokens: usize) -> ContextWindow {
        self.build_with_pins(history, &self.pins, reserved_system_tokens)
    }

    /// Build a window against an explicit pin set.
    ///
    /// # Algorithm
    ///
    /// 1. If the whole history fits, return it unchanged
    /// 2. Admit the last `min_messages_to_keep` messages
    /// 3. Admit every pinned candidate, even past the budget
    /// 4. Sort the rest by importance (descending, stable) and admit each
    ///    one that still fits; a candidate that does not fit is skipped
    /// 5. Re-sort admitted candidates by timestamp and append the tail
    /// 6. Digest the dropped messages if history exceeds the threshold
    pub fn build_with_pins(
        &self,
        history: &[Message],
        pins: &HashSet<String>,
        reserved_system_tokens: usize,
    ) -> ContextWindow {
        let budget = self.available_budget(reserved_system_tokens);
        let scored = scoring::score_history(history, pins, self.config.decay_rate);
        let total: usize = scored.iter().map(|s| s.tokens).sum();

        if total <= budget {
            return ContextWindow::everything(history);
        }

        let keep = self.config.min_messages_to_keep.min(history.len());
        let (candidates, tail) = scored.split_at(history.len() - keep);

        let mut used: usize = tail.iter().map(|s| s.tokens).sum();
        let mut admitted: Vec<&ScoredMessage<'_>> = Vec::with_capacity(candidates.len());

        // ── Pinned candidates (always admitted) ────────────────────────────
        for candidate in candidates.iter().filter(|c| c.pinned) {
            used += candidate.tokens;
            admitted.push(candidate);
        }
        let over_budget = used > budget;
        if over_budget {
            warn!(
                budget,
                used,
                pinned = admitted.len(),
                tail = tail.len(),
                "Pinned messages and recent tail exceed the context budget"
            );
        }

        // ── Greedy pass over the rest ──────────────────────────────────────
        let mut pool: Vec<&ScoredMessage<'_>> = candidates.iter().filter(|c| !c.pinned).collect();
        pool.sort_by(|a, b| b.importance.total_cmp(&a.importance));

        let mut dropped: Vec<&ScoredMessage<'_>> = Vec::new();
        for candidate in pool {
            if used + candidate.tokens <= budget {
                used += candidate.tokens;
                admitted.push(candidate);
            } else {
                dropped.push(candidate);
            }
        }

        admitted.sort_by(|a, b| {
            a.message
                .timestamp
                .cmp(&b.message.timestamp)
                .then(a.index.cmp(&b.index))
        });
        dropped.sort_by_key(|d| d.index);

        let mut messages: Vec<Message> = admitted.iter().map(|s| s.message.clone()).collect();
        messages.extend(tail.iter().map(|s| s.message.clone()));

        let summary = if !dropped.is_empty() && history.len() > self.config.summarize_threshold {
            let refs: Vec<&Message> = dropped.iter().map(|d| d.message).collect();
            Some(digest::summarize_dropped(&refs))
        } else {
            None
        };
        let summary_tokens = summary.as_deref().map_or(0, token::estimate_tokens);

        debug!(
            history = history.len(),
            admitted = messages.len(),
            dropped = dropped.len(),
            budget,
            used,
            summary_tokens,
            "Context window built"
        );

        ContextWindow {
            messages,
            summary,
            total_tokens: used + summary_tokens,
            dropped_count: dropped.len(),
            over_budget,
        }
    }
}
