//! Budgeted conversation windows and tiered prompt assembly.
//!
//! Two per-turn decisions, both made locally with no network calls:
//!
//! | Decision | Component | Policy |
//! |----------|-----------|--------|
//! | Which past messages survive | [`WindowBuilder`] | Recent tail + pins, then greedy by importance |
//! | Which prompt sections appear | [`TieredAssembler`] | Stable tiers (cached) + dynamic sections, gated by mode |
//!
//! A slower path, [`Maintainer`], asks the model to save durable memory
//! and to summarize old history once size thresholds are crossed.

pub mod assembler;
pub mod cache;
pub mod digest;
pub mod maintenance;
pub mod models;
pub mod modules;
pub mod relevance;
pub mod scoring;
pub mod token;
pub mod window;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use assembler::{StructuredContext, TieredAssembler};
pub use cache::StableCache;
pub use maintenance::{
    CompactionOutcome, FlushOutcome, MaintenanceError, MaintenanceReport, Maintainer,
};
pub use models::{ContextLimits, DEFAULT_CONTEXT_LIMIT, model_context_limit};
pub use modules::{Intent, ModuleFlags, OperatingMode, detect_intent, resolve_modules};
pub use relevance::select_relevant_memory;
pub use scoring::ScoredMessage;
pub use token::estimate_tokens;
pub use window::{BudgetConfig, ContextWindow, WindowBuilder};
