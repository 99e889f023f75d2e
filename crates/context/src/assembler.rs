//! Tiered prompt assembly, the per-turn instructional context.
//!
//! The prompt is split by how often its content changes:
//!
//! **Stable** (cached for a short TTL, keyed by operating mode and the
//! selected memory slice)
//! 1. Identity notes + relevant long-term memory + daily notes
//! 2. Safety and reasoning instructions
//! 3. Capability and resourcefulness docs (mode-gated)
//! 4. Tool-format instructions (mode-gated)
//!
//! **Dynamic** (rebuilt every turn)
//! - time, onboarding, scheduled jobs, document index, device automation,
//!   telemetry, health warnings, background tasks, active hours, nudge
//!
//! Every source read is fallible. A failing source is logged and its
//! section is left out; no source can block a turn.
//!
//! Dates (daily-notes key, memory relevance, the fallback clock) use local
//! time, matching what a host's time-context source reports.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use strata_config::{AppConfig, AssemblerConfig};
use strata_core::error::SourceError;
use strata_core::history::MemoryUpdateHandler;
use strata_core::message::Message;
use strata_core::sources::{ContextSources, ScheduledJob};
use tracing::{debug, warn};

use crate::cache::{self, StableCache};
use crate::maintenance::{CompactionOutcome, FlushOutcome, MaintenanceReport, Maintainer};
use crate::models::ContextLimits;
use crate::modules::{self, ModuleFlags, OperatingMode};
use crate::relevance;
use crate::token;
use crate::window::{BudgetConfig, ContextWindow, WindowBuilder};

/// Used when no safety document is configured.
pub const DEFAULT_SAFETY: &str = "Think step by step before acting. Never reveal secrets, \
credentials, or private notes to third parties. Ask before taking irreversible actions. \
If you are unsure, say so instead of guessing.";

// ── Types ─────────────────────────────────────────────────────────────────

/// The assembled instructional context for one turn.
#[derive(Debug, Clone, Serialize)]
pub struct StructuredContext {
    /// Rarely-changing part, possibly served from cache.
    pub stable: String,
    /// Per-turn part.
    pub dynamic: String,
    /// `stable` and `dynamic` joined.
    pub combined: String,
    /// Token estimate of `combined`.
    pub estimated_tokens: usize,
    /// Rolling hash of `stable`.
    pub stable_hash: u64,
    /// Whether `stable` came from the cache.
    pub from_cache: bool,
    /// Sections resolved for this turn.
    pub modules: ModuleFlags,
    /// `estimated_tokens` as a share of the model's context window.
    pub prompt_share: f64,
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// Per-conversation assembler. Owns the window builder (and its pins),
/// the stable cache, and optionally the maintenance routines.
pub struct TieredAssembler {
    sources: Arc<dyn ContextSources>,
    window: WindowBuilder,
    settings: AssemblerConfig,
    model: String,
    limits: ContextLimits,
    cache: StableCache,
    maintainer: Option<Maintainer>,
}

impl TieredAssembler {
    pub fn new(
        sources: Arc<dyn ContextSources>,
        settings: AssemblerConfig,
        window: WindowBuilder,
    ) -> Self {
        let cache = StableCache::new(Duration::from_secs(settings.cache_ttl_secs));
        Self {
            sources,
            window,
            settings,
            model: String::new(),
            limits: ContextLimits::with_defaults(),
            cache,
            maintainer: None,
        }
    }

    /// Build from a loaded config. Re-derives the window budget from the
    /// model when `window.derive_from_model` is set.
    pub fn from_config(sources: Arc<dyn ContextSources>, config: &AppConfig) -> Self {
        let limits = ContextLimits::with_defaults().with_overrides(&config.context_limits);
        let mut window = WindowBuilder::new(BudgetConfig::from_settings(&config.window));
        if config.window.derive_from_model {
            window.configure_for_model_with(&limits, &config.model);
        }
        Self::new(sources, config.assembler.clone(), window)
            .with_context_limits(limits)
            .with_model(config.model.clone())
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_context_limits(mut self, limits: ContextLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_maintainer(mut self, maintainer: Maintainer) -> Self {
        self.maintainer = Some(maintainer);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn window(&self) -> &WindowBuilder {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut WindowBuilder {
        &mut self.window
    }

    pub fn maintainer(&self) -> Option<&Maintainer> {
        self.maintainer.as_ref()
    }

    /// The token estimator used for every sizing decision.
    pub fn estimate_tokens(text: &str) -> usize {
        token::estimate_tokens(text)
    }

    pub fn pin(&mut self, id: impl Into<String>) -> bool {
        self.window.pin(id)
    }

    pub fn unpin(&mut self, id: &str) -> bool {
        self.window.unpin(id)
    }

    /// Switch model: the prompt-share check and the window budget follow.
    pub fn configure_for_model(&mut self, model: &str) -> usize {
        self.model = model.to_string();
        self.window.configure_for_model_with(&self.limits, model)
    }

    /// Context window of the current model.
    pub fn model_context_limit(&self) -> usize {
        self.limits.limit_for(&self.model)
    }

    /// Window over `history` with this conversation's pins.
    pub fn build_context_window(
        &self,
        history: &[Message],
        reserved_system_tokens: usize,
    ) -> ContextWindow {
        self.window.build(history, reserved_system_tokens)
    }

    /// Window over `history` with an explicit pin set.
    pub fn build_context_window_with_pins(
        &self,
        history: &[Message],
        pins: &HashSet<String>,
        reserved_system_tokens: usize,
    ) -> ContextWindow {
        self.window.build_with_pins(history, pins, reserved_system_tokens)
    }

    /// Drop the cached stable part. Call whenever identity or instruction
    /// sources change.
    pub fn invalidate_stable_cache(&mut self) {
        debug!("Stable context cache invalidated");
        self.cache.invalidate();
    }

    /// Start over: clear the stable cache and the flush cycle. Pins stay.
    pub fn reset_conversation(&mut self) {
        self.cache.invalidate();
        if let Some(maintainer) = &self.maintainer {
            maintainer.reset_cycle();
        }
    }

    // ── Structured context ────────────────────────────────────────────────

    /// Assemble the instructional context for one turn.
    ///
    /// `user_message` drives intent detection and memory relevance.
    pub fn build_structured_context(
        &mut self,
        mode: OperatingMode,
        user_message: Option<&str>,
    ) -> StructuredContext {
        let intent = user_message.and_then(modules::detect_intent);
        let flags = modules::resolve_modules(mode, intent);

        let memory = or_none(
            "memory",
            self.sources.memory_notes(&self.settings.memory_key),
        );
        let memory_slice = match memory.as_deref() {
            Some(notes) if !notes.trim().is_empty() => self.relevant_memory(notes, user_message),
            _ => String::new(),
        };
        let memory_hash = cache::rolling_hash(&memory_slice);

        let cached = self
            .cache
            .get(mode, memory_hash)
            .map(|(text, hash)| (text.to_string(), hash));
        let (stable, stable_hash, from_cache) = match cached {
            Some((text, hash)) => {
                debug!(%mode, "Stable context served from cache");
                (text, hash, true)
            }
            None => {
                let text = self.build_stable(mode, &flags, &memory_slice);
                let hash = self.cache.store(mode, memory_hash, text.clone());
                debug!(%mode, hash, chars = text.len(), "Stable context rebuilt");
                (text, hash, false)
            }
        };

        let memory_is_empty = memory.as_deref().is_some_and(|m| m.trim().is_empty());
        let dynamic = self.build_dynamic(&flags, memory_is_empty);
        let combined = join_sections(&[stable.as_str(), dynamic.as_str()]);
        let estimated_tokens = token::estimate_tokens(&combined);

        let window = self.model_context_limit();
        let prompt_share = estimated_tokens as f64 / window.max(1) as f64;
        if prompt_share > self.settings.prompt_warn_ratio {
            warn!(
                model = %self.model,
                estimated_tokens,
                window,
                share_pct = (prompt_share * 1000.0).round() / 10.0,
                "Instructional context is using a large share of the model window"
            );
        }

        StructuredContext {
            stable,
            dynamic,
            combined,
            estimated_tokens,
            stable_hash,
            from_cache,
            modules: flags,
            prompt_share,
        }
    }

    fn build_stable(&self, mode: OperatingMode, flags: &ModuleFlags, memory_slice: &str) -> String {
        let mut sections: Vec<String> = Vec::new();

        // ── Tier 1: identity, memory, daily notes ──────────────────────────
        let identity = or_empty("identity", self.sources.identity_notes());
        push_section(&mut sections, "Identity", &identity);

        push_section(&mut sections, "Long-Term Memory", memory_slice);

        if flags.daily_notes && mode.is_interactive() {
            let date_key = today().format("%Y-%m-%d").to_string();
            let daily = or_empty("daily_notes", self.sources.daily_notes(&date_key));
            push_section(&mut sections, &format!("Daily Notes {date_key}"), &daily);
        }

        // ── Tier 2: safety ─────────────────────────────────────────────────
        let safety = or_empty("safety", self.sources.document("safety"));
        if safety.trim().is_empty() {
            push_section(&mut sections, "Safety", DEFAULT_SAFETY);
        } else {
            push_section(&mut sections, "Safety", &safety);
        }

        // ── Tier 3: capabilities ───────────────────────────────────────────
        if flags.capabilities {
            let doc = or_empty("capabilities", self.sources.document("capabilities"));
            push_section(&mut sections, "Capabilities", &doc);
        }
        if flags.resourcefulness {
            let doc = or_empty("resourcefulness", self.sources.document("resourcefulness"));
            push_section(&mut sections, "Resourcefulness", &doc);
        }

        // ── Tier 4: tool format ────────────────────────────────────────────
        if flags.tool_format {
            let doc = or_empty("tool_format", self.sources.document("tool_format"));
            push_section(&mut sections, "Tool Format", &doc);
        }

        sections.join("\n\n")
    }

    fn relevant_memory(&self, memory: &str, user_message: Option<&str>) -> String {
        match user_message {
            Some(query) if memory.chars().count() > self.settings.memory_relevance_min_chars => {
                relevance::select_relevant_memory(
                    memory,
                    query,
                    today(),
                    self.settings.memory_char_budget,
                )
            }
            _ => memory.to_string(),
        }
    }

    /// `memory_is_empty` is true only when the memory source was read and
    /// holds nothing.
    fn build_dynamic(&self, flags: &ModuleFlags, memory_is_empty: bool) -> String {
        let mut sections: Vec<String> = Vec::new();

        let time = or_empty("time", self.sources.time_context());
        if time.trim().is_empty() {
            let now = Local::now().format("%A, %Y-%m-%d %H:%M (%:z)").to_string();
            push_section(&mut sections, "Current Time", &now);
        } else {
            push_section(&mut sections, "Current Time", &time);
        }

        if flags.onboarding
            && let Some(ritual) = or_empty("onboarding", self.sources.onboarding())
        {
            push_section(&mut sections, "Onboarding", &ritual);
        }

        let jobs = if flags.scheduled_jobs || flags.memory_nudge {
            or_none("scheduled_jobs", self.sources.scheduled_jobs())
        } else {
            None
        };
        if flags.scheduled_jobs
            && let Some(jobs) = &jobs
        {
            push_section(&mut sections, "Scheduled Jobs", &render_jobs(jobs));
        }

        if flags.document_index
            && let Some(stats) = or_empty("document_index", self.sources.index_stats())
            && stats.file_count > 0
        {
            let line = format!(
                "{} files indexed as {} chunks (embedding: {}). Search them before saying you don't know.",
                stats.file_count, stats.chunk_count, stats.embedding_mode
            );
            push_section(&mut sections, "Document Index", &line);
        }

        if flags.device_automation
            && or_empty("device_automation", self.sources.device_automation_enabled())
        {
            push_section(
                &mut sections,
                "Device Automation",
                "Device automation is available. Confirm with the user before changing device state.",
            );
        }

        if flags.monitoring || flags.health {
            let telemetry = or_empty("telemetry", self.sources.telemetry());
            if flags.monitoring {
                push_section(&mut sections, "System Status", &telemetry.summary);
            }
            if flags.health {
                let warnings: Vec<String> =
                    telemetry.warnings.iter().map(|w| format!("- {w}")).collect();
                push_section(&mut sections, "Health Warnings", &warnings.join("\n"));
            }
        }

        if flags.background_tasks {
            let tasks = or_empty("background_tasks", self.sources.background_tasks());
            let lines: Vec<String> = tasks
                .iter()
                .map(|t| format!("- {} ({}s): {}", t.id, t.elapsed_secs, t.description))
                .collect();
            push_section(&mut sections, "Background Tasks", &lines.join("\n"));
        }

        if flags.active_hours
            && let Some(hours) = or_empty("active_hours", self.sources.active_hours())
        {
            let line = format!(
                "Active between {} and {}. Outside these hours, only act on urgent events.",
                hours.start, hours.end
            );
            push_section(&mut sections, "Active Hours", &line);
        }

        // Only nudge on confirmed emptiness; a failed read says nothing.
        if flags.memory_nudge && memory_is_empty && jobs.as_ref().is_some_and(Vec::is_empty) {
            push_section(
                &mut sections,
                "Reminder",
                "Long-term memory is empty and no jobs are scheduled. Save durable facts \
                 about the user as you learn them, and suggest recurring jobs when a task \
                 repeats.",
            );
        }

        sections.join("\n\n")
    }

    // ── Maintenance ───────────────────────────────────────────────────────

    /// Run the memory flush if a maintainer is attached.
    pub async fn maybe_run_memory_flush(&self, handler: &dyn MemoryUpdateHandler) -> FlushOutcome {
        match &self.maintainer {
            Some(maintainer) => maintainer.maybe_run_memory_flush(handler).await,
            None => FlushOutcome::Skipped,
        }
    }

    /// Run compaction if a maintainer is attached.
    pub async fn maybe_compact_context(&self) -> CompactionOutcome {
        match &self.maintainer {
            Some(maintainer) => maintainer.maybe_compact_context().await,
            None => CompactionOutcome::Skipped,
        }
    }

    /// Flush, then compact.
    pub async fn run_maintenance(&self, handler: &dyn MemoryUpdateHandler) -> MaintenanceReport {
        match &self.maintainer {
            Some(maintainer) => maintainer.run_maintenance(handler).await,
            None => MaintenanceReport {
                flush: FlushOutcome::Skipped,
                compaction: CompactionOutcome::Skipped,
            },
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────

/// Today's date on the local clock.
fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// A source read, or `None` after logging the failure.
fn or_none<T>(section: &'static str, result: Result<T, SourceError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(section, error = %e, "Context source failed, section omitted");
            None
        }
    }
}

/// Unwrap a source read, logging and defaulting on failure.
fn or_empty<T: Default>(section: &'static str, result: Result<T, SourceError>) -> T {
    or_none(section, result).unwrap_or_default()
}

/// Append `[title]\nbody` unless the body is blank.
fn push_section(sections: &mut Vec<String>, title: &str, body: &str) {
    let body = body.trim();
    if !body.is_empty() {
        sections.push(format!("[{title}]\n{body}"));
    }
}

fn join_sections(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_jobs(jobs: &[ScheduledJob]) -> String {
    jobs.iter()
        .map(|job| {
            let state = if job.enabled { "enabled" } else { "paused" };
            if job.action.is_empty() {
                format!("- {} [{}] ({state})", job.name, job.schedule)
            } else {
                format!("- {} [{}] ({state}): {}", job.name, job.schedule, job.action)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{RecordingHandler, StaticSources, history_of};
    use strata_core::sources::{ActiveHours, BackgroundTask, IndexStats, Telemetry};

    // ── Helpers ────────────────────────────────────────────────────────

    fn rich_sources() -> StaticSources {
        StaticSources {
            identity: "You are Wren, a calm home assistant.".into(),
            memory: "User's name is Ada.".into(),
            daily: "Ada has a dentist appointment at 3pm.".into(),
            onboarding: Some("Ask the user what they'd like to be called.".into()),
            time: "Tuesday evening, 19:40".into(),
            jobs: vec![ScheduledJob {
                name: "morning-brief".into(),
                schedule: "0 7 * * *".into(),
                enabled: true,
                action: "Summarize the calendar".into(),
            }],
            index: Some(IndexStats {
                chunk_count: 420,
                file_count: 12,
                embedding_mode: "local".into(),
            }),
            telemetry: Telemetry {
                summary: "CPU 12%, battery 80%".into(),
                warnings: vec!["Disk 91% full".into()],
            },
            device_automation: true,
            tasks: vec![BackgroundTask {
                id: "task-7".into(),
                description: "Re-indexing notes".into(),
                elapsed_secs: 42,
            }],
            active_hours: Some(ActiveHours {
                start: "08:00".into(),
                end: "22:00".into(),
            }),
            ..StaticSources::default()
        }
        .with_document("safety", "Be careful.")
        .with_document("capabilities", "You can read files.")
        .with_document("resourcefulness", "Try another approach before giving up.")
        .with_document("tool_format", "Call tools as [TOOL:name args].")
    }

    fn assembler(sources: StaticSources) -> (Arc<StaticSources>, TieredAssembler) {
        let sources = Arc::new(sources);
        let assembler = TieredAssembler::new(
            sources.clone(),
            AssemblerConfig::default(),
            WindowBuilder::default(),
        )
        .with_model("gpt-4o");
        (sources, assembler)
    }

    fn position(text: &str, needle: &str) -> usize {
        text.find(needle)
            .unwrap_or_else(|| panic!("missing {needle:?} in:\n{text}"))
    }

    // ── Caching ────────────────────────────────────────────────────────

    #[test]
    fn stable_part_is_cached_within_ttl() {
        let (sources, mut asm) = assembler(rich_sources());
        let first = asm.build_structured_context(OperatingMode::Chat, None);
        let second = asm.build_structured_context(OperatingMode::Chat, None);

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(first.stable, second.stable);
        assert_eq!(first.stable_hash, second.stable_hash);
        assert_eq!(sources.identity_reads(), 1);
    }

    #[test]
    fn invalidation_forces_rebuild() {
        let (sources, mut asm) = assembler(rich_sources());
        asm.build_structured_context(OperatingMode::Chat, None);
        asm.invalidate_stable_cache();
        let rebuilt = asm.build_structured_context(OperatingMode::Chat, None);
        assert!(!rebuilt.from_cache);
        assert_eq!(sources.identity_reads(), 2);
    }

    #[test]
    fn reset_conversation_clears_cache() {
        let (_, mut asm) = assembler(rich_sources());
        asm.build_structured_context(OperatingMode::Chat, None);
        asm.reset_conversation();
        assert!(!asm.build_structured_context(OperatingMode::Chat, None).from_cache);
    }

    #[test]
    fn mode_change_rebuilds() {
        let (_, mut asm) = assembler(rich_sources());
        asm.build_structured_context(OperatingMode::Chat, None);
        let monitor = asm.build_structured_context(OperatingMode::Monitor, None);
        assert!(!monitor.from_cache);
        assert!(!monitor.stable.contains("[Tool Format]"));
    }

    #[test]
    fn zero_ttl_disables_cache() {
        let sources = Arc::new(rich_sources());
        let settings = AssemblerConfig {
            cache_ttl_secs: 0,
            ..AssemblerConfig::default()
        };
        let mut asm = TieredAssembler::new(sources.clone(), settings, WindowBuilder::default());
        asm.build_structured_context(OperatingMode::Chat, None);
        assert!(!asm.build_structured_context(OperatingMode::Chat, None).from_cache);
        assert_eq!(sources.identity_reads(), 2);
    }

    #[test]
    fn new_question_reselects_memory_within_ttl() {
        let memory = format!(
            "# Pets\nThe cat is called Miso.\n# Work\n{}\n# Travel\n{}\n",
            "Quarterly planning notes. ".repeat(20),
            "Lisbon itinerary draft. ".repeat(20)
        );
        let settings = AssemblerConfig {
            memory_char_budget: 200,
            ..AssemblerConfig::default()
        };
        let sources = Arc::new(StaticSources {
            memory,
            ..StaticSources::default()
        });
        let mut asm = TieredAssembler::new(sources.clone(), settings, WindowBuilder::default());

        let cat = asm.build_structured_context(OperatingMode::Chat, Some("what is my cat called"));
        assert!(cat.stable.contains("Miso"));

        let trip = asm.build_structured_context(OperatingMode::Chat, Some("when do I fly to lisbon"));
        assert!(!trip.from_cache);
        assert!(trip.stable.contains("Lisbon"));
        assert!(!trip.stable.contains("Miso"));

        let again = asm.build_structured_context(OperatingMode::Chat, Some("lisbon flight times"));
        assert!(again.from_cache);
        assert_eq!(again.stable_hash, trip.stable_hash);
        assert_eq!(sources.identity_reads(), 2);
    }

    // ── Stable tiers ───────────────────────────────────────────────────

    #[test]
    fn stable_tiers_in_order() {
        let (_, mut asm) = assembler(rich_sources());
        let ctx = asm.build_structured_context(OperatingMode::Chat, None);
        let s = &ctx.stable;
        let identity = position(s, "[Identity]");
        let memory = position(s, "[Long-Term Memory]");
        let daily = position(s, "[Daily Notes");
        let safety = position(s, "[Safety]");
        let caps = position(s, "[Capabilities]");
        let tools = position(s, "[Tool Format]");
        assert!(identity < memory && memory < daily && daily < safety);
        assert!(safety < caps && caps < tools);
        assert!(ctx.combined.starts_with(&ctx.stable));
        assert!(ctx.combined.ends_with(&ctx.dynamic));
    }

    #[test]
    fn default_safety_when_document_missing() {
        let (_, mut asm) = assembler(StaticSources::default());
        let ctx = asm.build_structured_context(OperatingMode::Chat, None);
        assert!(ctx.stable.contains(DEFAULT_SAFETY));
    }

    #[test]
    fn daily_notes_only_in_interactive_modes() {
        let (_, mut asm) = assembler(rich_sources());
        assert!(asm
            .build_structured_context(OperatingMode::Vision, None)
            .stable
            .contains("dentist"));
        assert!(!asm
            .build_structured_context(OperatingMode::ScheduledJob, None)
            .stable
            .contains("dentist"));
    }

    #[test]
    fn long_memory_is_filtered_by_message() {
        let memory = format!(
            "# Pets\nThe cat is called Miso.\n# Work\n{}\n# Travel\n{}\n",
            "Quarterly planning notes. ".repeat(20),
            "Lisbon itinerary draft. ".repeat(20)
        );
        let settings = AssemblerConfig {
            memory_char_budget: 200,
            ..AssemblerConfig::default()
        };
        let sources = Arc::new(StaticSources {
            memory,
            ..StaticSources::default()
        });
        let mut asm = TieredAssembler::new(sources, settings, WindowBuilder::default());

        let ctx = asm.build_structured_context(OperatingMode::Chat, Some("what is my cat called"));
        assert!(ctx.stable.contains("Miso"));
        assert!(ctx.stable.contains("(2 sections omitted)"));

        asm.invalidate_stable_cache();
        let unfiltered = asm.build_structured_context(OperatingMode::Chat, None);
        assert!(unfiltered.stable.contains("Lisbon"));
    }

    // ── Dynamic sections ───────────────────────────────────────────────

    #[test]
    fn chat_includes_every_dynamic_section() {
        let (_, mut asm) = assembler(rich_sources());
        let d = asm.build_structured_context(OperatingMode::Chat, None).dynamic;
        assert!(d.contains("[Current Time]\nTuesday evening"));
        assert!(d.contains("[Onboarding]"));
        assert!(d.contains("- morning-brief [0 7 * * *] (enabled): Summarize the calendar"));
        assert!(d.contains("12 files indexed as 420 chunks"));
        assert!(d.contains("[Device Automation]"));
        assert!(d.contains("CPU 12%"));
        assert!(d.contains("- Disk 91% full"));
        assert!(d.contains("- task-7 (42s): Re-indexing notes"));
        assert!(d.contains("Active between 08:00 and 22:00"));
        assert!(!d.contains("[Reminder]"));
    }

    #[test]
    fn sub_task_omits_onboarding_monitoring_and_health() {
        let (_, mut asm) = assembler(rich_sources());
        let ctx = asm.build_structured_context(OperatingMode::SubTask, None);
        assert!(!ctx.dynamic.contains("[Onboarding]"));
        assert!(!ctx.dynamic.contains("[System Status]"));
        assert!(!ctx.dynamic.contains("[Health Warnings]"));
        assert!(ctx.stable.contains("[Tool Format]"));
    }

    #[test]
    fn intent_enables_scheduled_jobs_in_vision() {
        let (_, mut asm) = assembler(rich_sources());
        let plain = asm.build_structured_context(OperatingMode::Vision, Some("what is this?"));
        assert!(!plain.dynamic.contains("[Scheduled Jobs]"));
        let remind = asm.build_structured_context(
            OperatingMode::Vision,
            Some("remind me every morning to water this plant"),
        );
        assert!(remind.dynamic.contains("[Scheduled Jobs]"));
    }

    #[test]
    fn nudge_when_memory_and_jobs_are_empty() {
        let (_, mut asm) = assembler(StaticSources::default());
        let ctx = asm.build_structured_context(OperatingMode::Chat, None);
        assert!(ctx.dynamic.contains("[Reminder]"));

        let (_, mut asm) = assembler(StaticSources::default());
        let ctx = asm.build_structured_context(OperatingMode::SubTask, None);
        assert!(!ctx.dynamic.contains("[Reminder]"));
    }

    #[test]
    fn time_falls_back_to_local_clock() {
        let (_, mut asm) = assembler(StaticSources::default());
        let before = Local::now().format("%Y-%m-%d").to_string();
        let ctx = asm.build_structured_context(OperatingMode::Chat, None);
        let after = Local::now().format("%Y-%m-%d").to_string();
        assert!(ctx.dynamic.contains("[Current Time]"));
        assert!(ctx.dynamic.contains(&before) || ctx.dynamic.contains(&after));
    }

    #[test]
    fn daily_notes_keyed_by_local_date() {
        let (sources, mut asm) = assembler(rich_sources());
        let before = Local::now().format("%Y-%m-%d").to_string();
        let ctx = asm.build_structured_context(OperatingMode::Chat, None);
        let after = Local::now().format("%Y-%m-%d").to_string();

        let keys = sources.daily_keys();
        assert_eq!(keys.len(), 1);
        assert!(keys[0] == before || keys[0] == after);
        assert!(ctx.stable.contains(&format!("[Daily Notes {}]", keys[0])));
    }

    #[test]
    fn no_nudge_when_jobs_or_memory_cannot_be_read() {
        let (_, mut asm) = assembler(StaticSources {
            failing: vec!["jobs"],
            ..StaticSources::default()
        });
        let ctx = asm.build_structured_context(OperatingMode::Chat, None);
        assert!(!ctx.dynamic.contains("[Reminder]"));
        assert!(!ctx.dynamic.contains("[Scheduled Jobs]"));

        let (_, mut asm) = assembler(StaticSources {
            failing: vec!["memory"],
            ..StaticSources::default()
        });
        let ctx = asm.build_structured_context(OperatingMode::Chat, None);
        assert!(!ctx.dynamic.contains("[Reminder]"));
    }

    #[test]
    fn failing_sources_are_omitted_not_fatal() {
        let sources = StaticSources {
            failing: vec!["identity", "jobs", "telemetry", "capabilities"],
            ..rich_sources()
        };
        let (_, mut asm) = assembler(sources);
        let ctx = asm.build_structured_context(OperatingMode::Chat, None);
        assert!(!ctx.stable.contains("[Identity]"));
        assert!(!ctx.stable.contains("[Capabilities]"));
        assert!(ctx.stable.contains("[Safety]\nBe careful."));
        assert!(!ctx.dynamic.contains("[Scheduled Jobs]"));
        assert!(!ctx.dynamic.contains("[System Status]"));
        assert!(ctx.dynamic.contains("[Background Tasks]"));
    }

    // ── Budget ─────────────────────────────────────────────────────────

    #[test]
    fn prompt_share_against_model_window() {
        let (_, mut asm) = assembler(rich_sources());
        let ctx = asm.build_structured_context(OperatingMode::Chat, None);
        assert_eq!(ctx.estimated_tokens, token::estimate_tokens(&ctx.combined));
        assert!(ctx.prompt_share < 0.25);

        let mut limits = ContextLimits::with_defaults();
        limits.set("tiny-model", 100);
        let mut asm = TieredAssembler::new(
            Arc::new(rich_sources()),
            AssemblerConfig::default(),
            WindowBuilder::default(),
        )
        .with_context_limits(limits)
        .with_model("tiny-model");
        let ctx = asm.build_structured_context(OperatingMode::Chat, None);
        assert!(ctx.prompt_share > 0.25);
    }

    #[test]
    fn configure_for_model_updates_window_budget() {
        let (_, mut asm) = assembler(StaticSources::default());
        assert_eq!(asm.configure_for_model("claude-sonnet-4"), 200_000);
        assert_eq!(asm.model(), "claude-sonnet-4");
        assert_eq!(asm.window().config().max_context_tokens, 120_000);
    }

    #[test]
    fn from_config_derives_budget_when_asked() {
        let mut config = AppConfig::default();
        config.model = "my-finetune".into();
        config.window.derive_from_model = true;
        config.context_limits.insert("my-finetune".into(), 50_000);
        let asm = TieredAssembler::from_config(Arc::new(StaticSources::default()), &config);
        assert_eq!(asm.model_context_limit(), 50_000);
        assert_eq!(asm.window().config().max_context_tokens, 30_000);
        assert_eq!(asm.window().config().reserved_for_reply, 4_000);
    }

    #[test]
    fn window_passthrough_respects_pins() {
        let (_, mut asm) = assembler(StaticSources::default());
        asm.window_mut().set_config(BudgetConfig {
            max_context_tokens: 100,
            reserved_for_reply: 0,
            min_messages_to_keep: 1,
            ..BudgetConfig::default()
        });
        asm.pin("msg-0");
        let history = history_of(30, 70);
        let window = asm.build_context_window(&history, 0);
        assert!(window.admitted_ids().contains(&"msg-0"));

        assert!(asm.unpin("msg-0"));
        let pins: HashSet<String> = ["msg-1".to_string()].into_iter().collect();
        let window = asm.build_context_window_with_pins(&history, &pins, 0);
        assert!(window.admitted_ids().contains(&"msg-1"));
        assert!(!window.admitted_ids().contains(&"msg-0"));
    }

    #[tokio::test]
    async fn maintenance_without_maintainer_is_skipped() {
        let (_, asm) = assembler(StaticSources::default());
        let handler = RecordingHandler::default();
        assert!(matches!(asm.maybe_run_memory_flush(&handler).await, FlushOutcome::Skipped));
        assert!(matches!(asm.maybe_compact_context().await, CompactionOutcome::Skipped));
        let report = asm.run_maintenance(&handler).await;
        assert!(matches!(report.flush, FlushOutcome::Skipped));
    }
}
