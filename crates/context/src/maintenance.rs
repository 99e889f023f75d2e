//! Background maintenance: pre-compaction memory flush and history
//! compaction.
//!
//! Both routines are triggered by the estimated size of history, not by
//! wall-clock time, and both are the only places the context engine calls
//! a model. Failures never propagate to the turn: they are logged and
//! returned inside the outcome, and the next turn's threshold check
//! retries.
//!
//! Flush runs at most once per compaction cycle. A successful compaction
//! starts a new cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use strata_config::MaintenanceConfig;
use strata_core::error::{HistoryError, ProviderError, SourceError};
use strata_core::history::{HistoryStore, MemoryUpdateHandler};
use strata_core::message::Message;
use strata_core::provider::{Provider, SendOptions};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::token;

/// Reply meaning "nothing worth saving".
pub const NO_OP_SENTINEL: &str = "NO_OP";

/// Tag carried by synthetic summary messages.
pub const SUMMARY_TAG: &str = "summary";

/// Per-message cap when rendering the transcript to summarize.
const MAX_TRANSCRIPT_MESSAGE_CHARS: usize = 2_000;

#[derive(Debug, Clone, Error)]
pub enum MaintenanceError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Memory update failed: {0}")]
    Handler(SourceError),

    #[error("{0} already in progress")]
    Busy(&'static str),
}

/// Result of [`Maintainer::maybe_run_memory_flush`].
#[derive(Debug, Clone)]
pub enum FlushOutcome {
    /// Below threshold, or already flushed this cycle.
    Skipped,
    /// The model replied with the no-op sentinel.
    NothingToSave,
    /// Instructions were handed to the update handler.
    Applied,
    /// Logged; the cycle flag was rolled back.
    Failed(MaintenanceError),
}

/// Result of [`Maintainer::maybe_compact_context`].
#[derive(Debug, Clone)]
pub enum CompactionOutcome {
    Skipped,
    /// The model's summary was too short to be worth keeping.
    Trivial,
    Compacted {
        summarized: usize,
        summary_tokens: usize,
    },
    /// Logged; history was not touched.
    Failed(MaintenanceError),
}

/// Both outcomes of [`Maintainer::run_maintenance`].
#[derive(Debug, Clone)]
pub struct MaintenanceReport {
    pub flush: FlushOutcome,
    pub compaction: CompactionOutcome,
}

/// Clears an in-progress flag on drop. Optionally rolls back the cycle
/// flag too unless [`Claim::commit`] was called.
struct Claim<'a> {
    in_progress: &'a AtomicBool,
    rollback: Option<&'a AtomicBool>,
}

impl<'a> Claim<'a> {
    fn acquire(in_progress: &'a AtomicBool) -> Option<Self> {
        if in_progress.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(Self {
            in_progress,
            rollback: None,
        })
    }

    fn commit(mut self) {
        self.rollback = None;
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if let Some(flag) = self.rollback {
            flag.store(false, Ordering::Release);
        }
        self.in_progress.store(false, Ordering::Release);
    }
}

/// Per-conversation maintenance state.
pub struct Maintainer {
    provider: Arc<dyn Provider>,
    history: Arc<dyn HistoryStore>,
    config: MaintenanceConfig,
    flushed_this_cycle: AtomicBool,
    flush_in_progress: AtomicBool,
    compaction_in_progress: AtomicBool,
    summaries: Mutex<HashMap<String, String>>,
}

impl Maintainer {
    pub fn new(
        provider: Arc<dyn Provider>,
        history: Arc<dyn HistoryStore>,
        config: MaintenanceConfig,
    ) -> Self {
        Self {
            provider,
            history,
            config,
            flushed_this_cycle: AtomicBool::new(false),
            flush_in_progress: AtomicBool::new(false),
            compaction_in_progress: AtomicBool::new(false),
            summaries: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &MaintenanceConfig {
        &self.config
    }

    /// Name of the provider maintenance calls go to.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    pub fn has_flushed_this_cycle(&self) -> bool {
        self.flushed_this_cycle.load(Ordering::Acquire)
    }

    /// Forget the flush cycle, e.g. when the conversation is reset.
    pub fn reset_cycle(&self) {
        self.flushed_this_cycle.store(false, Ordering::Release);
    }

    /// Summary recorded for a `YYYY-MM-DD` date key.
    pub async fn summary_for(&self, date_key: &str) -> Option<String> {
        self.summaries.lock().await.get(date_key).cloned()
    }

    /// All recorded summaries by date key.
    pub async fn summaries(&self) -> HashMap<String, String> {
        self.summaries.lock().await.clone()
    }

    /// Flush then compact. Flush goes first so durable facts are saved
    /// before the messages holding them are summarized away.
    pub async fn run_maintenance(&self, handler: &dyn MemoryUpdateHandler) -> MaintenanceReport {
        let flush = self.maybe_run_memory_flush(handler).await;
        let compaction = self.maybe_compact_context().await;
        MaintenanceReport { flush, compaction }
    }

    // ── Memory flush ──────────────────────────────────────────────────────

    /// Ask the model to persist durable facts, once per compaction cycle,
    /// when history is large enough.
    pub async fn maybe_run_memory_flush(&self, handler: &dyn MemoryUpdateHandler) -> FlushOutcome {
        if self.has_flushed_this_cycle() {
            return FlushOutcome::Skipped;
        }

        let messages = match self.history.messages().await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, "Memory flush could not read history");
                return FlushOutcome::Failed(e.into());
            }
        };
        let tokens = token::estimate_messages_tokens(&messages);
        if tokens < self.config.flush_token_threshold
            || messages.len() < self.config.flush_min_messages
        {
            return FlushOutcome::Skipped;
        }

        let Some(mut claim) = Claim::acquire(&self.flush_in_progress) else {
            debug!("Memory flush already running");
            return FlushOutcome::Failed(MaintenanceError::Busy("memory flush"));
        };
        self.flushed_this_cycle.store(true, Ordering::Release);
        claim.rollback = Some(&self.flushed_this_cycle);

        info!(
            provider = self.provider_name(),
            tokens,
            messages = messages.len(),
            "Running pre-compaction memory flush"
        );

        match self.run_flush(handler).await {
            Ok(outcome) => {
                claim.commit();
                outcome
            }
            Err(e) => {
                warn!(error = %e, "Memory flush failed, will retry on a later turn");
                FlushOutcome::Failed(e)
            }
        }
    }

    async fn run_flush(
        &self,
        handler: &dyn MemoryUpdateHandler,
    ) -> Result<FlushOutcome, MaintenanceError> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let reply = self
            .provider
            .send_message(&flush_prompt(&today), SendOptions::default())
            .await?;

        if is_no_op(&reply) {
            info!("Memory flush: nothing to save");
            return Ok(FlushOutcome::NothingToSave);
        }

        handler
            .apply(reply.trim())
            .await
            .map_err(MaintenanceError::Handler)?;
        info!(chars = reply.trim().len(), "Memory flush applied");
        Ok(FlushOutcome::Applied)
    }

    // ── Compaction ────────────────────────────────────────────────────────

    /// Replace all but the most recent messages with one model-written
    /// summary once history crosses the compaction thresholds.
    pub async fn maybe_compact_context(&self) -> CompactionOutcome {
        let messages = match self.history.messages().await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, "Compaction could not read history");
                return CompactionOutcome::Failed(e.into());
            }
        };
        let tokens = token::estimate_messages_tokens(&messages);
        if tokens < self.config.compaction_token_threshold
            || messages.len() < self.config.compaction_min_messages
            || messages.len() <= self.config.keep_recent
        {
            return CompactionOutcome::Skipped;
        }

        let Some(_claim) = Claim::acquire(&self.compaction_in_progress) else {
            debug!("Compaction already running");
            return CompactionOutcome::Failed(MaintenanceError::Busy("compaction"));
        };

        let count = messages.len() - self.config.keep_recent;
        info!(
            provider = self.provider_name(),
            tokens,
            summarizing = count,
            keeping = self.config.keep_recent,
            "Compacting history"
        );

        match self.compact_prefix(&messages[..count]).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Compaction failed, history left unchanged");
                CompactionOutcome::Failed(e)
            }
        }
    }

    async fn compact_prefix(&self, prefix: &[Message]) -> Result<CompactionOutcome, MaintenanceError> {
        let options = SendOptions::unrecorded().with_max_tokens(self.config.summary_max_tokens);
        let reply = self
            .provider
            .send_message(&compaction_prompt(prefix), options)
            .await?;

        let summary = reply.trim();
        if is_no_op(summary) || summary.chars().count() < self.config.min_summary_chars {
            info!(chars = summary.chars().count(), "Compaction summary too short, keeping history");
            return Ok(CompactionOutcome::Trivial);
        }

        let message = Message::system(format!("[Summary of {} earlier messages]\n{summary}", prefix.len()))
            .with_tag(SUMMARY_TAG);
        let summary_tokens = token::estimate_message_tokens(&message);
        self.history.replace_prefix(prefix.len(), message).await?;

        let date_key = Utc::now().format("%Y-%m-%d").to_string();
        self.summaries
            .lock()
            .await
            .entry(date_key)
            .and_modify(|existing| {
                existing.push_str("\n\n");
                existing.push_str(summary);
            })
            .or_insert_with(|| summary.to_string());

        self.reset_cycle();
        info!(summarized = prefix.len(), summary_tokens, "History compacted");

        Ok(CompactionOutcome::Compacted {
            summarized: prefix.len(),
            summary_tokens,
        })
    }
}

fn is_no_op(reply: &str) -> bool {
    reply.trim().eq_ignore_ascii_case(NO_OP_SENTINEL)
}

fn flush_prompt(today: &str) -> String {
    format!(
        "Pre-compaction memory flush. This conversation is nearing its context limit and \
         older messages will soon be summarized away.\n\
         Write memory-update instructions for anything durable worth keeping: user facts, \
         preferences, key decisions, open tasks. One instruction per line. Notes for today \
         belong under {today}.\n\n\
         If nothing needs saving, reply exactly: {NO_OP_SENTINEL}"
    )
}

fn compaction_prompt(prefix: &[Message]) -> String {
    let mut transcript = String::new();
    for message in prefix {
        let content: String = message
            .content
            .chars()
            .take(MAX_TRANSCRIPT_MESSAGE_CHARS)
            .collect();
        transcript.push_str(&format!("{}: {}\n", message.role, content));
    }
    format!(
        "Summarize the key points, decisions, and context from the conversation below. \
         Focus on active tasks, decisions made, user preferences learned, and open \
         questions. Output only the summary, no preamble.\n\n\
         <conversation>\n{transcript}</conversation>"
    )
}
