//! Context sources: the text and data providers behind the prompt.
//!
//! Every method has an empty default so a host implements only the sources
//! it actually has. Any method may fail; the assembler treats a failure as
//! an empty section and never lets it block a turn.

use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// A queued / recurring job known to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub name: String,

    /// Schedule expression as the scheduler understands it (e.g. cron)
    pub schedule: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// What the job does when it fires
    #[serde(default)]
    pub action: String,
}

fn default_true() -> bool {
    true
}

/// Document-index statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub chunk_count: usize,
    pub file_count: usize,
    /// e.g. "local", "remote", "keyword-only"
    pub embedding_mode: String,
}

/// Live telemetry snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// One-line status summary (CPU, memory, battery, ...)
    #[serde(default)]
    pub summary: String,

    /// Active warnings, most severe first
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// A background sub-process / sub-task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundTask {
    pub id: String,
    pub description: String,
    pub elapsed_secs: u64,
}

/// The daily window in which the agent may act unprompted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveHours {
    /// "HH:MM"
    pub start: String,
    /// "HH:MM"
    pub end: String,
}

/// The six families of context providers consumed by the tiered assembler.
pub trait ContextSources: Send + Sync {
    /// Identity / persona notes.
    fn identity_notes(&self) -> Result<String, SourceError> {
        Ok(String::new())
    }

    /// Long-term memory notes stored under `key`.
    fn memory_notes(&self, _key: &str) -> Result<String, SourceError> {
        Ok(String::new())
    }

    /// Daily notes for a date key (the core uses `YYYY-MM-DD`).
    fn daily_notes(&self, _date_key: &str) -> Result<String, SourceError> {
        Ok(String::new())
    }

    /// An instruction document by name: `safety`, `capabilities`,
    /// `resourcefulness`, `tool_format`.
    fn document(&self, _name: &str) -> Result<String, SourceError> {
        Ok(String::new())
    }

    /// Onboarding-ritual content, `Some` only while onboarding is pending.
    fn onboarding(&self) -> Result<Option<String>, SourceError> {
        Ok(None)
    }

    /// Current time-of-day context string.
    fn time_context(&self) -> Result<String, SourceError> {
        Ok(String::new())
    }

    fn scheduled_jobs(&self) -> Result<Vec<ScheduledJob>, SourceError> {
        Ok(Vec::new())
    }

    fn index_stats(&self) -> Result<Option<IndexStats>, SourceError> {
        Ok(None)
    }

    fn telemetry(&self) -> Result<Telemetry, SourceError> {
        Ok(Telemetry::default())
    }

    fn device_automation_enabled(&self) -> Result<bool, SourceError> {
        Ok(false)
    }

    fn background_tasks(&self) -> Result<Vec<BackgroundTask>, SourceError> {
        Ok(Vec::new())
    }

    fn active_hours(&self) -> Result<Option<ActiveHours>, SourceError> {
        Ok(None)
    }
}

/// A source set with nothing in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSources;

impl ContextSources for NoSources {}
