//! Module resolution: which optional prompt sections apply this turn.
//!
//! The table is derived from the operating mode and, optionally, an intent
//! detected from the user's message. Nothing here is persisted.
//!
//! | Mode | Disabled sections |
//! |------|-------------------|
//! | chat | none |
//! | monitor | tool format, onboarding, daily notes, memory nudge |
//! | scheduled_job | onboarding, monitoring, daily notes, memory nudge |
//! | sub_task | onboarding, monitoring, health, daily notes, memory nudge |
//! | vision | onboarding, scheduled jobs, document index, background tasks |
//! | manual_control | onboarding |

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The agent's operating mode for the current turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// Interactive conversation
    #[default]
    Chat,
    /// Passive monitoring / heartbeat turns
    Monitor,
    /// Turns triggered by a scheduled job
    ScheduledJob,
    /// Delegated sub-task execution
    SubTask,
    /// Screen / camera analysis
    Vision,
    /// The user is driving the device directly
    ManualControl,
}

impl OperatingMode {
    pub const ALL: [OperatingMode; 6] = [
        Self::Chat,
        Self::Monitor,
        Self::ScheduledJob,
        Self::SubTask,
        Self::Vision,
        Self::ManualControl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Monitor => "monitor",
            Self::ScheduledJob => "scheduled_job",
            Self::SubTask => "sub_task",
            Self::Vision => "vision",
            Self::ManualControl => "manual_control",
        }
    }

    /// Modes where a person is reading along (daily notes are included).
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Chat | Self::Vision | Self::ManualControl)
    }
}

impl std::fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        match normalized.as_str() {
            "chat" => Ok(Self::Chat),
            "monitor" | "monitoring" | "passive" | "heartbeat" => Ok(Self::Monitor),
            "scheduled_job" | "cron" | "job" => Ok(Self::ScheduledJob),
            "sub_task" | "subtask" | "task" => Ok(Self::SubTask),
            "vision" => Ok(Self::Vision),
            "manual_control" | "manual" | "control" => Ok(Self::ManualControl),
            other => Err(format!("unknown operating mode: {other}")),
        }
    }
}

/// A coarse intent guessed from the user's message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Scheduling,
    Documents,
    Device,
}

const SCHEDULING_WORDS: &[&str] = &[
    "remind me",
    "every day",
    "every morning",
    "every week",
    "schedule",
    "recurring",
    "cron",
];
const DOCUMENT_WORDS: &[&str] = &["document", "my files", "pdf", "in my notes", "indexed"];
const DEVICE_WORDS: &[&str] = &["turn on", "turn off", "lights", "thermostat", "device", "open the app"];

/// Guess an intent from keywords. First family to match wins.
pub fn detect_intent(message: &str) -> Option<Intent> {
    let lower = message.to_lowercase();
    let hit = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if hit(SCHEDULING_WORDS) {
        Some(Intent::Scheduling)
    } else if hit(DOCUMENT_WORDS) {
        Some(Intent::Documents)
    } else if hit(DEVICE_WORDS) {
        Some(Intent::Device)
    } else {
        None
    }
}

/// Per-section inclusion flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFlags {
    pub capabilities: bool,
    pub resourcefulness: bool,
    pub tool_format: bool,
    pub onboarding: bool,
    pub daily_notes: bool,
    pub scheduled_jobs: bool,
    pub document_index: bool,
    pub device_automation: bool,
    pub monitoring: bool,
    pub health: bool,
    pub background_tasks: bool,
    pub active_hours: bool,
    pub memory_nudge: bool,
}

impl ModuleFlags {
    /// Every optional section enabled.
    pub fn all() -> Self {
        Self {
            capabilities: true,
            resourcefulness: true,
            tool_format: true,
            onboarding: true,
            daily_notes: true,
            scheduled_jobs: true,
            document_index: true,
            device_automation: true,
            monitoring: true,
            health: true,
            background_tasks: true,
            active_hours: true,
            memory_nudge: true,
        }
    }

    /// `(name, enabled)` pairs in a fixed order, for diagnostics.
    pub fn entries(&self) -> [(&'static str, bool); 13] {
        [
            ("capabilities", self.capabilities),
            ("resourcefulness", self.resourcefulness),
            ("tool_format", self.tool_format),
            ("onboarding", self.onboarding),
            ("daily_notes", self.daily_notes),
            ("scheduled_jobs", self.scheduled_jobs),
            ("document_index", self.document_index),
            ("device_automation", self.device_automation),
            ("monitoring", self.monitoring),
            ("health", self.health),
            ("background_tasks", self.background_tasks),
            ("active_hours", self.active_hours),
            ("memory_nudge", self.memory_nudge),
        ]
    }
}

/// Compute the section table for a mode and optional intent.
pub fn resolve_modules(mode: OperatingMode, intent: Option<Intent>) -> ModuleFlags {
    let mut flags = ModuleFlags::all();

    match mode {
        OperatingMode::Chat => {}
        OperatingMode::Monitor => {
            flags.tool_format = false;
            flags.onboarding = false;
            flags.daily_notes = false;
            flags.memory_nudge = false;
            flags.active_hours = true;
        }
        OperatingMode::ScheduledJob => {
            flags.onboarding = false;
            flags.monitoring = false;
            flags.daily_notes = false;
            flags.memory_nudge = false;
        }
        OperatingMode::SubTask => {
            flags.onboarding = false;
            flags.monitoring = false;
            flags.health = false;
            flags.daily_notes = false;
            flags.memory_nudge = false;
        }
        OperatingMode::Vision => {
            flags.onboarding = false;
            flags.scheduled_jobs = false;
            flags.document_index = false;
            flags.background_tasks = false;
        }
        OperatingMode::ManualControl => {
            flags.onboarding = false;
        }
    }

    match intent {
        Some(Intent::Scheduling) => flags.scheduled_jobs = true,
        Some(Intent::Documents) => flags.document_index = true,
        Some(Intent::Device) => flags.device_automation = true,
        None => {}
    }

    flags
}
