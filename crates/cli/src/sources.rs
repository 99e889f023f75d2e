//! Context sources read from a workspace directory.
//!
//! ```text
//! <workspace>/
//!   IDENTITY.md            identity / persona notes
//!   MEMORY.md              long-term memory (key "long_term")
//!   memory/<key>.md        other memory keys and daily notes (YYYY-MM-DD)
//!   docs/<name>.md         safety, capabilities, resourcefulness, tool_format
//!   ONBOARDING.md          onboarding ritual, pending while the file exists
//!   jobs.toml              [[jobs]] name / schedule / enabled / action
//!   status.toml            device_automation, [index], [telemetry], [[tasks]], [active_hours]
//! ```
//!
//! Missing files are empty sources. Unreadable or malformed files are
//! errors, which the assembler logs and skips.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Deserialize;
use strata_core::error::SourceError;
use strata_core::sources::{
    ActiveHours, BackgroundTask, ContextSources, IndexStats, ScheduledJob, Telemetry,
};
use tracing::debug;

const LONG_TERM_KEY: &str = "long_term";

#[derive(Debug, Default, Deserialize)]
struct JobsFile {
    #[serde(default)]
    jobs: Vec<ScheduledJob>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusFile {
    #[serde(default)]
    device_automation: bool,
    #[serde(default)]
    index: Option<IndexStats>,
    #[serde(default)]
    telemetry: Telemetry,
    #[serde(default)]
    tasks: Vec<BackgroundTask>,
    #[serde(default)]
    active_hours: Option<ActiveHours>,
}

#[derive(Debug, Clone)]
pub struct DirectorySources {
    root: PathBuf,
}

impl DirectorySources {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Read a file under the root. A missing file reads as empty.
    fn read(&self, relative: &str) -> Result<String, SourceError> {
        let path = self.root.join(relative);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                debug!(file = %path.display(), "Loaded context file");
                Ok(content)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(SourceError::ReadFailed {
                source_name: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn read_toml<T: Default + for<'de> Deserialize<'de>>(
        &self,
        relative: &str,
    ) -> Result<T, SourceError> {
        let raw = self.read(relative)?;
        if raw.trim().is_empty() {
            return Ok(T::default());
        }
        toml::from_str(&raw).map_err(|e| SourceError::Malformed {
            source_name: relative.to_string(),
            reason: e.to_string(),
        })
    }

    fn status(&self) -> Result<StatusFile, SourceError> {
        self.read_toml("status.toml")
    }
}

/// Keys and document names become file names, so keep them to a safe
/// alphabet.
fn checked_name<'a>(kind: &str, name: &'a str) -> Result<&'a str, SourceError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(name)
    } else {
        Err(SourceError::Malformed {
            source_name: kind.to_string(),
            reason: format!("invalid name {name:?}"),
        })
    }
}

impl ContextSources for DirectorySources {
    fn identity_notes(&self) -> Result<String, SourceError> {
        self.read("IDENTITY.md")
    }

    fn memory_notes(&self, key: &str) -> Result<String, SourceError> {
        if key == LONG_TERM_KEY {
            return self.read("MEMORY.md");
        }
        let key = checked_name("memory", key)?;
        self.read(&format!("memory/{key}.md"))
    }

    fn daily_notes(&self, date_key: &str) -> Result<String, SourceError> {
        let key = checked_name("daily_notes", date_key)?;
        self.read(&format!("memory/{key}.md"))
    }

    fn document(&self, name: &str) -> Result<String, SourceError> {
        let name = checked_name("docs", name)?;
        self.read(&format!("docs/{name}.md"))
    }

    fn onboarding(&self) -> Result<Option<String>, SourceError> {
        let ritual = self.read("ONBOARDING.md")?;
        Ok((!ritual.trim().is_empty()).then_some(ritual))
    }

    fn time_context(&self) -> Result<String, SourceError> {
        Ok(Local::now().format("%A, %Y-%m-%d %H:%M (%:z)").to_string())
    }

    fn scheduled_jobs(&self) -> Result<Vec<ScheduledJob>, SourceError> {
        Ok(self.read_toml::<JobsFile>("jobs.toml")?.jobs)
    }

    fn index_stats(&self) -> Result<Option<IndexStats>, SourceError> {
        Ok(self.status()?.index)
    }

    fn telemetry(&self) -> Result<Telemetry, SourceError> {
        Ok(self.status()?.telemetry)
    }

    fn device_automation_enabled(&self) -> Result<bool, SourceError> {
        Ok(self.status()?.device_automation)
    }

    fn background_tasks(&self) -> Result<Vec<BackgroundTask>, SourceError> {
        Ok(self.status()?.tasks)
    }

    fn active_hours(&self) -> Result<Option<ActiveHours>, SourceError> {
        Ok(self.status()?.active_hours)
    }
}
