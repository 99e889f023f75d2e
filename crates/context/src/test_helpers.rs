//! Shared test fixtures: scripted and hanging providers, a recording
//! update handler, and in-memory context sources.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{Duration, TimeZone, Utc};
use strata_core::error::{ProviderError, SourceError};
use strata_core::history::MemoryUpdateHandler;
use strata_core::message::Message;
use strata_core::provider::{Provider, SendOptions};
use strata_core::sources::{
    ActiveHours, BackgroundTask, ContextSources, IndexStats, ScheduledJob, Telemetry,
};

/// `n` alternating user/assistant messages of exactly `chars` characters,
/// with ids `msg-<i>` one minute apart.
pub fn history_of(n: usize, chars: usize) -> Vec<Message> {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let mut content = format!("message {i} ");
            while content.len() < chars {
                content.push('x');
            }
            content.truncate(chars);
            let msg = if i % 2 == 0 {
                Message::user(content)
            } else {
                Message::assistant(content)
            };
            msg.with_id(format!("msg-{i}"))
                .at(start + Duration::minutes(i as i64))
        })
        .collect()
}

/// A provider that replays a fixed script of replies.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: Mutex<Vec<(String, SendOptions)>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Only successful text replies.
    pub fn texts(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Prompt and options of the `n`th call.
    pub fn call(&self, n: usize) -> (String, SendOptions) {
        self.calls.lock().unwrap()[n].clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn send_message(
        &self,
        prompt: &str,
        options: SendOptions,
    ) -> Result<String, ProviderError> {
        let call = self.calls.lock().unwrap().len();
        self.calls.lock().unwrap().push((prompt.to_string(), options));
        self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
            panic!("ScriptedProvider: no more replies (call #{call})")
        })
    }
}

/// A provider whose calls never complete, for in-flight and cancellation
/// tests.
#[derive(Default)]
pub struct HangingProvider {
    calls: Mutex<usize>,
}

impl HangingProvider {
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Provider for HangingProvider {
    fn name(&self) -> &str {
        "hanging_mock"
    }

    async fn send_message(
        &self,
        _prompt: &str,
        _options: SendOptions,
    ) -> Result<String, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        std::future::pending().await
    }
}

/// Records every instruction block it is asked to apply.
#[derive(Default)]
pub struct RecordingHandler {
    applied: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingHandler {
    pub fn failing() -> Self {
        Self {
            applied: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn applied(&self) -> Vec<String> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MemoryUpdateHandler for RecordingHandler {
    async fn apply(&self, instructions: &str) -> Result<(), SourceError> {
        if self.fail {
            return Err(SourceError::Unavailable("memory store offline".into()));
        }
        self.applied.lock().unwrap().push(instructions.to_string());
        Ok(())
    }
}

/// Context sources backed by plain fields. Fields left empty behave like
/// an absent source; names in `failing` return an error instead.
#[derive(Default)]
pub struct StaticSources {
    pub identity: String,
    pub memory: String,
    pub daily: String,
    pub documents: HashMap<String, String>,
    pub onboarding: Option<String>,
    pub time: String,
    pub jobs: Vec<ScheduledJob>,
    pub index: Option<IndexStats>,
    pub telemetry: Telemetry,
    pub device_automation: bool,
    pub tasks: Vec<BackgroundTask>,
    pub active_hours: Option<ActiveHours>,
    pub failing: Vec<&'static str>,
    pub identity_reads: Mutex<usize>,
    pub daily_keys: Mutex<Vec<String>>,
}

impl StaticSources {
    fn check(&self, name: &str) -> Result<(), SourceError> {
        if self.failing.contains(&name) {
            return Err(SourceError::ReadFailed {
                source_name: name.to_string(),
                reason: "simulated failure".into(),
            });
        }
        Ok(())
    }

    pub fn with_document(mut self, name: &str, text: &str) -> Self {
        self.documents.insert(name.to_string(), text.to_string());
        self
    }

    pub fn identity_reads(&self) -> usize {
        *self.identity_reads.lock().unwrap()
    }

    /// Date keys passed to `daily_notes`, in call order.
    pub fn daily_keys(&self) -> Vec<String> {
        self.daily_keys.lock().unwrap().clone()
    }
}

impl ContextSources for StaticSources {
    fn identity_notes(&self) -> Result<String, SourceError> {
        *self.identity_reads.lock().unwrap() += 1;
        self.check("identity")?;
        Ok(self.identity.clone())
    }

    fn memory_notes(&self, _key: &str) -> Result<String, SourceError> {
        self.check("memory")?;
        Ok(self.memory.clone())
    }

    fn daily_notes(&self, date_key: &str) -> Result<String, SourceError> {
        self.daily_keys.lock().unwrap().push(date_key.to_string());
        self.check("daily")?;
        Ok(self.daily.clone())
    }

    fn document(&self, name: &str) -> Result<String, SourceError> {
        self.check(name)?;
        Ok(self.documents.get(name).cloned().unwrap_or_default())
    }

    fn onboarding(&self) -> Result<Option<String>, SourceError> {
        self.check("onboarding")?;
        Ok(self.onboarding.clone())
    }

    fn time_context(&self) -> Result<String, SourceError> {
        self.check("time")?;
        Ok(self.time.clone())
    }

    fn scheduled_jobs(&self) -> Result<Vec<ScheduledJob>, SourceError> {
        self.check("jobs")?;
        Ok(self.jobs.clone())
    }

    fn index_stats(&self) -> Result<Option<IndexStats>, SourceError> {
        self.check("index")?;
        Ok(self.index.clone())
    }

    fn telemetry(&self) -> Result<Telemetry, SourceError> {
        self.check("telemetry")?;
        Ok(self.telemetry.clone())
    }

    fn device_automation_enabled(&self) -> Result<bool, SourceError> {
        self.check("device")?;
        Ok(self.device_automation)
    }

    fn background_tasks(&self) -> Result<Vec<BackgroundTask>, SourceError> {
        self.check("tasks")?;
        Ok(self.tasks.clone())
    }

    fn active_hours(&self) -> Result<Option<ActiveHours>, SourceError> {
        self.check("active_hours")?;
        Ok(self.active_hours.clone())
    }
}
