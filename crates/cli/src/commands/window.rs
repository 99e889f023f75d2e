//! `strata window`: build a conversation window from a history file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use strata_config::AppConfig;
use strata_context::{BudgetConfig, ContextLimits, WindowBuilder, estimate_tokens};
use strata_core::message::{Message, Role};

pub struct WindowArgs {
    pub history: PathBuf,
    pub model: Option<String>,
    pub pins: Vec<String>,
    pub system_tokens: usize,
    pub json: bool,
}

/// A history entry as written by hand: only `role` and `content` are
/// required.
#[derive(Debug, Deserialize)]
struct HistoryEntry {
    #[serde(default)]
    id: Option<String>,
    role: Role,
    content: String,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    tag: Option<String>,
}

/// Read a JSON array of messages. Missing ids become `msg-<index>`;
/// missing timestamps are spaced one second apart in file order.
pub fn load_history(path: &Path) -> Result<Vec<Message>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let entries: Vec<HistoryEntry> = serde_json::from_str(&raw)
        .map_err(|e| format!("Invalid history file {}: {e}", path.display()))?;

    let base = Utc::now() - Duration::seconds(entries.len() as i64);
    let messages = entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let message = match entry.role {
                Role::User => Message::user(entry.content),
                Role::Assistant => Message::assistant(entry.content),
                Role::System => Message::system(entry.content),
            };
            let message = message
                .with_id(entry.id.unwrap_or_else(|| format!("msg-{i}")))
                .at(entry
                    .timestamp
                    .unwrap_or(base + Duration::seconds(i as i64)));
            match entry.tag {
                Some(tag) => message.with_tag(tag),
                None => message,
            }
        })
        .collect();
    Ok(messages)
}

pub fn run(config: &AppConfig, args: WindowArgs) -> Result<(), Box<dyn std::error::Error>> {
    let history = load_history(&args.history)?;

    let mut builder = WindowBuilder::new(BudgetConfig::from_settings(&config.window));
    let model = args.model.as_deref().or(if config.window.derive_from_model {
        Some(config.model.as_str())
    } else {
        None
    });
    if let Some(model) = model {
        let limits = ContextLimits::with_defaults().with_overrides(&config.context_limits);
        builder.configure_for_model_with(&limits, model);
    }
    for pin in args.pins {
        builder.pin(pin);
    }

    let window = builder.build(&history, args.system_tokens);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&window)?);
        return Ok(());
    }

    let budget = builder.available_budget(args.system_tokens);
    println!("Context Window");
    println!("==============");
    println!("  History:    {} messages", history.len());
    println!("  Budget:     {budget} tokens");
    println!(
        "  Admitted:   {} messages, {} tokens",
        window.messages.len(),
        window.total_tokens
    );
    println!("  Dropped:    {}", window.dropped_count);
    if window.over_budget {
        println!("  ⚠️  Pinned messages and recent tail exceed the budget");
    }
    println!();

    for message in &window.messages {
        let pinned = if builder.is_pinned(&message.id) { "📌" } else { "  " };
        let preview: String = message.content.chars().take(60).collect();
        println!(
            "{pinned} {:<12} {:<9} {:>6}t  {}",
            message.id,
            message.role.to_string(),
            estimate_tokens(&message.content),
            preview.replace('\n', " ")
        );
    }

    if let Some(summary) = &window.summary {
        println!();
        println!("{summary}");
    }

    Ok(())
}
