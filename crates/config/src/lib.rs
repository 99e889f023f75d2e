//! Configuration loading, validation, and management for Strata.
//!
//! Loads configuration from `~/.strata/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.strata/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Target model identifier (drives context-limit lookup)
    #[serde(default = "default_model")]
    pub model: String,

    /// Conversation window budget
    #[serde(default)]
    pub window: WindowConfig,

    /// Tiered prompt assembly
    #[serde(default)]
    pub assembler: AssemblerConfig,

    /// Memory flush and history compaction thresholds
    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    /// Model id → context window size, overriding the built-in table
    #[serde(default)]
    pub context_limits: HashMap<String, usize>,
}

fn default_model() -> String {
    "gpt-4o".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    #[serde(default = "default_reserved_for_reply")]
    pub reserved_for_reply: usize,

    /// History length above which dropped messages are summarized inline
    #[serde(default = "default_summarize_threshold")]
    pub summarize_threshold: usize,

    /// Importance lost per message of age
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,

    #[serde(default = "default_min_messages_to_keep")]
    pub min_messages_to_keep: usize,

    /// Re-derive the budget from `model` at startup
    #[serde(default)]
    pub derive_from_model: bool,
}

fn default_max_context_tokens() -> usize {
    80_000
}
fn default_reserved_for_reply() -> usize {
    8_192
}
fn default_summarize_threshold() -> usize {
    30
}
fn default_decay_rate() -> f64 {
    0.002
}
fn default_min_messages_to_keep() -> usize {
    6
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: default_max_context_tokens(),
            reserved_for_reply: default_reserved_for_reply(),
            summarize_threshold: default_summarize_threshold(),
            decay_rate: default_decay_rate(),
            min_messages_to_keep: default_min_messages_to_keep(),
            derive_from_model: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblerConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Character budget for the relevance-filtered memory slice
    #[serde(default = "default_memory_char_budget")]
    pub memory_char_budget: usize,

    /// Memory notes shorter than this are included verbatim
    #[serde(default = "default_memory_relevance_min_chars")]
    pub memory_relevance_min_chars: usize,

    /// Share of the model window above which the prompt is flagged
    #[serde(default = "default_prompt_warn_ratio")]
    pub prompt_warn_ratio: f64,

    /// Key under which long-term memory notes are stored
    #[serde(default = "default_memory_key")]
    pub memory_key: String,
}

fn default_cache_ttl_secs() -> u64 {
    30
}
fn default_memory_char_budget() -> usize {
    14_000
}
fn default_memory_relevance_min_chars() -> usize {
    500
}
fn default_prompt_warn_ratio() -> f64 {
    0.25
}
fn default_memory_key() -> String {
    "long_term".into()
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            memory_char_budget: default_memory_char_budget(),
            memory_relevance_min_chars: default_memory_relevance_min_chars(),
            prompt_warn_ratio: default_prompt_warn_ratio(),
            memory_key: default_memory_key(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    #[serde(default = "default_flush_token_threshold")]
    pub flush_token_threshold: usize,

    #[serde(default = "default_flush_min_messages")]
    pub flush_min_messages: usize,

    #[serde(default = "default_compaction_token_threshold")]
    pub compaction_token_threshold: usize,

    #[serde(default = "default_compaction_min_messages")]
    pub compaction_min_messages: usize,

    /// Most recent messages left untouched by compaction
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,

    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,

    /// Summaries shorter than this are discarded as trivial
    #[serde(default = "default_min_summary_chars")]
    pub min_summary_chars: usize,
}

fn default_flush_token_threshold() -> usize {
    50_000
}
fn default_flush_min_messages() -> usize {
    20
}
fn default_compaction_token_threshold() -> usize {
    80_000
}
fn default_compaction_min_messages() -> usize {
    40
}
fn default_keep_recent() -> usize {
    20
}
fn default_summary_max_tokens() -> u32 {
    1_024
}
fn default_min_summary_chars() -> usize {
    40
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            flush_token_threshold: default_flush_token_threshold(),
            flush_min_messages: default_flush_min_messages(),
            compaction_token_threshold: default_compaction_token_threshold(),
            compaction_min_messages: default_compaction_min_messages(),
            keep_recent: default_keep_recent(),
            summary_max_tokens: default_summary_max_tokens(),
            min_summary_chars: default_min_summary_chars(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.strata/config.toml).
    ///
    /// `STRATA_MODEL` overrides the configured model.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(model) = std::env::var("STRATA_MODEL") {
            config.model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".strata")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.window.max_context_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "window.max_context_tokens must be > 0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.window.decay_rate) {
            return Err(ConfigError::ValidationError(
                "window.decay_rate must be between 0.0 and 1.0".into(),
            ));
        }

        if self.assembler.prompt_warn_ratio <= 0.0 || self.assembler.prompt_warn_ratio > 1.0 {
            return Err(ConfigError::ValidationError(
                "assembler.prompt_warn_ratio must be in (0.0, 1.0]".into(),
            ));
        }

        let m = &self.maintenance;
        if m.compaction_token_threshold < m.flush_token_threshold
            || m.compaction_min_messages < m.flush_min_messages
        {
            return Err(ConfigError::ValidationError(
                "compaction thresholds must not be below flush thresholds".into(),
            ));
        }

        if m.keep_recent == 0 {
            return Err(ConfigError::ValidationError(
                "maintenance.keep_recent must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            window: WindowConfig::default(),
            assembler: AssemblerConfig::default(),
            maintenance: MaintenanceConfig::default(),
            context_limits: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.window.max_context_tokens, 80_000);
        assert_eq!(config.window.reserved_for_reply, 8_192);
        assert_eq!(config.assembler.cache_ttl_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.maintenance.keep_recent, config.maintenance.keep_recent);
    }

    #[test]
    fn partial_sections_fill_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
model = "claude-sonnet-4"

[window]
min_messages_to_keep = 2

[context_limits]
"my-local-model" = 32768
"#,
        )
        .unwrap();
        assert_eq!(config.model, "claude-sonnet-4");
        assert_eq!(config.window.min_messages_to_keep, 2);
        assert_eq!(config.window.max_context_tokens, 80_000);
        assert_eq!(config.context_limits.get("my-local-model"), Some(&32_768));
    }

    #[test]
    fn invalid_decay_rate_rejected() {
        let mut config = AppConfig::default();
        config.window.decay_rate = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_maintenance_thresholds_rejected() {
        let mut config = AppConfig::default();
        config.maintenance.compaction_token_threshold = 10_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("flush thresholds"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        let config = result.unwrap();
        assert_eq!(config.model, "gpt-4o");
    }

    #[test]
    fn malformed_file_reports_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "model = [").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o"));
        assert!(toml_str.contains("[maintenance]"));
    }
}
