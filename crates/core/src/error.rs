//! Error types for the Strata domain.
//!
//! One `thiserror` enum per collaborator boundary. Callers that combine
//! boundaries (maintenance, the CLI) wrap these in their own errors.

use thiserror::Error;

/// Failures of the model-invocation collaborator.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Model call failed with status {status_code}: {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Model rate limited, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Model call timed out after {0}")]
    Timeout(String),

    #[error("Request cancelled: {0}")]
    Cancelled(String),

    #[error("Model unreachable: {0}")]
    Network(String),
}

/// Failures of the conversation-history store.
#[derive(Debug, Clone, Error)]
pub enum HistoryError {
    #[error("History store failed: {0}")]
    Storage(String),

    #[error("Cannot replace {requested} messages, history holds {available}")]
    PrefixOutOfRange { requested: usize, available: usize },
}

/// Failures of an optional text/data provider.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to read {source_name}: {reason}")]
    ReadFailed { source_name: String, reason: String },

    #[error("Malformed data from {source_name}: {reason}")]
    Malformed { source_name: String, reason: String },
}
