//! Provider trait: the abstraction over model invocation.
//!
//! The context engine only calls a model from its maintenance routines
//! (memory flush and history compaction). Everything else is local.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Per-request options for [`Provider::send_message`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendOptions {
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Do not record this exchange in conversation history
    #[serde(default)]
    pub skip_history: bool,
}

impl SendOptions {
    /// Options for a request whose exchange must not enter history.
    pub fn unrecorded() -> Self {
        Self {
            skip_history: true,
            ..Self::default()
        }
    }

    /// Cap the reply length.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// The model-invocation collaborator.
///
/// Hosts wrap their model client in this trait. Cancellation and timeouts
/// are the host's business; a cancelled call should surface as an error.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider.
    fn name(&self) -> &str;

    /// Send a prompt and return the model's text reply.
    async fn send_message(
        &self,
        prompt: &str,
        options: SendOptions,
    ) -> std::result::Result<String, ProviderError>;
}
