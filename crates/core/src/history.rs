//! History store trait: the conversation-history collaborator.
//!
//! The store owns messages. The context engine reads snapshots and, during
//! compaction, asks the store to replace a prefix with one summary message.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{HistoryError, SourceError};
use crate::message::Message;

/// Reader + prefix mutator over one conversation's history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Ordered snapshot of the conversation (oldest first).
    async fn messages(&self) -> Result<Vec<Message>, HistoryError>;

    /// Replace the oldest `count` messages with a single `summary` message.
    async fn replace_prefix(&self, count: usize, summary: Message) -> Result<(), HistoryError>;
}

/// Applies the memory-update instructions emitted during a memory flush.
#[async_trait]
pub trait MemoryUpdateHandler: Send + Sync {
    async fn apply(&self, instructions: &str) -> Result<(), SourceError>;
}

/// A history store kept in a Vec.
/// Useful for tests and sessions where persistence isn't needed.
#[derive(Clone, Default)]
pub struct InMemoryHistory {
    messages: Arc<RwLock<Vec<Message>>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an existing history.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            messages: Arc::new(RwLock::new(messages)),
        }
    }

    /// Append a message.
    pub async fn push(&self, message: Message) {
        self.messages.write().await.push(message);
    }

    /// Number of stored messages.
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn messages(&self) -> Result<Vec<Message>, HistoryError> {
        Ok(self.messages.read().await.clone())
    }

    async fn replace_prefix(&self, count: usize, summary: Message) -> Result<(), HistoryError> {
        let mut messages = self.messages.write().await;
        if count > messages.len() {
            return Err(HistoryError::PrefixOutOfRange {
                requested: count,
                available: messages.len(),
            });
        }
        messages.splice(..count, std::iter::once(summary));
        tracing::debug!(replaced = count, remaining = messages.len(), "History prefix replaced");
        Ok(())
    }
}
