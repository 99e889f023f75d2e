//! # Strata Core
//!
//! Domain types, collaborator traits, and error definitions for the Strata
//! context engine. Nothing in here performs I/O on its own. It defines the
//! shapes that the context crate consumes and that hosts implement.
//!
//! ## Collaborators
//!
//! The context engine never talks to a model, a database, or a file system
//! directly. Each of those is a trait here:
//! - [`Provider`]: model invocation, used only by maintenance routines
//! - [`HistoryStore`]: conversation history reader + prefix mutator
//! - [`ContextSources`]: identity notes, docs, telemetry, jobs, and friends
//! - [`MemoryUpdateHandler`]: applies memory-update instructions from a flush

pub mod error;
pub mod history;
pub mod message;
pub mod provider;
pub mod sources;

// Re-export key types at crate root for ergonomics
pub use error::{HistoryError, ProviderError, SourceError};
pub use history::{HistoryStore, InMemoryHistory, MemoryUpdateHandler};
pub use message::{Message, Role};
pub use provider::{Provider, SendOptions};
pub use sources::{
    ActiveHours, BackgroundTask, ContextSources, IndexStats, NoSources, ScheduledJob, Telemetry,
};
