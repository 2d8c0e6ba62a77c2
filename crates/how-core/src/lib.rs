//! Command memory for `how`: keyword extraction and the interaction store.

mod context;
mod error;
mod interaction_store;
pub mod keywords;

pub use context::OpContext;
pub use error::{MemoryError, OpenStage};
pub use interaction_store::{InteractionStore, StoreOptions, DB_FILE_NAME, DEFAULT_BUSY_TIMEOUT};
pub use keywords::{extract, tags_for};

pub use how_types::Interaction;

/// Result type for memory operations.
pub type Result<T> = std::result::Result<T, MemoryError>;
