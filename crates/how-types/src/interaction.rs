//! Recorded question → command interactions.
//!
//! An interaction is created the first time a command is saved and updated in
//! place every time the same command is saved again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One remembered command together with the question that last produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    /// Row identifier, assigned on first insert and never reused.
    pub id: i64,
    /// The most recent question that produced or matched this command.
    pub question: String,
    /// The shell command. Unique across all stored interactions.
    pub command: String,
    /// The most recent explanation given for the command.
    pub explanation: String,
    /// Space-joined keywords extracted from `question`, used for indexing.
    pub tags: String,
    /// When the command was first saved.
    pub created_at: DateTime<Utc>,
    /// How many times the command has been saved.
    pub use_count: u32,
}

impl Interaction {
    /// Whether the command has been saved more than once.
    pub fn is_repeat(&self) -> bool {
        self.use_count > 1
    }

    /// Keywords this interaction is indexed under.
    pub fn tag_list(&self) -> impl Iterator<Item = &str> {
        self.tags.split_whitespace()
    }
}
