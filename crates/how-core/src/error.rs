//! Error types for the command memory.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Step of opening the store that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenStage {
    Connect,
    JournalMode,
    BusyTimeout,
    Schema,
    LegacyRepair,
    RebuildIndex,
}

impl fmt::Display for OpenStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            OpenStage::Connect => "opening database",
            OpenStage::JournalMode => "enabling WAL mode",
            OpenStage::BusyTimeout => "setting busy timeout",
            OpenStage::Schema => "creating schema",
            OpenStage::LegacyRepair => "deduplicating legacy rows",
            OpenStage::RebuildIndex => "rebuilding FTS index",
        };
        f.write_str(stage)
    }
}

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Failed to create memory directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open memory store ({stage}): {source}")]
    Open {
        stage: OpenStage,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Failed to save interaction: {0}")]
    Save(#[source] rusqlite::Error),

    #[error("Failed to search interactions: {0}")]
    Search(#[source] rusqlite::Error),

    #[error("Failed to list interactions: {0}")]
    List(#[source] rusqlite::Error),

    #[error("Failed to clear interactions: {0}")]
    Clear(#[source] rusqlite::Error),

    #[error("Failed to close memory store: {0}")]
    Close(#[source] rusqlite::Error),
}

impl MemoryError {
    /// Whether the store could not be opened at all.
    pub fn is_open_error(&self) -> bool {
        matches!(self, MemoryError::CreateDir { .. } | MemoryError::Open { .. })
    }

    /// Whether the operation was aborted by its [`OpContext`](crate::OpContext).
    pub fn is_interrupted(&self) -> bool {
        match self.sqlite_error() {
            Some(rusqlite::Error::SqliteFailure(e, _)) => {
                e.code == rusqlite::ErrorCode::OperationInterrupted
            }
            _ => false,
        }
    }

    fn sqlite_error(&self) -> Option<&rusqlite::Error> {
        match self {
            MemoryError::CreateDir { .. } => None,
            MemoryError::Open { source, .. } => Some(source),
            MemoryError::Save(e)
            | MemoryError::Search(e)
            | MemoryError::List(e)
            | MemoryError::Clear(e)
            | MemoryError::Close(e) => Some(e),
        }
    }
}

/// The error SQLite reports when a progress handler aborts a statement.
pub(crate) fn interrupted() -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_INTERRUPT),
        Some("operation cancelled".to_string()),
    )
}
