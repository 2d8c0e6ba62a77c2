//! Shared types for the `how` command memory.

mod interaction;

pub use interaction::*;
