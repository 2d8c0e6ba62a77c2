//! Command-line front end for the `how` command memory.
//!
//! Split from main.rs so configuration, logging and prompt formatting can be
//! tested directly.

pub mod config;
pub mod logging;
pub mod prompt;
