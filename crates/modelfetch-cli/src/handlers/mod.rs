//! Command handlers.
//!
//! Handlers are thin: validate CLI-specific input, call the download
//! manager, and format the outcome for the terminal.

pub mod get;
pub mod paths;
