//! Reporting: run summaries and batch lines for the terminal.

pub mod format;

pub use format::*;
