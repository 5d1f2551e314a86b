//! `pulse-widths` library crate.
//!
//! The binary (`pw`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the analysis stages can be driven from other tools
//! - code stays easy to navigate as the project grows
//!
//! Pipeline stages, in dependency order: `profile` (clip, segment, S/N),
//! `fit` (multi-Gaussian + BIC), `measure` (widths, extrema), `analysis`
//! (single-alpha evaluation and the alpha sweep).

pub mod analysis;
pub mod app;
pub mod cli;
pub mod data;
pub mod debug;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod measure;
pub mod models;
pub mod plot;
pub mod profile;
pub mod report;
