//! Input/output helpers.
//!
//! - profile loaders for bestprof/ascii/csv (`ingest`)
//! - per-bin CSV export (`export`)
//! - analysis JSON read/write (`record`)

pub mod export;
pub mod ingest;
pub mod record;

pub use export::*;
pub use ingest::*;
pub use record::*;
