//! Profile-level stages that run before any model fitting.
//!
//! - `clip`: iterative sigma-clipping noise estimate and clip sanity check
//! - `components`: gap filling and contiguous on-pulse segmentation
//! - `sn`: signal-to-noise estimate from the raw profile

pub mod clip;
pub mod components;
pub mod sn;

pub use clip::*;
pub use components::*;
pub use sn::*;
