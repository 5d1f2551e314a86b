//! Gaussian mixture evaluation.
//!
//! Models are implemented as small, pure functions over flat parameter vectors
//! so that fitting and measurement code can stay generic.

pub mod model;

pub use model::*;
