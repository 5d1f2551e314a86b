//! Multi-Gaussian fit orchestration.
//!
//! Responsibilities:
//!
//! - seed one Gaussian per on-pulse component
//! - fit mixtures of increasing order with bounded Levenberg–Marquardt
//! - select the best order using BIC

pub mod fitter;
pub mod seeds;
pub mod selection;

pub use fitter::*;
pub use seeds::*;
pub use selection::*;
