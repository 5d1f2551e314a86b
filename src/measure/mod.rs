//! Quantities derived from a fitted profile.
//!
//! - `widths`: W10, W50, Weq, Wscat with uncertainties
//! - `extrema`: minima/maxima of the fit (with uncertainties) and of the raw profile

pub mod extrema;
pub mod widths;

pub use extrema::*;
pub use widths::*;
