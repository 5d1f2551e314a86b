//! Numerical building blocks: statistics, root finding, splines and bounded
//! nonlinear least squares.

pub mod lm;
pub mod roots;
pub mod spline;
pub mod stats;

pub use lm::*;
pub use roots::*;
pub use spline::*;
pub use stats::*;
