//! End-to-end profile analysis.
//!
//! - `despike`: impulse excision ahead of normalisation
//! - `evaluate`: one full evaluation at a fixed clip `alpha`
//! - `auto`: the alpha sweep and the fixed/auto dispatcher

pub mod auto;
pub mod despike;
pub mod evaluate;

pub use auto::*;
pub use despike::*;
pub use evaluate::*;
