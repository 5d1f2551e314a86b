//! Initial guesses and parameter bounds for the mixture fit.
//!
//! Each on-pulse component contributes one seed Gaussian (centre = mean index,
//! amplitude = half the component peak, width = index span). Higher model
//! orders reuse the seeds cyclically, so order `k` starts from the first `k`
//! entries of `seed0, seed1, ..., seed0, seed1, ...`.
//!
//! A component's span overestimates the width of a narrow pulse several times
//! over, and from there the solver can park a Gaussian at zero amplitude or
//! on a single bin. Every order is therefore started from several points:
//! - `Seeded`: the cyclic seeds as above
//! - `Narrowed`: the same seeds with widths divided by [`NARROWING`]
//! - `Grown`: the previous order's solution plus one Gaussian placed on the
//!   largest residual
//!
//! The fitter keeps whichever start reaches the lowest χ².

use std::fmt;

use crate::domain::{ComponentSet, GaussianComponent};
use crate::math::{Bounds, argmax};
use crate::models::sample_bins;

/// Smallest width (in bins) a fitted Gaussian may take.
pub const MIN_WIDTH: f64 = 0.1;

/// Divisor applied to seed widths for the `Narrowed` start.
pub const NARROWING: f64 = 4.0;

/// FWHM of a unit-width Gaussian, `2·sqrt(2 ln 2)`.
const FWHM_PER_WIDTH: f64 = 2.354_820_045_030_949;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartKind {
    Seeded,
    Narrowed,
    Grown,
}

impl fmt::Display for StartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StartKind::Seeded => "seeded",
            StartKind::Narrowed => "narrowed",
            StartKind::Grown => "grown",
        };
        f.write_str(s)
    }
}

/// One seed per component, in scan order.
pub fn component_seeds(components: &ComponentSet) -> Vec<GaussianComponent> {
    components
        .iter()
        .map(|c| GaussianComponent {
            amplitude: 0.5 * c.peak(),
            center: c.mean_index(),
            width: (c.span() as f64).max(MIN_WIDTH),
        })
        .collect()
}

/// Flat initial parameter vector for a mixture of `order` Gaussians.
pub fn initial_guess(seeds: &[GaussianComponent], order: usize) -> Vec<f64> {
    if seeds.is_empty() {
        return Vec::new();
    }
    seeds
        .iter()
        .cycle()
        .take(order)
        .flat_map(|g| [g.amplitude, g.center, g.width])
        .collect()
}

/// Every starting point for a mixture of `order` Gaussians.
///
/// `previous` is the accepted solution of order `order - 1`, if any; it only
/// contributes when its length matches.
pub fn start_points(
    y: &[f64],
    seeds: &[GaussianComponent],
    order: usize,
    previous: Option<&[f64]>,
) -> Vec<(StartKind, Vec<f64>)> {
    let mut starts = vec![(StartKind::Seeded, initial_guess(seeds, order))];

    let narrowed: Vec<GaussianComponent> = seeds
        .iter()
        .map(|g| GaussianComponent {
            width: (g.width / NARROWING).max(MIN_WIDTH),
            ..*g
        })
        .collect();
    starts.push((StartKind::Narrowed, initial_guess(&narrowed, order)));

    if let Some(prev) = previous.filter(|p| order >= 1 && p.len() == 3 * (order - 1)) {
        starts.push((StartKind::Grown, grown_guess(y, prev)));
    }
    starts.retain(|(_, guess)| guess.len() == 3 * order);
    starts
}

/// `previous` plus a Gaussian on the largest positive residual.
///
/// The new width comes from the half-maximum extent of the residual around
/// that bin, and is at least one bin.
pub fn grown_guess(y: &[f64], previous: &[f64]) -> Vec<f64> {
    let curve = sample_bins(previous, y.len());
    let residual: Vec<f64> = y.iter().zip(&curve).map(|(a, b)| a - b).collect();
    let mut guess = previous.to_vec();
    let Some(peak) = argmax(&residual) else {
        return guess;
    };

    let half = residual[peak] / 2.0;
    let mut lo = peak;
    while lo > 0 && residual[lo - 1] > half {
        lo -= 1;
    }
    let mut hi = peak;
    while hi + 1 < residual.len() && residual[hi + 1] > half {
        hi += 1;
    }
    let width = ((hi - lo + 1) as f64 / FWHM_PER_WIDTH).max(1.0);

    guess.extend([residual[peak].max(0.0), peak as f64, width]);
    guess
}

/// Box constraints: amplitude in `[0, max_y]`, centre in `[0, N]`, width in `[MIN_WIDTH, N]`.
pub fn mixture_bounds(order: usize, n_bins: usize, max_y: f64) -> Bounds {
    let n = n_bins as f64;
    let mut lower = Vec::with_capacity(3 * order);
    let mut upper = Vec::with_capacity(3 * order);
    for _ in 0..order {
        lower.extend([0.0, 0.0, MIN_WIDTH]);
        upper.extend([max_y, n, n.max(MIN_WIDTH)]);
    }
    Bounds { lower, upper }
}
