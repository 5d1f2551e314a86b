//! Minima and maxima, of the fitted mixture and of the raw profile.

use nalgebra::DMatrix;

use crate::domain::{ExtremaSet, Extremum, GaussianFit};
use crate::error::ProfileError;
use crate::math::{InterpolatingSpline, bracket_roots, max};
use crate::models::{multi_gauss_d2dx2, multi_gauss_ddx, slope_gradient};
use crate::profile::find_components;

use super::widths::{propagate, scan_grid};

const ROOT_TOL: f64 = 1e-10;

/// Degree of the zero-smoothing spline through each raw component.
pub const RAW_SPLINE_DEGREE: usize = 4;

/// Position uncertainty of a stationary point: `sqrt(J'·C·J'ᵀ) / |f''(x)|`.
pub fn extremum_error(x: f64, params: &[f64], covariance: &DMatrix<f64>) -> f64 {
    let mut grad = vec![0.0; params.len()];
    slope_gradient(x, params, &mut grad);
    let curvature = multi_gauss_d2dx2(x, params).abs();
    if curvature == 0.0 {
        return f64::INFINITY;
    }
    propagate(&grad, covariance) / curvature
}

/// Stationary points of the fitted mixture over `[0, n_bins - 1]`.
pub fn find_minima_maxima_gauss(fit: &GaussianFit, n_bins: usize) -> ExtremaSet {
    let params = fit.model.to_params();
    let roots = bracket_roots(|x| multi_gauss_ddx(x, &params), &scan_grid(n_bins), ROOT_TOL);

    let mut set = ExtremaSet::default();
    for root in roots {
        let point = Extremum {
            position: root,
            error: extremum_error(root, &params, &fit.covariance),
        };
        // The slope falls through zero at a maximum.
        if multi_gauss_d2dx2(root, &params) < 0.0 {
            set.maxima.push(point);
        } else {
            set.minima.push(point);
        }
    }
    set
}

/// Stationary points of a zero-clipped profile.
///
/// Each component is interpolated on its own index axis by a quartic spline;
/// derivative roots are classified by the sample to their left and mapped back
/// to profile bins. A maximum at `mx` is dropped when bins `⌊mx⌋ - 1` and
/// `⌊mx⌋` both stay below `ignore_threshold · max(profile)`.
/// Returns `(minima, maxima)`.
pub fn find_minima_maxima(
    profile: &[f64],
    ignore_threshold: f64,
    min_comp_len: usize,
) -> Result<(Vec<f64>, Vec<f64>), ProfileError> {
    let components = find_components(profile, min_comp_len)?;
    let mut minima = Vec::new();
    let mut maxima = Vec::new();

    for comp in components.iter() {
        if comp.len() < 2 {
            continue;
        }
        let x: Vec<f64> = (0..comp.len()).map(|i| i as f64).collect();
        let spline = InterpolatingSpline::new(&x, &comp.values, RAW_SPLINE_DEGREE)?;
        let curvature = spline.derivative().derivative();
        let offset = comp.start() as f64;
        for root in spline.derivative_roots() {
            let idx = root as usize;
            let is_minimum = if idx == 0 {
                curvature.eval(root) > 0.0
            } else {
                comp.values[idx - 1] > comp.values[idx.min(comp.len() - 1)]
            };
            if is_minimum {
                minima.push(root + offset);
            } else {
                maxima.push(root + offset);
            }
        }
    }

    let cutoff = ignore_threshold * max(profile).unwrap_or(0.0);
    maxima.retain(|&mx| {
        let centre = (mx as usize).min(profile.len().saturating_sub(1));
        let lo = centre.saturating_sub(1);
        profile[lo..=centre].iter().copied().fold(f64::NEG_INFINITY, f64::max) >= cutoff
    });

    Ok((minima, maxima))
}
