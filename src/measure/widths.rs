//! Pulse widths from the fitted mixture, with propagated uncertainties.
//!
//! - W10, W50, Wscat: distance between the first and last crossing of
//!   `fit - t·A`, where `A = max(fit) - min(fit)` and `t` is 0.1, 0.5 or 1/e.
//! - Weq: integral of the on-pulse samples divided by their peak.
//!
//! Crossing positions carry `σx = sqrt(J·C·Jᵀ) / |f'(x)|` with `J` the gradient
//! of the model value at `x`; the two crossing errors add in quadrature.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::domain::{GaussianFit, Measurement, WidthFailure, WidthKind, WidthSet};
use crate::error::ProfileError;
use crate::math::{InterpolatingSpline, bracket_roots, max, min};
use crate::models::{multi_gauss, multi_gauss_ddx, value_gradient};

/// Samples per bin used when scanning the model for crossings.
pub const SCAN_OVERSAMPLE: usize = 10;
const ROOT_TOL: f64 = 1e-10;

/// Dense, ascending grid over `[0, n - 1]`.
pub fn scan_grid(n_bins: usize) -> Vec<f64> {
    if n_bins < 2 {
        return vec![0.0; n_bins];
    }
    let steps = (n_bins - 1) * SCAN_OVERSAMPLE;
    (0..=steps).map(|i| i as f64 / SCAN_OVERSAMPLE as f64).collect()
}

/// `sqrt(g·C·gᵀ)` for a gradient row `g`.
pub fn propagate(gradient: &[f64], covariance: &DMatrix<f64>) -> f64 {
    let g = DVector::from_column_slice(gradient);
    let var = (g.transpose() * covariance * &g)[(0, 0)];
    var.max(0.0).sqrt()
}

/// Uncertainty of a crossing at `x` of a fitted mixture.
pub fn crossing_error(x: f64, params: &[f64], covariance: &DMatrix<f64>) -> f64 {
    let mut grad = vec![0.0; params.len()];
    value_gradient(x, params, &mut grad);
    let slope = multi_gauss_ddx(x, params).abs();
    if slope == 0.0 {
        return f64::INFINITY;
    }
    propagate(&grad, covariance) / slope
}

/// Width of `fit` at fraction `level` of its span.
pub fn width_at_level(fit: &GaussianFit, level: f64, n_bins: usize) -> Result<Measurement, ProfileError> {
    let params = fit.model.to_params();
    let span = match (max(&fit.curve), min(&fit.curve)) {
        (Some(hi), Some(lo)) => hi - lo,
        _ => return Err(ProfileError::NumericalDegeneracy("empty fit curve")),
    };
    let threshold = level * span;

    let crossings = bracket_roots(|x| multi_gauss(x, &params) - threshold, &scan_grid(n_bins), ROOT_TOL);
    let (Some(&first), Some(&last)) = (crossings.first(), crossings.last()) else {
        return Err(ProfileError::InsufficientCrossings { level, crossings: 0 });
    };
    if crossings.len() < 2 {
        return Err(ProfileError::InsufficientCrossings {
            level,
            crossings: crossings.len(),
        });
    }

    let e1 = crossing_error(first, &params, &fit.covariance);
    let e2 = crossing_error(last, &params, &fit.covariance);
    Ok(Measurement {
        value: last - first,
        error: (e1 * e1 + e2 * e2).sqrt(),
    })
}

/// Equivalent width of the on-pulse samples.
///
/// `on_pulse[i]` marks the bins the noise estimator clipped as signal; those
/// samples are concatenated, interpolated by a cubic spline and integrated.
pub fn equivalent_width(profile: &[f64], on_pulse: &[bool], noise_std: f64) -> Result<Measurement, ProfileError> {
    let samples: Vec<f64> = profile
        .iter()
        .zip(on_pulse)
        .filter(|&(_, &on)| on)
        .map(|(&v, _)| v)
        .collect();
    if samples.len() < 2 {
        return Err(ProfileError::NumericalDegeneracy("fewer than two on-pulse samples"));
    }
    let peak = max(&samples).unwrap_or(0.0);
    if !(peak > 0.0) {
        return Err(ProfileError::NumericalDegeneracy("on-pulse peak is not positive"));
    }

    let x: Vec<f64> = (0..samples.len()).map(|i| i as f64).collect();
    let integral = InterpolatingSpline::new(&x, &samples, 3)?.integral();
    let lowered: Vec<f64> = samples.iter().map(|v| (v - noise_std).max(0.0)).collect();
    let integral_low = InterpolatingSpline::new(&x, &lowered, 3)?.integral();

    let integral_err = (integral - integral_low).abs();
    let peak_err = noise_std;
    let error = ((integral_err / peak).powi(2) + (integral * peak_err / (peak * peak)).powi(2)).sqrt();
    Ok(Measurement {
        value: integral / peak,
        error,
    })
}

/// W10, W50, Weq and Wscat; widths that cannot be measured are recorded as failures.
pub fn find_widths(fit: &GaussianFit, profile: &[f64], on_pulse: &[bool], noise_std: f64) -> WidthSet {
    let n = profile.len();
    let mut set = WidthSet::default();

    for kind in WidthKind::ALL {
        let measured = match kind.level() {
            Some(level) => width_at_level(fit, level, n),
            None => equivalent_width(profile, on_pulse, noise_std),
        };
        match measured {
            Ok(m) => {
                debug!(width = kind.display_name(), value = m.value, error = m.error, "measured width");
                match kind {
                    WidthKind::W10 => set.w10 = Some(m),
                    WidthKind::W50 => set.w50 = Some(m),
                    WidthKind::Weq => set.weq = Some(m),
                    WidthKind::Wscat => set.wscat = Some(m),
                }
            }
            Err(e) => {
                warn!(width = kind.display_name(), error = %e, "width could not be measured");
                set.failures.push(WidthFailure {
                    kind,
                    reason: e.to_string(),
                });
            }
        }
    }
    set
}
