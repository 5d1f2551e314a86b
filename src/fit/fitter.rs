//! Low-level fitting routine for a single model order.
//!
//! Given:
//! - a normalised profile `y_i` sampled at bins `x_i = i`
//! - the off-pulse noise standard deviation
//! - seed Gaussians from the on-pulse components
//!
//! we solve a bounded nonlinear least-squares problem for a mixture of `order`
//! Gaussians from each start point (see [`super::seeds`]), keep the lowest-SSE
//! solution, and score it:
//!
//! ```text
//! χ²    = Σ ((y_i - f(x_i)) / σ_noise)^2
//! χ²_r  = χ² / (N - 1)
//! BIC   = χ² + 3·order·ln N
//! ```

use tracing::trace;

use crate::domain::{GaussianComponent, GaussianFit, GaussianMixture};
use crate::math::lm::{self, LmConfig, LmFailure, LmResult};
use crate::models::{MixtureModel, PARAMS_PER_GAUSSIAN, sample_bins};

use super::seeds::{mixture_bounds, start_points};

/// Chi-square of `fit` against `observed` with a constant per-sample sigma.
pub fn chi_square(observed: &[f64], fitted: &[f64], sigma: f64) -> f64 {
    observed
        .iter()
        .zip(fitted)
        .map(|(o, e)| {
            let r = (o - e) / sigma;
            r * r
        })
        .sum()
}

/// Bayesian information criterion for Gaussian noise with a known sigma.
pub fn bic(chi_square: f64, order: usize, n: usize) -> f64 {
    chi_square + (PARAMS_PER_GAUSSIAN * order) as f64 * (n as f64).ln()
}

/// Fit a mixture of `order` Gaussians to `y`.
///
/// # Arguments
/// - `y`: normalised profile (peak 1, baseline 0)
/// - `noise_std`: off-pulse standard deviation of `y` (must be > 0)
/// - `seeds`: one seed Gaussian per on-pulse component
/// - `order`: number of Gaussians
/// - `previous`: accepted parameters of order `order - 1`, if any
/// - `config`: solver settings
///
/// Fails only when every start point fails; the first failure is returned.
pub fn fit_order(
    y: &[f64],
    noise_std: f64,
    seeds: &[GaussianComponent],
    order: usize,
    previous: Option<&[f64]>,
    config: &LmConfig,
) -> Result<GaussianFit, LmFailure> {
    let n = y.len();
    let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let max_y = y.iter().copied().fold(f64::NEG_INFINITY, f64::max).max(0.0);
    let bounds = mixture_bounds(order, n, max_y);

    let mut best: Option<LmResult> = None;
    let mut first_err: Option<LmFailure> = None;
    for (kind, mut guess) in start_points(y, seeds, order, previous) {
        bounds.project(&mut guess);
        match lm::fit(&MixtureModel, &x, y, &guess, &bounds, config) {
            Ok(res) => {
                trace!(order, start = %kind, sse = res.sse, iterations = res.iterations, "start converged");
                if best.as_ref().is_none_or(|b| res.sse < b.sse) {
                    best = Some(res);
                }
            }
            Err(e) => {
                trace!(order, start = %kind, error = %e, "start failed");
                first_err.get_or_insert(e);
            }
        }
    }

    let Some(result) = best else {
        return Err(first_err.unwrap_or(LmFailure::ShapeMismatch));
    };

    let curve = sample_bins(&result.params, n);
    let chi_square = chi_square(y, &curve, noise_std);
    let reduced_chi_square = chi_square / (n as f64 - 1.0);

    Ok(GaussianFit {
        model: GaussianMixture::from_params(&result.params),
        covariance: result.covariance,
        curve,
        chi_square,
        reduced_chi_square,
        bic: bic(chi_square, order, n),
        iterations: result.iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn single_pulse(n: usize) -> Vec<f64> {
        sample_bins(&[1.0, 30.0, 4.0], n)
    }

    #[test]
    fn bic_penalises_order() {
        let n = 128;
        assert!(bic(10.0, 2, n) > bic(10.0, 1, n));
        assert_abs_diff_eq!(bic(0.0, 1, n), 3.0 * (128f64).ln(), epsilon = 1e-12);
    }

    #[test]
    fn recovers_noise_free_gaussian() {
        let y = single_pulse(64);
        let seeds = [GaussianComponent {
            amplitude: 0.5,
            center: 31.0,
            width: 12.0,
        }];
        let fit = fit_order(&y, 0.01, &seeds, 1, None, &LmConfig::default()).unwrap();
        let g = fit.model.components[0];
        assert_abs_diff_eq!(g.amplitude, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(g.center, 30.0, epsilon = 1e-6);
        assert_abs_diff_eq!(g.width, 4.0, epsilon = 1e-6);
        assert!(fit.reduced_chi_square < 1e-6);
        assert_eq!(fit.covariance.nrows(), 3);
        assert_eq!(fit.curve.len(), 64);
    }

    #[test]
    fn wide_seeds_still_find_both_pulses() {
        // Seeds as wide as the component spans; the seeded start alone ends
        // with one Gaussian parked at zero amplitude.
        let truth = [1.0, 40.0, 4.0, 0.6, 90.0, 6.0];
        let y = sample_bins(&truth, 128);
        let seeds = [
            GaussianComponent {
                amplitude: 0.5,
                center: 40.0,
                width: 22.0,
            },
            GaussianComponent {
                amplitude: 0.3,
                center: 90.0,
                width: 30.0,
            },
        ];
        let one = fit_order(&y, 0.01, &seeds, 1, None, &LmConfig::default()).unwrap();
        let prev = one.model.to_params();
        let two = fit_order(&y, 0.01, &seeds, 2, Some(&prev), &LmConfig::default()).unwrap();
        for (got, want) in two.model.to_params().iter().zip(truth) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-6);
        }
        assert!(two.reduced_chi_square < 1e-10);
    }

    #[test]
    fn chi_square_scales_with_sigma() {
        let a = [1.0, 2.0, 3.0];
        let b = [1.0, 2.5, 2.0];
        assert_abs_diff_eq!(chi_square(&a, &b, 1.0), 1.25, epsilon = 1e-12);
        assert_abs_diff_eq!(chi_square(&a, &b, 0.5), 5.0, epsilon = 1e-12);
    }
}
