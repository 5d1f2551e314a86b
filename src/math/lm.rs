//! Bounded Levenberg–Marquardt least squares.
//!
//! We minimise
//!
//! ```text
//! SSE(p) = Σ (y_i - f(x_i; p))^2,   lower <= p <= upper
//! ```
//!
//! Implementation choices:
//! - Marquardt scaling: the damping term is `λ·diag(JᵀJ)`, so parameters with
//!   very different magnitudes (amplitudes near 1, centres in the hundreds)
//!   are handled evenly.
//! - Bounds use an active set: a parameter resting on a bound whose descent
//!   direction points outward is held fixed for that iteration, the damped
//!   system is solved for the rest, and the trial point is projected back
//!   into the box.
//! - The covariance is `pinv(JᵀJ)·SSE/(n - m)` evaluated at the solution. We use
//!   an SVD pseudo-inverse so that degenerate mixtures (two identical
//!   Gaussians) still yield a usable, if singular, covariance.

use nalgebra::{DMatrix, DVector};

/// A model that can be fitted by [`fit`].
pub trait LmModel {
    fn evaluate(&self, x: f64, params: &[f64]) -> f64;

    /// Partial derivatives of `evaluate` with respect to each parameter.
    fn jacobian_row(&self, x: f64, params: &[f64], out: &mut [f64]);
}

/// Box constraints on the parameter vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    pub fn project(&self, params: &mut [f64]) {
        for (i, p) in params.iter_mut().enumerate() {
            *p = p.clamp(self.lower[i], self.upper[i]);
        }
    }

    /// True when parameter `i` sits on a bound and `direction` points out of the box.
    pub fn blocks(&self, i: usize, value: f64, direction: f64) -> bool {
        (value <= self.lower[i] && direction < 0.0) || (value >= self.upper[i] && direction > 0.0)
    }

    pub fn contains(&self, params: &[f64]) -> bool {
        params
            .iter()
            .enumerate()
            .all(|(i, p)| *p >= self.lower[i] && *p <= self.upper[i])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmConfig {
    pub max_iterations: usize,
    /// Relative SSE decrease below which we stop.
    pub ftol: f64,
    /// Relative step size below which we stop.
    pub xtol: f64,
    /// Gradient infinity-norm below which we stop.
    pub gtol: f64,
    pub initial_lambda: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-12,
            initial_lambda: 1e-3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LmResult {
    pub params: Vec<f64>,
    pub covariance: DMatrix<f64>,
    pub sse: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LmFailure {
    #[error("{n} observations cannot constrain {m} parameters")]
    Underdetermined { n: usize, m: usize },

    #[error("initial guess and bounds have different lengths")]
    ShapeMismatch,

    #[error("non-finite residuals")]
    NonFinite,

    #[error("no convergence after {0} iterations")]
    MaxIterations(usize),

    #[error("covariance could not be computed: {0}")]
    Covariance(&'static str),
}

const LAMBDA_MIN: f64 = 1e-15;
const LAMBDA_MAX: f64 = 1e16;
const DIAG_FLOOR: f64 = 1e-12;

/// Fit `model` to `(x, y)` starting from `initial`.
pub fn fit<M: LmModel>(
    model: &M,
    x: &[f64],
    y: &[f64],
    initial: &[f64],
    bounds: &Bounds,
    config: &LmConfig,
) -> Result<LmResult, LmFailure> {
    let n = x.len();
    let m = initial.len();
    if bounds.lower.len() != m || bounds.upper.len() != m || y.len() != n {
        return Err(LmFailure::ShapeMismatch);
    }
    if n <= m {
        return Err(LmFailure::Underdetermined { n, m });
    }

    let mut params = initial.to_vec();
    bounds.project(&mut params);

    let mut residuals = residual_vector(model, x, y, &params);
    let mut sse = residuals.norm_squared();
    if !sse.is_finite() {
        return Err(LmFailure::NonFinite);
    }

    let mut lambda = config.initial_lambda;
    let mut converged = sse == 0.0;
    let mut iterations = 0;

    while !converged && iterations < config.max_iterations {
        iterations += 1;
        let jac = jacobian(model, x, &params);
        let jtj = jac.transpose() * &jac;
        let grad = jac.transpose() * &residuals;

        // Parameters pinned to a bound with the gradient pushing outward stay put.
        let free: Vec<usize> = (0..m).filter(|&i| !bounds.blocks(i, params[i], grad[i])).collect();
        if free.iter().all(|&i| grad[i].abs() <= config.gtol) {
            converged = true;
            break;
        }
        let sub_jtj = jtj.select_rows(&free).select_columns(&free);
        let sub_grad = grad.select_rows(&free);

        loop {
            let mut damped = sub_jtj.clone();
            for i in 0..free.len() {
                damped[(i, i)] += lambda * sub_jtj[(i, i)].max(DIAG_FLOOR);
            }

            let Some(step) = damped.cholesky().map(|c| c.solve(&sub_grad)) else {
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    converged = true;
                    break;
                }
                continue;
            };

            let mut trial = params.clone();
            for (k, &i) in free.iter().enumerate() {
                trial[i] += step[k];
            }
            bounds.project(&mut trial);
            let trial_residuals = residual_vector(model, x, y, &trial);
            let trial_sse = trial_residuals.norm_squared();

            if trial_sse.is_finite() && trial_sse < sse {
                let moved: f64 = params
                    .iter()
                    .zip(&trial)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>()
                    .sqrt();
                let scale: f64 = params.iter().map(|p| p * p).sum::<f64>().sqrt();
                let decrease = sse - trial_sse;

                params = trial;
                residuals = trial_residuals;
                sse = trial_sse;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);

                if decrease <= config.ftol * sse.max(f64::MIN_POSITIVE)
                    || moved <= config.xtol * (scale + config.xtol)
                    || sse == 0.0
                {
                    converged = true;
                }
                break;
            }

            // No downhill step left at any damping: we are at a (bounded) minimum.
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                converged = true;
                break;
            }
        }
    }

    if !converged {
        return Err(LmFailure::MaxIterations(iterations));
    }

    let covariance = covariance(model, x, &params, sse)?;
    Ok(LmResult {
        params,
        covariance,
        sse,
        iterations,
    })
}

fn residual_vector<M: LmModel>(model: &M, x: &[f64], y: &[f64], params: &[f64]) -> DVector<f64> {
    DVector::from_iterator(
        x.len(),
        x.iter().zip(y).map(|(&xi, &yi)| yi - model.evaluate(xi, params)),
    )
}

fn jacobian<M: LmModel>(model: &M, x: &[f64], params: &[f64]) -> DMatrix<f64> {
    let m = params.len();
    let mut jac = DMatrix::<f64>::zeros(x.len(), m);
    let mut row = vec![0.0; m];
    for (i, &xi) in x.iter().enumerate() {
        model.jacobian_row(xi, params, &mut row);
        for j in 0..m {
            jac[(i, j)] = row[j];
        }
    }
    jac
}

fn covariance<M: LmModel>(
    model: &M,
    x: &[f64],
    params: &[f64],
    sse: f64,
) -> Result<DMatrix<f64>, LmFailure> {
    let n = x.len();
    let m = params.len();
    let jac = jacobian(model, x, params);
    let jtj = jac.transpose() * &jac;
    if jtj.iter().any(|v| !v.is_finite()) {
        return Err(LmFailure::Covariance("non-finite Jacobian"));
    }

    let svd = jtj.svd(true, true);
    let largest = svd.singular_values.max();
    let eps = f64::EPSILON * (n.max(m) as f64) * largest;
    let pinv = svd.pseudo_inverse(eps).map_err(LmFailure::Covariance)?;

    let dof = (n - m) as f64;
    Ok(pinv * (sse / dof))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    struct Line;

    impl LmModel for Line {
        fn evaluate(&self, x: f64, p: &[f64]) -> f64 {
            p[0] + p[1] * x
        }

        fn jacobian_row(&self, x: f64, _p: &[f64], out: &mut [f64]) {
            out[0] = 1.0;
            out[1] = x;
        }
    }

    struct Exp;

    impl LmModel for Exp {
        fn evaluate(&self, x: f64, p: &[f64]) -> f64 {
            p[0] * (-p[1] * x).exp()
        }

        fn jacobian_row(&self, x: f64, p: &[f64], out: &mut [f64]) {
            let e = (-p[1] * x).exp();
            out[0] = e;
            out[1] = -p[0] * x * e;
        }
    }

    fn open_bounds(m: usize) -> Bounds {
        Bounds {
            lower: vec![f64::NEG_INFINITY; m],
            upper: vec![f64::INFINITY; m],
        }
    }

    #[test]
    fn recovers_line_exactly() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 + 3.0 * v).collect();
        let res = fit(&Line, &x, &y, &[0.0, 0.0], &open_bounds(2), &LmConfig::default()).unwrap();
        assert_abs_diff_eq!(res.params[0], 2.0, epsilon = 1e-8);
        assert_abs_diff_eq!(res.params[1], 3.0, epsilon = 1e-8);
        assert!(res.sse < 1e-12);
    }

    #[test]
    fn recovers_exponential_decay() {
        let x: Vec<f64> = (0..30).map(|i| i as f64 * 0.2).collect();
        let y: Vec<f64> = x.iter().map(|v| 4.0 * (-0.7 * v).exp()).collect();
        let res = fit(&Exp, &x, &y, &[1.0, 0.1], &open_bounds(2), &LmConfig::default()).unwrap();
        assert_abs_diff_eq!(res.params[0], 4.0, epsilon = 1e-6);
        assert_abs_diff_eq!(res.params[1], 0.7, epsilon = 1e-6);
    }

    #[test]
    fn respects_upper_bound() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 5.0 + 0.0 * v).collect();
        let bounds = Bounds {
            lower: vec![0.0, -1.0],
            upper: vec![3.0, 1.0],
        };
        let res = fit(&Line, &x, &y, &[1.0, 0.0], &bounds, &LmConfig::default()).unwrap();
        assert!(bounds.contains(&res.params));
        assert!(res.params[0] <= 3.0);
    }

    #[test]
    fn pinned_parameter_lets_the_rest_converge() {
        // Unconstrained optimum has intercept -1; with intercept >= 0 the slope
        // becomes the through-origin least-squares slope Σxy / Σx².
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| -1.0 + 2.0 * v).collect();
        let bounds = Bounds {
            lower: vec![0.0, f64::NEG_INFINITY],
            upper: vec![f64::INFINITY, f64::INFINITY],
        };
        let res = fit(&Line, &x, &y, &[0.5, 0.0], &bounds, &LmConfig::default()).unwrap();
        assert_eq!(res.params[0], 0.0);
        assert_abs_diff_eq!(res.params[1], 525.0 / 285.0, epsilon = 1e-8);
    }

    #[test]
    fn covariance_matches_linear_regression() {
        // For OLS, cov = s^2 (XᵀX)^-1 with s^2 = SSE/(n-2).
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [0.1, 0.9, 2.1, 2.9];
        let res = fit(&Line, &x, &y, &[0.0, 1.0], &open_bounds(2), &LmConfig::default()).unwrap();
        let s2 = res.sse / 2.0;
        // (XᵀX)^-1 for x = 0..3: [[0.7, -0.3], [-0.3, 0.2]]
        assert_abs_diff_eq!(res.covariance[(0, 0)], 0.7 * s2, epsilon = 1e-9);
        assert_abs_diff_eq!(res.covariance[(1, 1)], 0.2 * s2, epsilon = 1e-9);
        assert_abs_diff_eq!(res.covariance[(0, 1)], -0.3 * s2, epsilon = 1e-9);
    }

    #[test]
    fn underdetermined_is_rejected() {
        let err = fit(&Line, &[0.0, 1.0], &[0.0, 1.0], &[0.0, 0.0], &open_bounds(2), &LmConfig::default())
            .unwrap_err();
        assert_eq!(err, LmFailure::Underdetermined { n: 2, m: 2 });
    }
}
