//! Gaussian mixture evaluation.
//!
//! Parameters are a flat vector `[a0, c0, w0, a1, c1, w1, ...]`; every
//! Gaussian contributes
//!
//! ```text
//! g(x) = a · exp(-(x - c)^2 / (2 w^2))
//! ```
//!
//! The fitter needs the value and its parameter gradient. The measurement
//! stages additionally need the first and second x-derivatives and the
//! parameter gradient of the slope (for extremum uncertainties).

use crate::domain::GaussianMixture;
use crate::math::LmModel;

/// Number of parameters per Gaussian.
pub const PARAMS_PER_GAUSSIAN: usize = 3;

#[inline]
fn envelope(x: f64, c: f64, w: f64) -> f64 {
    let d = x - c;
    (-d * d / (2.0 * w * w)).exp()
}

/// Mixture value at `x`.
pub fn multi_gauss(x: f64, params: &[f64]) -> f64 {
    params
        .chunks_exact(PARAMS_PER_GAUSSIAN)
        .map(|p| p[0] * envelope(x, p[1], p[2]))
        .sum()
}

/// First derivative with respect to `x`.
pub fn multi_gauss_ddx(x: f64, params: &[f64]) -> f64 {
    params
        .chunks_exact(PARAMS_PER_GAUSSIAN)
        .map(|p| {
            let (a, c, w) = (p[0], p[1], p[2]);
            -a * envelope(x, c, w) * (x - c) / (w * w)
        })
        .sum()
}

/// Second derivative with respect to `x`.
pub fn multi_gauss_d2dx2(x: f64, params: &[f64]) -> f64 {
    params
        .chunks_exact(PARAMS_PER_GAUSSIAN)
        .map(|p| {
            let (a, c, w) = (p[0], p[1], p[2]);
            let d = x - c;
            let w2 = w * w;
            a * envelope(x, c, w) * (d * d / (w2 * w2) - 1.0 / w2)
        })
        .sum()
}

/// Gradient of the mixture value with respect to each parameter.
pub fn value_gradient(x: f64, params: &[f64], out: &mut [f64]) {
    for (p, o) in params
        .chunks_exact(PARAMS_PER_GAUSSIAN)
        .zip(out.chunks_exact_mut(PARAMS_PER_GAUSSIAN))
    {
        let (a, c, w) = (p[0], p[1], p[2]);
        let d = x - c;
        let e = envelope(x, c, w);
        o[0] = e;
        o[1] = a * e * d / (w * w);
        o[2] = a * e * d * d / (w * w * w);
    }
}

/// Gradient of the mixture slope `df/dx` with respect to each parameter.
pub fn slope_gradient(x: f64, params: &[f64], out: &mut [f64]) {
    for (p, o) in params
        .chunks_exact(PARAMS_PER_GAUSSIAN)
        .zip(out.chunks_exact_mut(PARAMS_PER_GAUSSIAN))
    {
        let (a, c, w) = (p[0], p[1], p[2]);
        let d = x - c;
        let e = envelope(x, c, w);
        let w2 = w * w;
        let w3 = w2 * w;
        o[0] = -e * d / w2;
        o[1] = a * e * (1.0 / w2 - d * d / (w2 * w2));
        o[2] = a * e * d * (2.0 / w3 - d * d / (w3 * w2));
    }
}

/// Sample the mixture at every integer bin `0..n`.
pub fn sample_bins(params: &[f64], n: usize) -> Vec<f64> {
    (0..n).map(|i| multi_gauss(i as f64, params)).collect()
}

/// Adapter that lets the least-squares solver fit a mixture of fixed order.
#[derive(Debug, Clone, Copy)]
pub struct MixtureModel;

impl LmModel for MixtureModel {
    fn evaluate(&self, x: f64, params: &[f64]) -> f64 {
        multi_gauss(x, params)
    }

    fn jacobian_row(&self, x: f64, params: &[f64], out: &mut [f64]) {
        value_gradient(x, params, out);
    }
}

impl GaussianMixture {
    pub fn eval(&self, x: f64) -> f64 {
        self.components
            .iter()
            .map(|g| g.amplitude * envelope(x, g.center, g.width))
            .sum()
    }
}
