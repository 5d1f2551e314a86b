//! Interpolating B-splines (zero smoothing) with root queries.
//!
//! A spline of degree `k` through `m` points `(x_i, y_i)` lives on a clamped
//! knot vector: `k + 1` copies of `x_0`, `m - k - 1` interior knots and
//! `k + 1` copies of `x_{m-1}`. Interior knots follow the usual interpolation
//! placement:
//!
//! ```text
//! odd k:   t = x_{l + (k+1)/2}
//! even k:  t = (x_{l + k/2} + x_{l + k/2 + 1}) / 2,     l = 0 .. m - k - 1
//! ```
//!
//! so the quartic used for raw-profile extrema has its knots half-way between
//! samples. Coefficients solve the `m × m` collocation system. Between two
//! breakpoints the spline is one polynomial; roots are bisected on pieces
//! split at the roots of the derivative, which makes every piece monotone.

use nalgebra::{DMatrix, DVector};

use crate::error::ProfileError;
use crate::math::roots::bisect;

const ROOT_TOL: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct InterpolatingSpline {
    degree: usize,
    knots: Vec<f64>,
    coefs: Vec<f64>,
}

impl InterpolatingSpline {
    /// Build the degree-`degree` interpolant through `(x_i, y_i)`.
    ///
    /// `x` must be strictly increasing. With fewer than `degree + 1` points the
    /// degree drops to `len - 1`.
    pub fn new(x: &[f64], y: &[f64], degree: usize) -> Result<Self, ProfileError> {
        let m = x.len();
        if m != y.len() {
            return Err(ProfileError::InvalidProfile(format!(
                "spline abscissa/ordinate length mismatch ({m} vs {})",
                y.len()
            )));
        }
        if m < 2 {
            return Err(ProfileError::InvalidProfile(
                "a spline needs at least two samples".to_string(),
            ));
        }
        if degree == 0 {
            return Err(ProfileError::InvalidProfile("spline degree must be at least 1".to_string()));
        }
        if x.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(ProfileError::InvalidProfile(
                "spline abscissae must be strictly increasing".to_string(),
            ));
        }

        let k = degree.min(m - 1);
        let mut knots = vec![x[0]; k + 1];
        for l in 0..m - k - 1 {
            let t = if k % 2 == 1 {
                x[l + (k + 1) / 2]
            } else {
                0.5 * (x[l + k / 2] + x[l + k / 2 + 1])
            };
            knots.push(t);
        }
        knots.extend(std::iter::repeat_n(x[m - 1], k + 1));

        let mut spline = Self {
            degree: k,
            knots,
            coefs: vec![0.0; m],
        };

        let mut collocation = DMatrix::<f64>::zeros(m, m);
        for (row, &xi) in x.iter().enumerate() {
            let (span, basis) = spline.basis(xi);
            for (j, b) in basis.iter().enumerate() {
                collocation[(row, span - k + j)] = *b;
            }
        }
        let coefs = collocation
            .lu()
            .solve(&DVector::from_column_slice(y))
            .ok_or(ProfileError::NumericalDegeneracy("spline collocation matrix is singular"))?;
        spline.coefs = coefs.iter().copied().collect();
        Ok(spline)
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    fn lower(&self) -> f64 {
        self.knots[0]
    }

    fn upper(&self) -> f64 {
        self.knots[self.knots.len() - 1]
    }

    /// Knot interval `[t_mu, t_mu+1)` holding `x`; the last interval is closed.
    fn span(&self, x: f64) -> usize {
        let n = self.coefs.len();
        let k = self.degree;
        if x >= self.knots[n] {
            return n - 1;
        }
        // First knot strictly greater than x, searched among t_k+1 ..= t_n.
        let above = self.knots[k + 1..=n].partition_point(|&t| t <= x);
        k + above
    }

    /// The `degree + 1` basis functions that are nonzero at `x` (Cox–de Boor).
    fn basis(&self, x: f64) -> (usize, Vec<f64>) {
        let k = self.degree;
        let mu = self.span(x);
        let t = &self.knots;
        let mut n = vec![0.0; k + 1];
        let mut left = vec![0.0; k + 1];
        let mut right = vec![0.0; k + 1];
        n[0] = 1.0;
        for j in 1..=k {
            left[j] = x - t[mu + 1 - j];
            right[j] = t[mu + j] - x;
            let mut saved = 0.0;
            for r in 0..j {
                let tmp = n[r] / (right[r + 1] + left[j - r]);
                n[r] = saved + right[r + 1] * tmp;
                saved = left[j - r] * tmp;
            }
            n[j] = saved;
        }
        (mu, n)
    }

    /// Value at `x`, clamped to the data range.
    pub fn eval(&self, x: f64) -> f64 {
        let x = x.clamp(self.lower(), self.upper());
        let (mu, basis) = self.basis(x);
        basis
            .iter()
            .enumerate()
            .map(|(j, b)| b * self.coefs[mu - self.degree + j])
            .sum()
    }

    /// The derivative as a spline of one degree lower.
    pub fn derivative(&self) -> Self {
        let k = self.degree;
        if k == 0 {
            return Self {
                degree: 0,
                knots: self.knots.clone(),
                coefs: vec![0.0; self.coefs.len()],
            };
        }
        let coefs = self
            .coefs
            .windows(2)
            .enumerate()
            .map(|(i, c)| k as f64 * (c[1] - c[0]) / (self.knots[i + k + 1] - self.knots[i + 1]))
            .collect();
        Self {
            degree: k - 1,
            knots: self.knots[1..self.knots.len() - 1].to_vec(),
            coefs,
        }
    }

    /// Integral over the whole data range.
    pub fn integral(&self) -> f64 {
        let k = self.degree;
        self.coefs
            .iter()
            .enumerate()
            .map(|(i, c)| c * (self.knots[i + k + 1] - self.knots[i]) / (k + 1) as f64)
            .sum()
    }

    /// Distinct knots, ascending.
    fn breakpoints(&self) -> Vec<f64> {
        let mut out: Vec<f64> = Vec::new();
        for &t in &self.knots {
            if out.last().is_none_or(|&last| t > last) {
                out.push(t);
            }
        }
        out
    }

    /// Roots of the derivative in ascending order.
    pub fn derivative_roots(&self) -> Vec<f64> {
        self.derivative().roots()
    }

    /// Roots of the spline in ascending order.
    pub fn roots(&self) -> Vec<f64> {
        let breaks = self.breakpoints();
        let mut out = Vec::new();
        match self.degree {
            0 => return out,
            1 => {
                for w in breaks.windows(2) {
                    let (a, b) = (w[0], w[1]);
                    let (fa, fb) = (self.eval(a), self.eval(b));
                    if fa == 0.0 {
                        out.push(a);
                    } else if fa * fb < 0.0 {
                        out.push(a + fa / (fa - fb) * (b - a));
                    }
                }
            }
            _ => {
                let (lo, hi) = (self.lower(), self.upper());
                let mut cuts = breaks.clone();
                cuts.extend(self.derivative().roots().into_iter().filter(|&r| r > lo && r < hi));
                let cuts = dedup_sorted(cuts);

                let f = |x: f64| self.eval(x);
                for w in cuts.windows(2) {
                    let (a, b) = (w[0], w[1]);
                    let (fa, fb) = (f(a), f(b));
                    if fa == 0.0 {
                        out.push(a);
                    } else if fa * fb < 0.0 {
                        out.push(bisect(&f, a, b, ROOT_TOL));
                    }
                }
            }
        }
        if let Some(&last) = breaks.last() {
            if self.eval(last) == 0.0 {
                out.push(last);
            }
        }
        dedup_sorted(out)
    }
}

fn dedup_sorted(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    values.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
    values
}
