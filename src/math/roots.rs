//! Scalar root finding by sign-change bracketing.
//!
//! The function is sampled on a caller-supplied grid; each strict sign change
//! between neighbours is refined by bisection. Exact zeros on grid points are
//! reported once. Roots closer together than the grid spacing may be missed,
//! which is acceptable for the smooth, bin-sampled curves in this crate.

const MAX_BISECT: usize = 200;

/// Refine a root of `f` inside `[lo, hi]` where `f(lo)` and `f(hi)` differ in sign.
pub fn bisect<F>(f: &F, mut lo: f64, mut hi: f64, tol: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    let mut f_lo = f(lo);
    for _ in 0..MAX_BISECT {
        let mid = 0.5 * (lo + hi);
        if (hi - lo).abs() <= tol {
            return mid;
        }
        let f_mid = f(mid);
        if f_mid == 0.0 {
            return mid;
        }
        if (f_mid < 0.0) == (f_lo < 0.0) {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// All roots of `f` found by scanning `grid` (ascending) for sign changes.
pub fn bracket_roots<F>(f: F, grid: &[f64], tol: f64) -> Vec<f64>
where
    F: Fn(f64) -> f64,
{
    let mut roots = Vec::new();
    if grid.len() < 2 {
        return roots;
    }

    let values: Vec<f64> = grid.iter().map(|&x| f(x)).collect();
    for i in 0..grid.len() - 1 {
        let (a, b) = (values[i], values[i + 1]);
        if !(a.is_finite() && b.is_finite()) {
            continue;
        }
        if a == 0.0 {
            // Count a grid zero only where the sign actually flips across it.
            let before = if i > 0 { values[i - 1] } else { 0.0 };
            if i > 0 && before * b < 0.0 {
                roots.push(grid[i]);
            }
            continue;
        }
        if a * b < 0.0 {
            roots.push(bisect(&f, grid[i], grid[i + 1], tol));
        }
    }
    roots
}
