//! On-pulse segmentation.
//!
//! Both operations are pure: they take the current mask or profile and return
//! a new value, leaving the input untouched.

use tracing::debug;

use crate::domain::ComponentSet;
use crate::error::ProfileError;

/// Close short off-pulse gaps between on-pulse bins.
///
/// For every on-pulse bin `i` with `i + scope < N`, the farthest on-pulse bin
/// `i + j` (`1 <= j <= scope`) is located and bins `i..i + j` are marked
/// on-pulse. Filled bins take part in later look-aheads, so a chain of gaps
/// each shorter than `scope` closes completely.
pub fn fill_clipped_prof(on_pulse: &[bool], scope: usize) -> Vec<bool> {
    let mut out = on_pulse.to_vec();
    let n = out.len();
    if scope == 0 {
        return out;
    }

    for i in 0..n {
        if !out[i] || i + scope >= n {
            continue;
        }
        if let Some(j) = (1..=scope).rev().find(|&j| out[i + j]) {
            for flag in &mut out[i..i + j] {
                *flag = true;
            }
        }
    }
    out
}

/// Zero every bin not flagged on-pulse.
pub fn mask_profile(profile: &[f64], on_pulse: &[bool]) -> Vec<f64> {
    profile
        .iter()
        .zip(on_pulse)
        .map(|(&v, &on)| if on { v } else { 0.0 })
        .collect()
}

/// Split a zero-clipped profile into contiguous runs of nonzero samples.
///
/// Runs shorter than `min_comp_len` or without a positive sample are dropped.
pub fn find_components(profile: &[f64], min_comp_len: usize) -> Result<ComponentSet, ProfileError> {
    let mut runs: Vec<(Vec<usize>, Vec<f64>)> = Vec::new();
    for (i, &v) in profile.iter().enumerate() {
        if v == 0.0 {
            continue;
        }
        if i == 0 || profile[i - 1] == 0.0 || runs.is_empty() {
            runs.push((Vec::new(), Vec::new()));
        }
        if let Some((idx, vals)) = runs.last_mut() {
            idx.push(i);
            vals.push(v);
        }
    }

    let found = runs.len();
    let mut set = ComponentSet::new();
    for (indices, values) in runs {
        let peak = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if indices.len() >= min_comp_len && peak > 0.0 {
            set.push(indices, values);
        }
    }
    debug!(found, kept = set.len(), min_comp_len, "segmented on-pulse region");

    if set.is_empty() {
        return Err(ProfileError::NoComponentsFound);
    }
    Ok(set)
}
