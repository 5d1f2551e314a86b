//! Impulse excision.
//!
//! A single-bin (or few-bin) impulse far brighter than the pulse survives
//! clipping as its own on-pulse run, is then dropped by the component length
//! cut, and still owns the profile maximum that normalisation divides by. Runs
//! shorter than `min_comp_len` whose peak exceeds every full-length run are
//! therefore replaced by the off-pulse median before fitting.

use tracing::{debug, warn};

use crate::domain::AnalysisConfig;
use crate::error::ProfileError;
use crate::profile::{fill_clipped_prof, sigma_clip};

#[derive(Debug, Clone, PartialEq)]
pub struct Excision {
    pub profile: Vec<f64>,
    /// Bins that were overwritten, ascending.
    pub excised: Vec<usize>,
}

/// Contiguous `true` runs as half-open `(start, end)` ranges.
pub fn mask_runs(mask: &[bool]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, &on) in mask.iter().enumerate() {
        match (on, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, mask.len()));
    }
    runs
}

fn run_peak(profile: &[f64], (start, end): (usize, usize)) -> f64 {
    profile[start..end].iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Replace short, over-bright on-pulse runs with the off-pulse median.
pub fn excise_impulses(
    profile: &[f64],
    alpha: f64,
    min_comp_len: usize,
    config: &AnalysisConfig,
) -> Result<Excision, ProfileError> {
    let unchanged = || Excision {
        profile: profile.to_vec(),
        excised: Vec::new(),
    };

    let clip = sigma_clip(profile, alpha, &config.clip)?;
    let mask = fill_clipped_prof(&clip.on_pulse_mask(), config.search_scope_for(profile.len()));
    let runs = mask_runs(&mask);

    let pulse_peak = runs
        .iter()
        .filter(|(s, e)| e - s >= min_comp_len)
        .map(|&r| run_peak(profile, r))
        .reduce(f64::max);
    let (Some(pulse_peak), Some(median)) = (pulse_peak, clip.noise_median()) else {
        debug!("no full-length on-pulse run, skipping impulse excision");
        return Ok(unchanged());
    };

    let mut out = profile.to_vec();
    let mut excised = Vec::new();
    for &(start, end) in runs.iter().filter(|(s, e)| e - s < min_comp_len) {
        if run_peak(profile, (start, end)) > pulse_peak {
            for (i, v) in out.iter_mut().enumerate().take(end).skip(start) {
                *v = median;
                excised.push(i);
            }
        }
    }

    if !excised.is_empty() {
        warn!(bins = ?excised, replacement = median, "excised impulsive outliers");
    }
    Ok(Excision { profile: out, excised })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synth::{SynthProfile, synth_profile};

    #[test]
    fn runs_of_a_mask() {
        let mask = [true, true, false, false, true, false, true];
        assert_eq!(mask_runs(&mask), vec![(0, 2), (4, 5), (6, 7)]);
        assert!(mask_runs(&[false; 4]).is_empty());
    }

    #[test]
    fn bright_spike_is_replaced() {
        let mut profile = synth_profile(&SynthProfile {
            bins: 128,
            gaussians: vec![(1.0, 64.0, 5.0)],
            noise_std: 0.02,
            seed: 1,
        })
        .unwrap();
        profile[20] = 1000.0;
        let out = excise_impulses(&profile, 3.0, 5, &AnalysisConfig::default()).unwrap();
        assert_eq!(out.excised, vec![20]);
        assert!(out.profile[20].abs() < 0.1);
        assert_eq!(out.profile[64], profile[64]);
    }

    #[test]
    fn clean_profile_is_untouched() {
        let profile = synth_profile(&SynthProfile {
            bins: 128,
            gaussians: vec![(1.0, 64.0, 5.0)],
            noise_std: 0.02,
            seed: 2,
        })
        .unwrap();
        let out = excise_impulses(&profile, 3.0, 5, &AnalysisConfig::default()).unwrap();
        assert!(out.excised.is_empty());
        assert_eq!(out.profile, profile);
    }
}
