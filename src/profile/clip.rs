//! Iterative sigma clipping.
//!
//! Each trial flags every sample outside `median ± alpha·std` of the samples
//! still kept, then recomputes the standard deviation. Iteration stops once
//! the relative change `(old - new) / new` drops to `tol` or `ntrials` is
//! reached. The returned sigma is the estimate in force *before* the stopping
//! check, which is the behaviour downstream noise thresholds were tuned on.

use tracing::{debug, warn};

use crate::domain::{ClipConfig, ClipResult};
use crate::error::ProfileError;
use crate::math::{median_present, std_dev, std_present};

/// Reject empty profiles and non-finite samples.
pub fn validate_profile(profile: &[f64]) -> Result<(), ProfileError> {
    if profile.is_empty() {
        return Err(ProfileError::InvalidProfile("profile has no samples".to_string()));
    }
    if let Some(i) = profile.iter().position(|v| !v.is_finite()) {
        return Err(ProfileError::InvalidProfile(format!(
            "sample {i} is not finite ({})",
            profile[i]
        )));
    }
    Ok(())
}

/// Sigma-clip `profile`, returning the noise sigma and the noise-only samples.
pub fn sigma_clip(profile: &[f64], alpha: f64, config: &ClipConfig) -> Result<ClipResult, ProfileError> {
    validate_profile(profile)?;
    if !(alpha.is_finite() && alpha > 0.0) {
        return Err(ProfileError::InvalidProfile(format!("clip alpha must be positive, got {alpha}")));
    }

    let mut samples: Vec<Option<f64>> = profile.iter().copied().map(Some).collect();
    let mut old_std = std_dev(profile).ok_or(ProfileError::NumericalDegeneracy("empty profile"))?;
    let ntrials = config.ntrials.max(1);

    for trial in 0..ntrials {
        let median = median_present(&samples)
            .ok_or(ProfileError::NumericalDegeneracy("every sample was clipped"))?;
        let lo = median - alpha * old_std;
        let hi = median + alpha * old_std;
        for s in samples.iter_mut() {
            if matches!(s, Some(v) if *v < lo || *v > hi) {
                *s = None;
            }
        }

        let new_std = std_present(&samples)
            .ok_or(ProfileError::NumericalDegeneracy("every sample was clipped"))?;
        let change = if new_std > 0.0 {
            (old_std - new_std) / new_std
        } else if old_std == 0.0 {
            0.0
        } else {
            f64::INFINITY
        };

        if change <= config.tol {
            debug!(trial = trial + 1, sigma = old_std, "sigma clip reached tolerance");
            return Ok(ClipResult { sigma: old_std, samples });
        }
        if trial + 1 == ntrials {
            warn!(ntrials, sigma = old_std, "sigma clip hit the trial limit before reaching tolerance");
            return Ok(ClipResult { sigma: old_std, samples });
        }
        old_std = new_std;
    }

    Ok(ClipResult { sigma: old_std, samples })
}

/// Reject clips that flagged too few or too many samples.
pub fn check_clip(clip: &ClipResult, config: &ClipConfig) -> Result<(), ProfileError> {
    let total = clip.len();
    let clipped = clip.clipped_count();
    let fraction = clip.clipped_fraction();
    if clipped == 0 || fraction <= config.too_little {
        return Err(ProfileError::LittleClipped { clipped, total });
    }
    if fraction >= config.too_much {
        return Err(ProfileError::TooMuchClipped { clipped, total });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synth::{SynthProfile, synth_profile};
    use approx::assert_abs_diff_eq;

    fn noisy_pulse() -> Vec<f64> {
        synth_profile(&SynthProfile {
            bins: 256,
            gaussians: vec![(1.0, 128.0, 6.0)],
            noise_std: 0.02,
            seed: 7,
        })
        .unwrap()
    }

    #[test]
    fn clips_the_pulse_and_estimates_noise() {
        let profile = noisy_pulse();
        let clip = sigma_clip(&profile, 3.0, &ClipConfig::default()).unwrap();
        assert_eq!(clip.len(), profile.len());
        // The pulse peak must be flagged, and the noise estimate should land
        // near the injected std.
        assert!(clip.samples[128].is_none());
        assert!(clip.clipped_count() > 5);
        let noise = clip.noise_std().unwrap();
        assert!((noise - 0.02).abs() < 0.01, "noise std {noise}");
        check_clip(&clip, &ClipConfig::default()).unwrap();
    }

    #[test]
    fn same_profile_and_alpha_give_the_same_clip() {
        let profile = noisy_pulse();
        let cfg = ClipConfig::default();
        for alpha in [1.5, 3.0, 4.5] {
            let first = sigma_clip(&profile, alpha, &cfg).unwrap();
            let second = sigma_clip(&profile, alpha, &cfg).unwrap();
            assert_eq!(first.sigma.to_bits(), second.sigma.to_bits());
            assert_eq!(first.on_pulse_mask(), second.on_pulse_mask());
            assert_eq!(first, second);
        }
    }

    #[test]
    fn clipping_noise_only_output_is_stable() {
        let profile = noisy_pulse();
        let cfg = ClipConfig::default();
        let first = sigma_clip(&profile, 3.0, &cfg).unwrap();
        let noise = first.noise_values();
        let second = sigma_clip(&noise, 3.0, &cfg).unwrap();
        // A second pass over pure noise removes at most a handful of tail samples.
        assert!(second.clipped_count() <= noise.len() / 50 + 1);
        let direct = crate::math::std_dev(&noise).unwrap();
        assert_abs_diff_eq!(second.sigma, direct, epsilon = 0.1 * direct);
    }

    #[test]
    fn constant_profile_is_little_clipped() {
        let profile = vec![0.0; 64];
        let clip = sigma_clip(&profile, 3.0, &ClipConfig::default()).unwrap();
        assert_eq!(clip.sigma, 0.0);
        assert_eq!(clip.clipped_count(), 0);
        let err = check_clip(&clip, &ClipConfig::default()).unwrap_err();
        assert_eq!(err, ProfileError::LittleClipped { clipped: 0, total: 64 });
    }

    #[test]
    fn heavy_clipping_is_rejected() {
        let clip = ClipResult {
            sigma: 1.0,
            samples: vec![None, None, None, None, Some(0.0)],
        };
        let err = check_clip(&clip, &ClipConfig::default()).unwrap_err();
        assert!(matches!(err, ProfileError::TooMuchClipped { clipped: 4, total: 5 }));
    }

    #[test]
    fn invalid_input_is_rejected() {
        assert!(matches!(
            sigma_clip(&[], 3.0, &ClipConfig::default()),
            Err(ProfileError::InvalidProfile(_))
        ));
        assert!(matches!(
            sigma_clip(&[1.0, f64::NAN, 2.0], 3.0, &ClipConfig::default()),
            Err(ProfileError::InvalidProfile(_))
        ));
    }
}
