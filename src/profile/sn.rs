//! Signal-to-noise estimate from a folded profile.

use tracing::warn;

use crate::domain::{SnConfig, SnEstimate};
use crate::error::ProfileError;
use crate::math::{argmax, max, min};
use crate::profile::clip::{check_clip, sigma_clip};

/// Rotate `profile` so that its peak lands on bin `N/2`.
pub fn centre_on_peak(profile: &[f64]) -> Vec<f64> {
    let n = profile.len();
    let Some(peak) = argmax(profile) else {
        return Vec::new();
    };
    let mut out = profile.to_vec();
    let target = n / 2;
    if peak > target {
        out.rotate_left(peak - target);
    } else {
        out.rotate_right(target - peak);
    }
    out
}

/// Estimate S/N as peak over off-pulse sigma.
///
/// Profiles whose noise floor sits well above their minimum (or where nothing
/// was clipped) are flagged as scattered and carry no S/N.
pub fn est_sn_from_prof(profile: &[f64], alpha: f64, config: &SnConfig) -> Result<SnEstimate, ProfileError> {
    let centred = centre_on_peak(profile);
    let clip = sigma_clip(&centred, alpha, &config.clip)?;
    check_clip(&clip, &config.clip)?;

    let hi = max(&centred).ok_or(ProfileError::NumericalDegeneracy("empty profile"))?;
    let lo = min(&centred).ok_or(ProfileError::NumericalDegeneracy("empty profile"))?;
    let floor = lo + 0.1 * (hi - lo);

    let noise = clip.noise_values();
    let noise_min = min(&noise).unwrap_or(f64::INFINITY);
    if noise_min > floor || clip.clipped_count() == 0 {
        warn!(noise_min, floor, "profile is highly scattered, S/N cannot be estimated");
        return Ok(SnEstimate {
            sn: None,
            sn_error: None,
            scattered: true,
        });
    }

    let sigma = clip.sigma;
    if sigma <= 0.0 || noise.len() < 2 {
        return Err(ProfileError::NumericalDegeneracy("off-pulse noise has zero spread"));
    }
    let sigma_err = sigma / (2.0 * noise.len() as f64 - 2.0).sqrt();
    let sn = hi / sigma;
    let sn_error = sn * (config.amplitude_variance / (hi * hi) + (sigma_err / sigma).powi(2)).sqrt();

    Ok(SnEstimate {
        sn: Some(sn),
        sn_error: Some(sn_error),
        scattered: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synth::{SynthProfile, synth_profile};
    use approx::assert_relative_eq;

    #[test]
    fn centring_moves_peak_to_middle() {
        let mut p = vec![0.0; 10];
        p[1] = 3.0;
        let c = centre_on_peak(&p);
        assert_eq!(argmax(&c), Some(5));
        p[1] = 0.0;
        p[8] = 3.0;
        assert_eq!(argmax(&centre_on_peak(&p)), Some(5));
    }

    #[test]
    fn sn_tracks_peak_over_noise() {
        // Peak near the edge exercises the rotation.
        let profile = synth_profile(&SynthProfile {
            bins: 512,
            gaussians: vec![(10.0, 20.0, 6.0)],
            noise_std: 0.5,
            seed: 3,
        })
        .unwrap();
        let est = est_sn_from_prof(&profile, 3.0, &SnConfig::default()).unwrap();
        assert!(!est.scattered);
        let sn = est.sn.unwrap();
        assert!(sn > 12.0 && sn < 30.0, "sn {sn}");
        assert!(est.sn_error.unwrap() > 0.0);
    }

    #[test]
    fn uncertainty_formula() {
        let profile = synth_profile(&SynthProfile {
            bins: 256,
            gaussians: vec![(5.0, 100.0, 4.0)],
            noise_std: 0.25,
            seed: 9,
        })
        .unwrap();
        let cfg = SnConfig::default();
        let est = est_sn_from_prof(&profile, 3.0, &cfg).unwrap();

        let centred = centre_on_peak(&profile);
        let clip = sigma_clip(&centred, 3.0, &cfg.clip).unwrap();
        let hi = max(&centred).unwrap();
        let n = clip.noise_values().len() as f64;
        let sigma_err = clip.sigma / (2.0 * n - 2.0).sqrt();
        let sn = hi / clip.sigma;
        let expected = sn * (500.0 / (hi * hi) + (sigma_err / clip.sigma).powi(2)).sqrt();
        assert_relative_eq!(est.sn.unwrap(), sn, max_relative = 1e-12);
        assert_relative_eq!(est.sn_error.unwrap(), expected, max_relative = 1e-12);
    }

    #[test]
    fn raised_noise_floor_is_scattered() {
        // The only low sample is clipped as an outlier, leaving a noise floor
        // far above the profile minimum.
        let profile: Vec<f64> = (0..128)
            .map(|i| match i {
                64 => 10.0,
                10 => 0.0,
                _ => 2.0 + 0.01 * (i as f64).sin(),
            })
            .collect();
        let est = est_sn_from_prof(&profile, 3.0, &SnConfig::default()).unwrap();
        assert!(est.scattered);
        assert!(est.sn.is_none());
        assert!(est.sn_error.is_none());
    }
}
