//! Single-alpha profile evaluation.
//!
//! Pipeline:
//! impulse excision -> clip/normalise/segment/fit -> widths -> extrema -> S/N

use tracing::{debug, info};

use crate::domain::{AnalysisConfig, ProfileAnalysis};
use crate::error::ProfileError;
use crate::fit::fit_gaussian;
use crate::measure::{find_minima_maxima, find_minima_maxima_gauss, find_widths};
use crate::profile::{est_sn_from_prof, mask_profile, validate_profile};

use super::despike::excise_impulses;

/// Fit `profile` with clip multiplier `alpha` and derive every measurement.
pub fn prof_eval_gfit(profile: &[f64], alpha: f64, config: &AnalysisConfig) -> Result<ProfileAnalysis, ProfileError> {
    validate_profile(profile)?;
    let n = profile.len();
    let min_comp_len = config.min_comp_len_for(n);
    debug!(alpha, n_bins = n, min_comp_len, "evaluating profile");

    let excision = excise_impulses(profile, alpha, min_comp_len, config)?;
    let outcome = fit_gaussian(&excision.profile, alpha, min_comp_len, config)?;
    let best = &outcome.selection.best;

    let widths = find_widths(best, &outcome.profile, &outcome.clip.on_pulse_mask(), outcome.noise_std);
    let extrema = find_minima_maxima_gauss(best, n);

    let zeroed = mask_profile(&outcome.profile, &outcome.on_pulse);
    let (raw_minima, raw_maxima) = find_minima_maxima(&zeroed, config.ignore_threshold, min_comp_len)?;

    let sn = match config.period_ms {
        Some(_) => Some(est_sn_from_prof(&outcome.profile, alpha, &config.sn)?),
        None => None,
    };

    info!(
        alpha,
        n_gaussians = best.n_gaussians(),
        reduced_chi_square = best.reduced_chi_square,
        w10 = ?widths.w10.map(|m| m.value),
        w50 = ?widths.w50.map(|m| m.value),
        weq = ?widths.weq.map(|m| m.value),
        wscat = ?widths.wscat.map(|m| m.value),
        maxima = ?extrema.maxima.iter().map(|m| m.position).collect::<Vec<_>>(),
        sn = ?sn.and_then(|s| s.sn),
        "profile evaluated"
    );

    Ok(ProfileAnalysis {
        alpha,
        on_pulse: outcome.clip.on_pulse_mask(),
        noise_std: outcome.noise_std,
        min_comp_len,
        n_components: outcome.components.len(),
        excised_bins: excision.excised,
        orders: outcome.selection.summaries(),
        skipped_orders: outcome.selection.skipped.clone(),
        fit: outcome.selection.best.clone(),
        widths,
        extrema,
        raw_maxima,
        raw_minima,
        sn,
        profile: outcome.profile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synth::{SynthProfile, synth_profile};

    fn reference_profile() -> Vec<f64> {
        synth_profile(&SynthProfile {
            bins: 128,
            gaussians: vec![(1.0, 64.0, 5.0)],
            noise_std: 0.02,
            seed: 42,
        })
        .unwrap()
    }

    #[test]
    fn w50_of_reference_pulse() {
        let analysis = prof_eval_gfit(&reference_profile(), 3.0, &AnalysisConfig::default()).unwrap();
        let w50 = analysis.widths.w50.unwrap().value;
        let expected = 2.0 * 5.0 * (2.0 * 2f64.ln()).sqrt();
        assert!((w50 - expected).abs() / expected < 0.05, "w50 {w50} vs {expected}");
        assert!((1..=2).contains(&analysis.fit.n_gaussians()));
        assert_eq!(analysis.extrema.maxima.len(), 1);
        assert!((analysis.extrema.maxima[0].position - 64.0).abs() < 0.5);
        assert!(analysis.sn.is_none());
        assert!(analysis.excised_bins.is_empty());
    }

    #[test]
    fn widths_are_ordered_for_unimodal_fit() {
        let analysis = prof_eval_gfit(&reference_profile(), 3.0, &AnalysisConfig::default()).unwrap();
        let w = &analysis.widths;
        let (w10, w50, wscat) = (w.w10.unwrap().value, w.w50.unwrap().value, w.wscat.unwrap().value);
        assert!(w10 >= w50 && w50 >= wscat, "{w10} {w50} {wscat}");
        assert!(w.weq.is_some());
        assert!(w.failures.is_empty());
    }

    #[test]
    fn period_enables_sn() {
        let config = AnalysisConfig {
            period_ms: Some(714.5),
            ..AnalysisConfig::default()
        };
        let analysis = prof_eval_gfit(&reference_profile(), 3.0, &config).unwrap();
        let sn = analysis.sn.unwrap();
        assert!(!sn.scattered);
        assert!(sn.sn.unwrap() > 10.0);
    }

    #[test]
    fn spike_only_profile_has_no_components() {
        let mut profile = vec![0.0; 128];
        for (i, v) in profile.iter_mut().enumerate() {
            *v = 0.01 * ((i * 7919) % 13) as f64 / 13.0;
        }
        profile[40] = 5.0;
        let err = prof_eval_gfit(&profile, 3.0, &AnalysisConfig::default()).unwrap_err();
        assert_eq!(err, ProfileError::NoComponentsFound);
    }

    #[test]
    fn all_zero_profile_is_little_clipped() {
        let err = prof_eval_gfit(&vec![0.0; 128], 3.0, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, ProfileError::LittleClipped { .. }));
    }
}
