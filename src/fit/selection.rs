//! Model-order selection for the Gaussian mixture.
//!
//! The engine fits every order `1..=max_gaussians` and computes:
//! - χ² against the off-pulse noise
//! - BIC = χ² + 3·order·ln N
//!
//! Order `k` also starts from the accepted order `k - 1` solution plus one
//! Gaussian on the largest residual, so a skipped order only costs that start.
//!
//! Selection rules:
//! 1. Orders whose solver fails are skipped and recorded
//! 2. Choose the order with minimum BIC
//! 3. Ties go to the lower order

use tracing::{debug, info, warn};

use crate::domain::{
    AnalysisConfig, ClipResult, ComponentSet, GaussianFit, OrderSummary,
};
use crate::error::ProfileError;
use crate::math::{max, mean_present};
use crate::profile::{check_clip, fill_clipped_prof, find_components, mask_profile, sigma_clip};

use super::fitter::fit_order;
use super::seeds::component_seeds;

/// Output of fitting + selection.
#[derive(Debug, Clone)]
pub struct FitSelection {
    pub best: GaussianFit,
    /// Fits for all orders that converged, in increasing order.
    pub fits: Vec<GaussianFit>,
    /// Any orders that were skipped and why (for diagnostics).
    pub skipped: Vec<(usize, String)>,
}

impl FitSelection {
    pub fn summaries(&self) -> Vec<OrderSummary> {
        self.fits
            .iter()
            .map(|f| OrderSummary {
                n_gaussians: f.n_gaussians(),
                chi_square: f.chi_square,
                reduced_chi_square: f.reduced_chi_square,
                bic: f.bic,
            })
            .collect()
    }
}

/// Everything `fit_gaussian` derives from the raw profile on its way to the fit.
#[derive(Debug, Clone)]
pub struct GaussianFitOutcome {
    /// Baseline-subtracted profile with unit peak.
    pub profile: Vec<f64>,
    /// Off-pulse standard deviation of `profile`.
    pub noise_std: f64,
    /// Clip of the input profile (flags are scale invariant).
    pub clip: ClipResult,
    /// Gap-filled on-pulse mask used for segmentation.
    pub on_pulse: Vec<bool>,
    pub components: ComponentSet,
    pub selection: FitSelection,
}

/// Clip, normalise, segment and fit a profile with up to `max_gaussians` Gaussians.
///
/// # Arguments
/// - `profile`: raw profile samples
/// - `alpha`: sigma-clip multiplier
/// - `min_comp_len`: minimum on-pulse component length in bins
/// - `config`: analysis settings (`max_gaussians`, clip bounds, solver)
pub fn fit_gaussian(
    profile: &[f64],
    alpha: f64,
    min_comp_len: usize,
    config: &AnalysisConfig,
) -> Result<GaussianFitOutcome, ProfileError> {
    let clip = sigma_clip(profile, alpha, &config.clip)?;
    check_clip(&clip, &config.clip)?;

    let baseline = mean_present(&clip.samples).ok_or(ProfileError::NumericalDegeneracy("no off-pulse samples"))?;
    let shifted: Vec<f64> = profile.iter().map(|v| v - baseline).collect();
    let peak = max(&shifted).ok_or(ProfileError::NumericalDegeneracy("empty profile"))?;
    if !(peak > 0.0) {
        return Err(ProfileError::NumericalDegeneracy("profile has no signal above the off-pulse mean"));
    }
    let y: Vec<f64> = shifted.iter().map(|v| v / peak).collect();
    let noise: Vec<Option<f64>> = clip.samples.iter().map(|s| s.map(|v| (v - baseline) / peak)).collect();
    let noise_std = crate::math::std_present(&noise).unwrap_or(0.0);
    if !(noise_std > 0.0) {
        return Err(ProfileError::NumericalDegeneracy("off-pulse noise has zero spread"));
    }

    let on_pulse = fill_clipped_prof(&clip.on_pulse_mask(), config.search_scope_for(profile.len()));
    let components = find_components(&mask_profile(&y, &on_pulse), min_comp_len)?;
    debug!(
        n_components = components.len(),
        centres = ?components.iter().map(|c| c.mean_index()).collect::<Vec<_>>(),
        "profile components"
    );

    let selection = select_order(&y, noise_std, &components, config)?;
    Ok(GaussianFitOutcome {
        profile: y,
        noise_std,
        clip,
        on_pulse,
        components,
        selection,
    })
}

/// Fit every order `1..=max_gaussians` and keep the lowest-BIC mixture.
pub fn select_order(
    y: &[f64],
    noise_std: f64,
    components: &ComponentSet,
    config: &AnalysisConfig,
) -> Result<FitSelection, ProfileError> {
    let seeds = component_seeds(components);
    let max_gaussians = config.max_gaussians.max(1);

    let mut fits: Vec<GaussianFit> = Vec::new();
    let mut skipped = Vec::new();
    for order in 1..=max_gaussians {
        let previous = fits
            .last()
            .filter(|f| f.n_gaussians() + 1 == order)
            .map(|f| f.model.to_params());
        match fit_order(y, noise_std, &seeds, order, previous.as_deref(), &config.lm) {
            Ok(fit) => {
                debug!(
                    order,
                    reduced_chi_square = fit.reduced_chi_square,
                    bic = fit.bic,
                    iterations = fit.iterations,
                    "fitted mixture"
                );
                fits.push(fit);
            }
            Err(e) => {
                warn!(order, error = %e, "mixture fit did not converge, skipping order");
                skipped.push((order, e.to_string()));
            }
        }
    }

    let best = select_by_bic(&fits).ok_or(ProfileError::FitDivergence { max_gaussians })?;
    info!(
        n_gaussians = best.n_gaussians(),
        reduced_chi_square = best.reduced_chi_square,
        bic = best.bic,
        "selected mixture"
    );
    Ok(FitSelection { best, fits, skipped })
}

fn select_by_bic(fits: &[GaussianFit]) -> Option<GaussianFit> {
    let mut best: Option<&GaussianFit> = None;
    for f in fits.iter().filter(|f| f.bic.is_finite()) {
        match best {
            Some(b) if f.bic >= b.bic => {}
            _ => best = Some(f),
        }
    }
    best.cloned()
}
