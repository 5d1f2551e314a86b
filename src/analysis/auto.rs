//! Auto-tuning sweep over the clip multiplier.
//!
//! There is no way to know a priori which `alpha` separates pulse from noise
//! best, so every value of the sweep is evaluated and the run whose reduced χ²
//! is closest to 1 wins. Clip and segmentation failures only rule out that
//! `alpha`; anything else ends the sweep.

use tracing::{debug, debug_span, info};

use crate::domain::{AlphaMode, AlphaSweep, AnalysisConfig, AttemptSummary, AutoAnalysis, ProfileAnalysis};
use crate::error::{AttemptFailure, ProfileError};

use super::evaluate::prof_eval_gfit;

fn success_summary(analysis: &ProfileAnalysis) -> AttemptSummary {
    AttemptSummary {
        alpha: analysis.alpha,
        reduced_chi_square: Some(analysis.fit.reduced_chi_square),
        bic: Some(analysis.fit.bic),
        n_gaussians: Some(analysis.fit.n_gaussians()),
        failure: None,
    }
}

fn failure_summary(alpha: f64, error: &ProfileError) -> AttemptSummary {
    AttemptSummary {
        alpha,
        reduced_chi_square: None,
        bic: None,
        n_gaussians: None,
        failure: Some(error.to_string()),
    }
}

/// Evaluate every `alpha` of `sweep` and keep the run with `|1 - χ²_r|` minimal.
pub fn auto_gfit(profile: &[f64], sweep: &AlphaSweep, config: &AnalysisConfig) -> Result<AutoAnalysis, ProfileError> {
    let mut attempts = Vec::new();
    let mut failures = Vec::new();
    let mut best: Option<ProfileAnalysis> = None;

    for alpha in sweep.values() {
        let _span = debug_span!("alpha_attempt", alpha).entered();
        match prof_eval_gfit(profile, alpha, config) {
            Ok(analysis) => {
                attempts.push(success_summary(&analysis));
                let score = (1.0 - analysis.fit.reduced_chi_square).abs();
                let better = match &best {
                    Some(b) => score < (1.0 - b.fit.reduced_chi_square).abs(),
                    None => score.is_finite(),
                };
                if better {
                    best = Some(analysis);
                }
            }
            Err(e) if e.is_recoverable() => {
                debug!(error = %e, "alpha rejected");
                attempts.push(failure_summary(alpha, &e));
                failures.push(AttemptFailure { alpha, error: e });
            }
            Err(e) => return Err(e),
        }
    }

    let Some(best) = best else {
        return Err(ProfileError::AllAttemptsFailed { attempts: failures });
    };
    info!(
        alpha = best.alpha,
        bic = best.fit.bic,
        reduced_chi_square = best.fit.reduced_chi_square,
        "best alpha selected"
    );
    Ok(AutoAnalysis { best, attempts })
}

/// Run the analysis in whichever alpha mode `config` asks for.
pub fn analyze(profile: &[f64], config: &AnalysisConfig) -> Result<AutoAnalysis, ProfileError> {
    match config.alpha {
        AlphaMode::Auto(sweep) => auto_gfit(profile, &sweep, config),
        AlphaMode::Fixed(alpha) => {
            let best = prof_eval_gfit(profile, alpha, config)?;
            let attempts = vec![success_summary(&best)];
            Ok(AutoAnalysis { best, attempts })
        }
    }
}
