//! Shared analysis pipeline used by `pw fit` and `pw batch`.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load -> resolve period -> (auto-)fit -> widths/extrema/S/N
//!
//! The front-ends can then focus on presentation (summary vs one-liner).

use std::path::Path;

use tracing::info;

use crate::analysis::analyze;
use crate::domain::{AnalysisConfig, AutoAnalysis, LoadedProfile, ProfileFormat};
use crate::error::AppError;
use crate::io::load_profile;

/// All computed outputs of one profile analysis.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub input: LoadedProfile,
    /// The configuration actually used (period resolved from the file if unset).
    pub config: AnalysisConfig,
    pub result: AutoAnalysis,
}

/// Load `path` and analyse it.
pub fn run_fit(path: &Path, format: Option<ProfileFormat>, config: &AnalysisConfig) -> Result<RunOutput, AppError> {
    let input = load_profile(path, format)?;
    run_loaded(input, config)
}

/// Analyse an already-loaded profile.
pub fn run_loaded(input: LoadedProfile, config: &AnalysisConfig) -> Result<RunOutput, AppError> {
    let config = AnalysisConfig {
        period_ms: config.period_ms.or(input.period_ms),
        ..config.clone()
    };
    info!(
        source = %input.source.display(),
        n_bins = input.samples.len(),
        period_ms = ?config.period_ms,
        "analysing profile"
    );

    let result = analyze(&input.samples, &config)?;
    Ok(RunOutput { input, config, result })
}
