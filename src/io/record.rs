//! Read/write analysis JSON files.
//!
//! The analysis JSON is the portable representation of one run:
//! - the selected Gaussian mixture and its covariance
//! - widths, extrema and S/N with uncertainties
//! - the normalised profile and fit curve for re-plotting
//! - every sweep attempt
//!
//! The schema is defined by `domain::AnalysisFile`.

use std::fs::File;
use std::path::Path;

use crate::domain::{AnalysisFile, AttemptSummary, LoadedProfile, ProfileAnalysis};
use crate::error::AppError;

/// Assemble the serializable record of a run.
pub fn analysis_record(
    analysis: &ProfileAnalysis,
    attempts: &[AttemptSummary],
    input: &LoadedProfile,
    period_ms: Option<f64>,
) -> AnalysisFile {
    let cov = &analysis.fit.covariance;
    let covariance = (0..cov.nrows())
        .map(|i| (0..cov.ncols()).map(|j| cov[(i, j)]).collect())
        .collect();

    AnalysisFile {
        tool: "pw".to_string(),
        source: input.source.display().to_string(),
        name: input.name.clone(),
        obs_start: input.obs_start,
        period_ms,
        alpha: analysis.alpha,
        n_bins: analysis.n_bins(),
        n_gaussians: analysis.fit.n_gaussians(),
        gaussians: analysis.fit.model.components.clone(),
        covariance,
        reduced_chi_square: analysis.fit.reduced_chi_square,
        bic: analysis.fit.bic,
        widths: analysis.widths.clone(),
        extrema: analysis.extrema.clone(),
        raw_maxima: analysis.raw_maxima.clone(),
        sn: analysis.sn,
        excised_bins: analysis.excised_bins.clone(),
        attempts: attempts.to_vec(),
        profile: analysis.profile.clone(),
        fit: analysis.fit.curve.clone(),
    }
}

/// Write an analysis JSON file.
pub fn write_analysis_json(path: &Path, record: &AnalysisFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create analysis JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, record)
        .map_err(|e| AppError::new(2, format!("Failed to write analysis JSON: {e}")))?;
    Ok(())
}

/// Read an analysis JSON file.
pub fn read_analysis_json(path: &Path) -> Result<AnalysisFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open analysis JSON '{}': {e}", path.display())))?;
    let record: AnalysisFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid analysis JSON: {e}")))?;
    Ok(record)
}
