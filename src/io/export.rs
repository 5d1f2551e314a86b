//! Export per-bin results to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::ProfileAnalysis;
use crate::error::AppError;
use crate::models::multi_gauss;

/// Write one row per bin: normalised profile, fit, residual, flags and each
/// Gaussian's own contribution.
pub fn write_bins_csv(path: &Path, analysis: &ProfileAnalysis) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    let gaussians = &analysis.fit.model.components;
    let mut header = String::from("bin,profile,fit,residual,on_pulse,excised");
    for k in 1..=gaussians.len() {
        header.push_str(&format!(",gaussian_{k}"));
    }
    writeln!(file, "{header}").map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for (i, (&y, &f)) in analysis.profile.iter().zip(&analysis.fit.curve).enumerate() {
        let mut row = format!(
            "{},{:.8},{:.8},{:.8},{},{}",
            i,
            y,
            f,
            y - f,
            u8::from(analysis.on_pulse.get(i).copied().unwrap_or(false)),
            u8::from(analysis.excised_bins.contains(&i)),
        );
        for g in gaussians {
            row.push_str(&format!(",{:.8}", multi_gauss(i as f64, &[g.amplitude, g.center, g.width])));
        }
        writeln!(file, "{row}").map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    Ok(())
}
