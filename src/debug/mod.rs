//! Debug bundle writer for inspecting a run: clip, sweep attempts and model orders.

use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::domain::{AnalysisConfig, AlphaMode, AutoAnalysis, LoadedProfile, WidthKind};
use crate::error::AppError;

/// Write a Markdown bundle into `dir` and return its path.
pub fn write_debug_bundle(
    dir: &Path,
    input: &LoadedProfile,
    result: &AutoAnalysis,
    config: &AnalysisConfig,
) -> Result<PathBuf, AppError> {
    create_dir_all(dir).map_err(|e| AppError::new(2, format!("Failed to create debug dir: {e}")))?;

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let stem = input
        .source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("profile");
    let path = dir.join(format!("pw_debug_{stem}_{ts}.md"));

    let mut file = File::create(&path).map_err(|e| AppError::new(2, format!("Failed to create debug file: {e}")))?;
    let text = render_bundle(input, result, config);
    file.write_all(text.as_bytes())
        .map_err(|e| AppError::new(2, format!("Failed to write debug file: {e}")))?;

    Ok(path)
}

fn render_bundle(input: &LoadedProfile, result: &AutoAnalysis, config: &AnalysisConfig) -> String {
    let a = &result.best;
    let mut out = String::new();

    out.push_str("# pw debug bundle\n");
    out.push_str(&format!("- generated: {}\n", Local::now().to_rfc3339()));
    out.push_str(&format!("- source: {}\n", input.source.display()));
    out.push_str(&format!("- format: {:?}\n", input.format));
    out.push_str(&format!("- n_bins: {}\n", a.n_bins()));
    match config.alpha {
        AlphaMode::Fixed(alpha) => out.push_str(&format!("- alpha_mode: fixed {alpha:.2}\n")),
        AlphaMode::Auto(s) => out.push_str(&format!(
            "- alpha_mode: auto {:.2}..{:.2} ({} steps)\n",
            s.start, s.end, s.steps
        )),
    }
    out.push_str(&format!(
        "- clip: tol={}, ntrials={}, too_little={}, too_much={}\n",
        config.clip.tol, config.clip.ntrials, config.clip.too_little, config.clip.too_much
    ));
    out.push_str(&format!(
        "- max_gaussians={}, ignore_threshold={}, search_scope={}\n",
        config.max_gaussians,
        config.ignore_threshold,
        config.search_scope_for(a.n_bins())
    ));

    out.push_str("\n## Clip summary\n");
    out.push_str(&format!("- chosen alpha: {:.2}\n", a.alpha));
    out.push_str(&format!("- noise std (normalised): {:.6}\n", a.noise_std));
    out.push_str(&format!(
        "- on-pulse bins: {} of {}\n",
        a.on_pulse.iter().filter(|&&on| on).count(),
        a.n_bins()
    ));
    out.push_str(&format!("- min_comp_len: {}\n", a.min_comp_len));
    out.push_str(&format!("- components: {}\n", a.n_components));
    out.push_str(&format!("- excised bins: {:?}\n", a.excised_bins));

    out.push_str("\n## Sweep attempts\n");
    out.push_str("| alpha | n | red_chi2 | bic | failure |\n");
    out.push_str("| - | - | - | - | - |\n");
    for at in &result.attempts {
        out.push_str(&format!(
            "| {:.2} | {} | {} | {} | {} |\n",
            at.alpha,
            at.n_gaussians.map_or_else(|| "-".to_string(), |n| n.to_string()),
            fmt_opt(at.reduced_chi_square),
            fmt_opt(at.bic),
            at.failure.as_deref().unwrap_or(""),
        ));
    }

    out.push_str("\n## Model orders\n");
    out.push_str("| n | chi2 | red_chi2 | bic |\n");
    out.push_str("| - | - | - | - |\n");
    for o in &a.orders {
        out.push_str(&format!(
            "| {} | {:.6} | {:.6} | {:.3} |\n",
            o.n_gaussians, o.chi_square, o.reduced_chi_square, o.bic
        ));
    }
    for (order, reason) in &a.skipped_orders {
        out.push_str(&format!("- skipped n={order}: {reason}\n"));
    }

    out.push_str("\n## Selected mixture\n");
    out.push_str(&format!("- iterations: {}\n", a.fit.iterations));
    out.push_str(&format!("- params: {}\n", fmt_vec(&a.fit.model.to_params())));
    let diag: Vec<f64> = (0..a.fit.covariance.nrows())
        .map(|i| a.fit.covariance[(i, i)].max(0.0).sqrt())
        .collect();
    out.push_str(&format!("- param errors: {}\n", fmt_vec(&diag)));

    out.push_str("\n## Measurements\n");
    for kind in WidthKind::ALL {
        match a.widths.get(kind) {
            Some(m) => out.push_str(&format!("- {}: {:.6} ± {:.6}\n", kind.display_name(), m.value, m.error)),
            None => out.push_str(&format!("- {}: -\n", kind.display_name())),
        }
    }
    for f in &a.widths.failures {
        out.push_str(&format!("- {} failed: {}\n", f.kind.display_name(), f.reason));
    }
    let maxima: Vec<f64> = a.extrema.maxima.iter().map(|m| m.position).collect();
    let minima: Vec<f64> = a.extrema.minima.iter().map(|m| m.position).collect();
    out.push_str(&format!("- fit maxima: {}\n", fmt_vec(&maxima)));
    out.push_str(&format!("- fit minima: {}\n", fmt_vec(&minima)));
    out.push_str(&format!("- raw maxima: {}\n", fmt_vec(&a.raw_maxima)));
    out.push_str(&format!("- raw minima: {}\n", fmt_vec(&a.raw_minima)));

    out.push_str("\n## Profile\n");
    out.push_str("| bin | profile | fit | on_pulse |\n");
    out.push_str("| - | - | - | - |\n");
    for (i, (&y, &f)) in a.profile.iter().zip(&a.fit.curve).enumerate() {
        let on = a.on_pulse.get(i).copied().unwrap_or(false);
        out.push_str(&format!("| {i} | {y:.6} | {f:.6} | {} |\n", u8::from(on)));
    }

    out
}

fn fmt_vec(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{v:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.3}"),
        _ => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::data::synth::{SynthProfile, synth_profile};
    use crate::domain::{AlphaSweep, ProfileFormat};

    #[test]
    fn bundle_contains_attempts_and_orders() {
        let samples = synth_profile(&SynthProfile {
            bins: 128,
            gaussians: vec![(1.0, 64.0, 5.0)],
            noise_std: 0.02,
            seed: 3,
        })
        .unwrap();
        let config = AnalysisConfig {
            alpha: AlphaMode::Auto(AlphaSweep::default()),
            ..AnalysisConfig::default()
        };
        let result = analyze(&samples, &config).unwrap();
        let input = LoadedProfile {
            source: "synthetic.txt".into(),
            format: ProfileFormat::Ascii,
            name: None,
            samples,
            period_ms: None,
            period_error_ms: None,
            obs_start: None,
        };

        let dir = tempfile::tempdir().unwrap();
        let path = write_debug_bundle(dir.path(), &input, &result, &config).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();

        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("pw_debug_synthetic_"));
        assert!(text.contains("## Sweep attempts"));
        assert!(text.contains("## Model orders"));
        assert!(text.contains("- alpha_mode: auto 1.00..5.00 (9 steps)"));
        let attempt_rows = text
            .lines()
            .skip_while(|l| !l.starts_with("## Sweep attempts"))
            .skip(3)
            .take_while(|l| l.starts_with('|'))
            .count();
        assert_eq!(attempt_rows, 9);
    }
}
