//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the analysis code stays clean and testable
//! - output changes are localized

use std::path::Path;

use crate::domain::{AttemptSummary, AutoAnalysis, Extremum, LoadedProfile, Measurement, ProfileAnalysis, WidthKind};

/// Format the full run summary (input metadata + order diagnostics + measurements).
pub fn format_run_summary(input: &LoadedProfile, result: &AutoAnalysis, period_ms: Option<f64>) -> String {
    let a = &result.best;
    let mut out = String::new();

    out.push_str("=== pw - Pulse Profile Analysis ===\n");
    out.push_str(&format!("Source: {} ({:?})\n", input.source.display(), input.format));
    if let Some(name) = &input.name {
        out.push_str(&format!("Pulsar: {name}\n"));
    }
    if let Some(start) = input.obs_start {
        out.push_str(&format!("Obs start: {}\n", start.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    match period_ms {
        Some(p) => out.push_str(&format!("Bins: {} | period={p:.6} ms\n", a.n_bins())),
        None => out.push_str(&format!("Bins: {}\n", a.n_bins())),
    }
    out.push_str(&format!(
        "Clip: alpha={:.2} | noise_std={:.5} | on-pulse bins={} | min_comp_len={} | components={}\n",
        a.alpha,
        a.noise_std,
        a.on_pulse.iter().filter(|&&on| on).count(),
        a.min_comp_len,
        a.n_components,
    ));
    if !a.excised_bins.is_empty() {
        out.push_str(&format!("Excised impulse bins: {:?}\n", a.excised_bins));
    }

    out.push_str("\nModel orders:\n");
    for o in &a.orders {
        let chosen = if o.n_gaussians == a.fit.n_gaussians() { "*" } else { " " };
        out.push_str(&format!(
            "{chosen} n={:<2} chi2={:.3} red_chi2={:.4} BIC={:.3}\n",
            o.n_gaussians, o.chi_square, o.reduced_chi_square, o.bic
        ));
    }
    for (order, reason) in &a.skipped_orders {
        out.push_str(&format!("  (skipped n={order}) {reason}\n"));
    }

    out.push_str("\nGaussians (bins, normalised amplitude):\n");
    let cov = &a.fit.covariance;
    for (k, g) in a.fit.model.components.iter().enumerate() {
        let err = |j: usize| {
            let i = 3 * k + j;
            if i < cov.nrows() { cov[(i, i)].max(0.0).sqrt() } else { f64::NAN }
        };
        out.push_str(&format!(
            "  #{} amp={:.4}±{:.4} centre={:.3}±{:.3} width={:.3}±{:.3}\n",
            k + 1,
            g.amplitude,
            err(0),
            g.center,
            err(1),
            g.width,
            err(2),
        ));
    }

    out.push_str("\nWidths:\n");
    out.push_str(&format_widths(a, period_ms));

    out.push_str("\nExtrema:\n");
    out.push_str(&format!("  maxima (fit): {}\n", fmt_extrema(&a.extrema.maxima)));
    out.push_str(&format!("  minima (fit): {}\n", fmt_extrema(&a.extrema.minima)));
    out.push_str(&format!("  maxima (raw): {}\n", fmt_positions(&a.raw_maxima)));

    if let Some(sn) = a.sn {
        out.push_str("\nS/N: ");
        match (sn.sn, sn.sn_error) {
            (Some(v), Some(e)) => out.push_str(&format!("{v:.2} ± {e:.2}\n")),
            _ => out.push_str("unavailable\n"),
        }
        if sn.scattered {
            out.push_str("  profile appears scattered (no clean noise floor)\n");
        }
    }

    if result.attempts.len() > 1 {
        out.push_str("\nAlpha sweep:\n");
        out.push_str(&format_attempts(&result.attempts, a.alpha));
    }

    out
}

fn format_widths(a: &ProfileAnalysis, period_ms: Option<f64>) -> String {
    let mut out = String::new();
    for kind in WidthKind::ALL {
        let name = kind.display_name();
        match a.widths.get(kind) {
            Some(m) => {
                out.push_str(&format!("  {name:<6} {} bins", fmt_measure(m)));
                if let Some(ms) = period_ms.and_then(|p| a.widths.in_ms(kind, a.n_bins(), p)) {
                    out.push_str(&format!("  ({} ms)", fmt_measure(ms)));
                }
                out.push('\n');
            }
            None => {
                let reason = a
                    .widths
                    .failures
                    .iter()
                    .find(|f| f.kind == kind)
                    .map_or("not measured", |f| f.reason.as_str());
                out.push_str(&format!("  {name:<6} unavailable: {reason}\n"));
            }
        }
    }
    out
}

fn format_attempts(attempts: &[AttemptSummary], chosen_alpha: f64) -> String {
    let mut out = String::new();
    for at in attempts {
        let chosen = if at.alpha == chosen_alpha { "*" } else { " " };
        match (&at.failure, at.reduced_chi_square, at.bic, at.n_gaussians) {
            (Some(reason), ..) => {
                out.push_str(&format!("{chosen} alpha={:.2} failed: {reason}\n", at.alpha));
            }
            (None, Some(chi), Some(bic), Some(n)) => {
                out.push_str(&format!(
                    "{chosen} alpha={:.2} n={n} red_chi2={chi:.4} BIC={bic:.3}\n",
                    at.alpha
                ));
            }
            _ => out.push_str(&format!("{chosen} alpha={:.2}\n", at.alpha)),
        }
    }
    out
}

/// One line per file for `pw batch`.
pub fn format_batch_line(path: &Path, result: &AutoAnalysis) -> String {
    let a = &result.best;
    let w50 = a.widths.w50.map_or_else(|| "-".to_string(), fmt_measure);
    let sn = a
        .sn
        .and_then(|s| s.sn)
        .map_or_else(|| "-".to_string(), |v| format!("{v:.1}"));
    format!(
        "ok   {} alpha={:.2} n={} red_chi2={:.3} W50={} S/N={}",
        path.display(),
        a.alpha,
        a.fit.n_gaussians(),
        a.fit.reduced_chi_square,
        w50,
        sn,
    )
}

fn fmt_measure(m: Measurement) -> String {
    format!("{:.4} ± {:.4}", m.value, m.error)
}

fn fmt_extrema(v: &[Extremum]) -> String {
    if v.is_empty() {
        return "-".to_string();
    }
    let parts: Vec<String> = v.iter().map(|e| format!("{:.3}±{:.3}", e.position, e.error)).collect();
    parts.join(", ")
}

fn fmt_positions(v: &[f64]) -> String {
    if v.is_empty() {
        return "-".to_string();
    }
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.3}")).collect();
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::data::synth::{SynthProfile, synth_profile};
    use crate::domain::{AnalysisConfig, ProfileFormat};

    fn run() -> (LoadedProfile, AutoAnalysis) {
        let samples = synth_profile(&SynthProfile {
            bins: 128,
            gaussians: vec![(1.0, 64.0, 5.0)],
            noise_std: 0.02,
            seed: 42,
        })
        .unwrap();
        let input = LoadedProfile {
            source: "J0000+0000.bestprof".into(),
            format: ProfileFormat::Bestprof,
            name: Some("J0000+0000".to_string()),
            samples: samples.clone(),
            period_ms: Some(100.0),
            period_error_ms: None,
            obs_start: None,
        };
        let config = AnalysisConfig {
            period_ms: Some(100.0),
            ..AnalysisConfig::default()
        };
        (input, analyze(&samples, &config).unwrap())
    }

    #[test]
    fn summary_lists_every_section() {
        let (input, result) = run();
        let txt = format_run_summary(&input, &result, Some(100.0));
        assert!(txt.contains("Pulsar: J0000+0000"));
        assert!(txt.contains("Model orders:"));
        assert!(txt.contains("* n="));
        for kind in WidthKind::ALL {
            assert!(txt.contains(kind.display_name()), "{txt}");
        }
        assert!(txt.contains(" ms)"));
        assert!(txt.contains("S/N: "));
        // Fixed alpha: no sweep table.
        assert!(!txt.contains("Alpha sweep"));
    }

    #[test]
    fn batch_line_is_single_line() {
        let (input, result) = run();
        let line = format_batch_line(&input.source, &result);
        assert!(line.starts_with("ok   J0000+0000.bestprof"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn attempts_mark_chosen_alpha() {
        let attempts = vec![
            AttemptSummary {
                alpha: 1.0,
                reduced_chi_square: None,
                bic: None,
                n_gaussians: None,
                failure: Some("no profile components have been found".to_string()),
            },
            AttemptSummary {
                alpha: 1.5,
                reduced_chi_square: Some(1.02),
                bic: Some(130.5),
                n_gaussians: Some(2),
                failure: None,
            },
        ];
        let txt = format_attempts(&attempts, 1.5);
        assert_eq!(
            txt,
            "  alpha=1.00 failed: no profile components have been found\n* alpha=1.50 n=2 red_chi2=1.0200 BIC=130.500\n"
        );
    }
}
