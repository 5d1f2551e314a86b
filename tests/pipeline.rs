use pulse_widths::analysis::{analyze, auto_gfit};
use pulse_widths::app::pipeline::run_fit;
use pulse_widths::app::write_ascii_profile;
use pulse_widths::data::{SynthProfile, synth_profile};
use pulse_widths::domain::{AlphaMode, AlphaSweep, AnalysisConfig, WidthKind};
use pulse_widths::io::{analysis_record, read_analysis_json, write_analysis_json, write_bins_csv};
use pulse_widths::plot::render_ascii_plot_from_record;

fn single_pulse(seed: u64) -> Vec<f64> {
    synth_profile(&SynthProfile {
        bins: 128,
        gaussians: vec![(1.0, 64.0, 5.0)],
        noise_std: 0.02,
        seed,
    })
    .unwrap()
}

fn fwhm(width: f64) -> f64 {
    2.0 * (2.0 * 2f64.ln()).sqrt() * width
}

#[test]
fn single_gaussian_w50_matches_fwhm() {
    let out = analyze(&single_pulse(42), &AnalysisConfig::default()).unwrap();
    let w50 = out.best.widths.w50.unwrap();
    approx::assert_relative_eq!(w50.value, fwhm(5.0), max_relative = 0.05);
    assert!(w50.error > 0.0 && w50.error < 1.0);
    assert_eq!(out.best.fit.n_gaussians(), 1);
}

#[test]
fn sweep_survives_a_huge_outlier() {
    let mut profile = single_pulse(7);
    profile[20] = 1000.0;

    let out = auto_gfit(&profile, &AlphaSweep::default(), &AnalysisConfig::default()).unwrap();
    let best = &out.best;

    assert_eq!(best.excised_bins, vec![20]);
    assert!(!best.on_pulse[20]);
    assert!(best.profile[20].abs() < 0.2);
    approx::assert_relative_eq!(best.widths.w50.unwrap().value, fwhm(5.0), max_relative = 0.1);
    assert_eq!(best.extrema.maxima.len(), 1);
    assert!((best.extrema.maxima[0].position - 64.0).abs() < 1.0);

    let best_score = (1.0 - best.fit.reduced_chi_square).abs();
    for chi in out.attempts.iter().filter_map(|a| a.reduced_chi_square) {
        assert!(best_score <= (1.0 - chi).abs() + 1e-12);
    }
}

#[test]
fn double_pulse_needs_two_gaussians() {
    let profile = synth_profile(&SynthProfile {
        bins: 512,
        gaussians: vec![(1.0, 200.0, 8.0), (0.6, 300.0, 12.0)],
        noise_std: 0.01,
        seed: 5,
    })
    .unwrap();
    let out = analyze(&profile, &AnalysisConfig::default()).unwrap();
    let n = out.best.fit.n_gaussians();
    assert!((1..=3).contains(&n), "picked {n} gaussians");
    assert!(out.best.n_components >= 2);
    for (a, c, w) in [(1.0, 200.0, 8.0), (0.6, 300.0, 12.0)] {
        let g = out
            .best
            .fit
            .model
            .components
            .iter()
            .min_by(|x, y| (x.center - c).abs().total_cmp(&(y.center - c).abs()))
            .unwrap();
        assert!((g.amplitude - a).abs() < 0.05, "{g:?}");
        assert!((g.center - c).abs() < 0.5, "{g:?}");
        approx::assert_relative_eq!(g.width, w, max_relative = 0.1);
    }
    let maxima: Vec<f64> = out.best.extrema.maxima.iter().map(|m| m.position).collect();
    assert!(maxima.iter().any(|m| (m - 200.0).abs() < 1.0), "{maxima:?}");
    assert!(maxima.iter().any(|m| (m - 300.0).abs() < 1.0), "{maxima:?}");
    assert!(out.best.extrema.minima.len() >= 1);
    // W10 spans both pulses.
    let w10 = out.best.widths.w10.unwrap().value;
    assert!(w10 > 100.0, "w10 {w10}");
}

#[test]
fn file_to_json_to_plot() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("pulse.txt");
    write_ascii_profile(&input, &single_pulse(11)).unwrap();

    let config = AnalysisConfig {
        alpha: AlphaMode::Auto(AlphaSweep::default()),
        period_ms: Some(253.065),
        ..AnalysisConfig::default()
    };
    let run = run_fit(&input, None, &config).unwrap();
    let best = &run.result.best;
    assert!(best.sn.is_some());

    let json = dir.path().join("analysis.json");
    let record = analysis_record(best, &run.result.attempts, &run.input, run.config.period_ms);
    write_analysis_json(&json, &record).unwrap();
    let back = read_analysis_json(&json).unwrap();

    assert_eq!(back.n_bins, 128);
    assert_eq!(back.n_gaussians, best.fit.n_gaussians());
    assert_eq!(back.covariance.len(), 3 * back.n_gaussians);
    assert_eq!(back.attempts.len(), 9);
    approx::assert_relative_eq!(
        back.widths.get(WidthKind::W50).unwrap().value,
        best.widths.w50.unwrap().value,
        max_relative = 1e-12
    );
    assert_eq!(back.period_ms, Some(253.065));

    let plot = render_ascii_plot_from_record(&back, 60, 15);
    assert!(plot.starts_with("Plot: bins=[0, 127]"));
    assert_eq!(plot.lines().count(), 16);

    let csv = dir.path().join("bins.csv");
    write_bins_csv(&csv, best).unwrap();
    let text = std::fs::read_to_string(&csv).unwrap();
    assert!(text.starts_with("bin,profile,fit,residual,on_pulse,excised,gaussian_1"));
    assert_eq!(text.lines().count(), 129);
}
