//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and installs logging
//! - loads profiles and runs the analysis pipeline
//! - prints reports/plots
//! - writes optional exports

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;
use rayon::prelude::*;
use tracing::warn;

use crate::cli::{AnalysisArgs, BatchArgs, Command, FitArgs, PlotArgs, SimulateArgs};
use crate::data::synth::{SynthProfile, synth_profile};
use crate::domain::{AlphaMode, AlphaSweep, AnalysisConfig};
use crate::error::AppError;
use crate::logging::{LogConfig, init_logging};

pub mod pipeline;

/// Entry point for the `pw` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    init_logging(&LogConfig {
        level: cli.log_level,
        format: cli.log_format,
        ..LogConfig::default()
    });

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Batch(args) => handle_batch(args),
        Command::Plot(args) => handle_plot(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = analysis_config_from_args(&args.analysis);
    let run = pipeline::run_fit(&args.input, args.analysis.format, &config)?;
    let best = &run.result.best;

    println!(
        "{}",
        crate::report::format_run_summary(&run.input, &run.result, run.config.period_ms)
    );

    if let Some(path) = &args.plot {
        let plot = crate::plot::render_ascii_plot(best, args.width, args.height);
        std::fs::write(path, plot)
            .map_err(|e| AppError::new(2, format!("Failed to write plot '{}': {e}", path.display())))?;
    }

    // Optional exports.
    if let Some(path) = &args.export_csv {
        crate::io::write_bins_csv(path, best)?;
    }
    if let Some(path) = &args.export_json {
        let record = crate::io::analysis_record(best, &run.result.attempts, &run.input, run.config.period_ms);
        crate::io::write_analysis_json(path, &record)?;
    }
    if let Some(dir) = &args.debug_bundle {
        let path = crate::debug::write_debug_bundle(dir, &run.input, &run.result, &run.config)?;
        eprintln!("Debug bundle written to {}", path.display());
    }

    Ok(())
}

fn handle_batch(args: BatchArgs) -> Result<(), AppError> {
    let config = analysis_config_from_args(&args.analysis);
    let outcomes = batch_outcomes(&args.inputs, args.analysis.format, &config);

    let mut failed = 0usize;
    for (path, outcome) in args.inputs.iter().zip(&outcomes) {
        match outcome {
            Ok(line) => println!("{line}"),
            Err(err) => {
                failed += 1;
                println!("FAIL {}: {}", path.display(), err.to_string().replace('\n', " "));
            }
        }
    }

    if failed > 0 {
        warn!(failed, total = outcomes.len(), "batch finished with failures");
        return Err(AppError::new(
            1,
            format!("{failed} of {} profiles failed.", outcomes.len()),
        ));
    }
    Ok(())
}

/// Analyse every file in parallel; results come back in input order.
pub fn batch_outcomes(
    inputs: &[PathBuf],
    format: Option<crate::domain::ProfileFormat>,
    config: &AnalysisConfig,
) -> Vec<Result<String, AppError>> {
    inputs
        .par_iter()
        .map(|path| -> Result<String, AppError> {
            let run = pipeline::run_fit(path, format, config)?;
            Ok(crate::report::format_batch_line(path, &run.result))
        })
        .collect()
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let record = crate::io::read_analysis_json(&args.json)?;
    let plot = crate::plot::render_ascii_plot_from_record(&record, args.width, args.height);
    println!("{plot}");
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let samples = synth_profile(&SynthProfile {
        bins: args.bins,
        gaussians: args.gaussians.clone(),
        noise_std: args.noise,
        seed: args.seed,
    })?;
    write_ascii_profile(&args.out, &samples)?;
    eprintln!("Wrote {} bins to {}", samples.len(), args.out.display());
    Ok(())
}

/// Write samples in the psrchive-style text layout the ascii loader reads.
pub fn write_ascii_profile(path: &Path, samples: &[f64]) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", path.display())))?;
    writeln!(file, "File: synthetic Src: simulated Nsub: 1 Nch: 1 Npol: 1 Nbin: {}", samples.len())
        .map_err(|e| AppError::new(2, format!("Failed to write profile header: {e}")))?;
    for (i, v) in samples.iter().enumerate() {
        writeln!(file, "0 0 {i} {v:.8}").map_err(|e| AppError::new(2, format!("Failed to write profile: {e}")))?;
    }
    Ok(())
}

pub fn analysis_config_from_args(args: &AnalysisArgs) -> AnalysisConfig {
    AnalysisConfig {
        alpha: if args.auto {
            AlphaMode::Auto(AlphaSweep::default())
        } else {
            AlphaMode::Fixed(args.alpha)
        },
        max_gaussians: args.max_gaussians,
        min_comp_len: args.min_comp_len,
        ignore_threshold: args.ignore_threshold,
        search_scope: args.search_scope,
        period_ms: args.period,
        ..AnalysisConfig::default()
    }
}
