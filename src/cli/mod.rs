//! Command-line parsing for the pulse profile analyser.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the analysis code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::ProfileFormat;
use crate::logging::{LogFormat, LogLevel};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "pw", version, about = "Pulsar pulse-profile widths, components and S/N")]
pub struct Cli {
    /// Log level (overridden by RUST_LOG).
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyse one profile: fit, widths, extrema and S/N.
    Fit(FitArgs),
    /// Analyse many profiles in parallel, one summary line per file.
    Batch(BatchArgs),
    /// Re-render the ASCII plot of a saved analysis JSON.
    Plot(PlotArgs),
    /// Write a synthetic multi-Gaussian profile in ascii format.
    Simulate(SimulateArgs),
}

/// Analysis options shared by `fit` and `batch`.
#[derive(Debug, Args, Clone)]
pub struct AnalysisArgs {
    /// Sigma-clip multiplier.
    #[arg(long, default_value_t = 2.0, conflicts_with = "auto")]
    pub alpha: f64,

    /// Sweep alpha over 1..5 and keep the fit with reduced chi-square closest to 1.
    #[arg(long)]
    pub auto: bool,

    /// Highest number of Gaussians to try.
    #[arg(long, default_value_t = 6)]
    pub max_gaussians: usize,

    /// Minimum component length in bins (default: max(5, N/100 + 2)).
    #[arg(long)]
    pub min_comp_len: Option<usize>,

    /// Raw maxima below this fraction of the peak are ignored.
    #[arg(long, default_value_t = 0.02)]
    pub ignore_threshold: f64,

    /// Gap-filling scope in bins (default: N/100).
    #[arg(long)]
    pub search_scope: Option<usize>,

    /// Rotation period in ms (overrides the file's period; enables S/N and ms widths).
    #[arg(long, value_name = "MS")]
    pub period: Option<f64>,

    /// Input format (default: from the file extension).
    #[arg(long, value_enum)]
    pub format: Option<ProfileFormat>,
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Profile file (.bestprof, .txt/.ascii/.pdv, .csv).
    pub input: PathBuf,

    #[command(flatten)]
    pub analysis: AnalysisArgs,

    /// Write the ASCII plot to this file.
    #[arg(long, value_name = "PATH")]
    pub plot: Option<PathBuf>,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export per-bin results to CSV.
    #[arg(long, value_name = "PATH")]
    pub export_csv: Option<PathBuf>,

    /// Export the analysis (mixture, covariance, measurements) to JSON.
    #[arg(long, value_name = "PATH")]
    pub export_json: Option<PathBuf>,

    /// Write a Markdown debug bundle into this directory.
    #[arg(long, value_name = "DIR")]
    pub debug_bundle: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct BatchArgs {
    /// Profile files.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}

/// Options for plotting a saved analysis.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Analysis JSON produced by `pw fit --export-json`.
    pub json: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[derive(Debug, Parser)]
pub struct SimulateArgs {
    /// Gaussian as `AMPLITUDE,CENTER,WIDTH` in bins; repeatable.
    #[arg(long = "gaussian", value_name = "A,C,W", required = true, value_parser = parse_gaussian)]
    pub gaussians: Vec<(f64, f64, f64)>,

    /// Number of phase bins.
    #[arg(long, default_value_t = 1024)]
    pub bins: usize,

    /// White-noise standard deviation.
    #[arg(long, default_value_t = 0.01)]
    pub noise: f64,

    /// RNG seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Output path.
    #[arg(long, value_name = "PATH")]
    pub out: PathBuf,
}

/// `"1.0,512,20"` -> `(1.0, 512.0, 20.0)`.
pub fn parse_gaussian(s: &str) -> Result<(f64, f64, f64), String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [a, c, w] = parts.as_slice() else {
        return Err(format!("expected AMPLITUDE,CENTER,WIDTH, got '{s}'"));
    };
    let num = |v: &str| v.parse::<f64>().map_err(|_| format!("'{v}' is not a number"));
    Ok((num(a)?, num(c)?, num(w)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn gaussian_triplet_parses() {
        assert_eq!(parse_gaussian("1, 512, 20").unwrap(), (1.0, 512.0, 20.0));
        assert!(parse_gaussian("1,2").is_err());
        assert!(parse_gaussian("1,x,3").is_err());
    }

    #[test]
    fn fit_defaults() {
        let cli = Cli::parse_from(["pw", "fit", "a.bestprof"]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.analysis.alpha, 2.0);
        assert!(!args.analysis.auto);
        assert_eq!(args.analysis.max_gaussians, 6);
        assert_eq!(cli.log_level, LogLevel::Warn);
    }

    #[test]
    fn auto_conflicts_with_alpha() {
        assert!(Cli::try_parse_from(["pw", "fit", "a.txt", "--auto", "--alpha", "3"]).is_err());
        assert!(Cli::try_parse_from(["pw", "batch", "a.txt", "b.txt", "--auto"]).is_ok());
    }
}
