//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed between pipeline stages in-memory
//! - exported to JSON/CSV
//! - reloaded later for plotting

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::math::LmConfig;

/// Result of sigma-clipping a profile.
///
/// `samples[i]` is the input value where bin `i` was kept as noise and `None`
/// where it was clipped as signal.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipResult {
    /// Noise standard deviation estimate (never negative).
    pub sigma: f64,
    pub samples: Vec<Option<f64>>,
}

impl ClipResult {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clipped_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_none()).count()
    }

    pub fn clipped_fraction(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.clipped_count() as f64 / self.samples.len() as f64
    }

    /// `true` for bins clipped as signal.
    pub fn on_pulse_mask(&self) -> Vec<bool> {
        self.samples.iter().map(|s| s.is_none()).collect()
    }

    pub fn noise_values(&self) -> Vec<f64> {
        crate::math::present(&self.samples)
    }

    pub fn noise_std(&self) -> Option<f64> {
        crate::math::std_present(&self.samples)
    }

    pub fn noise_median(&self) -> Option<f64> {
        crate::math::median_present(&self.samples)
    }
}

/// Stable identifier of a component inside a [`ComponentSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub usize);

/// A contiguous run of on-pulse bins.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub id: ComponentId,
    /// Profile indices, ascending and contiguous.
    pub indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl Component {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn start(&self) -> usize {
        self.indices.first().copied().unwrap_or(0)
    }

    pub fn end(&self) -> usize {
        self.indices.last().copied().unwrap_or(0)
    }

    pub fn peak(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn mean_index(&self) -> f64 {
        if self.indices.is_empty() {
            return 0.0;
        }
        self.indices.iter().sum::<usize>() as f64 / self.indices.len() as f64
    }

    pub fn span(&self) -> usize {
        self.end() - self.start()
    }
}

/// Arena of components in left-to-right scan order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentSet {
    components: Vec<Component>,
}

impl ComponentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a component, assigning it the next id.
    pub fn push(&mut self, indices: Vec<usize>, values: Vec<f64>) -> ComponentId {
        let id = ComponentId(self.components.len());
        self.components.push(Component { id, indices, values });
        id
    }

    pub fn get(&self, id: ComponentId) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// One Gaussian: `amplitude · exp(-(x - center)^2 / (2 width^2))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianComponent {
    pub amplitude: f64,
    pub center: f64,
    pub width: f64,
}

/// Additive mixture of Gaussians.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GaussianMixture {
    pub components: Vec<GaussianComponent>,
}

impl GaussianMixture {
    /// Build from a flat `[a0, c0, w0, a1, c1, w1, ...]` vector.
    pub fn from_params(params: &[f64]) -> Self {
        let components = params
            .chunks_exact(3)
            .map(|p| GaussianComponent {
                amplitude: p[0],
                center: p[1],
                width: p[2],
            })
            .collect();
        Self { components }
    }

    pub fn to_params(&self) -> Vec<f64> {
        self.components
            .iter()
            .flat_map(|g| [g.amplitude, g.center, g.width])
            .collect()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Best fit for one model order.
#[derive(Debug, Clone)]
pub struct GaussianFit {
    pub model: GaussianMixture,
    /// Parameter covariance, `3k × 3k`, ordered like `model.to_params()`.
    pub covariance: DMatrix<f64>,
    /// Model sampled at every profile bin.
    pub curve: Vec<f64>,
    pub chi_square: f64,
    pub reduced_chi_square: f64,
    pub bic: f64,
    pub iterations: usize,
}

impl GaussianFit {
    pub fn n_gaussians(&self) -> usize {
        self.model.len()
    }
}

/// A value with its 1-sigma uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub error: f64,
}

impl Measurement {
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            value: self.value * factor,
            error: self.error * factor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WidthKind {
    W10,
    W50,
    Weq,
    Wscat,
}

impl WidthKind {
    pub const ALL: [WidthKind; 4] = [WidthKind::W10, WidthKind::W50, WidthKind::Weq, WidthKind::Wscat];

    pub fn display_name(self) -> &'static str {
        match self {
            WidthKind::W10 => "W10",
            WidthKind::W50 => "W50",
            WidthKind::Weq => "Weq",
            WidthKind::Wscat => "Wscat",
        }
    }

    /// Fraction of the fit span at which the width is measured (`None` for Weq).
    pub fn level(self) -> Option<f64> {
        match self {
            WidthKind::W10 => Some(0.1),
            WidthKind::W50 => Some(0.5),
            WidthKind::Wscat => Some((-1.0f64).exp()),
            WidthKind::Weq => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidthFailure {
    pub kind: WidthKind,
    pub reason: String,
}

/// Pulse widths in bins. A width that could not be measured is `None` and has
/// an entry in `failures`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidthSet {
    pub w10: Option<Measurement>,
    pub w50: Option<Measurement>,
    pub weq: Option<Measurement>,
    pub wscat: Option<Measurement>,
    pub failures: Vec<WidthFailure>,
}

impl WidthSet {
    pub fn get(&self, kind: WidthKind) -> Option<Measurement> {
        match kind {
            WidthKind::W10 => self.w10,
            WidthKind::W50 => self.w50,
            WidthKind::Weq => self.weq,
            WidthKind::Wscat => self.wscat,
        }
    }

    /// Convert a width from bins to milliseconds.
    pub fn in_ms(&self, kind: WidthKind, n_bins: usize, period_ms: f64) -> Option<Measurement> {
        if n_bins == 0 {
            return None;
        }
        self.get(kind).map(|m| m.scaled(period_ms / n_bins as f64))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extremum {
    /// Bin position (continuous).
    pub position: f64,
    pub error: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtremaSet {
    pub minima: Vec<Extremum>,
    pub maxima: Vec<Extremum>,
}

/// Signal-to-noise estimate. `sn`/`sn_error` are `None` for scattered profiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnEstimate {
    pub sn: Option<f64>,
    pub sn_error: Option<f64>,
    pub scattered: bool,
}

/// Chi-square / BIC summary for one attempted model order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub n_gaussians: usize,
    pub chi_square: f64,
    pub reduced_chi_square: f64,
    pub bic: f64,
}

/// Everything computed for one profile at one clip `alpha`.
#[derive(Debug, Clone)]
pub struct ProfileAnalysis {
    pub alpha: f64,
    /// Baseline-subtracted profile normalised to a unit peak.
    pub profile: Vec<f64>,
    /// `true` for bins clipped as signal.
    pub on_pulse: Vec<bool>,
    pub noise_std: f64,
    pub min_comp_len: usize,
    pub n_components: usize,
    /// Bins replaced by the noise median before fitting (impulsive outliers).
    pub excised_bins: Vec<usize>,
    pub fit: GaussianFit,
    pub orders: Vec<OrderSummary>,
    pub skipped_orders: Vec<(usize, String)>,
    pub widths: WidthSet,
    pub extrema: ExtremaSet,
    /// Maxima of the raw profile (spline of each component), in bins.
    pub raw_maxima: Vec<f64>,
    pub raw_minima: Vec<f64>,
    pub sn: Option<SnEstimate>,
}

impl ProfileAnalysis {
    pub fn n_bins(&self) -> usize {
        self.profile.len()
    }
}

/// Outcome of one `alpha` in the auto-tuning sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub alpha: f64,
    pub reduced_chi_square: Option<f64>,
    pub bic: Option<f64>,
    pub n_gaussians: Option<usize>,
    pub failure: Option<String>,
}

/// Result of the auto-tuning sweep: the chosen run plus every attempt.
#[derive(Debug, Clone)]
pub struct AutoAnalysis {
    pub best: ProfileAnalysis,
    pub attempts: Vec<AttemptSummary>,
}

/// Sigma-clipping knobs (the multiplier `alpha` is passed separately).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipConfig {
    /// Fractional std change at which clipping stops.
    pub tol: f64,
    pub ntrials: usize,
    /// Clipped fraction at or below which the clip is rejected.
    pub too_little: f64,
    /// Clipped fraction at or above which the clip is rejected.
    pub too_much: f64,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            tol: 0.1,
            ntrials: 10,
            too_little: 0.0,
            too_much: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnConfig {
    pub clip: ClipConfig,
    /// Fixed instrumental amplitude variance used in the S/N uncertainty.
    pub amplitude_variance: f64,
}

impl Default for SnConfig {
    fn default() -> Self {
        Self {
            clip: ClipConfig {
                tol: 0.01,
                ntrials: 100,
                ..ClipConfig::default()
            },
            amplitude_variance: 500.0,
        }
    }
}

/// `steps` alpha values linearly spaced over `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlphaSweep {
    pub start: f64,
    pub end: f64,
    pub steps: usize,
}

impl Default for AlphaSweep {
    fn default() -> Self {
        Self {
            start: 1.0,
            end: 5.0,
            steps: 9,
        }
    }
}

impl AlphaSweep {
    pub fn values(&self) -> Vec<f64> {
        crate::math::linspace(self.start, self.end, self.steps)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlphaMode {
    Fixed(f64),
    Auto(AlphaSweep),
}

/// Analysis settings shared by every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub alpha: AlphaMode,
    pub max_gaussians: usize,
    /// Minimum component length in bins; `None` derives it from the profile length.
    pub min_comp_len: Option<usize>,
    /// Raw maxima below this fraction of the profile peak are ignored.
    pub ignore_threshold: f64,
    /// Gap-filling look-ahead in bins; `None` uses 1% of the profile length.
    pub search_scope: Option<usize>,
    pub clip: ClipConfig,
    pub sn: SnConfig,
    /// Rotation period; enables the S/N estimate and width conversion.
    pub period_ms: Option<f64>,
    pub lm: LmConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            alpha: AlphaMode::Fixed(3.0),
            max_gaussians: 6,
            min_comp_len: None,
            ignore_threshold: 0.02,
            search_scope: None,
            clip: ClipConfig::default(),
            sn: SnConfig::default(),
            period_ms: None,
            lm: LmConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// `max(5, round(N/100) + 2)` unless set explicitly.
    pub fn min_comp_len_for(&self, n_bins: usize) -> usize {
        self.min_comp_len
            .unwrap_or_else(|| ((n_bins as f64 / 100.0 + 0.5) as usize + 2).max(5))
    }

    pub fn search_scope_for(&self, n_bins: usize) -> usize {
        self.search_scope.unwrap_or(n_bins / 100)
    }
}

/// Input file formats understood by the loaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProfileFormat {
    /// PRESTO `.bestprof` (header + one bin per line).
    Bestprof,
    /// psrchive `pdv`-style text; intensity in the fourth column.
    Ascii,
    /// CSV with an `intensity`/`flux`/`i`/`value` column.
    Csv,
}

/// A profile read from disk plus whatever metadata the format carried.
#[derive(Debug, Clone)]
pub struct LoadedProfile {
    pub source: PathBuf,
    pub format: ProfileFormat,
    pub name: Option<String>,
    pub samples: Vec<f64>,
    pub period_ms: Option<f64>,
    pub period_error_ms: Option<f64>,
    pub obs_start: Option<DateTime<Utc>>,
}

/// A saved analysis (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisFile {
    pub tool: String,
    pub source: String,
    pub name: Option<String>,
    pub obs_start: Option<DateTime<Utc>>,
    pub period_ms: Option<f64>,
    pub alpha: f64,
    pub n_bins: usize,
    pub n_gaussians: usize,
    pub gaussians: Vec<GaussianComponent>,
    pub covariance: Vec<Vec<f64>>,
    pub reduced_chi_square: f64,
    pub bic: f64,
    pub widths: WidthSet,
    pub extrema: ExtremaSet,
    pub raw_maxima: Vec<f64>,
    pub sn: Option<SnEstimate>,
    pub excised_bins: Vec<usize>,
    pub attempts: Vec<AttemptSummary>,
    pub profile: Vec<f64>,
    pub fit: Vec<f64>,
}
