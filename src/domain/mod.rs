//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - clip and segmentation records (`ClipResult`, `ComponentSet`)
//! - the Gaussian mixture model and its fit (`GaussianMixture`, `GaussianFit`)
//! - measured outputs (`WidthSet`, `ExtremaSet`, `SnEstimate`, `ProfileAnalysis`)
//! - analysis and run configuration (`AnalysisConfig`, `AlphaMode`)

pub mod types;

pub use types::*;
