//! woundcare-core: Pure wound-photo metrics and triage status (sans-IO).
//!
//! Turns one RGB photograph into a fixed set of scalar metrics plus a
//! binary abnormal-tissue mask, then classifies those metrics (optionally
//! against a prior observation) into a four-level triage status with an
//! ordered explanation trail:
//!
//! downsample -> grayscale -> Laplacian variance -> colour threshold ->
//! opening/closing -> metrics -> ordered override rules.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! rasters or encoded byte slices and returns structured data. File
//! access, argument parsing and output formatting live in
//! `woundcare-cli`.

pub mod classify;
pub mod decode;
pub mod diagnostics;
pub mod downsample;
pub mod extract;
pub mod grayscale;
pub mod rationale;
pub mod sharpness;
pub mod tissue;
pub mod types;

use serde::{Deserialize, Serialize};

pub use classify::{ClassifierConfig, Decision, Quality, Rule, Status, classify, compute_delta_pct};
pub use diagnostics::{Clock, ExtractDiagnostics, NoClock};
pub use downsample::DownsampleFilter;
pub use extract::{extract, extract_bytes, extract_bytes_with_diagnostics, extract_with_diagnostics};
pub use rationale::{PatientContext, RationaleInput, RationaleSource, TemplateRationale, rationale_or_template};
pub use types::{
    AnalysisConfig, AnalysisError, Dimensions, ExtractConfig, Mask, MetricSet, MetricSummary,
};

/// Metrics and status of one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub metrics: MetricSet,
    pub decision: Decision,
}

/// Extract metrics from encoded image bytes and classify them.
///
/// `previous` is the most recent prior observation of the same wound,
/// if any.
///
/// # Errors
///
/// Returns the errors of [`extract_bytes`]. Classification itself is
/// total.
pub fn analyze(
    image_bytes: &[u8],
    previous: Option<&MetricSummary>,
    config: &AnalysisConfig,
) -> Result<Analysis, AnalysisError> {
    let metrics = extract_bytes(image_bytes, &config.extract)?;
    let decision = classify(&metrics.summary(), previous, &config.classifier);
    Ok(Analysis { metrics, decision })
}
