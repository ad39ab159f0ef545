//! Extraction diagnostics: timing and counts for each stage.
//!
//! Every call to [`extract_with_diagnostics`](crate::extract::extract_with_diagnostics)
//! collects these alongside the metrics. The core never reads a clock
//! itself; callers supply a [`Clock`] so the crate stays free of
//! platform time sources.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::downsample::DownsampleFilter;

/// Time source used to measure stage durations.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A [`Clock`] that reports every duration as zero.
///
/// Used by [`extract`](crate::extract::extract), which discards the
/// diagnostics anyway.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl Clock for NoClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractDiagnostics {
    /// Image decoding (only when extracting from encoded bytes).
    pub decode: Option<StageDiagnostics>,
    pub downsample: StageDiagnostics,
    pub grayscale: StageDiagnostics,
    pub sharpness: StageDiagnostics,
    /// Per-pixel colour thresholding.
    pub threshold: StageDiagnostics,
    /// Opening and closing.
    pub morphology: StageDiagnostics,
    /// Area, redness and exudate computation.
    pub metrics: StageDiagnostics,
    /// Total wall-clock duration of the extraction (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

/// Diagnostics for a single extraction stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific counts.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    Decode {
        /// Size of the encoded input.
        input_bytes: usize,
        width: u32,
        height: u32,
    },
    Downsample {
        filter: DownsampleFilter,
        source_width: u32,
        source_height: u32,
        width: u32,
        height: u32,
        /// Whether the image was actually resized.
        applied: bool,
    },
    Grayscale {
        /// Mean luma.
        brightness: f64,
    },
    Sharpness {
        blur_var: f64,
    },
    Threshold {
        /// Pixels passing the colour test before cleaning.
        raw_pixel_count: u64,
        total_pixel_count: u64,
    },
    Morphology {
        radius: u8,
        pixels_before: u64,
        pixels_after: u64,
    },
    Metrics {
        area: u64,
        /// Pixels above the near-saturation cutoff.
        exudate_pixel_count: u64,
        /// Whether redness was taken over the whole image.
        redness_fallback: bool,
    },
}

impl ExtractDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Extraction Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());
        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(72));

        let total_ms = duration_ms(self.total_duration);
        let mut stages: Vec<(&str, &StageDiagnostics)> = Vec::new();
        if let Some(ref decode) = self.decode {
            stages.push(("Decode", decode));
        }
        stages.extend([
            ("Downsample", &self.downsample),
            ("Grayscale", &self.grayscale),
            ("Sharpness", &self.sharpness),
            ("Threshold", &self.threshold),
            ("Morphology", &self.morphology),
            ("Metrics", &self.metrics),
        ]);

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Downsample {
            filter,
            source_width,
            source_height,
            width,
            height,
            applied,
        } => {
            if *applied {
                format!("{filter} {source_width}x{source_height} -> {width}x{height}")
            } else {
                format!("unchanged {width}x{height}")
            }
        }
        StageMetrics::Grayscale { brightness } => format!("brightness={brightness:.1}"),
        StageMetrics::Sharpness { blur_var } => format!("blur_var={blur_var:.1}"),
        StageMetrics::Threshold {
            raw_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let pct = if *total_pixel_count > 0 {
                *raw_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!("raw={raw_pixel_count} ({pct:.1}%)")
        }
        StageMetrics::Morphology {
            radius,
            pixels_before,
            pixels_after,
        } => format!("r={radius} {pixels_before}->{pixels_after} px"),
        StageMetrics::Metrics {
            area,
            exudate_pixel_count,
            redness_fallback,
        } => {
            let scope = if *redness_fallback { "image" } else { "mask" };
            format!("area={area} exudate_px={exudate_pixel_count} redness_over={scope}")
        }
    }
}
