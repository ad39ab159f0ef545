//! Metric extraction: one RGB image in, one [`MetricSet`] out.
//!
//! # Stages
//!
//! 1. Downsample so the longest axis is at most `max_dimension`
//! 2. Grayscale conversion and mean brightness
//! 3. Laplacian variance (blur proxy)
//! 4. Per-pixel abnormal-tissue thresholding
//! 5. Opening then closing of the mask
//! 6. Area, redness and exudate proxy
//!
//! Extraction is a pure function of the pixel data and the config: the
//! same input always yields a bit-identical [`MetricSet`].

use log::debug;

use crate::decode;
use crate::diagnostics::{Clock, ExtractDiagnostics, NoClock, StageDiagnostics, StageMetrics};
use crate::downsample::downsample;
use crate::grayscale::{count_above, mean_intensity, to_gray};
use crate::sharpness::laplacian_variance;
use crate::tissue;
use crate::types::{AnalysisError, Dimensions, ExtractConfig, MetricSet, RgbImage};

/// Compute the metric set for an RGB image.
///
/// # Errors
///
/// Returns [`AnalysisError::ZeroArea`] if the image has no pixels and
/// [`AnalysisError::InvalidConfig`] if `config` fails validation.
pub fn extract(image: &RgbImage, config: &ExtractConfig) -> Result<MetricSet, AnalysisError> {
    extract_with_diagnostics(image, config, &NoClock).map(|(metrics, _)| metrics)
}

/// Decode encoded image bytes, then [`extract`].
///
/// # Errors
///
/// Returns [`AnalysisError::EmptyInput`] or [`AnalysisError::ImageDecode`]
/// for undecodable input, plus everything [`extract`] can return.
pub fn extract_bytes(bytes: &[u8], config: &ExtractConfig) -> Result<MetricSet, AnalysisError> {
    extract_bytes_with_diagnostics(bytes, config, &NoClock).map(|(metrics, _)| metrics)
}

/// [`extract_bytes`] with per-stage diagnostics, including decoding.
///
/// # Errors
///
/// See [`extract_bytes`].
pub fn extract_bytes_with_diagnostics<C: Clock>(
    bytes: &[u8],
    config: &ExtractConfig,
    clock: &C,
) -> Result<(MetricSet, ExtractDiagnostics), AnalysisError> {
    let start = clock.now();
    let image = decode::decode_rgb(bytes)?;
    let decode_diag = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Decode {
            input_bytes: bytes.len(),
            width: image.width(),
            height: image.height(),
        },
    };
    debug!(
        "decoded {} bytes to {}x{}",
        bytes.len(),
        image.width(),
        image.height()
    );

    let (metrics, mut diagnostics) = extract_with_diagnostics(&image, config, clock)?;
    diagnostics.total_duration += decode_diag.duration;
    diagnostics.decode = Some(decode_diag);
    Ok((metrics, diagnostics))
}

/// [`extract`] with per-stage diagnostics.
///
/// # Errors
///
/// See [`extract`].
#[allow(clippy::cast_precision_loss)]
pub fn extract_with_diagnostics<C: Clock>(
    image: &RgbImage,
    config: &ExtractConfig,
    clock: &C,
) -> Result<(MetricSet, ExtractDiagnostics), AnalysisError> {
    config.validate()?;
    let (source_width, source_height) = image.dimensions();
    if source_width == 0 || source_height == 0 {
        return Err(AnalysisError::ZeroArea {
            width: source_width,
            height: source_height,
        });
    }
    let total_start = clock.now();

    // 1. Downsample.
    let start = clock.now();
    let (working, applied) = downsample(image, config.max_dimension, config.downsample_filter);
    let dimensions = Dimensions {
        width: working.width(),
        height: working.height(),
    };
    let total_pixels = dimensions.pixel_count();
    let downsample_diag = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Downsample {
            filter: config.downsample_filter,
            source_width,
            source_height,
            width: dimensions.width,
            height: dimensions.height,
            applied,
        },
    };
    debug!(
        "working resolution {}x{} (downsampled: {applied})",
        dimensions.width, dimensions.height
    );

    // 2. Grayscale and brightness.
    let start = clock.now();
    let gray = to_gray(&working);
    let brightness = mean_intensity(&gray);
    let grayscale_diag = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Grayscale { brightness },
    };

    // 3. Blur proxy.
    let start = clock.now();
    let blur_var = laplacian_variance(&gray);
    let sharpness_diag = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Sharpness { blur_var },
    };
    debug!("brightness={brightness:.2} blur_var={blur_var:.2}");

    // 4. Colour thresholding.
    let start = clock.now();
    let raw = tissue::raw_mask(&working, config);
    let raw_pixel_count = raw.pixels().map(|p| u64::from(p.0[0] != 0)).sum();
    let threshold_diag = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Threshold {
            raw_pixel_count,
            total_pixel_count: total_pixels,
        },
    };

    // 5. Morphological cleaning.
    let start = clock.now();
    let mask = tissue::clean(&raw, config.morph_radius);
    let area = mask.count();
    let morphology_diag = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Morphology {
            radius: config.morph_radius,
            pixels_before: raw_pixel_count,
            pixels_after: area,
        },
    };
    debug!("mask: {raw_pixel_count} raw -> {area} cleaned pixels");

    // 6. Scalar metrics.
    let start = clock.now();
    let redness = tissue::mean_red(&working, &mask);
    let exudate_pixel_count = count_above(&gray, config.exudate_cutoff);
    let exudate_ratio = exudate_pixel_count as f64 / total_pixels as f64;
    let metrics = MetricSet::new(mask, redness, exudate_ratio, brightness, blur_var);
    let metrics_diag = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Metrics {
            area,
            exudate_pixel_count,
            redness_fallback: area == 0,
        },
    };
    debug!(
        "area={} ({:.3}%) redness={redness:.2} exudate_ratio={exudate_ratio:.4}",
        metrics.area(),
        metrics.area_pct()
    );

    let diagnostics = ExtractDiagnostics {
        decode: None,
        downsample: downsample_diag,
        grayscale: grayscale_diag,
        sharpness: sharpness_diag,
        threshold: threshold_diag,
        morphology: morphology_diag,
        metrics: metrics_diag,
        total_duration: clock.elapsed(&total_start),
    };
    Ok((metrics, diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgb;

    use super::*;

    fn wound_on_skin(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            if x >= w / 4 && x < 3 * w / 4 && y >= h / 4 && y < 3 * h / 4 {
                Rgb([190, 70, 60])
            } else {
                Rgb([150, 140, 130])
            }
        })
    }

    #[test]
    fn uniform_gray_has_no_area() {
        let img = RgbImage::from_pixel(64, 48, Rgb([128, 128, 128]));
        let metrics = extract(&img, &ExtractConfig::default()).unwrap();
        assert_eq!(metrics.area(), 0);
        assert!(metrics.area_pct().abs() < f64::EPSILON);
        assert!((metrics.redness() - 128.0).abs() < 1e-12);
        assert!((metrics.brightness() - 128.0).abs() < 1e-12);
        assert!(metrics.blur_var().abs() < f64::EPSILON);
        assert!(metrics.exudate_ratio().abs() < f64::EPSILON);
    }

    #[test]
    fn all_black_is_degenerate_but_valid() {
        let img = RgbImage::new(10, 10);
        let metrics = extract(&img, &ExtractConfig::default()).unwrap();
        assert_eq!(metrics.area(), 0);
        assert!(metrics.redness().abs() < f64::EPSILON);
        assert!(metrics.brightness().abs() < f64::EPSILON);
    }

    #[test]
    fn all_white_is_fully_exudate() {
        let img = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
        let metrics = extract(&img, &ExtractConfig::default()).unwrap();
        assert_eq!(metrics.area(), 0);
        assert!((metrics.exudate_ratio() - 1.0).abs() < f64::EPSILON);
        assert!((metrics.redness() - 255.0).abs() < f64::EPSILON);
    }

    #[test]
    fn wound_region_is_measured() {
        let metrics = extract(&wound_on_skin(80, 80), &ExtractConfig::default()).unwrap();
        assert!(metrics.area() > 1200 && metrics.area() <= 1600);
        assert!((metrics.redness() - 190.0).abs() < 1.0);
        assert_eq!(metrics.mask().count(), metrics.area());
    }

    #[test]
    fn large_input_is_capped() {
        let metrics = extract(&wound_on_skin(1600, 1200), &ExtractConfig::default()).unwrap();
        assert_eq!(
            metrics.dimensions(),
            Dimensions {
                width: 512,
                height: 384
            }
        );
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn single_pixel_image_is_valid() {
        let img = RgbImage::from_pixel(1, 1, Rgb([200, 20, 20]));
        let metrics = extract(&img, &ExtractConfig::default()).unwrap();
        assert!(metrics.area() <= 1);
        assert_eq!(metrics.mask().count(), metrics.area());
        assert!((metrics.area_pct() - metrics.area() as f64 * 100.0).abs() < 1e-12);
        assert!((metrics.redness() - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_area_image_is_an_error() {
        let img = RgbImage::new(0, 0);
        assert!(matches!(
            extract(&img, &ExtractConfig::default()),
            Err(AnalysisError::ZeroArea { .. })
        ));
    }

    #[test]
    fn invalid_config_is_an_error() {
        let config = ExtractConfig {
            max_dimension: 0,
            ..ExtractConfig::default()
        };
        assert!(matches!(
            extract(&wound_on_skin(8, 8), &config),
            Err(AnalysisError::InvalidConfig(_))
        ));
    }

    #[test]
    fn extract_bytes_rejects_garbage() {
        assert!(matches!(
            extract_bytes(&[], &ExtractConfig::default()),
            Err(AnalysisError::EmptyInput)
        ));
        assert!(matches!(
            extract_bytes(&[1, 2, 3], &ExtractConfig::default()),
            Err(AnalysisError::ImageDecode(_))
        ));
    }

    #[test]
    fn diagnostics_track_morphology() {
        let (metrics, diag) = extract_with_diagnostics(
            &wound_on_skin(80, 80),
            &ExtractConfig::default(),
            &NoClock,
        )
        .unwrap();
        assert!(diag.decode.is_none());
        match diag.morphology.metrics {
            StageMetrics::Morphology {
                pixels_before,
                pixels_after,
                ..
            } => {
                assert_eq!(pixels_before, 1600);
                assert_eq!(pixels_after, metrics.area());
            }
            ref other => unreachable!("unexpected stage metrics {other:?}"),
        }
    }
}
