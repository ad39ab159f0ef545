//! Image downsampling to a bounded working resolution.
//!
//! Reduces the input image so the longest axis is at most
//! `max_dimension`. Every downstream stage (grayscale, Laplacian,
//! masking, morphology) then runs on a pixel grid of bounded size, and
//! the colour thresholds see comparable pixel statistics regardless of
//! the capture resolution.
//!
//! If the image is already at or below the cap, it is returned
//! unchanged.

use std::fmt;

use image::Rgb;
use serde::{Deserialize, Serialize};

use crate::types::RgbImage;

/// Resampling filter used when downsampling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownsampleFilter {
    /// Disabled: skip downsampling regardless of image size.
    Disabled,
    /// Area averaging: each output pixel is the coverage-weighted mean
    /// of the source pixels under it. Best for shrinking photos.
    #[default]
    Area,
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation.
    Triangle,
    /// Bicubic (Catmull-Rom).
    CatmullRom,
    /// Gaussian.
    Gaussian,
    /// Lanczos with 3 lobes.
    Lanczos3,
}

impl DownsampleFilter {
    /// The `image` crate filter for the resampling variants.
    ///
    /// `Disabled` and `Area` have no counterpart there.
    const fn to_image_filter(self) -> Option<image::imageops::FilterType> {
        match self {
            Self::Disabled | Self::Area => None,
            Self::Nearest => Some(image::imageops::FilterType::Nearest),
            Self::Triangle => Some(image::imageops::FilterType::Triangle),
            Self::CatmullRom => Some(image::imageops::FilterType::CatmullRom),
            Self::Gaussian => Some(image::imageops::FilterType::Gaussian),
            Self::Lanczos3 => Some(image::imageops::FilterType::Lanczos3),
        }
    }
}

impl fmt::Display for DownsampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Area => f.write_str("Area"),
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Output size for an image whose longest axis exceeds `max_dimension`.
///
/// Both axes are scaled by `max_dimension / longest` and truncated,
/// never going below one pixel. Inputs already within the cap are
/// returned as-is.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension || longest == 0 {
        return (width, height);
    }
    let scale = |v: u32| {
        let scaled = u64::from(v) * u64::from(max_dimension) / u64::from(longest);
        (scaled as u32).max(1)
    };
    (scale(width), scale(height))
}

/// Downsample so the longest axis is at most `max_dimension` pixels.
///
/// Returns the (possibly unchanged) image and whether downsampling was
/// actually applied.
#[must_use]
pub fn downsample(
    image: &RgbImage,
    max_dimension: u32,
    filter: DownsampleFilter,
) -> (RgbImage, bool) {
    if filter == DownsampleFilter::Disabled {
        return (image.clone(), false);
    }

    let (w, h) = image.dimensions();
    let (tw, th) = target_dimensions(w, h, max_dimension);
    if (tw, th) == (w, h) {
        return (image.clone(), false);
    }

    let resized = filter.to_image_filter().map_or_else(
        || area_resize(image, tw, th),
        |f| image::imageops::resize(image, tw, th, f),
    );
    (resized, true)
}

/// Shrink by area averaging.
///
/// Requires `dst_w <= src_w` and `dst_h <= src_h`, which
/// [`target_dimensions`] guarantees.
fn area_resize(src: &RgbImage, dst_w: u32, dst_h: u32) -> RgbImage {
    let x_spans = coverage(src.width(), dst_w);
    let y_spans = coverage(src.height(), dst_h);

    RgbImage::from_fn(dst_w, dst_h, |dx, dy| {
        let mut acc = [0.0_f64; 3];
        let mut total = 0.0;
        for &(sy, wy) in &y_spans[dy as usize] {
            for &(sx, wx) in &x_spans[dx as usize] {
                let weight = wx * wy;
                let p = src.get_pixel(sx, sy).0;
                for (a, &v) in acc.iter_mut().zip(p.iter()) {
                    *a += weight * f64::from(v);
                }
                total += weight;
            }
        }
        Rgb(acc.map(|a| round_channel(a / total)))
    })
}

/// For each destination index along one axis, the source indices it
/// overlaps and the overlap length of each.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn coverage(src_len: u32, dst_len: u32) -> Vec<Vec<(u32, f64)>> {
    let scale = f64::from(src_len) / f64::from(dst_len);
    (0..dst_len)
        .map(|d| {
            let start = f64::from(d) * scale;
            let end = (start + scale).min(f64::from(src_len));
            let first = start.floor() as u32;
            let last = (end.ceil() as u32).min(src_len);
            (first..last)
                .filter_map(|s| {
                    let overlap = end.min(f64::from(s + 1)) - start.max(f64::from(s));
                    (overlap > 1e-9).then_some((s, overlap))
                })
                .collect()
        })
        .collect()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([128, 128, 128]))
    }

    #[test]
    fn default_filter_is_area() {
        assert_eq!(DownsampleFilter::default(), DownsampleFilter::Area);
    }

    #[test]
    fn no_downsample_when_already_small() {
        let (result, applied) = downsample(&test_image(100, 80), 512, DownsampleFilter::Area);
        assert!(!applied);
        assert_eq!(result.dimensions(), (100, 80));
    }

    #[test]
    fn no_downsample_when_exact_match() {
        let (result, applied) = downsample(&test_image(512, 300), 512, DownsampleFilter::Area);
        assert!(!applied);
        assert_eq!(result.dimensions(), (512, 300));
    }

    #[test]
    fn landscape_preserves_aspect() {
        let (result, applied) = downsample(&test_image(1024, 768), 256, DownsampleFilter::Area);
        assert!(applied);
        assert_eq!(result.dimensions(), (256, 192));
    }

    #[test]
    fn portrait_preserves_aspect() {
        let (result, applied) = downsample(&test_image(600, 1200), 256, DownsampleFilter::Area);
        assert!(applied);
        assert_eq!(result.dimensions(), (128, 256));
    }

    #[test]
    fn target_dimensions_truncate() {
        // 333 * 100 / 1000 = 33.3 -> 33
        assert_eq!(target_dimensions(1000, 333, 100), (100, 33));
    }

    #[test]
    fn target_dimensions_never_collapse_to_zero() {
        assert_eq!(target_dimensions(4000, 2, 100), (100, 1));
    }

    #[test]
    fn disabled_skips_even_large_image() {
        let (result, applied) = downsample(&test_image(1024, 768), 256, DownsampleFilter::Disabled);
        assert!(!applied);
        assert_eq!(result.dimensions(), (1024, 768));
    }

    #[test]
    fn image_filters_resize_to_target() {
        let (result, applied) = downsample(&test_image(300, 150), 100, DownsampleFilter::Triangle);
        assert!(applied);
        assert_eq!(result.dimensions(), (100, 50));
    }

    #[test]
    fn area_preserves_uniform_colour() {
        let img = RgbImage::from_pixel(999, 701, Rgb([200, 31, 77]));
        let (result, _) = downsample(&img, 128, DownsampleFilter::Area);
        assert!(result.pixels().all(|p| p.0 == [200, 31, 77]));
    }

    #[test]
    fn area_halving_averages_blocks() {
        // 2x2 checkerboard of 0 and 200 collapses to the mean, 100.
        let img = RgbImage::from_fn(4, 4, |x, y| {
            if (x + y) % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([200, 200, 200])
            }
        });
        let (result, applied) = downsample(&img, 2, DownsampleFilter::Area);
        assert!(applied);
        assert_eq!(result.dimensions(), (2, 2));
        assert!(result.pixels().all(|p| p.0 == [100, 100, 100]));
    }

    #[test]
    fn area_fractional_scale_weights_by_overlap() {
        // 3 -> 2 columns: output 0 covers src 0 fully and src 1 by half.
        let img = RgbImage::from_fn(3, 1, |x, _| match x {
            0 => Rgb([0, 0, 0]),
            1 => Rgb([90, 90, 90]),
            _ => Rgb([180, 180, 180]),
        });
        let (result, _) = downsample(&img, 2, DownsampleFilter::Area);
        assert_eq!(result.dimensions(), (2, 1));
        // (0 * 1.0 + 90 * 0.5) / 1.5 = 30
        assert_eq!(result.get_pixel(0, 0).0, [30, 30, 30]);
        // (90 * 0.5 + 180 * 1.0) / 1.5 = 150
        assert_eq!(result.get_pixel(1, 0).0, [150, 150, 150]);
    }

    #[test]
    fn display_names() {
        assert_eq!(DownsampleFilter::Area.to_string(), "Area");
        assert_eq!(DownsampleFilter::Lanczos3.to_string(), "Lanczos3");
    }
}
