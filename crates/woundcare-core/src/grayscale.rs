//! RGB to grayscale conversion and whole-image intensity statistics.
//!
//! Uses the BT.601 luma weights `0.299*R + 0.587*G + 0.114*B` in 14-bit
//! fixed point so the result is bit-exact across platforms. The
//! `image` crate's own `to_luma8` uses BT.709 weights, which would shift
//! the near-saturation cutoff used for the exudate proxy.

use image::Luma;

use crate::types::{GrayImage, RgbImage};

const SHIFT: u32 = 14;
const WEIGHT_R: u32 = 4899;
const WEIGHT_G: u32 = 9617;
const WEIGHT_B: u32 = 1868;
const _: () = assert!(WEIGHT_R + WEIGHT_G + WEIGHT_B == 1 << SHIFT);

/// Luma of a single RGB sample, rounded to nearest.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = WEIGHT_R * u32::from(r) + WEIGHT_G * u32::from(g) + WEIGHT_B * u32::from(b);
    ((weighted + (1 << (SHIFT - 1))) >> SHIFT) as u8
}

/// Convert an RGB raster to single-channel luma.
#[must_use = "returns the grayscale image"]
pub fn to_gray(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        Luma([luma(r, g, b)])
    })
}

/// Mean pixel value of a grayscale raster. Zero for an empty raster.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_intensity(image: &GrayImage) -> f64 {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return 0.0;
    }
    let sum: u64 = image.pixels().map(|p| u64::from(p.0[0])).sum();
    sum as f64 / count as f64
}

/// Number of pixels strictly brighter than `cutoff`.
#[must_use]
pub fn count_above(image: &GrayImage, cutoff: u8) -> u64 {
    image.pixels().map(|p| u64::from(p.0[0] > cutoff)).sum()
}
