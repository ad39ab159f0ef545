//! Abnormal-tissue masking.
//!
//! A pixel is flagged when red clearly dominates both other channels,
//! red itself is bright enough to matter, and the pixel is not lost in
//! shadow. The raw per-pixel mask is then cleaned with one opening
//! (removes isolated speckle) followed by one closing (fills pinholes)
//! with an elliptical structuring element, via
//! [`imageproc::morphology`]. Pixels outside the image take no part in
//! either pass.

use image::{Luma, Rgb};
use imageproc::morphology::{self, Mask as Footprint};

use crate::types::{ExtractConfig, GrayImage, Mask, RgbImage};

/// Per-pixel abnormal-tissue test.
///
/// `R > ratio*G && R > ratio*B && R > min_red && mean(R, G, B) > min_mean`.
#[must_use]
pub fn is_abnormal(pixel: Rgb<u8>, config: &ExtractConfig) -> bool {
    let [r, g, b] = pixel.0;
    let red = f64::from(r);
    let dominant = red > config.red_ratio * f64::from(g) && red > config.red_ratio * f64::from(b);
    let sum = u32::from(r) + u32::from(g) + u32::from(b);
    dominant && r > config.min_red && sum > 3 * u32::from(config.min_mean_intensity)
}

/// Unfiltered mask: 255 where [`is_abnormal`] holds, 0 elsewhere.
#[must_use = "returns the raw mask"]
pub fn raw_mask(image: &RgbImage, config: &ExtractConfig) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([if is_abnormal(*image.get_pixel(x, y), config) {
            255
        } else {
            0
        }])
    })
}

/// Elliptical structuring element inscribed in a `(2r+1)`-pixel square.
///
/// Row `dy` spans `round(r * sqrt(1 - dy^2 / r^2))` pixels either side of
/// the centre, so radius 3 gives row widths 1, 5, 7, 7, 7, 5, 1.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
pub fn ellipse_footprint(radius: u8) -> GrayImage {
    let r = i32::from(radius);
    let size = 2 * u32::from(radius) + 1;
    GrayImage::from_fn(size, size, |x, y| {
        let dy = y as i32 - r;
        let half = if r == 0 {
            0
        } else {
            (f64::from(r) * (f64::from(r * r - dy * dy) / f64::from(r * r)).sqrt()).round() as i32
        };
        Luma([if (x as i32 - r).abs() <= half { 255 } else { 0 }])
    })
}

/// Opening then closing with [`ellipse_footprint`] of the given radius.
///
/// A radius of zero returns the mask unchanged.
#[must_use = "returns the cleaned mask"]
pub fn clean(mask: &GrayImage, radius: u8) -> Mask {
    if radius == 0 {
        return Mask::from_image(mask.clone());
    }
    let footprint = Footprint::from_image(&ellipse_footprint(radius), radius, radius);
    let opened = morphology::grayscale_open(mask, &footprint);
    Mask::from_image(morphology::grayscale_close(&opened, &footprint))
}

/// Mean red value over the set pixels of `mask`, or over the whole image
/// when the mask is empty.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_red(image: &RgbImage, mask: &Mask) -> f64 {
    let use_mask = mask.count() > 0;
    let (sum, count) = image
        .enumerate_pixels()
        .filter(|(x, y, _)| !use_mask || mask.contains(*x, *y))
        .fold((0_u64, 0_u64), |(sum, count), (_, _, p)| {
            (sum + u64::from(p.0[0]), count + 1)
        });
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}
