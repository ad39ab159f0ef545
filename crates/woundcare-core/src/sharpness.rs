//! Blur proxy: variance of the Laplacian.
//!
//! Wraps [`imageproc::filter::laplacian_filter`] (the 4-neighbour
//! second-derivative kernel) and reduces its response to a single
//! population variance. Sharp, detailed captures have a wide spread of
//! Laplacian values; blurry or flat ones stay near zero.
//!
//! The filter itself clamps at the edges, so the image is first padded
//! by one pixel with reflect-101 borders (`gfedcb|abcdefgh|gfedcba`) and
//! only the input pixel grid of the response is measured.

use crate::types::GrayImage;

/// Reflect-101 index into an axis of length `len`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn reflect_101(i: i64, len: u32) -> u32 {
    let n = i64::from(len);
    if n == 1 {
        return 0;
    }
    let i = if i < 0 { -i } else { i };
    let i = if i >= n { 2 * n - 2 - i } else { i };
    i as u32
}

/// `image` grown by one pixel on every side with reflect-101 borders.
fn pad_reflect_101(image: &GrayImage) -> GrayImage {
    let (w, h) = image.dimensions();
    GrayImage::from_fn(w + 2, h + 2, |x, y| {
        *image.get_pixel(
            reflect_101(i64::from(x) - 1, w),
            reflect_101(i64::from(y) - 1, h),
        )
    })
}

/// Population variance of the Laplacian response of `image`.
///
/// Returns 0.0 for an empty raster.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn laplacian_variance(image: &GrayImage) -> f64 {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }
    let response = imageproc::filter::laplacian_filter(&pad_reflect_101(image));
    let values: Vec<f64> = response
        .enumerate_pixels()
        .filter(|(x, y, _)| (1..=w).contains(x) && (1..=h).contains(y))
        .map(|(_, _, p)| f64::from(p.0[0]))
        .collect();
    let n = values.len() as f64;

    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}
