//! Image decoding and colour normalization.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces an 8-bit
//! three-channel raster. Alpha is dropped; grayscale and 16-bit inputs
//! are widened or narrowed to 8-bit RGB.

use image::DynamicImage;

use crate::types::{AnalysisError, RgbImage};

/// Decode raw image bytes without any colour conversion.
///
/// # Errors
///
/// Returns [`AnalysisError::EmptyInput`] if `bytes` is empty.
/// Returns [`AnalysisError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, AnalysisError> {
    if bytes.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Normalize any decoded image to 8-bit RGB.
///
/// # Errors
///
/// Returns [`AnalysisError::ZeroArea`] if either dimension is zero.
pub fn to_rgb(image: &DynamicImage) -> Result<RgbImage, AnalysisError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(AnalysisError::ZeroArea { width, height });
    }
    Ok(image.to_rgb8())
}

/// Decode raw bytes straight to an 8-bit RGB raster.
///
/// # Errors
///
/// See [`decode`] and [`to_rgb`].
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, AnalysisError> {
    to_rgb(&decode(bytes)?)
}
