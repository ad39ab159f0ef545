//! Shared types for the woundcare analysis core.

use serde::{Deserialize, Serialize};

use crate::classify::ClassifierConfig;
use crate::downsample::DownsampleFilter;

/// Re-export `GrayImage` so downstream crates can read the mask raster
/// without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage`, the input raster accepted by
/// [`extract`](crate::extract::extract).
pub use image::RgbImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total number of pixels (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Length of the longer axis.
    #[must_use]
    pub const fn longer_dim(self) -> u32 {
        if self.width > self.height {
            self.width
        } else {
            self.height
        }
    }
}

// ───────────────────────────── Mask ─────────────────────────────

/// Binary abnormal-tissue raster.
///
/// Backed by a [`GrayImage`] whose pixels are either 0 or 255. The
/// dimensions always match the processed (possibly downscaled) image
/// that produced it.
///
/// Serialized as `(width, height, bits)` where `bits` holds one 0/1
/// byte per pixel in row-major order, since `image::ImageBuffer` does
/// not implement serde traits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "MaskProxy", try_from = "MaskProxy")]
pub struct Mask(GrayImage);

impl Mask {
    /// Wrap a raster, normalizing every non-zero pixel to 255.
    #[must_use]
    pub fn from_image(mut image: GrayImage) -> Self {
        for pixel in image.pixels_mut() {
            if pixel.0[0] != 0 {
                pixel.0[0] = 255;
            }
        }
        Self(image)
    }

    /// An all-zero mask of the given size.
    #[must_use]
    pub fn empty(dimensions: Dimensions) -> Self {
        Self(GrayImage::new(dimensions.width, dimensions.height))
    }

    /// Raster size in pixels.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.0.width(),
            height: self.0.height(),
        }
    }

    /// Population count: number of set pixels.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.0.pixels().map(|p| u64::from(p.0[0] != 0)).sum()
    }

    /// Whether the pixel at `(x, y)` is set. Out-of-bounds coordinates
    /// are never set.
    #[must_use]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.0.width() && y < self.0.height() && self.0.get_pixel(x, y).0[0] != 0
    }

    /// Borrow the underlying 0/255 raster.
    #[must_use]
    pub const fn as_image(&self) -> &GrayImage {
        &self.0
    }

    /// Consume the mask and return the underlying 0/255 raster.
    #[must_use]
    pub fn into_image(self) -> GrayImage {
        self.0
    }
}

/// Serde proxy for [`Mask`].
#[derive(Serialize, Deserialize)]
struct MaskProxy(u32, u32, Vec<u8>);

impl From<Mask> for MaskProxy {
    fn from(mask: Mask) -> Self {
        let (width, height) = mask.0.dimensions();
        let bits = mask.0.into_raw().into_iter().map(|v| u8::from(v != 0)).collect();
        Self(width, height, bits)
    }
}

impl TryFrom<MaskProxy> for Mask {
    type Error = String;

    fn try_from(proxy: MaskProxy) -> Result<Self, Self::Error> {
        let MaskProxy(width, height, bits) = proxy;
        GrayImage::from_raw(width, height, bits)
            .map(Self::from_image)
            .ok_or_else(|| format!("mask bits do not match {width}x{height} raster"))
    }
}

// ─────────────────────────── MetricSet ──────────────────────────

/// Quantitative signals extracted from one wound photograph.
///
/// Produced only by [`extract`](crate::extract::extract); immutable
/// afterwards. The mask population count always equals [`area`](Self::area)
/// and `area_pct == area / (width * height) * 100` for the processed
/// image size. Deserialization re-checks the first invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MetricSetProxy")]
pub struct MetricSet {
    area: u64,
    area_pct: f64,
    redness: f64,
    exudate_ratio: f64,
    brightness: f64,
    blur_var: f64,
    mask: Mask,
}

impl MetricSet {
    /// Assemble a metric set from a cleaned mask and the scalar signals.
    ///
    /// `area` and `area_pct` are derived from the mask so the two
    /// invariants cannot drift.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn new(
        mask: Mask,
        redness: f64,
        exudate_ratio: f64,
        brightness: f64,
        blur_var: f64,
    ) -> Self {
        let area = mask.count();
        let total = mask.dimensions().pixel_count();
        let area_pct = if total == 0 {
            0.0
        } else {
            area as f64 / total as f64 * 100.0
        };
        Self {
            area,
            area_pct,
            redness,
            exudate_ratio,
            brightness,
            blur_var,
            mask,
        }
    }

    /// Count of pixels classified as abnormal tissue.
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.area
    }

    /// [`area`](Self::area) as a percentage of processed pixels (0–100).
    #[must_use]
    pub const fn area_pct(&self) -> f64 {
        self.area_pct
    }

    /// Mean red value inside the mask, or over the whole image when the
    /// mask is empty.
    #[must_use]
    pub const fn redness(&self) -> f64 {
        self.redness
    }

    /// Fraction of near-saturated pixels (0–1).
    #[must_use]
    pub const fn exudate_ratio(&self) -> f64 {
        self.exudate_ratio
    }

    /// Mean grayscale intensity (0–255).
    #[must_use]
    pub const fn brightness(&self) -> f64 {
        self.brightness
    }

    /// Variance of the Laplacian response.
    #[must_use]
    pub const fn blur_var(&self) -> f64 {
        self.blur_var
    }

    /// The abnormal-tissue raster.
    #[must_use]
    pub const fn mask(&self) -> &Mask {
        &self.mask
    }

    /// Size of the processed image the metrics were computed on.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        self.mask.dimensions()
    }

    /// Scalar view without the raster, for consumers that do not need it.
    #[must_use]
    pub const fn summary(&self) -> MetricSummary {
        MetricSummary {
            area: self.area,
            area_pct: self.area_pct,
            redness: self.redness,
            exudate_ratio: self.exudate_ratio,
            brightness: self.brightness,
            blur_var: self.blur_var,
        }
    }
}

impl From<&MetricSet> for MetricSummary {
    fn from(metrics: &MetricSet) -> Self {
        metrics.summary()
    }
}

#[derive(Deserialize)]
struct MetricSetProxy {
    area: u64,
    area_pct: f64,
    redness: f64,
    exudate_ratio: f64,
    brightness: f64,
    blur_var: f64,
    mask: Mask,
}

impl TryFrom<MetricSetProxy> for MetricSet {
    type Error = String;

    fn try_from(proxy: MetricSetProxy) -> Result<Self, Self::Error> {
        let population = proxy.mask.count();
        if population != proxy.area {
            return Err(format!(
                "area {} does not match mask population {population}",
                proxy.area
            ));
        }
        Ok(Self {
            area: proxy.area,
            area_pct: proxy.area_pct,
            redness: proxy.redness,
            exudate_ratio: proxy.exudate_ratio,
            brightness: proxy.brightness,
            blur_var: proxy.blur_var,
            mask: proxy.mask,
        })
    }
}

/// Scalar metrics without the mask raster.
///
/// This is what crosses the persistence boundary and what the
/// classifier reads. Deserialization is fail-open: a field that is
/// missing, `null`, non-numeric, non-finite or negative becomes zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    #[serde(default, deserialize_with = "lenient::count")]
    pub area: u64,
    #[serde(default, deserialize_with = "lenient::scalar")]
    pub area_pct: f64,
    #[serde(default, deserialize_with = "lenient::scalar")]
    pub redness: f64,
    #[serde(default, deserialize_with = "lenient::scalar")]
    pub exudate_ratio: f64,
    #[serde(default, deserialize_with = "lenient::scalar")]
    pub brightness: f64,
    #[serde(default, deserialize_with = "lenient::scalar")]
    pub blur_var: f64,
}

/// Fail-open deserializers for [`MetricSummary`] fields.
mod lenient {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Number(f64),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    fn coerce(value: Loose) -> f64 {
        let v = match value {
            Loose::Number(n) => n,
            Loose::Text(s) => s.trim().parse().unwrap_or(0.0),
            Loose::Other(_) => 0.0,
        };
        if v.is_finite() && v >= 0.0 { v } else { 0.0 }
    }

    pub fn scalar<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Loose::deserialize(deserializer).map(coerce)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        Loose::deserialize(deserializer).map(|v| coerce(v) as u64)
    }
}

// ─────────────────────────── Config ─────────────────────────────

/// Parameters of the metric extractor.
///
/// Defaults: a 512 px working resolution, a 10 % red dominance ratio,
/// an absolute red floor of 70, a dark-pixel floor of 30, a radius-3
/// disk for morphology and a near-saturation cutoff of 230.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Longest-axis cap in pixels. Larger inputs are downscaled
    /// preserving aspect ratio.
    pub max_dimension: u32,

    /// Resampling filter used when downscaling.
    pub downsample_filter: DownsampleFilter,

    /// Red must exceed both green and blue times this ratio.
    pub red_ratio: f64,

    /// Red must be strictly above this value.
    pub min_red: u8,

    /// Mean of R, G and B must be strictly above this value. Excludes
    /// shadow and vignette pixels.
    pub min_mean_intensity: u8,

    /// Radius of the Euclidean disk used for the opening and closing
    /// passes. Zero disables mask cleaning.
    pub morph_radius: u8,

    /// Grayscale values strictly above this count towards
    /// `exudate_ratio`.
    pub exudate_cutoff: u8,
}

impl ExtractConfig {
    pub const DEFAULT_MAX_DIMENSION: u32 = 512;
    pub const DEFAULT_DOWNSAMPLE_FILTER: DownsampleFilter = DownsampleFilter::Area;
    pub const DEFAULT_RED_RATIO: f64 = 1.1;
    pub const DEFAULT_MIN_RED: u8 = 70;
    pub const DEFAULT_MIN_MEAN_INTENSITY: u8 = 30;
    pub const DEFAULT_MORPH_RADIUS: u8 = 3;
    pub const DEFAULT_EXUDATE_CUTOFF: u8 = 230;

    /// Check invariants that the extractor relies on.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidConfig`] if `max_dimension` is
    /// zero or `red_ratio` is negative or not finite.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.max_dimension == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_dimension must be at least 1".to_string(),
            ));
        }
        if !self.red_ratio.is_finite() || self.red_ratio < 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "red_ratio must be finite and non-negative, got {}",
                self.red_ratio
            )));
        }
        Ok(())
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_dimension: Self::DEFAULT_MAX_DIMENSION,
            downsample_filter: Self::DEFAULT_DOWNSAMPLE_FILTER,
            red_ratio: Self::DEFAULT_RED_RATIO,
            min_red: Self::DEFAULT_MIN_RED,
            min_mean_intensity: Self::DEFAULT_MIN_MEAN_INTENSITY,
            morph_radius: Self::DEFAULT_MORPH_RADIUS,
            exudate_cutoff: Self::DEFAULT_EXUDATE_CUTOFF,
        }
    }
}

/// Full analysis configuration: extraction plus classification.
///
/// This is the shape accepted by the CLI's `--config` and
/// `--config-json` options. Missing sections fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub extract: ExtractConfig,
    pub classifier: ClassifierConfig,
}

// ─────────────────────────── Errors ─────────────────────────────

/// Errors that can occur during metric extraction.
///
/// Classification never fails, so every variant concerns the input
/// image or the extractor configuration.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The decoded raster has zero width or height.
    #[error("image has zero area ({width}x{height})")]
    ZeroArea { width: u32, height: u32 },

    /// Extractor configuration is invalid.
    #[error("invalid analysis configuration: {0}")]
    InvalidConfig(String),
}

/// Serde-compatible proxy for `AnalysisError`.
///
/// `image::ImageError` does not implement serde, so the `ImageDecode`
/// variant stores its `Display` string instead.
#[derive(Serialize, Deserialize)]
enum AnalysisErrorProxy {
    ImageDecode(String),
    EmptyInput,
    ZeroArea { width: u32, height: u32 },
    InvalidConfig(String),
}

impl Serialize for AnalysisError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => AnalysisErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => AnalysisErrorProxy::EmptyInput,
            Self::ZeroArea { width, height } => AnalysisErrorProxy::ZeroArea {
                width: *width,
                height: *height,
            },
            Self::InvalidConfig(s) => AnalysisErrorProxy::InvalidConfig(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AnalysisError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = AnalysisErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            // The typed image error cannot be rebuilt; keep its message.
            AnalysisErrorProxy::ImageDecode(msg) => {
                Self::InvalidConfig(format!("image decode error: {msg}"))
            }
            AnalysisErrorProxy::EmptyInput => Self::EmptyInput,
            AnalysisErrorProxy::ZeroArea { width, height } => Self::ZeroArea { width, height },
            AnalysisErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
        })
    }
}
