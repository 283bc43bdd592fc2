//! Shared types for the inkline line-art pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::segment::ModelError;

/// Re-export `GrayImage` so downstream crates can reference
/// single-channel raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can pass decoded color
/// images without depending on `image` directly.
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
    /// Dimensions of any `image` buffer.
    #[must_use]
    pub fn of<I: image::GenericImageView>(image: &I) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Per-pixel foreground opacity estimated by a matting model.
///
/// 0 is background, 255 is foreground. Only a
/// [`Segmenter`](crate::segment::Segmenter) produces one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaMatte(GrayImage);

impl AlphaMatte {
    /// Wrap a single-channel opacity image.
    #[must_use]
    pub const fn new(matte: GrayImage) -> Self {
        Self(matte)
    }

    /// The underlying opacity image.
    #[must_use]
    pub const fn as_image(&self) -> &GrayImage {
        &self.0
    }

    /// Consume the matte and return the underlying image.
    #[must_use]
    pub fn into_image(self) -> GrayImage {
        self.0
    }

    /// Matte dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.0)
    }
}

/// Strictly binary subject mask: 255 inside the subject, 0 elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundMask(GrayImage);

impl ForegroundMask {
    /// Matte values strictly above this are foreground.
    pub const MATTE_THRESHOLD: u8 = 128;

    /// Threshold an alpha matte at [`Self::MATTE_THRESHOLD`].
    #[must_use]
    pub fn from_matte(matte: &AlphaMatte) -> Self {
        Self(crate::threshold::binarize(
            matte.as_image(),
            Self::MATTE_THRESHOLD,
        ))
    }

    /// Build a mask from caller-supplied data. Any non-zero pixel is
    /// treated as foreground so the binary invariant always holds.
    #[must_use]
    pub fn from_image(mask: &GrayImage) -> Self {
        Self(crate::threshold::binarize(mask, 0))
    }

    /// The underlying 0/255 image.
    #[must_use]
    pub const fn as_image(&self) -> &GrayImage {
        &self.0
    }

    /// Consume the mask and return the underlying image.
    #[must_use]
    pub fn into_image(self) -> GrayImage {
        self.0
    }

    /// Mask dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.0)
    }

    /// Number of foreground pixels.
    #[must_use]
    pub fn foreground_pixels(&self) -> u64 {
        crate::quality::count_value(&self.0, 255)
    }

    /// Dilate the mask with an elliptical element so strokes at the
    /// silhouette (hair, fabric edges) are not clipped.
    ///
    /// `kernel` is normalized to an odd size of at least 1.
    #[must_use]
    pub fn loosen(&self, kernel: i32) -> LooseMask {
        let size = crate::morphology::normalize_odd(kernel);
        LooseMask(crate::morphology::dilate(&self.0, size, 1))
    }
}

/// A [`ForegroundMask`] grown by a fixed elliptical element.
///
/// Decides which pixels may contribute interior line strokes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LooseMask(GrayImage);

impl LooseMask {
    /// The underlying 0/255 image.
    #[must_use]
    pub const fn as_image(&self) -> &GrayImage {
        &self.0
    }

    /// Consume the mask and return the image.
    #[must_use]
    pub fn into_image(self) -> GrayImage {
        self.0
    }

    /// Number of pixels inside the loosened mask.
    #[must_use]
    pub fn foreground_pixels(&self) -> u64 {
        crate::quality::count_value(&self.0, 255)
    }
}

/// Result of running the pipeline with every intermediate preserved.
///
/// Field order follows the pipeline; [`StagedResult::artifacts`] pairs
/// the persisted stages with their conventional file stems.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// The decoded source photograph.
    pub original: RgbImage,
    /// Stage 1: matte returned by the segmenter.
    pub matte: AlphaMatte,
    /// Stage 1: binary subject mask derived from the matte.
    pub foreground_mask: ForegroundMask,
    /// Stage 1: subject composited onto white.
    pub subject_on_white: RgbImage,
    /// Stage 2: Gaussian-smoothed subject.
    pub denoised: RgbImage,
    /// Stage 3: single-channel luminance.
    pub grayscale: GrayImage,
    /// Stage 4: raw black-on-white line art.
    pub lineart_raw: GrayImage,
    /// Stage 5: polished coloring page.
    pub coloring_book: GrayImage,
    /// Source image dimensions in pixels.
    pub dimensions: Dimensions,
}

/// File stems of the persisted stage artifacts, in pipeline order.
pub const STAGES: [&str; 5] = [
    "01_subject_on_white",
    "02_gaussian_blur",
    "03_grayscale",
    "04_lineart_raw",
    "05_coloring_book",
];

impl StagedResult {
    /// The final deliverable.
    #[must_use]
    pub const fn final_image(&self) -> &GrayImage {
        &self.coloring_book
    }

    /// Stage artifacts paired with their [`STAGES`] file stems.
    ///
    /// The grayscale stage is re-expanded to three equal channels so the
    /// persisted file reads back as true gray in any viewer.
    #[must_use]
    pub fn artifacts(&self) -> [(&'static str, image::DynamicImage); 5] {
        use image::DynamicImage;
        [
            (STAGES[0], DynamicImage::ImageRgb8(self.subject_on_white.clone())),
            (STAGES[1], DynamicImage::ImageRgb8(self.denoised.clone())),
            (
                STAGES[2],
                DynamicImage::ImageRgb8(crate::grayscale::expand_to_rgb(&self.grayscale)),
            ),
            (STAGES[3], DynamicImage::ImageLuma8(self.lineart_raw.clone())),
            (STAGES[4], DynamicImage::ImageLuma8(self.coloring_book.clone())),
        ]
    }
}

/// Broad class of a [`PipelineError`], for orchestrators deciding
/// whether to skip an image, retry, or abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing, empty, unreadable or mismatched input.
    Input,
    /// The external matting model failed.
    Model,
    /// Configuration that cannot be normalized.
    Config,
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image (or a required mask) has no pixels.
    #[error("input image data is empty")]
    EmptyInput,

    /// Two inputs that must align pixel-for-pixel do not.
    #[error("{what} is {actual} but the image is {expected}")]
    DimensionMismatch {
        /// Which input disagreed with the image.
        what: &'static str,
        /// Dimensions of the reference image.
        expected: Dimensions,
        /// Dimensions of the offending input.
        actual: Dimensions,
    },

    /// The matting model failed. The model's error is carried unchanged.
    #[error("background segmentation failed: {0}")]
    Model(#[from] ModelError),

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ImageDecode(_) | Self::EmptyInput | Self::DimensionMismatch { .. } => {
                ErrorKind::Input
            }
            Self::Model(_) => ErrorKind::Model,
            Self::InvalidConfig(_) => ErrorKind::Config,
        }
    }
}

/// Check that `other` is non-empty and matches `image` pixel-for-pixel.
pub(crate) fn ensure_aligned(
    image: Dimensions,
    other: Dimensions,
    what: &'static str,
) -> Result<(), PipelineError> {
    if image.is_empty() || other.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    if image != other {
        return Err(PipelineError::DimensionMismatch {
            what,
            expected: image,
            actual: other,
        });
    }
    Ok(())
}
