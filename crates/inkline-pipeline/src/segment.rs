//! Background segmentation: matting-model boundary and compositing.
//!
//! The matting model itself lives outside this crate. It is reached
//! through the [`Segmenter`] trait so that real inference backends and
//! deterministic test stubs are interchangeable. Closures of the shape
//! `Fn(&RgbImage) -> Result<GrayImage, ModelError>` implement the trait
//! directly.
//!
//! Given a matte, [`segment`] composites the subject onto white and
//! derives the binary [`ForegroundMask`]. A failing model is never
//! papered over with a blank or full mask.

use image::GrayImage;

use crate::types::{AlphaMatte, Dimensions, ForegroundMask, PipelineError, RgbImage};

/// Errors reported by a matting backend.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The model ran but reported a failure.
    #[error("matting model failed: {0}")]
    Inference(String),

    /// The model returned a matte that does not cover the input image.
    #[error("matte is {actual} but the image is {expected}")]
    DimensionMismatch {
        /// Dimensions of the image sent to the model.
        expected: Dimensions,
        /// Dimensions of the returned matte.
        actual: Dimensions,
    },

    /// Any other backend error, preserved as the source.
    #[error(transparent)]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Capability to estimate a per-pixel alpha matte for a color image.
///
/// Implementations may be slow (neural inference) and may fail. The
/// pipeline imposes no timeout; that policy belongs to the caller.
pub trait Segmenter {
    /// Estimate foreground opacity for every pixel of `image`.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] if inference fails.
    fn matte(&self, image: &RgbImage) -> Result<AlphaMatte, ModelError>;
}

impl<F> Segmenter for F
where
    F: Fn(&RgbImage) -> Result<GrayImage, ModelError>,
{
    fn matte(&self, image: &RgbImage) -> Result<AlphaMatte, ModelError> {
        self(image).map(AlphaMatte::new)
    }
}

/// A matte computed ahead of time, e.g. the alpha channel of a cut-out
/// PNG written by an external background remover.
#[derive(Debug, Clone)]
pub struct PrecomputedMatte(AlphaMatte);

impl PrecomputedMatte {
    /// Use `matte` as-is for whatever image is segmented.
    #[must_use]
    pub const fn new(matte: GrayImage) -> Self {
        Self(AlphaMatte::new(matte))
    }

    /// Take the matte from the alpha channel of an RGBA image.
    #[must_use]
    pub fn from_alpha_channel(image: &image::RgbaImage) -> Self {
        Self::new(GrayImage::from_fn(image.width(), image.height(), |x, y| {
            image::Luma([image.get_pixel(x, y).0[3]])
        }))
    }
}

impl Segmenter for PrecomputedMatte {
    fn matte(&self, _image: &RgbImage) -> Result<AlphaMatte, ModelError> {
        Ok(self.0.clone())
    }
}

/// Output of the segmentation stage.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// The subject alpha-composited onto pure white.
    pub subject_on_white: RgbImage,
    /// Binary mask, 255 where the matte exceeds 128.
    pub foreground_mask: ForegroundMask,
    /// The raw matte returned by the model.
    pub matte: AlphaMatte,
}

/// Segment `image` with `segmenter`.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] for an image without pixels
/// (the model is not called). Returns [`PipelineError::Model`] carrying
/// the model's error unchanged if inference fails, or carrying
/// [`ModelError::DimensionMismatch`] if the matte does not match the
/// image.
pub fn segment<S>(image: &RgbImage, segmenter: &S) -> Result<Segmentation, PipelineError>
where
    S: Segmenter + ?Sized,
{
    let dimensions = Dimensions::of(image);
    if dimensions.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let matte = segmenter.matte(image)?;
    if matte.dimensions() != dimensions {
        return Err(ModelError::DimensionMismatch {
            expected: dimensions,
            actual: matte.dimensions(),
        }
        .into());
    }

    let subject_on_white = composite_on_white(image, &matte);
    let foreground_mask = ForegroundMask::from_matte(&matte);
    tracing::debug!(
        %dimensions,
        foreground_pixels = foreground_mask.foreground_pixels(),
        "segmented subject"
    );

    Ok(Segmentation {
        subject_on_white,
        foreground_mask,
        matte,
    })
}

/// Alpha-composite `image` over white: `a*fg + (1-a)*255` per channel,
/// computed in floating point and rounded.
///
/// `matte` must have the same dimensions as `image`.
#[must_use = "returns the composited image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn composite_on_white(image: &RgbImage, matte: &AlphaMatte) -> RgbImage {
    let alpha = matte.as_image();
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let a = f32::from(alpha.get_pixel(x, y).0[0]) / 255.0;
        let fg = image.get_pixel(x, y).0;
        image::Rgb(fg.map(|c| {
            f32::from(c)
                .mul_add(a, 255.0 * (1.0 - a))
                .round()
                .clamp(0.0, 255.0) as u8
        }))
    })
}
