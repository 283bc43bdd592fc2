//! Line extraction: grayscale subject to black-on-white line art.
//!
//! This module defines the [`LineExtractor`] trait for pluggable
//! extraction strategies and the [`LineStyle`] enum for selecting one at
//! runtime.
//!
//! # Strategies
//!
//! - [`LineStyle::Hybrid`] combines a Canny outline (clean silhouette)
//!   with XDoG interior strokes (eyes, mouth, folds), after a bilateral
//!   filter has flattened fabric and skin texture.
//! - [`LineStyle::Tracing`] runs a Gaussian adaptive threshold on a
//!   heavily bilateral-smoothed image, which reads more like a pencil
//!   tracing of dark regions.
//!
//! Both strategies work inside a *working mask*: the foreground mask,
//! optionally dilated into a [`LooseMask`](crate::types::LooseMask) so
//! that hair and soft edges are not cut off. No ink is ever produced
//! outside the working mask.

use std::borrow::Cow;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::bilateral::bilateral_filter;
use crate::config::LineConfig;
use crate::types::{Dimensions, ForegroundMask, PipelineError, ensure_aligned};
use crate::xdog::{XdogParams, xdog};

/// Selects which line extraction strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineStyle {
    /// Canny outline plus XDoG interior strokes.
    #[default]
    Hybrid,
    /// Bilateral smoothing plus Gaussian adaptive threshold.
    Tracing,
}

impl std::fmt::Display for LineStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hybrid => f.write_str("hybrid"),
            Self::Tracing => f.write_str("tracing"),
        }
    }
}

/// Trait for line extraction strategies.
///
/// Input: a grayscale image and a foreground mask of the same size.
/// Output: a strictly binary image, black (0) lines on white (255).
pub trait LineExtractor {
    /// Extract line art. Inputs are assumed non-empty and aligned.
    fn extract(&self, gray: &GrayImage, mask: &ForegroundMask, config: &LineConfig) -> GrayImage;
}

impl LineExtractor for LineStyle {
    fn extract(&self, gray: &GrayImage, mask: &ForegroundMask, config: &LineConfig) -> GrayImage {
        match *self {
            Self::Hybrid => extract_hybrid(gray, mask, config),
            Self::Tracing => extract_tracing(gray, mask, config),
        }
    }
}

/// Extract line art from `gray` within `mask`, using `config.style`.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if either buffer has no pixels
/// and [`PipelineError::DimensionMismatch`] if their sizes differ. Both
/// checks run before any pixel is processed.
pub fn extract_lines(
    gray: &GrayImage,
    mask: &ForegroundMask,
    config: &LineConfig,
) -> Result<GrayImage, PipelineError> {
    ensure_aligned(Dimensions::of(gray), mask.dimensions(), "foreground mask")?;
    let lineart = config.style.extract(gray, mask, config);
    tracing::debug!(
        style = %config.style,
        white_ratio = crate::quality::white_ratio(&lineart),
        "extracted lines"
    );
    Ok(lineart)
}

/// Mask pixels that extraction is allowed to ink.
fn working_mask<'a>(mask: &'a ForegroundMask, config: &LineConfig) -> Cow<'a, GrayImage> {
    if config.use_loose_mask {
        Cow::Owned(mask.loosen(config.loose_kernel).into_image())
    } else {
        Cow::Borrowed(mask.as_image())
    }
}

/// Copy of `gray` with every pixel outside `mask` set to white.
fn whiten_outside(gray: &GrayImage, mask: &GrayImage) -> GrayImage {
    let mut out = gray.clone();
    for (p, m) in out.pixels_mut().zip(mask.pixels()) {
        if m.0[0] == 0 {
            p.0[0] = 255;
        }
    }
    out
}

/// Zero every pixel of `image` outside `mask`.
fn clip_to(image: &mut GrayImage, mask: &GrayImage) {
    for (p, m) in image.pixels_mut().zip(mask.pixels()) {
        if m.0[0] == 0 {
            p.0[0] = 0;
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn extract_hybrid(gray: &GrayImage, mask: &ForegroundMask, config: &LineConfig) -> GrayImage {
    let working = working_mask(mask, config);
    let subject = whiten_outside(gray, &working);
    let smooth = bilateral_filter(
        &subject,
        config.bilateral_diameter,
        config.bilateral_sigma_color,
        config.bilateral_sigma_space,
    );

    let mut outer = crate::canny::canny(&smooth, config.canny_low, config.canny_high);
    clip_to(&mut outer, mask.as_image());

    let params = XdogParams {
        sigma: config.xdog_sigma,
        k: config.xdog_k,
        gamma: config.xdog_gamma,
        eps: config.xdog_eps,
        phi: config.xdog_phi,
    };
    let mut inner = crate::threshold::binarize(&xdog(&smooth, &params), config.inner_cutoff);
    clip_to(&mut inner, &working);

    tracing::trace!(
        outline_pixels = crate::quality::count_value(&outer, 255),
        stroke_pixels = crate::quality::count_value(&inner, 255),
        "hybrid components"
    );

    let mut edges = outer;
    for (o, i) in edges.pixels_mut().zip(inner.pixels()) {
        let sum = f32::from(o.0[0])
            .mul_add(config.outer_weight, f32::from(i.0[0]) * config.inner_weight)
            .round()
            .clamp(0.0, 255.0) as u8;
        o.0[0] = if sum > config.combine_cutoff { 0 } else { 255 };
    }
    edges
}

fn extract_tracing(gray: &GrayImage, mask: &ForegroundMask, config: &LineConfig) -> GrayImage {
    let working = working_mask(mask, config);
    let subject = whiten_outside(gray, &working);
    let smooth = bilateral_filter(
        &subject,
        config.tracing_bilateral_diameter,
        config.tracing_sigma_color,
        config.tracing_sigma_space,
    );
    let traced = crate::threshold::adaptive_gaussian(
        &smooth,
        config.tracing_block_size,
        config.tracing_offset,
    );
    let mut out = traced;
    for (p, m) in out.pixels_mut().zip(working.pixels()) {
        if m.0[0] == 0 {
            p.0[0] = 255;
        }
    }
    out
}
