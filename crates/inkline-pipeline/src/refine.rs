//! Morphological refinement of raw line art into a printable page.
//!
//! The refiner cleans up whatever the line extractor produced: it drops
//! isolated specks, bridges small stroke gaps, thickens lines so they
//! survive printing, and (for [`RefineStyle::Stylized`]) rounds stroke
//! contours with a median filter.
//!
//! Input may be any grayscale line drawing. Soft input is binarized with
//! Otsu's threshold and white-on-black input is flipped first, so the
//! refiner can also be run standalone on scanned or third-party art.

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use crate::config::RefineConfig;
use crate::morphology::{self, normalize_odd};
use crate::threshold;

/// Mean intensity below which input is taken to be white-on-black.
const DARK_MEAN: f64 = 127.0;

/// Selects the refinement style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RefineStyle {
    /// Speck removal, closing and thickening.
    #[default]
    Standard,
    /// [`Standard`](Self::Standard) followed by a median filter that
    /// rounds stroke ends and corners.
    Stylized,
}

impl std::fmt::Display for RefineStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => f.write_str("standard"),
            Self::Stylized => f.write_str("stylized"),
        }
    }
}

/// What the refiner did to one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RefineStats {
    /// Otsu level used, if the input needed binarizing.
    pub otsu_level: Option<u8>,
    /// Whether the input was inverted as white-on-black.
    pub inverted: bool,
    /// Ink components before speck removal.
    pub components_before: usize,
    /// Ink components after speck removal.
    pub components_after: usize,
}

/// Trait for refinement strategies.
pub trait Refiner {
    /// Refine a black-on-white line drawing, reporting what was done.
    fn refine(&self, lineart: &GrayImage, config: &RefineConfig) -> (GrayImage, RefineStats);
}

impl Refiner for RefineStyle {
    fn refine(&self, lineart: &GrayImage, config: &RefineConfig) -> (GrayImage, RefineStats) {
        let (mut ink, stats) = clean_ink(lineart, config);
        if *self == Self::Stylized {
            let radius = (normalize_odd(config.median_kernel) / 2)
                .min(ink.width().max(ink.height()));
            if radius > 0 {
                ink = imageproc::filter::median_filter(&ink, radius, radius);
            }
        }
        (threshold::invert(&ink), stats)
    }
}

/// Refine `lineart` with `config.style`.
///
/// Output is strictly binary, black lines on white, with the input's
/// dimensions. Empty images are returned unchanged.
#[must_use = "returns the refined page"]
pub fn refine(lineart: &GrayImage, config: &RefineConfig) -> GrayImage {
    refine_with_stats(lineart, config).0
}

/// [`refine`], also returning [`RefineStats`].
#[must_use = "returns the refined page and its statistics"]
pub fn refine_with_stats(lineart: &GrayImage, config: &RefineConfig) -> (GrayImage, RefineStats) {
    if lineart.width() == 0 || lineart.height() == 0 {
        return (lineart.clone(), RefineStats::default());
    }
    let (page, stats) = config.style.refine(lineart, config);
    tracing::debug!(
        style = %config.style,
        otsu_level = ?stats.otsu_level,
        inverted = stats.inverted,
        components_before = stats.components_before,
        components_after = stats.components_after,
        "refined line art"
    );
    (page, stats)
}

/// Refine any decoded image; color input is reduced to luminance first.
#[must_use = "returns the refined page"]
pub fn refine_dynamic(image: &DynamicImage, config: &RefineConfig) -> GrayImage {
    refine(&crate::grayscale::to_luminance_dynamic(image), config)
}

#[allow(clippy::cast_precision_loss)]
fn mean(image: &GrayImage) -> f64 {
    let n = u64::from(image.width()) * u64::from(image.height());
    if n == 0 {
        return 0.0;
    }
    image.pixels().map(|p| u64::from(p.0[0])).sum::<u64>() as f64 / n as f64
}

/// Normalize to black-on-white, then run the shared cleanup on the ink
/// mask (255 = ink).
fn clean_ink(lineart: &GrayImage, config: &RefineConfig) -> (GrayImage, RefineStats) {
    let mut stats = RefineStats::default();

    let mut page = if config.auto_binarize && !threshold::is_binary(lineart) {
        let (binary, level) = threshold::binarize_otsu(lineart);
        stats.otsu_level = Some(level);
        binary
    } else {
        lineart.clone()
    };
    if config.auto_invert && mean(&page) < DARK_MEAN {
        page = threshold::invert(&page);
        stats.inverted = true;
    }

    // Anything not pure white counts as ink.
    let ink = threshold::binarize(&threshold::invert(&page), 0);
    stats.components_before = morphology::component_areas(&ink).len();

    let ink = morphology::remove_specks(&ink, config.speck_area());
    stats.components_after = morphology::component_areas(&ink).len();

    let ink = morphology::close(&ink, normalize_odd(config.close_kernel));
    let ink = morphology::dilate(
        &ink,
        normalize_odd(config.thicken_kernel),
        config.thicken_iterations(),
    );
    (ink, stats)
}
