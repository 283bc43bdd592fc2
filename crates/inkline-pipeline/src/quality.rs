//! Image statistics used by diagnostics and by property tests.
//!
//! None of these feed back into the pipeline; they describe its output.

use image::GrayImage;

/// Number of pixels exactly equal to `value`.
#[must_use]
pub fn count_value(image: &GrayImage, value: u8) -> u64 {
    image.pixels().filter(|p| p.0[0] == value).count() as u64
}

#[allow(clippy::cast_precision_loss)]
fn ratio(count: u64, image: &GrayImage) -> f64 {
    let total = u64::from(image.width()) * u64::from(image.height());
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64
}

/// Fraction of pixels that are pure white (255).
#[must_use]
pub fn white_ratio(image: &GrayImage) -> f64 {
    ratio(count_value(image, 255), image)
}

/// Fraction of pixels in the mid-gray band `20 < v < 235`.
#[must_use]
pub fn gray_ratio(image: &GrayImage) -> f64 {
    let gray = image
        .pixels()
        .filter(|p| (21..235).contains(&p.0[0]))
        .count() as u64;
    ratio(gray, image)
}

/// Count and mean area of the 8-connected ink components.
///
/// Ink is any pixel darker than 128. An image without ink reports
/// `(0, 0.0)`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct InkComponents {
    /// Number of separate ink blobs.
    pub count: usize,
    /// Mean blob area in pixels.
    pub mean_area: f64,
}

/// Measure the ink components of a white-background line drawing.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ink_components(image: &GrayImage) -> InkComponents {
    let mut ink = image.clone();
    for p in ink.pixels_mut() {
        p.0[0] = if p.0[0] < 128 { 255 } else { 0 };
    }
    let areas = crate::morphology::component_areas(&ink);
    if areas.is_empty() {
        return InkComponents {
            count: 0,
            mean_area: 0.0,
        };
    }
    let total: u64 = areas.iter().map(|&a| u64::from(a)).sum();
    InkComponents {
        count: areas.len(),
        mean_area: total as f64 / areas.len() as f64,
    }
}

/// Variance of the 3x3 Laplacian response, a common sharpness measure.
///
/// Lower values mean a smoother image.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn laplacian_variance(image: &GrayImage) -> f64 {
    if image.width() == 0 || image.height() == 0 {
        return 0.0;
    }
    let response = imageproc::filter::laplacian_filter(image);
    let n = f64::from(image.width()) * f64::from(image.height());
    let mean = response.pixels().map(|p| f64::from(p.0[0])).sum::<f64>() / n;
    response
        .pixels()
        .map(|p| {
            let d = f64::from(p.0[0]) - mean;
            d * d
        })
        .sum::<f64>()
        / n
}
