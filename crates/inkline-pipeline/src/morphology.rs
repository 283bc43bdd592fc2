//! Binary morphology and connected-component filtering.
//!
//! All operations treat 255 as foreground ("ink") and 0 as background.
//! Structuring elements are discs approximating OpenCV's elliptical
//! kernels: an odd kernel size `k` maps to
//! [`imageproc::morphology::Mask::disk`] with radius `(k - 1) / 2`.

use image::{GrayImage, Luma};
use imageproc::morphology::Mask;
use imageproc::region_labelling::{Connectivity, connected_components};

/// Normalize a kernel size to an odd value of at least 1.
#[must_use]
pub fn normalize_odd(kernel: i32) -> u32 {
    let k = u32::try_from(kernel).unwrap_or(0).max(1);
    if k % 2 == 0 { k.saturating_add(1) } else { k }
}

/// Elliptical structuring element for an odd kernel size.
fn ellipse(kernel: u32, image: &GrayImage) -> Mask {
    Mask::disk(element_radius(kernel, image))
}

/// Disc radius for an odd kernel size, capped at the image's longer side
/// and at what [`Mask::disk`] accepts.
fn element_radius(kernel: u32, image: &GrayImage) -> u8 {
    let radius = (kernel / 2).min(image.width().max(image.height())).max(1);
    u8::try_from(radius).unwrap_or(u8::MAX)
}

/// Dilate `image` with an elliptical element, `iterations` times.
///
/// A kernel of 1 or zero iterations returns a copy. Iterations past the
/// point where a single ink pixel would cover the image are skipped.
#[must_use = "returns the dilated image"]
pub fn dilate(image: &GrayImage, kernel: u32, iterations: u32) -> GrayImage {
    if kernel <= 1 || iterations == 0 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let radius = u32::from(element_radius(kernel, image));
    let span = image.width().max(image.height());
    let iterations = iterations.min(span.saturating_mul(2) / radius + 1);
    let element = ellipse(kernel, image);
    let mut out = imageproc::morphology::grayscale_dilate(image, &element);
    for _ in 1..iterations {
        let next = imageproc::morphology::grayscale_dilate(&out, &element);
        if next == out {
            break;
        }
        out = next;
    }
    out
}

/// Erode `image` with an elliptical element once.
#[must_use = "returns the eroded image"]
pub fn erode(image: &GrayImage, kernel: u32) -> GrayImage {
    if kernel <= 1 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    imageproc::morphology::grayscale_erode(image, &ellipse(kernel, image))
}

/// Morphological close (dilate, then erode) with an elliptical element.
///
/// Reconnects strokes separated by gaps narrower than the kernel.
#[must_use = "returns the closed image"]
pub fn close(image: &GrayImage, kernel: u32) -> GrayImage {
    if kernel <= 1 {
        return image.clone();
    }
    erode(&dilate(image, kernel, 1), kernel)
}

/// Pixel areas of the 8-connected foreground components of `ink`.
///
/// Every non-zero pixel counts as foreground. The order of the returned
/// areas follows label order and carries no other meaning.
#[must_use]
pub fn component_areas(ink: &GrayImage) -> Vec<u32> {
    let labels = connected_components(ink, Connectivity::Eight, Luma([0u8]));
    let mut areas: Vec<u32> = Vec::new();
    for label in labels.pixels().map(|p| p.0[0]) {
        if label == 0 {
            continue;
        }
        let idx = label as usize - 1;
        if idx >= areas.len() {
            areas.resize(idx + 1, 0);
        }
        areas[idx] += 1;
    }
    areas.retain(|&a| a > 0);
    areas
}

/// Remove 8-connected ink components smaller than `min_area` pixels.
///
/// Surviving components are kept pixel-for-pixel at 255; everything else
/// becomes 0. A `min_area` of 0 or 1 only normalizes the image to 0/255.
#[must_use = "returns the filtered ink mask"]
pub fn remove_specks(ink: &GrayImage, min_area: u32) -> GrayImage {
    let labels = connected_components(ink, Connectivity::Eight, Luma([0u8]));
    let mut areas: Vec<u32> = Vec::new();
    for label in labels.pixels().map(|p| p.0[0]) {
        let idx = label as usize;
        if idx >= areas.len() {
            areas.resize(idx + 1, 0);
        }
        areas[idx] += 1;
    }

    let mut kept = 0usize;
    let out = GrayImage::from_fn(ink.width(), ink.height(), |x, y| {
        let label = labels.get_pixel(x, y).0[0] as usize;
        if label != 0 && areas[label] >= min_area {
            kept += 1;
            Luma([255])
        } else {
            Luma([0])
        }
    });
    tracing::trace!(min_area, components = areas.len().saturating_sub(1), kept, "speck filter");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(w: u32, h: u32, points: &[(u32, u32)]) -> GrayImage {
        let mut img = GrayImage::new(w, h);
        for &(x, y) in points {
            img.put_pixel(x, y, Luma([255]));
        }
        img
    }

    fn ink_count(img: &GrayImage) -> usize {
        img.pixels().filter(|p| p.0[0] == 255).count()
    }

    #[test]
    fn normalize_odd_clamps_and_rounds_up() {
        assert_eq!(normalize_odd(-3), 1);
        assert_eq!(normalize_odd(0), 1);
        assert_eq!(normalize_odd(1), 1);
        assert_eq!(normalize_odd(2), 3);
        assert_eq!(normalize_odd(13), 13);
    }

    #[test]
    fn dilate_grows_and_keeps_center() {
        let img = dot(9, 9, &[(4, 4)]);
        let out = dilate(&img, 3, 1);
        assert_eq!(out.get_pixel(4, 4).0[0], 255);
        assert_eq!(out.get_pixel(3, 4).0[0], 255);
        assert_eq!(out.get_pixel(4, 5).0[0], 255);
        assert!(ink_count(&out) > 1);
        assert!(ink_count(&dilate(&img, 3, 2)) > ink_count(&out));
    }

    #[test]
    fn trivial_dilate_is_identity() {
        let img = dot(5, 5, &[(1, 1)]);
        assert_eq!(dilate(&img, 1, 3), img);
        assert_eq!(dilate(&img, 5, 0), img);
    }

    #[test]
    fn unbounded_dilation_saturates() {
        let img = dot(12, 7, &[(2, 3)]);
        let full = dilate(&img, 3, u32::MAX);
        assert_eq!(ink_count(&full), 12 * 7);
        assert_eq!(dilate(&img, u32::MAX, u32::MAX), full);
        assert_eq!(erode(&full, u32::MAX), full);
    }

    #[test]
    fn close_bridges_one_pixel_gap_in_thick_stroke() {
        let points: Vec<(u32, u32)> = (2..15)
            .filter(|&x| x != 8)
            .flat_map(|x| (4..=6).map(move |y| (x, y)))
            .collect();
        let img = dot(17, 11, &points);
        assert_eq!(component_areas(&img).len(), 2);
        let closed = close(&img, 3);
        assert_eq!(closed.get_pixel(8, 5).0[0], 255);
        assert_eq!(component_areas(&closed).len(), 1);
    }

    #[test]
    fn close_three_leaves_gap_in_hairline() {
        let points: Vec<(u32, u32)> = (2..15).filter(|&x| x != 8).map(|x| (x, 5)).collect();
        let img = dot(17, 11, &points);
        // The 3x3 element is a cross, so the diagonal support is missing.
        assert_eq!(close(&img, 3).get_pixel(8, 5).0[0], 0);
        assert_eq!(component_areas(&close(&img, 3)).len(), 2);
    }

    #[test]
    fn component_areas_uses_eight_connectivity() {
        // Diagonal neighbours join; the isolated pixel does not.
        let img = dot(10, 10, &[(1, 1), (2, 2), (3, 3), (8, 8)]);
        let mut areas = component_areas(&img);
        areas.sort_unstable();
        assert_eq!(areas, vec![1, 3]);
    }

    #[test]
    fn remove_specks_drops_small_components_only() {
        let mut points: Vec<(u32, u32)> = (0..10).map(|x| (x, 2)).collect();
        points.push((15, 15));
        let img = dot(20, 20, &points);
        let cleaned = remove_specks(&img, 5);
        assert_eq!(cleaned.get_pixel(15, 15).0[0], 0);
        assert_eq!(ink_count(&cleaned), 10);
    }

    #[test]
    fn remove_specks_with_zero_area_keeps_everything() {
        let img = dot(6, 6, &[(0, 0), (5, 5)]);
        assert_eq!(remove_specks(&img, 0), img);
    }

    #[test]
    fn repeated_speck_removal_never_resurrects() {
        let img = dot(12, 12, &[(1, 1), (1, 2), (5, 5), (9, 9), (9, 10), (10, 10)]);
        let once = remove_specks(&img, 3);
        let twice = remove_specks(&once, 2);
        for (x, y, p) in twice.enumerate_pixels() {
            if p.0[0] == 255 {
                assert_eq!(once.get_pixel(x, y).0[0], 255);
            }
        }
    }
}
