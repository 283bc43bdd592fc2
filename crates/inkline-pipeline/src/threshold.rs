//! Global, automatic and adaptive binarization plus inversion.
//!
//! All functions return fresh 0/255 images; inputs are never modified.

use image::{GrayImage, Luma};

/// Binarize: pixels strictly above `cutoff` become 255, the rest 0.
#[must_use = "returns the binarized image"]
pub fn binarize(image: &GrayImage, cutoff: u8) -> GrayImage {
    let mut out = image.clone();
    for p in out.pixels_mut() {
        p.0[0] = if p.0[0] > cutoff { 255 } else { 0 };
    }
    out
}

/// Binarize with a threshold chosen by Otsu's method.
///
/// Returns the binarized image and the level that was used.
#[must_use = "returns the binarized image and its Otsu level"]
pub fn binarize_otsu(image: &GrayImage) -> (GrayImage, u8) {
    let level = imageproc::contrast::otsu_level(image);
    (binarize(image, level), level)
}

/// Invert every pixel (bitwise NOT).
#[must_use = "returns the inverted image"]
pub fn invert(image: &GrayImage) -> GrayImage {
    let mut out = image.clone();
    for p in out.pixels_mut() {
        p.0[0] = !p.0[0];
    }
    out
}

/// Returns `true` if every pixel is exactly 0 or 255.
#[must_use]
pub fn is_binary(image: &GrayImage) -> bool {
    image.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255)
}

/// Local adaptive threshold against a Gaussian-weighted neighbourhood mean.
///
/// A pixel stays white when it is brighter than `mean - offset`, where
/// `mean` is the Gaussian-weighted average over a `block_size` window.
/// Anything at or below that turns black, so flat regions remain white
/// and only locally dark strokes are inked.
///
/// `block_size` is normalized to an odd value of at least 3 and at most
/// [`kernel_limit`](crate::blur::kernel_limit) for the image.
#[must_use = "returns the thresholded image"]
pub fn adaptive_gaussian(image: &GrayImage, block_size: i32, offset: f32) -> GrayImage {
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let block = crate::blur::effective_kernel_size(block_size, image.width(), image.height());
    let mean = imageproc::filter::gaussian_blur_f32(image, crate::blur::sigma_for_kernel(block));
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let local = f32::from(mean.get_pixel(x, y).0[0]) - offset;
        if f32::from(image.get_pixel(x, y).0[0]) > local {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binarize_is_strictly_greater() {
        let img = GrayImage::from_fn(3, 1, |x, _| Luma([[19, 20, 21][x as usize]]));
        let out = binarize(&img, 20);
        let values: Vec<u8> = out.pixels().map(|p| p.0[0]).collect();
        assert_eq!(values, vec![0, 0, 255]);
    }

    #[test]
    fn double_invert_is_identity() {
        let img = GrayImage::from_fn(5, 5, |x, y| Luma([u8::try_from(x * 40 + y).unwrap_or(0)]));
        assert_eq!(invert(&invert(&img)), img);
    }

    #[test]
    fn is_binary_detects_gray() {
        let mut img = GrayImage::from_pixel(4, 4, Luma([255]));
        assert!(is_binary(&img));
        img.put_pixel(1, 1, Luma([0]));
        assert!(is_binary(&img));
        img.put_pixel(2, 2, Luma([128]));
        assert!(!is_binary(&img));
    }

    #[test]
    fn otsu_separates_two_levels() {
        let img = GrayImage::from_fn(10, 10, |x, _| if x < 5 { Luma([40]) } else { Luma([210]) });
        let (out, level) = binarize_otsu(&img);
        assert!((40..210).contains(&level), "level {level}");
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(9, 0).0[0], 255);
    }

    #[test]
    fn adaptive_keeps_flat_regions_white() {
        let img = GrayImage::from_pixel(20, 20, Luma([90]));
        let out = adaptive_gaussian(&img, 9, 5.0);
        assert!(out.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn adaptive_inks_thin_dark_line() {
        let img = GrayImage::from_fn(21, 21, |x, _| if x == 10 { Luma([30]) } else { Luma([220]) });
        let out = adaptive_gaussian(&img, 9, 5.0);
        assert_eq!(out.get_pixel(10, 10).0[0], 0);
        assert_eq!(out.get_pixel(2, 10).0[0], 255);
        assert!(is_binary(&out));
    }

    #[test]
    fn huge_block_size_is_capped_by_image_extent() {
        let img = GrayImage::from_fn(21, 21, |x, _| if x == 10 { Luma([30]) } else { Luma([220]) });
        let out = adaptive_gaussian(&img, i32::MAX, 5.0);
        assert_eq!(out.dimensions(), (21, 21));
        assert_eq!(out, adaptive_gaussian(&img, 43, 5.0));
        assert!(is_binary(&out));
    }
}
