//! Gaussian blur for noise suppression before line extraction.
//!
//! Wraps [`imageproc::filter::gaussian_blur_f32`] behind a kernel-size
//! interface. Kernel sizes are normalized to odd values of at least
//! [`MIN_KERNEL_SIZE`], capped by [`kernel_limit`], and converted to a
//! sigma with the same rule OpenCV applies when it is handed a kernel
//! size and `sigma = 0`. The kernel size picks sigma and nothing else:
//! imageproc sizes its own support as `2 * ceil(2 * sigma) + 1`.
//!
//! [`gaussian_blur`] operates on a single grayscale channel.
//! [`gaussian_blur_rgb`] applies the same blur independently to each
//! R/G/B channel.

use image::GrayImage;

use crate::types::RgbImage;

/// Smallest kernel the denoiser will use.
pub const MIN_KERNEL_SIZE: u32 = 3;

/// Normalize a requested kernel size: values below [`MIN_KERNEL_SIZE`]
/// become [`MIN_KERNEL_SIZE`], even values are incremented.
#[must_use]
pub fn normalize_kernel_size(kernel: i32) -> u32 {
    let k = u32::try_from(kernel).unwrap_or(0).max(MIN_KERNEL_SIZE);
    if k % 2 == 0 { k.saturating_add(1) } else { k }
}

/// Largest kernel worth using on a `width` x `height` image: one that
/// spans the image twice over. Always odd.
#[must_use]
pub fn kernel_limit(width: u32, height: u32) -> u32 {
    width.max(height).saturating_mul(2).saturating_add(1)
}

/// [`normalize_kernel_size`], capped at [`kernel_limit`] for the image.
///
/// Any `kernel` value, however large, maps to a finite, odd size.
#[must_use]
pub fn effective_kernel_size(kernel: i32, width: u32, height: u32) -> u32 {
    normalize_kernel_size(kernel)
        .min(kernel_limit(width, height))
        .max(MIN_KERNEL_SIZE)
}

/// Gaussian sigma for an (already normalized) kernel size.
///
/// `0.3 * ((k - 1) * 0.5 - 1) + 0.8`: 3 -> 0.8, 5 -> 1.1, 7 -> 1.4.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sigma_for_kernel(kernel: u32) -> f32 {
    let k = kernel.max(1) as f32;
    0.3f32.mul_add((k - 1.0).mul_add(0.5, -1.0), 0.8).max(0.1)
}

/// Gaussian-blur a grayscale image.
///
/// `kernel` only selects sigma, through [`effective_kernel_size`] and
/// [`sigma_for_kernel`]. The taps actually convolved are imageproc's
/// `2 * ceil(2 * sigma) + 1`, so kernel 5 (sigma 1.1) uses 7 taps.
///
/// The output has the same dimensions as the input. Empty images are
/// returned unchanged.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, kernel: i32) -> GrayImage {
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let size = effective_kernel_size(kernel, image.width(), image.height());
    imageproc::filter::gaussian_blur_f32(image, sigma_for_kernel(size))
}

/// Apply Gaussian blur to an RGB image by blurring each channel
/// independently. `kernel` selects sigma as in [`gaussian_blur`].
///
/// Gaussian blur is linear and separable per channel, so this is
/// equivalent to blurring in color space.
#[must_use = "returns the blurred RGB image"]
pub fn gaussian_blur_rgb(image: &RgbImage, kernel: i32) -> RgbImage {
    let (w, h) = (image.width(), image.height());
    if w == 0 || h == 0 {
        return image.clone();
    }
    let size = effective_kernel_size(kernel, w, h);
    let sigma = sigma_for_kernel(size);

    let channels: [GrayImage; 3] = std::array::from_fn(|c| {
        GrayImage::from_fn(w, h, |x, y| image::Luma([image.get_pixel(x, y).0[c]]))
    });
    let blurred: [GrayImage; 3] =
        std::array::from_fn(|c| imageproc::filter::gaussian_blur_f32(&channels[c], sigma));

    tracing::debug!(width = w, height = h, kernel = size, sigma, "denoised");

    RgbImage::from_fn(w, h, |x, y| {
        image::Rgb([
            blurred[0].get_pixel(x, y).0[0],
            blurred[1].get_pixel(x, y).0[0],
            blurred[2].get_pixel(x, y).0[0],
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(10, 10, |x, _y| {
            if x < 5 {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        })
    }

    #[test]
    fn kernel_sizes_are_normalized() {
        assert_eq!(normalize_kernel_size(-4), 3);
        assert_eq!(normalize_kernel_size(0), 3);
        assert_eq!(normalize_kernel_size(2), 3);
        assert_eq!(normalize_kernel_size(3), 3);
        assert_eq!(normalize_kernel_size(4), 5);
        assert_eq!(normalize_kernel_size(5), 5);
        assert_eq!(normalize_kernel_size(10), 11);
    }

    #[test]
    fn sigma_grows_with_kernel() {
        assert!((sigma_for_kernel(3) - 0.8).abs() < 1e-5);
        assert!((sigma_for_kernel(5) - 1.1).abs() < 1e-5);
        assert!(sigma_for_kernel(9) > sigma_for_kernel(5));
    }

    #[test]
    fn output_dimensions_preserved() {
        let img = GrayImage::new(17, 31);
        let blurred = gaussian_blur(&img, 5);
        assert_eq!(blurred.dimensions(), (17, 31));

        let rgb = RgbImage::new(13, 7);
        assert_eq!(gaussian_blur_rgb(&rgb, 5).dimensions(), (13, 7));
    }

    #[test]
    fn kernel_only_selects_sigma() {
        let img = sharp_edge_image();
        assert_eq!(
            gaussian_blur(&img, 5),
            imageproc::filter::gaussian_blur_f32(&img, sigma_for_kernel(5))
        );
    }

    #[test]
    fn huge_kernels_are_capped_by_image_extent() {
        assert_eq!(kernel_limit(8, 5), 17);
        assert_eq!(effective_kernel_size(i32::MAX, 8, 5), 17);
        assert_eq!(effective_kernel_size(5, 8, 5), 5);
        assert_eq!(effective_kernel_size(i32::MAX, 1, 1), MIN_KERNEL_SIZE);

        let img = sharp_edge_image();
        let blurred = gaussian_blur(&img, i32::MAX);
        assert_eq!(blurred.dimensions(), (10, 10));
        assert_eq!(blurred, gaussian_blur(&img, 21));

        let rgb = RgbImage::new(8, 5);
        assert_eq!(gaussian_blur_rgb(&rgb, i32::MAX).dimensions(), (8, 5));
    }

    #[test]
    fn empty_image_passes_through() {
        let img = GrayImage::new(0, 0);
        assert_eq!(gaussian_blur(&img, 5).dimensions(), (0, 0));
    }

    #[test]
    fn blur_smooths_sharp_edge() {
        let blurred = gaussian_blur(&sharp_edge_image(), 5);
        let left_of_edge = blurred.get_pixel(4, 5).0[0];
        let right_of_edge = blurred.get_pixel(5, 5).0[0];
        assert!(left_of_edge > 0, "got {left_of_edge}");
        assert!(right_of_edge < 255, "got {right_of_edge}");
    }

    #[test]
    fn even_and_small_kernels_match_their_normalized_size() {
        let img = sharp_edge_image();
        assert_eq!(gaussian_blur(&img, 4), gaussian_blur(&img, 5));
        assert_eq!(gaussian_blur(&img, 1), gaussian_blur(&img, 3));
    }

    #[test]
    fn deterministic() {
        let img = RgbImage::from_fn(12, 12, |x, y| {
            image::Rgb([
                u8::try_from((x * 21) % 256).unwrap_or(0),
                u8::try_from((y * 17) % 256).unwrap_or(0),
                128,
            ])
        });
        assert_eq!(gaussian_blur_rgb(&img, 5), gaussian_blur_rgb(&img, 5));
    }

    #[test]
    fn rgb_blur_matches_per_channel_gray_blur() {
        let img = RgbImage::from_fn(10, 10, |x, y| {
            image::Rgb([
                u8::try_from((x * 25) % 256).unwrap_or(0),
                u8::try_from((y * 30) % 256).unwrap_or(0),
                u8::try_from(((x + y) * 20) % 256).unwrap_or(0),
            ])
        });
        let rgb_blurred = gaussian_blur_rgb(&img, 7);
        for c in 0..3 {
            let chan = GrayImage::from_fn(10, 10, |x, y| image::Luma([img.get_pixel(x, y).0[c]]));
            let chan_blurred = gaussian_blur(&chan, 7);
            for (x, y, p) in chan_blurred.enumerate_pixels() {
                assert_eq!(rgb_blurred.get_pixel(x, y).0[c], p.0[0], "({x},{y}) channel {c}");
            }
        }
    }
}
