//! Edge-preserving bilateral filter for grayscale images.
//!
//! Each output pixel is the average of its circular neighbourhood,
//! weighted both by spatial distance (`sigma_space`) and by intensity
//! difference from the center (`sigma_color`). Flat texture is smoothed
//! while strong intensity steps survive, which keeps Canny from firing
//! on skin pores and fabric weave.
//!
//! The window radius is `diameter / 2`, capped at the image's longer
//! side. Neighbours outside the image are skipped rather than padded.

use image::{GrayImage, Luma};

/// Apply a bilateral filter.
///
/// A `diameter` below 1 is treated as 1 (a no-op window). Non-positive
/// sigmas are raised to a tiny positive value, which degenerates to
/// near-identity.
#[must_use = "returns the filtered image"]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
pub fn bilateral_filter(
    image: &GrayImage,
    diameter: i32,
    sigma_color: f32,
    sigma_space: f32,
) -> GrayImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return image.clone();
    }
    let radius = (diameter.max(1) / 2).unsigned_abs().min(w.max(h));
    if radius == 0 {
        return image.clone();
    }
    let sigma_color = sigma_color.max(1e-3);
    let sigma_space = sigma_space.max(1e-3);

    let color_lut: [f32; 256] = std::array::from_fn(|d| {
        let d = d as f32;
        (-(d * d) / (2.0 * sigma_color * sigma_color)).exp()
    });

    let r = radius as i32;
    let offsets: Vec<(i32, i32, f32)> = (-r..=r)
        .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
        .filter(|&(dx, dy)| dx * dx + dy * dy <= r * r)
        .map(|(dx, dy)| {
            let d2 = (dx * dx + dy * dy) as f32;
            (dx, dy, (-d2 / (2.0 * sigma_space * sigma_space)).exp())
        })
        .collect();

    let (wi, hi) = (w as i32, h as i32);
    GrayImage::from_fn(w, h, |x, y| {
        let center = image.get_pixel(x, y).0[0];
        let mut sum = 0.0f32;
        let mut weight_sum = 0.0f32;
        for &(dx, dy, spatial) in &offsets {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if nx < 0 || ny < 0 || nx >= wi || ny >= hi {
                continue;
            }
            let v = image.get_pixel(nx as u32, ny as u32).0[0];
            let weight = spatial * color_lut[usize::from(v.abs_diff(center))];
            sum += weight * f32::from(v);
            weight_sum += weight;
        }
        if weight_sum > 0.0 {
            Luma([(sum / weight_sum).round().clamp(0.0, 255.0) as u8])
        } else {
            Luma([center])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_image_is_unchanged() {
        let img = GrayImage::from_pixel(12, 12, Luma([77]));
        assert_eq!(bilateral_filter(&img, 7, 90.0, 90.0), img);
    }

    #[test]
    fn strong_step_is_preserved() {
        let img = GrayImage::from_fn(20, 20, |x, _| Luma([if x < 10 { 20 } else { 230 }]));
        let out = bilateral_filter(&img, 7, 30.0, 30.0);
        assert!(out.get_pixel(9, 10).0[0] < 40, "got {}", out.get_pixel(9, 10).0[0]);
        assert!(out.get_pixel(10, 10).0[0] > 210, "got {}", out.get_pixel(10, 10).0[0]);
    }

    #[test]
    fn small_texture_is_smoothed() {
        let img = GrayImage::from_fn(20, 20, |x, y| Luma([if (x + y) % 2 == 0 { 120 } else { 140 }]));
        let out = bilateral_filter(&img, 7, 90.0, 90.0);
        let spread = |g: &GrayImage| {
            let (lo, hi) = g.pixels().fold((255u8, 0u8), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
            hi - lo
        };
        assert!(spread(&out) < spread(&img));
    }

    #[test]
    fn tiny_diameter_is_identity() {
        let img = GrayImage::from_fn(5, 5, |x, y| Luma([u8::try_from(x * 30 + y).unwrap_or(0)]));
        assert_eq!(bilateral_filter(&img, 1, 90.0, 90.0), img);
        assert_eq!(bilateral_filter(&img, -4, 90.0, 90.0), img);
    }

    #[test]
    fn huge_diameter_is_capped_by_image_extent() {
        let img = GrayImage::from_fn(9, 6, |x, y| Luma([u8::try_from(x * 25 + y * 3).unwrap_or(0)]));
        let out = bilateral_filter(&img, i32::MAX, 40.0, 40.0);
        assert_eq!(out.dimensions(), (9, 6));
        assert_eq!(out, bilateral_filter(&img, 19, 40.0, 40.0));
    }

    #[test]
    fn dimensions_preserved() {
        let img = GrayImage::new(7, 3);
        assert_eq!(bilateral_filter(&img, 9, 120.0, 120.0).dimensions(), (7, 3));
    }
}
