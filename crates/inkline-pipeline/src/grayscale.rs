//! Image decoding and luminance reduction.
//!
//! [`decode`] accepts raw image bytes (PNG, JPEG, BMP, WebP) already held
//! in memory; this crate never touches the filesystem. [`to_luminance`]
//! flattens a color image to one channel with the Rec.601 luma weights
//! `0.299*R + 0.587*G + 0.114*B`, computed in fixed point and rounded.
//! `image`'s own `to_luma8` uses Rec.709 weights instead.

use image::{DynamicImage, GrayImage};

use crate::types::{PipelineError, RgbImage};

/// Decode raw image bytes.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty or decodes to
/// an image without pixels. Returns [`PipelineError::ImageDecode`] if the
/// format is unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    let img = image::load_from_memory(bytes)?;
    if img.width() == 0 || img.height() == 0 {
        return Err(PipelineError::EmptyInput);
    }
    Ok(img)
}

/// Reduce a color image to single-channel luminance.
#[must_use = "returns the luminance image"]
pub fn to_luminance(image: &RgbImage) -> GrayImage {
    let gray = GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
        image::Luma([u8::try_from((weighted + 500) / 1000).unwrap_or(u8::MAX)])
    });
    tracing::debug!(
        width = gray.width(),
        height = gray.height(),
        "reduced to luminance"
    );
    gray
}

/// Reduce any decoded image to luminance.
///
/// Single-channel 8-bit input is passed through unchanged.
#[must_use = "returns the luminance image"]
pub fn to_luminance_dynamic(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        other => to_luminance(&other.to_rgb8()),
    }
}

/// Re-expand a grayscale image to three identical channels.
#[must_use = "returns the expanded RGB image"]
pub fn expand_to_rgb(gray: &GrayImage) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        image::Rgb([v, v, v])
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode_png(img: &image::RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(decode(&[]), Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn valid_png_decodes() {
        let img = image::RgbaImage::from_fn(17, 31, |_, _| image::Rgba([128, 64, 32, 255]));
        let decoded = decode(&encode_png(&img)).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (17, 31));
    }

    #[test]
    fn luminance_uses_weighted_channels() {
        let px = |r, g, b| to_luminance(&RgbImage::from_pixel(1, 1, image::Rgb([r, g, b]))).get_pixel(0, 0).0[0];
        let (r, g, b) = (px(255, 0, 0), px(0, 255, 0), px(0, 0, 255));
        assert!(g > r && r > b, "expected green > red > blue, got R={r} G={g} B={b}");
    }

    #[test]
    fn luminance_matches_rec601() {
        let out = to_luminance(&RgbImage::from_pixel(1, 1, image::Rgb([200, 100, 50])));
        // 0.299*200 + 0.587*100 + 0.114*50 = 124.2
        assert_eq!(out.get_pixel(0, 0).0[0], 124);
    }

    #[test]
    fn neutral_gray_is_unchanged() {
        for v in [0u8, 1, 77, 128, 254, 255] {
            let out = to_luminance(&RgbImage::from_pixel(1, 1, image::Rgb([v, v, v])));
            assert_eq!(out.get_pixel(0, 0).0[0], v);
        }
    }

    #[test]
    fn luminance_preserves_dimensions() {
        let img = RgbImage::new(9, 4);
        assert_eq!(to_luminance(&img).dimensions(), (9, 4));
    }

    #[test]
    fn gray_input_is_passed_through() {
        let gray = GrayImage::from_fn(5, 5, |x, y| image::Luma([u8::try_from(x * 50 + y).unwrap()]));
        let out = to_luminance_dynamic(&DynamicImage::ImageLuma8(gray.clone()));
        assert_eq!(out, gray);
    }

    #[test]
    fn reexpanded_channels_are_equal() {
        let img = RgbImage::from_fn(16, 16, |x, y| {
            image::Rgb([
                u8::try_from(x * 15).unwrap(),
                u8::try_from(y * 15).unwrap(),
                u8::try_from((x + y) * 7).unwrap(),
            ])
        });
        let expanded = expand_to_rgb(&to_luminance(&img));
        assert!(expanded.pixels().all(|p| p.0[0] == p.0[1] && p.0[1] == p.0[2]));
    }
}
