//! Canny edge detection on an already-smoothed grayscale image.
//!
//! Unlike `imageproc::edges::canny`, no Gaussian pre-blur is applied: the
//! caller decides how the input is smoothed (the hybrid extractor feeds a
//! bilateral-filtered image). Gradient magnitude is the L1 norm
//! `|gx| + |gy|` of the 3x3 Sobel response, so thresholds are in the
//! same units as OpenCV's default Canny (0..=2040).
//!
//! A pixel with magnitude strictly above `high` seeds an edge. Edges grow
//! through 8-connected neighbours whose magnitude is strictly above `low`.
//! Hysteresis checks every neighbour against the image bounds, so edges
//! touching the border are followed safely.

use image::{GrayImage, Luma};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

/// Minimum allowed Canny threshold.
///
/// A low threshold of zero marks every pixel with any gradient as a
/// candidate, producing a dense edge map that floods the line drawing.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Clamp a threshold pair: both at least [`MIN_THRESHOLD`], `low <= high`.
#[must_use]
pub fn clamp_thresholds(low: f32, high: f32) -> (f32, f32) {
    let high = high.max(MIN_THRESHOLD);
    let low = low.max(MIN_THRESHOLD).min(high);
    (low, high)
}

/// Quantized gradient direction used for non-maximum suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Horizontal,
    Rising,
    Vertical,
    Falling,
}

impl Direction {
    /// Quantize a gradient vector to one of four directions.
    fn of(gx: f32, gy: f32) -> Self {
        let mut angle = gy.atan2(gx).to_degrees();
        if angle < 0.0 {
            angle += 180.0;
        }
        if !(22.5..157.5).contains(&angle) {
            Self::Horizontal
        } else if angle < 67.5 {
            Self::Rising
        } else if angle < 112.5 {
            Self::Vertical
        } else {
            Self::Falling
        }
    }

    /// Offsets of the two neighbours across the edge.
    const fn across(self) -> [(i64, i64); 2] {
        match self {
            Self::Horizontal => [(-1, 0), (1, 0)],
            Self::Rising => [(-1, -1), (1, 1)],
            Self::Vertical => [(0, -1), (0, 1)],
            Self::Falling => [(1, -1), (-1, 1)],
        }
    }
}

struct Magnitude {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl Magnitude {
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Magnitude at a signed offset; zero outside the image.
    fn at(&self, x: u32, y: u32, dx: i64, dy: i64) -> f32 {
        let nx = i64::from(x) + dx;
        let ny = i64::from(y) + dy;
        match (u32::try_from(nx), u32::try_from(ny)) {
            (Ok(nx), Ok(ny)) if nx < self.width && ny < self.height => {
                self.values[self.index(nx, ny)]
            }
            _ => 0.0,
        }
    }
}

/// Detect edges with the Canny algorithm.
///
/// Returns a binary map: 255 for edge pixels, 0 elsewhere. Thresholds
/// are clamped with [`clamp_thresholds`]. Images narrower or shorter
/// than 3 pixels have no interior and yield an empty edge map.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width < 3 || height < 3 {
        return GrayImage::new(width, height);
    }
    let (low, high) = clamp_thresholds(low_threshold, high_threshold);

    let gx = horizontal_sobel(image);
    let gy = vertical_sobel(image);
    let magnitude = Magnitude {
        width,
        height,
        values: gx
            .pixels()
            .zip(gy.pixels())
            .map(|(h, v)| f32::from(h.0[0].unsigned_abs()) + f32::from(v.0[0].unsigned_abs()))
            .collect(),
    };

    let thinned = suppress_non_maxima(&magnitude, &gx, &gy);
    hysteresis(&magnitude, &thinned, low, high)
}

/// Keep only pixels that are local maxima across the gradient direction.
///
/// Ties are broken toward the lower-index neighbour so flat ridges two
/// pixels wide keep exactly one line.
fn suppress_non_maxima(
    magnitude: &Magnitude,
    gx: &imageproc::definitions::Image<Luma<i16>>,
    gy: &imageproc::definitions::Image<Luma<i16>>,
) -> Vec<bool> {
    let mut keep = vec![false; magnitude.values.len()];
    for y in 0..magnitude.height {
        for x in 0..magnitude.width {
            let idx = magnitude.index(x, y);
            let m = magnitude.values[idx];
            if m <= 0.0 {
                continue;
            }
            let dir = Direction::of(
                f32::from(gx.get_pixel(x, y).0[0]),
                f32::from(gy.get_pixel(x, y).0[0]),
            );
            let [(ax, ay), (bx, by)] = dir.across();
            keep[idx] = m > magnitude.at(x, y, ax, ay) && m >= magnitude.at(x, y, bx, by);
        }
    }
    keep
}

/// Grow edges from strong seeds through weak candidates.
fn hysteresis(magnitude: &Magnitude, thinned: &[bool], low: f32, high: f32) -> GrayImage {
    let (w, h) = (magnitude.width, magnitude.height);
    let candidate = |idx: usize| thinned[idx] && magnitude.values[idx] > low;

    let mut out = GrayImage::new(w, h);
    let mut stack: Vec<(u32, u32)> = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let idx = magnitude.index(x, y);
            if !thinned[idx] || magnitude.values[idx] <= high || out.get_pixel(x, y).0[0] != 0 {
                continue;
            }
            out.put_pixel(x, y, Luma([255]));
            stack.push((x, y));
            while let Some((cx, cy)) = stack.pop() {
                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let (Ok(nx), Ok(ny)) =
                            (u32::try_from(i64::from(cx) + dx), u32::try_from(i64::from(cy) + dy))
                        else {
                            continue;
                        };
                        if nx >= w || ny >= h {
                            continue;
                        }
                        if out.get_pixel(nx, ny).0[0] == 0 && candidate(magnitude.index(nx, ny)) {
                            out.put_pixel(nx, ny, Luma([255]));
                            stack.push((nx, ny));
                        }
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 20x20 image with a sharp vertical boundary at x = 10.
    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(20, 20, |x, _y| if x < 10 { Luma([0]) } else { Luma([255]) })
    }

    fn edge_count(edges: &GrayImage) -> u32 {
        edges.pixels().map(|p| u32::from(p.0[0] > 0)).sum()
    }

    #[test]
    fn blank_image_produces_no_edges() {
        let img = GrayImage::from_pixel(20, 20, Luma([128]));
        assert_eq!(edge_count(&canny(&img, 50.0, 150.0)), 0);
    }

    #[test]
    fn sharp_edge_detected_as_thin_line() {
        let edges = canny(&sharp_edge_image(), 60.0, 160.0);
        for y in 0..20 {
            let row: u32 = (0..20).map(|x| u32::from(edges.get_pixel(x, y).0[0] > 0)).sum();
            assert_eq!(row, 1, "row {y} should hold exactly one edge pixel");
        }
        assert!(edges.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn output_dimensions_match_input() {
        let edges = canny(&GrayImage::new(17, 31), 50.0, 150.0);
        assert_eq!(edges.dimensions(), (17, 31));
    }

    #[test]
    fn tiny_images_have_no_edges() {
        let img = GrayImage::from_fn(2, 9, |x, _| Luma([if x == 0 { 0 } else { 255 }]));
        let edges = canny(&img, 1.0, 2.0);
        assert_eq!(edges.dimensions(), (2, 9));
        assert_eq!(edge_count(&edges), 0);
    }

    #[test]
    fn border_edge_does_not_panic() {
        let img = GrayImage::from_fn(10, 10, |x, _| Luma([if x == 1 { 255 } else { 0 }]));
        let edges = canny(&img, 1.0, 2.0);
        assert!(edge_count(&edges) > 0);
    }

    #[test]
    fn weak_contrast_below_high_is_rejected() {
        // Step of 20 levels gives an L1 magnitude of 80.
        let img = GrayImage::from_fn(20, 20, |x, _| Luma([if x < 10 { 100 } else { 120 }]));
        assert_eq!(edge_count(&canny(&img, 60.0, 160.0)), 0);
        assert!(edge_count(&canny(&img, 60.0, 70.0)) > 0);
    }

    #[test]
    fn zero_low_threshold_is_clamped_to_min() {
        let img = sharp_edge_image();
        assert_eq!(canny(&img, 0.0, 150.0), canny(&img, MIN_THRESHOLD, 150.0));
    }

    #[test]
    fn low_above_high_is_clamped() {
        let img = sharp_edge_image();
        assert_eq!(canny(&img, 200.0, 100.0), canny(&img, 100.0, 100.0));
    }

    #[test]
    fn clamp_thresholds_orders_pair() {
        assert_eq!(clamp_thresholds(0.0, 0.0), (MIN_THRESHOLD, MIN_THRESHOLD));
        assert_eq!(clamp_thresholds(80.0, 40.0), (40.0, 40.0));
        assert_eq!(clamp_thresholds(60.0, 160.0), (60.0, 160.0));
    }
}
