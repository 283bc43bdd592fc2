//! Pipeline diagnostics: timing, counts, and quality metrics per stage.
//!
//! These diagnostics are permanent instrumentation for parameter tuning.
//! [`process_staged_with_diagnostics`] runs the full pipeline while
//! timing each stage with a caller-supplied [`Clock`], so the library
//! itself never reads the system time.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::pipeline::{Pipeline, ProcessedStage};
use crate::segment::Segmenter;
use crate::types::{PipelineError, RgbImage, StagedResult};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of time for stage measurements.
///
/// The bench binary supplies one backed by `std::time::Instant`; tests
/// supply a fake that advances deterministically.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: background segmentation.
    pub segment: StageDiagnostics,
    /// Stage 2: Gaussian denoise.
    pub denoise: StageDiagnostics,
    /// Stage 3: luminance reduction.
    pub luminance: StageDiagnostics,
    /// Stage 4: line extraction.
    pub line_extraction: StageDiagnostics,
    /// Stage 5: morphological refinement.
    pub refine: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Quality summary of the finished page.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Background segmentation metrics.
    Segment {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Pixels inside the foreground mask.
        foreground_pixels: u64,
        /// Fraction of the image covered by the foreground mask.
        coverage: f64,
    },
    /// Gaussian denoise metrics.
    Denoise {
        /// Kernel size after normalization.
        kernel: u32,
        /// Sigma derived from the kernel.
        sigma: f32,
    },
    /// Luminance reduction metrics.
    Luminance {
        /// Mean intensity of the grayscale image.
        mean: f64,
    },
    /// Line extraction metrics.
    LineExtraction {
        /// Strategy that ran.
        style: String,
        /// Canny low threshold after clamping.
        low_threshold: f32,
        /// Canny high threshold after clamping.
        high_threshold: f32,
        /// Inked (black) pixels in the raw line art.
        ink_pixels: u64,
        /// Fraction of pure-white pixels.
        white_ratio: f64,
    },
    /// Morphological refinement metrics.
    Refine {
        /// Style that ran.
        style: String,
        /// Otsu level, if the input needed binarizing.
        otsu_level: Option<u8>,
        /// Whether the input was flipped as white-on-black.
        inverted: bool,
        /// Ink components before speck removal.
        components_before: usize,
        /// Ink components after speck removal.
        components_after: usize,
    },
}

/// Summary of the finished coloring page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Fraction of pure-white pixels on the page.
    pub white_ratio: f64,
    /// Fraction of mid-gray pixels on the page (0 for a binary page).
    pub gray_ratio: f64,
    /// Number of separate ink strokes.
    pub ink_components: usize,
    /// Mean stroke area in pixels.
    pub mean_component_area: f64,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<20} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Segment", &self.segment),
            ("Denoise", &self.denoise),
            ("Luminance", &self.luminance),
            ("Line Extraction", &self.line_extraction),
            ("Refine", &self.refine),
        ];
        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<20} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "White: {:.1}%  |  Gray: {:.2}%  |  Strokes: {} (mean area {:.1}px)",
            self.summary.white_ratio * 100.0,
            self.summary.gray_ratio * 100.0,
            self.summary.ink_components,
            self.summary.mean_component_area,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Segment {
            width,
            height,
            foreground_pixels,
            coverage,
        } => format!(
            "{width}x{height}, foreground={foreground_pixels} ({:.1}%)",
            coverage * 100.0
        ),
        StageMetrics::Denoise { kernel, sigma } => format!("kernel={kernel} sigma={sigma:.2}"),
        StageMetrics::Luminance { mean } => format!("mean={mean:.1}"),
        StageMetrics::LineExtraction {
            style,
            low_threshold,
            high_threshold,
            ink_pixels,
            white_ratio,
        } => format!(
            "{style} low={low_threshold:.1} high={high_threshold:.1} ink={ink_pixels} white={:.1}%",
            white_ratio * 100.0
        ),
        StageMetrics::Refine {
            style,
            otsu_level,
            inverted,
            components_before,
            components_after,
        } => {
            let otsu = otsu_level.map_or_else(|| "-".to_string(), |l| l.to_string());
            format!(
                "{style} otsu={otsu} inverted={inverted} components={components_before}->{components_after}"
            )
        }
    }
}

/// Time one stage transition, returning the next stage and its
/// diagnostics.
fn timed<C, T, F>(clock: &C, advance: F) -> Result<(T, StageDiagnostics), PipelineError>
where
    C: Clock + ?Sized,
    T: ProcessedStage,
    F: FnOnce() -> Result<T, PipelineError>,
{
    let start = clock.now();
    let stage = advance()?;
    let duration = clock.elapsed(&start);
    let metrics = stage.stage_metrics();
    tracing::trace!(stage = T::NAME, ?duration, "stage timed");
    Ok((stage, StageDiagnostics { duration, metrics }))
}

/// Run the full pipeline, collecting per-stage diagnostics.
///
/// # Errors
///
/// Returns the same errors as [`process_staged`](crate::process_staged).
pub fn process_staged_with_diagnostics<S, C>(
    image: RgbImage,
    config: &PipelineConfig,
    segmenter: &S,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError>
where
    S: Segmenter + ?Sized,
    C: Clock + ?Sized,
{
    let start = clock.now();
    let pending = Pipeline::new(image, config.clone());

    let (segmented, segment) = timed(clock, || pending.segment(segmenter))?;
    let (denoised, denoise) = timed(clock, || Ok(segmented.denoise()))?;
    let (reduced, luminance) = timed(clock, || Ok(denoised.reduce_luminance()))?;
    let (extracted, line_extraction) = timed(clock, || reduced.extract_lines())?;
    let (refined, refine) = timed(clock, || Ok(extracted.refine()))?;

    let staged = refined.into_result();
    let total_duration = clock.elapsed(&start);

    let page = staged.final_image();
    let strokes = crate::quality::ink_components(page);
    let summary = PipelineSummary {
        image_width: staged.dimensions.width,
        image_height: staged.dimensions.height,
        pixel_count: staged.dimensions.pixel_count(),
        white_ratio: crate::quality::white_ratio(page),
        gray_ratio: crate::quality::gray_ratio(page),
        ink_components: strokes.count,
        mean_component_area: strokes.mean_area,
    };

    Ok((
        staged,
        PipelineDiagnostics {
            segment,
            denoise,
            luminance,
            line_extraction,
            refine,
            total_duration,
            summary,
        },
    ))
}
