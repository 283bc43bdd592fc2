//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process_staged`] which runs the entire pipeline in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use inkline_pipeline::{ModelError, Pipeline, PipelineConfig, PipelineError};
//! # use image::{GrayImage, RgbImage};
//! # fn run(photo: RgbImage) -> Result<(), PipelineError> {
//! let segmenter = |image: &RgbImage| -> Result<GrayImage, ModelError> {
//!     Ok(GrayImage::from_pixel(image.width(), image.height(), image::Luma([255])))
//! };
//! let staged = Pipeline::new(photo, PipelineConfig::default())
//!     .segment(&segmenter)?
//!     .denoise()
//!     .reduce_luminance()
//!     .extract_lines()?
//!     .refine()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying all previously computed
//! intermediates. Skipping a stage or running them out of order is a
//! compile-time error.
//!
//! # Memory
//!
//! Every stage retains the full raster stack computed so far, because
//! [`StagedResult`] hands every intermediate to the caller. Callers that
//! only need the finished page should prefer [`crate::process`].

use image::GrayImage;

use crate::config::PipelineConfig;
use crate::diagnostics::StageMetrics;
use crate::refine::RefineStats;
use crate::segment::Segmenter;
use crate::types::{AlphaMatte, Dimensions, ForegroundMask, PipelineError, RgbImage, StagedResult};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`segment`](Self::segment) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .segment() to continue"]
pub struct Pending {
    config: PipelineConfig,
    original: RgbImage,
}

impl Pending {
    /// The source photo.
    #[must_use]
    pub const fn original(&self) -> &RgbImage {
        &self.original
    }

    /// Validate the configuration, then separate the subject from the
    /// background with `segmenter`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for an unusable config,
    /// [`PipelineError::EmptyInput`] for an image without pixels, and
    /// [`PipelineError::Model`] when the matting model fails.
    pub fn segment<S>(self, segmenter: &S) -> Result<Segmented, PipelineError>
    where
        S: Segmenter + ?Sized,
    {
        self.config.validate()?;
        let segmentation = crate::segment::segment(&self.original, segmenter)?;
        Ok(Segmented {
            config: self.config,
            dimensions: Dimensions::of(&self.original),
            original: self.original,
            matte: segmentation.matte,
            foreground_mask: segmentation.foreground_mask,
            subject_on_white: segmentation.subject_on_white,
        })
    }
}

// ───────────────────────── Stage 1: Segmented ────────────────────────

/// Pipeline state after background removal.
#[must_use = "pipeline stages are consumed by advancing; call .denoise() to continue"]
pub struct Segmented {
    config: PipelineConfig,
    dimensions: Dimensions,
    original: RgbImage,
    matte: AlphaMatte,
    foreground_mask: ForegroundMask,
    subject_on_white: RgbImage,
}

impl Segmented {
    /// The subject composited onto white.
    #[must_use]
    pub const fn subject_on_white(&self) -> &RgbImage {
        &self.subject_on_white
    }

    /// The binary foreground mask.
    #[must_use]
    pub const fn foreground_mask(&self) -> &ForegroundMask {
        &self.foreground_mask
    }

    /// Smooth the composited subject with a Gaussian blur.
    pub fn denoise(self) -> Denoised {
        let denoised =
            crate::blur::gaussian_blur_rgb(&self.subject_on_white, self.config.denoise_kernel);
        Denoised {
            config: self.config,
            dimensions: self.dimensions,
            original: self.original,
            matte: self.matte,
            foreground_mask: self.foreground_mask,
            subject_on_white: self.subject_on_white,
            denoised,
        }
    }
}

// ───────────────────────── Stage 2: Denoised ─────────────────────────

/// Pipeline state after Gaussian denoising.
#[must_use = "pipeline stages are consumed by advancing; call .reduce_luminance() to continue"]
pub struct Denoised {
    config: PipelineConfig,
    dimensions: Dimensions,
    original: RgbImage,
    matte: AlphaMatte,
    foreground_mask: ForegroundMask,
    subject_on_white: RgbImage,
    denoised: RgbImage,
}

impl Denoised {
    /// The smoothed color image.
    #[must_use]
    pub const fn denoised(&self) -> &RgbImage {
        &self.denoised
    }

    /// Flatten the smoothed image to luminance.
    pub fn reduce_luminance(self) -> Reduced {
        let grayscale = crate::grayscale::to_luminance(&self.denoised);
        Reduced {
            config: self.config,
            dimensions: self.dimensions,
            original: self.original,
            matte: self.matte,
            foreground_mask: self.foreground_mask,
            subject_on_white: self.subject_on_white,
            denoised: self.denoised,
            grayscale,
        }
    }
}

// ───────────────────────── Stage 3: Reduced ──────────────────────────

/// Pipeline state after luminance reduction.
#[must_use = "pipeline stages are consumed by advancing; call .extract_lines() to continue"]
pub struct Reduced {
    config: PipelineConfig,
    dimensions: Dimensions,
    original: RgbImage,
    matte: AlphaMatte,
    foreground_mask: ForegroundMask,
    subject_on_white: RgbImage,
    denoised: RgbImage,
    grayscale: GrayImage,
}

impl Reduced {
    /// The single-channel luminance image.
    #[must_use]
    pub const fn grayscale(&self) -> &GrayImage {
        &self.grayscale
    }

    /// Extract raw line art with the configured [`LineStyle`](crate::LineStyle).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if the grayscale image
    /// and the foreground mask disagree in size.
    pub fn extract_lines(self) -> Result<LinesExtracted, PipelineError> {
        let lineart_raw =
            crate::lines::extract_lines(&self.grayscale, &self.foreground_mask, &self.config.line)?;
        Ok(LinesExtracted {
            config: self.config,
            dimensions: self.dimensions,
            original: self.original,
            matte: self.matte,
            foreground_mask: self.foreground_mask,
            subject_on_white: self.subject_on_white,
            denoised: self.denoised,
            grayscale: self.grayscale,
            lineart_raw,
        })
    }
}

// ───────────────────────── Stage 4: LinesExtracted ───────────────────

/// Pipeline state after line extraction.
#[must_use = "pipeline stages are consumed by advancing; call .refine() to continue"]
pub struct LinesExtracted {
    config: PipelineConfig,
    dimensions: Dimensions,
    original: RgbImage,
    matte: AlphaMatte,
    foreground_mask: ForegroundMask,
    subject_on_white: RgbImage,
    denoised: RgbImage,
    grayscale: GrayImage,
    lineart_raw: GrayImage,
}

impl LinesExtracted {
    /// The raw black-on-white line art.
    #[must_use]
    pub const fn lineart_raw(&self) -> &GrayImage {
        &self.lineart_raw
    }

    /// Clean up and thicken the line art.
    pub fn refine(self) -> Refined {
        let (coloring_book, stats) =
            crate::refine::refine_with_stats(&self.lineart_raw, &self.config.refine);
        Refined {
            config: self.config,
            dimensions: self.dimensions,
            original: self.original,
            matte: self.matte,
            foreground_mask: self.foreground_mask,
            subject_on_white: self.subject_on_white,
            denoised: self.denoised,
            grayscale: self.grayscale,
            lineart_raw: self.lineart_raw,
            coloring_book,
            stats,
        }
    }
}

// ───────────────────────── Stage 5: Refined ──────────────────────────

/// Pipeline state after refinement, the final stage.
///
/// Call [`into_result`](Self::into_result) to extract the
/// [`StagedResult`] containing all intermediates.
#[must_use = "call .into_result() to extract the StagedResult"]
pub struct Refined {
    config: PipelineConfig,
    dimensions: Dimensions,
    original: RgbImage,
    matte: AlphaMatte,
    foreground_mask: ForegroundMask,
    subject_on_white: RgbImage,
    denoised: RgbImage,
    grayscale: GrayImage,
    lineart_raw: GrayImage,
    coloring_book: GrayImage,
    stats: RefineStats,
}

impl Refined {
    /// The finished coloring page.
    #[must_use]
    pub const fn coloring_book(&self) -> &GrayImage {
        &self.coloring_book
    }

    /// What the refiner did.
    #[must_use]
    pub const fn stats(&self) -> RefineStats {
        self.stats
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            original: self.original,
            matte: self.matte,
            foreground_mask: self.foreground_mask,
            subject_on_white: self.subject_on_white,
            denoised: self.denoised,
            grayscale: self.grayscale,
            lineart_raw: self.lineart_raw,
            coloring_book: self.coloring_book,
            dimensions: self.dimensions,
        }
    }
}

// ──────────────────────── PipelineStage trait ─────────────────────────

/// Total number of stages in the pipeline, including [`Pending`].
pub const STAGE_COUNT: usize = 6;

/// The output produced by a single pipeline stage.
///
/// Each variant borrows the data that the corresponding stage computed.
#[must_use]
pub enum StageOutput<'a> {
    /// The untouched source photo.
    Source {
        /// The photo.
        original: &'a RgbImage,
    },
    /// Background removal result.
    Segmented {
        /// The subject on white.
        subject_on_white: &'a RgbImage,
        /// The binary foreground mask.
        foreground_mask: &'a ForegroundMask,
    },
    /// Denoise result.
    Denoised {
        /// The smoothed color image.
        denoised: &'a RgbImage,
    },
    /// Luminance result.
    Reduced {
        /// The grayscale image.
        grayscale: &'a GrayImage,
    },
    /// Line extraction result.
    LinesExtracted {
        /// The raw line art.
        lineart_raw: &'a GrayImage,
    },
    /// Refinement result.
    Refined {
        /// The finished page.
        coloring_book: &'a GrayImage,
    },
}

/// Trait implemented by every pipeline stage, enabling uniform
/// inspection of intermediates.
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage. For every stage after
    /// [`Pending`] it is also the stem of the stage's artifact in
    /// [`STAGES`](crate::STAGES), without the numeric prefix.
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Pending through `5` for
    /// Refined).
    const INDEX: usize;

    /// The output this stage produced.
    fn output(&self) -> StageOutput<'_>;

    /// Stage-specific metrics for diagnostics.
    ///
    /// Returns `None` for [`Pending`], which has not yet performed any
    /// processing.
    fn metrics(&self) -> Option<StageMetrics>;
}

/// A stage that did work to reach its state, so it always has metrics.
pub trait ProcessedStage: PipelineStage {
    /// Metrics describing the work done to reach this state.
    fn stage_metrics(&self) -> StageMetrics;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Source {
            original: &self.original,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }
}

/// Implement [`PipelineStage`] for a stage that also implements
/// [`ProcessedStage`].
macro_rules! processed_stage {
    ($ty:ty, $name:literal, $index:literal, |$s:ident| $output:expr) => {
        impl PipelineStage for $ty {
            const NAME: &str = $name;
            const INDEX: usize = $index;

            fn output(&self) -> StageOutput<'_> {
                let $s = self;
                $output
            }

            fn metrics(&self) -> Option<StageMetrics> {
                Some(self.stage_metrics())
            }
        }
    };
}

processed_stage!(Segmented, "subject_on_white", 1, |s| StageOutput::Segmented {
    subject_on_white: &s.subject_on_white,
    foreground_mask: &s.foreground_mask,
});
processed_stage!(Denoised, "gaussian_blur", 2, |s| StageOutput::Denoised {
    denoised: &s.denoised,
});
processed_stage!(Reduced, "grayscale", 3, |s| StageOutput::Reduced {
    grayscale: &s.grayscale,
});
processed_stage!(LinesExtracted, "lineart_raw", 4, |s| StageOutput::LinesExtracted {
    lineart_raw: &s.lineart_raw,
});
processed_stage!(Refined, "coloring_book", 5, |s| StageOutput::Refined {
    coloring_book: &s.coloring_book,
});

impl ProcessedStage for Segmented {
    #[allow(clippy::cast_precision_loss)]
    fn stage_metrics(&self) -> StageMetrics {
        let foreground_pixels = self.foreground_mask.foreground_pixels();
        let total = self.dimensions.pixel_count();
        StageMetrics::Segment {
            width: self.dimensions.width,
            height: self.dimensions.height,
            foreground_pixels,
            coverage: if total > 0 {
                foreground_pixels as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

impl ProcessedStage for Denoised {
    fn stage_metrics(&self) -> StageMetrics {
        let kernel = crate::blur::effective_kernel_size(
            self.config.denoise_kernel,
            self.dimensions.width,
            self.dimensions.height,
        );
        StageMetrics::Denoise {
            kernel,
            sigma: crate::blur::sigma_for_kernel(kernel),
        }
    }
}

impl ProcessedStage for Reduced {
    #[allow(clippy::cast_precision_loss)]
    fn stage_metrics(&self) -> StageMetrics {
        let total = self.dimensions.pixel_count();
        let sum: u64 = self.grayscale.pixels().map(|p| u64::from(p.0[0])).sum();
        StageMetrics::Luminance {
            mean: if total > 0 {
                sum as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

impl ProcessedStage for LinesExtracted {
    fn stage_metrics(&self) -> StageMetrics {
        let (low_threshold, high_threshold) =
            crate::canny::clamp_thresholds(self.config.line.canny_low, self.config.line.canny_high);
        StageMetrics::LineExtraction {
            style: self.config.line.style.to_string(),
            low_threshold,
            high_threshold,
            ink_pixels: crate::quality::count_value(&self.lineart_raw, 0),
            white_ratio: crate::quality::white_ratio(&self.lineart_raw),
        }
    }
}

impl ProcessedStage for Refined {
    fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::Refine {
            style: self.config.refine.style.to_string(),
            otsu_level: self.stats.otsu_level,
            inverted: self.stats.inverted,
            components_before: self.stats.components_before,
            components_after: self.stats.components_after,
        }
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental photo-to-coloring-page pipeline.
///
/// Created via [`Pipeline::new`], which stores the photo and config
/// without doing any processing.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from a photo and config.
    ///
    /// No processing is performed and the config is not yet validated;
    /// call [`.segment()`](Pending::segment) to begin.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image: RgbImage, config: PipelineConfig) -> Pending {
        Pending {
            config,
            original: image,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::segment::ModelError;

    fn photo() -> RgbImage {
        RgbImage::from_fn(40, 40, |x, y| {
            if (10..30).contains(&x) && (10..30).contains(&y) {
                image::Rgb([180, 120, 90])
            } else {
                image::Rgb([20, 60, 200])
            }
        })
    }

    fn square_matte(image: &RgbImage) -> Result<GrayImage, ModelError> {
        Ok(GrayImage::from_fn(image.width(), image.height(), |x, y| {
            let inside = (8..32).contains(&x) && (8..32).contains(&y);
            image::Luma([if inside { 255 } else { 0 }])
        }))
    }

    #[test]
    fn pending_exposes_original() {
        let pending = Pipeline::new(photo(), PipelineConfig::default());
        assert_eq!(pending.original().dimensions(), (40, 40));
        assert!(pending.metrics().is_none());
        assert_eq!(Pending::INDEX, 0);
    }

    #[test]
    fn stages_chain_to_result() {
        let staged = Pipeline::new(photo(), PipelineConfig::default())
            .segment(&square_matte)
            .unwrap()
            .denoise()
            .reduce_luminance()
            .extract_lines()
            .unwrap()
            .refine()
            .into_result();
        assert_eq!(staged.dimensions, Dimensions { width: 40, height: 40 });
        assert_eq!(staged.coloring_book.dimensions(), (40, 40));
        assert_eq!(staged.subject_on_white.get_pixel(0, 0).0, [255, 255, 255]);
        assert!(crate::threshold::is_binary(&staged.coloring_book));
    }

    #[test]
    fn accessors_expose_each_intermediate() {
        let segmented = Pipeline::new(photo(), PipelineConfig::default())
            .segment(&square_matte)
            .unwrap();
        assert_eq!(segmented.foreground_mask().foreground_pixels(), 24 * 24);
        let denoised = segmented.denoise();
        assert_eq!(denoised.denoised().dimensions(), (40, 40));
        let reduced = denoised.reduce_luminance();
        let px = reduced.grayscale().get_pixel(0, 0).0[0];
        assert!(px >= 250, "background corner is {px}");
        let extracted = reduced.extract_lines().unwrap();
        assert!(crate::threshold::is_binary(extracted.lineart_raw()));
        let refined = extracted.refine();
        assert!(crate::threshold::is_binary(refined.coloring_book()));
    }

    #[test]
    fn names_match_artifact_stems() {
        let names = [
            Segmented::NAME,
            Denoised::NAME,
            Reduced::NAME,
            LinesExtracted::NAME,
            Refined::NAME,
        ];
        for (name, artifact) in names.iter().zip(crate::types::STAGES) {
            assert!(artifact.ends_with(name), "{artifact} vs {name}");
        }
        assert_eq!(Refined::INDEX + 1, STAGE_COUNT);
    }

    #[test]
    fn invalid_config_fails_before_model_runs() {
        let mut config = PipelineConfig::default();
        config.line.xdog_phi = f32::INFINITY;
        let called = std::cell::Cell::new(false);
        let spy = |image: &RgbImage| -> Result<GrayImage, ModelError> {
            called.set(true);
            square_matte(image)
        };
        let result = Pipeline::new(photo(), config).segment(&spy);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
        assert!(!called.get());
    }

    #[test]
    fn stage_outputs_borrow_current_data() {
        let segmented = Pipeline::new(photo(), PipelineConfig::default())
            .segment(&square_matte)
            .unwrap();
        assert!(matches!(segmented.output(), StageOutput::Segmented { .. }));
        let refined = segmented
            .denoise()
            .reduce_luminance()
            .extract_lines()
            .unwrap()
            .refine();
        assert!(matches!(
            refined.output(),
            StageOutput::Refined { coloring_book } if coloring_book.dimensions() == (40, 40)
        ));
        assert!(matches!(refined.metrics(), Some(StageMetrics::Refine { .. })));
    }
}
