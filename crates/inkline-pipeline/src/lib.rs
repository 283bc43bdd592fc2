//! inkline-pipeline: photo to coloring-book line art (sans-IO).
//!
//! Turns a photograph of a subject into black outlines on white with the
//! background removed, through:
//! segment -> denoise -> luminance -> line extraction -> refinement.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! images (or at most decodes in-memory bytes) and returns buffers. The
//! background matting model is injected through [`Segmenter`]. Reading
//! and writing files lives in `inkline-bench`.

pub mod bilateral;
pub mod blur;
pub mod canny;
pub mod config;
pub mod diagnostics;
pub mod grayscale;
pub mod lines;
pub mod morphology;
pub mod pipeline;
pub mod quality;
pub mod refine;
pub mod segment;
pub mod threshold;
pub mod types;
pub mod xdog;

pub use config::{LineConfig, PipelineConfig, RefineConfig};
pub use lines::{LineExtractor, LineStyle, extract_lines};
pub use pipeline::Pipeline;
pub use refine::{RefineStyle, Refiner, refine, refine_dynamic};
pub use segment::{ModelError, PrecomputedMatte, Segmenter, segment};
pub use types::{
    AlphaMatte, Dimensions, ErrorKind, ForegroundMask, GrayImage, LooseMask, PipelineError,
    RgbImage, STAGES, StagedResult,
};

/// Run the full pipeline and return only the finished coloring page.
///
/// # Pipeline steps
///
/// 1. Segment the subject with `segmenter` and composite it onto white
/// 2. Gaussian denoise
/// 3. Luminance reduction
/// 4. Line extraction ([`LineStyle`])
/// 5. Morphological refinement ([`RefineStyle`])
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// [`PipelineConfig::validate`], [`PipelineError::EmptyInput`] for an
/// image without pixels, and [`PipelineError::Model`] if the matting
/// model fails or returns a matte of the wrong size.
pub fn process<S>(
    image: &RgbImage,
    config: &PipelineConfig,
    segmenter: &S,
) -> Result<GrayImage, PipelineError>
where
    S: Segmenter + ?Sized,
{
    process_staged(image.clone(), config, segmenter).map(|staged| staged.coloring_book)
}

/// Run the full pipeline, preserving every intermediate.
///
/// # Errors
///
/// Same as [`process`].
pub fn process_staged<S>(
    image: RgbImage,
    config: &PipelineConfig,
    segmenter: &S,
) -> Result<StagedResult, PipelineError>
where
    S: Segmenter + ?Sized,
{
    let _span = tracing::debug_span!(
        "pipeline",
        width = image.width(),
        height = image.height(),
        line_style = %config.line.style,
        refine_style = %config.refine.style,
    )
    .entered();

    let staged = Pipeline::new(image, config.clone())
        .segment(segmenter)?
        .denoise()
        .reduce_luminance()
        .extract_lines()?
        .refine()
        .into_result();

    tracing::info!(
        dimensions = %staged.dimensions,
        white_ratio = quality::white_ratio(&staged.coloring_book),
        "coloring page ready"
    );
    Ok(staged)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn subject_photo() -> RgbImage {
        RgbImage::from_fn(64, 64, |x, y| {
            let d = (f64::from(x) - 32.0).hypot(f64::from(y) - 32.0);
            if d < 20.0 {
                image::Rgb([190, 140, 120])
            } else {
                image::Rgb([
                    u8::try_from((x * 4) % 256).unwrap(),
                    u8::try_from((y * 4) % 256).unwrap(),
                    90,
                ])
            }
        })
    }

    fn disc(image: &RgbImage) -> Result<GrayImage, ModelError> {
        Ok(GrayImage::from_fn(image.width(), image.height(), |x, y| {
            let d = (f64::from(x) - 32.0).hypot(f64::from(y) - 32.0);
            image::Luma([if d < 22.0 { 255 } else { 0 }])
        }))
    }

    #[test]
    fn process_matches_staged_final_image() {
        let config = PipelineConfig::default();
        let page = process(&subject_photo(), &config, &disc).unwrap();
        let staged = process_staged(subject_photo(), &config, &disc).unwrap();
        assert_eq!(&page, staged.final_image());
    }

    #[test]
    fn process_is_deterministic() {
        let config = PipelineConfig::default();
        let a = process(&subject_photo(), &config, &disc).unwrap();
        let b = process(&subject_photo(), &config, &disc).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn page_is_binary_with_white_background() {
        let page = process(&subject_photo(), &PipelineConfig::default(), &disc).unwrap();
        assert!(threshold::is_binary(&page));
        for (x, y) in [(0, 0), (63, 0), (0, 63), (63, 63)] {
            assert_eq!(page.get_pixel(x, y).0[0], 255);
        }
    }

    #[test]
    fn empty_image_is_an_input_error() {
        let err = process(&RgbImage::new(0, 0), &PipelineConfig::default(), &disc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn model_failure_is_a_model_error() {
        let failing = |_: &RgbImage| -> Result<GrayImage, ModelError> {
            Err(ModelError::Inference("weights missing".to_string()))
        };
        let err = process(&subject_photo(), &PipelineConfig::default(), &failing).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Model);
        assert!(err.to_string().contains("weights missing"));
    }

    #[test]
    fn invalid_config_is_a_config_error() {
        let mut config = PipelineConfig::default();
        config.line.bilateral_sigma_color = -1.0;
        let err = process(&subject_photo(), &config, &disc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn every_style_combination_runs() {
        for line in [LineStyle::Hybrid, LineStyle::Tracing] {
            for style in [RefineStyle::Standard, RefineStyle::Stylized] {
                let mut config = PipelineConfig::default();
                config.line.style = line;
                config.refine.style = style;
                let page = process(&subject_photo(), &config, &disc).unwrap();
                assert!(threshold::is_binary(&page), "{line}/{style}");
            }
        }
    }
}
