//! Pipeline configuration.
//!
//! Every numeric parameter is a named public field with a `DEFAULT_*`
//! associated constant so that front ends (the bench CLI, tests) can
//! reference defaults without constructing a config. All structs use
//! `#[serde(default)]`, so a partial JSON document overrides only the
//! fields it names.

use serde::{Deserialize, Serialize};

use crate::lines::LineStyle;
use crate::refine::RefineStyle;
use crate::types::PipelineError;

/// Configuration for the whole photo-to-coloring-page pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Gaussian denoise kernel size. Normalized to an odd value >= 3.
    pub denoise_kernel: i32,

    /// Line extraction parameters.
    pub line: LineConfig,

    /// Morphological refinement parameters.
    pub refine: RefineConfig,
}

impl PipelineConfig {
    /// Default denoise kernel size.
    pub const DEFAULT_DENOISE_KERNEL: i32 = 5;

    /// Check that every parameter can be normalized into a usable value.
    ///
    /// Kernel sizes, areas and iteration counts are always normalizable.
    /// Floating-point parameters must be finite and sigmas positive.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first bad
    /// field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.line.validate()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            denoise_kernel: Self::DEFAULT_DENOISE_KERNEL,
            line: LineConfig::default(),
            refine: RefineConfig::default(),
        }
    }
}

/// Parameters of the line extractor.
///
/// Canny thresholds are in L1 Sobel magnitude units (0..=2040) and are
/// clamped by [`crate::canny::clamp_thresholds`] at use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    /// Which extraction strategy to run.
    pub style: LineStyle,

    /// Canny hysteresis low threshold.
    pub canny_low: f32,
    /// Canny hysteresis high threshold.
    pub canny_high: f32,

    /// Bilateral filter window diameter for the hybrid strategy.
    pub bilateral_diameter: i32,
    /// Bilateral filter intensity sigma for the hybrid strategy.
    pub bilateral_sigma_color: f32,
    /// Bilateral filter spatial sigma for the hybrid strategy.
    pub bilateral_sigma_space: f32,

    /// XDoG narrow Gaussian sigma.
    pub xdog_sigma: f32,
    /// XDoG wide-to-narrow sigma ratio.
    pub xdog_k: f32,
    /// XDoG wide Gaussian weight.
    pub xdog_gamma: f32,
    /// XDoG soft-threshold offset.
    pub xdog_eps: f32,
    /// XDoG soft-threshold steepness.
    pub xdog_phi: f32,

    /// XDoG responses strictly above this become strokes.
    pub inner_cutoff: u8,
    /// Weighted sums strictly above this become ink.
    pub combine_cutoff: u8,
    /// Weight of the Canny outline in the combination.
    pub outer_weight: f32,
    /// Weight of the XDoG strokes in the combination.
    pub inner_weight: f32,

    /// Dilate the foreground mask before extraction so hair and soft
    /// edges stay inside the working area.
    pub use_loose_mask: bool,
    /// Elliptical element size for the loose mask.
    pub loose_kernel: i32,

    /// Bilateral diameter for the tracing strategy.
    pub tracing_bilateral_diameter: i32,
    /// Bilateral intensity sigma for the tracing strategy.
    pub tracing_sigma_color: f32,
    /// Bilateral spatial sigma for the tracing strategy.
    pub tracing_sigma_space: f32,
    /// Adaptive threshold neighbourhood size.
    pub tracing_block_size: i32,
    /// Adaptive threshold offset subtracted from the local mean.
    pub tracing_offset: f32,
}

impl LineConfig {
    /// Default Canny low threshold.
    pub const DEFAULT_CANNY_LOW: f32 = 60.0;
    /// Default Canny high threshold.
    pub const DEFAULT_CANNY_HIGH: f32 = 160.0;
    /// Default hybrid bilateral diameter.
    pub const DEFAULT_BILATERAL_DIAMETER: i32 = 7;
    /// Default hybrid bilateral intensity sigma.
    pub const DEFAULT_BILATERAL_SIGMA_COLOR: f32 = 90.0;
    /// Default hybrid bilateral spatial sigma.
    pub const DEFAULT_BILATERAL_SIGMA_SPACE: f32 = 90.0;
    /// Default XDoG sigma.
    pub const DEFAULT_XDOG_SIGMA: f32 = 0.9;
    /// Default XDoG k.
    pub const DEFAULT_XDOG_K: f32 = 1.6;
    /// Default XDoG gamma.
    pub const DEFAULT_XDOG_GAMMA: f32 = 0.985;
    /// Default XDoG epsilon.
    pub const DEFAULT_XDOG_EPS: f32 = 0.030;
    /// Default XDoG phi.
    pub const DEFAULT_XDOG_PHI: f32 = 14.0;
    /// Default XDoG stroke cutoff.
    pub const DEFAULT_INNER_CUTOFF: u8 = 200;
    /// Default combination cutoff.
    pub const DEFAULT_COMBINE_CUTOFF: u8 = 20;
    /// Default outline weight.
    pub const DEFAULT_OUTER_WEIGHT: f32 = 1.0;
    /// Default stroke weight.
    pub const DEFAULT_INNER_WEIGHT: f32 = 0.55;
    /// Loose mask is on by default.
    pub const DEFAULT_USE_LOOSE_MASK: bool = true;
    /// Default loose mask element size.
    pub const DEFAULT_LOOSE_KERNEL: i32 = 13;
    /// Default tracing bilateral diameter.
    pub const DEFAULT_TRACING_BILATERAL_DIAMETER: i32 = 9;
    /// Default tracing bilateral intensity sigma.
    pub const DEFAULT_TRACING_SIGMA_COLOR: f32 = 120.0;
    /// Default tracing bilateral spatial sigma.
    pub const DEFAULT_TRACING_SIGMA_SPACE: f32 = 120.0;
    /// Default adaptive threshold block size.
    pub const DEFAULT_TRACING_BLOCK_SIZE: i32 = 9;
    /// Default adaptive threshold offset.
    pub const DEFAULT_TRACING_OFFSET: f32 = 5.0;

    fn validate(&self) -> Result<(), PipelineError> {
        let finite = [
            ("line.canny_low", self.canny_low),
            ("line.canny_high", self.canny_high),
            ("line.xdog_gamma", self.xdog_gamma),
            ("line.xdog_eps", self.xdog_eps),
            ("line.xdog_phi", self.xdog_phi),
            ("line.outer_weight", self.outer_weight),
            ("line.inner_weight", self.inner_weight),
            ("line.tracing_offset", self.tracing_offset),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }

        let positive = [
            ("line.bilateral_sigma_color", self.bilateral_sigma_color),
            ("line.bilateral_sigma_space", self.bilateral_sigma_space),
            ("line.xdog_sigma", self.xdog_sigma),
            ("line.xdog_k", self.xdog_k),
            ("line.tracing_sigma_color", self.tracing_sigma_color),
            ("line.tracing_sigma_space", self.tracing_sigma_space),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be a positive finite number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            style: LineStyle::default(),
            canny_low: Self::DEFAULT_CANNY_LOW,
            canny_high: Self::DEFAULT_CANNY_HIGH,
            bilateral_diameter: Self::DEFAULT_BILATERAL_DIAMETER,
            bilateral_sigma_color: Self::DEFAULT_BILATERAL_SIGMA_COLOR,
            bilateral_sigma_space: Self::DEFAULT_BILATERAL_SIGMA_SPACE,
            xdog_sigma: Self::DEFAULT_XDOG_SIGMA,
            xdog_k: Self::DEFAULT_XDOG_K,
            xdog_gamma: Self::DEFAULT_XDOG_GAMMA,
            xdog_eps: Self::DEFAULT_XDOG_EPS,
            xdog_phi: Self::DEFAULT_XDOG_PHI,
            inner_cutoff: Self::DEFAULT_INNER_CUTOFF,
            combine_cutoff: Self::DEFAULT_COMBINE_CUTOFF,
            outer_weight: Self::DEFAULT_OUTER_WEIGHT,
            inner_weight: Self::DEFAULT_INNER_WEIGHT,
            use_loose_mask: Self::DEFAULT_USE_LOOSE_MASK,
            loose_kernel: Self::DEFAULT_LOOSE_KERNEL,
            tracing_bilateral_diameter: Self::DEFAULT_TRACING_BILATERAL_DIAMETER,
            tracing_sigma_color: Self::DEFAULT_TRACING_SIGMA_COLOR,
            tracing_sigma_space: Self::DEFAULT_TRACING_SIGMA_SPACE,
            tracing_block_size: Self::DEFAULT_TRACING_BLOCK_SIZE,
            tracing_offset: Self::DEFAULT_TRACING_OFFSET,
        }
    }
}

/// Parameters of the morphological refiner.
///
/// Kernel sizes are normalized to odd values >= 1; negative areas and
/// iteration counts are treated as 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Which refinement style to apply.
    pub style: RefineStyle,
    /// Otsu-binarize input that is not already strictly 0/255.
    pub auto_binarize: bool,
    /// Invert input whose mean is below 127 (white lines on black).
    pub auto_invert: bool,
    /// Ink components smaller than this many pixels are removed.
    pub speck_area: i64,
    /// Closing element size; bridges small stroke gaps.
    pub close_kernel: i32,
    /// Thickening element size.
    pub thicken_kernel: i32,
    /// Number of thickening dilations.
    pub thicken_iterations: i32,
    /// Median filter size for the stylized style.
    pub median_kernel: i32,
}

impl RefineConfig {
    /// Otsu binarization is on by default.
    pub const DEFAULT_AUTO_BINARIZE: bool = true;
    /// Auto-inversion is on by default.
    pub const DEFAULT_AUTO_INVERT: bool = true;
    /// Default minimum ink component area.
    pub const DEFAULT_SPECK_AREA: i64 = 120;
    /// Default closing element size.
    pub const DEFAULT_CLOSE_KERNEL: i32 = 3;
    /// Default thickening element size.
    pub const DEFAULT_THICKEN_KERNEL: i32 = 3;
    /// Default thickening iterations.
    pub const DEFAULT_THICKEN_ITERATIONS: i32 = 1;
    /// Default median filter size.
    pub const DEFAULT_MEDIAN_KERNEL: i32 = 3;

    /// Speck area clamped to the `u32` range.
    #[must_use]
    pub fn speck_area(&self) -> u32 {
        u32::try_from(self.speck_area.max(0)).unwrap_or(u32::MAX)
    }

    /// Thickening iterations clamped to be non-negative.
    #[must_use]
    pub fn thicken_iterations(&self) -> u32 {
        u32::try_from(self.thicken_iterations).unwrap_or(0)
    }
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            style: RefineStyle::default(),
            auto_binarize: Self::DEFAULT_AUTO_BINARIZE,
            auto_invert: Self::DEFAULT_AUTO_INVERT,
            speck_area: Self::DEFAULT_SPECK_AREA,
            close_kernel: Self::DEFAULT_CLOSE_KERNEL,
            thicken_kernel: Self::DEFAULT_THICKEN_KERNEL,
            thicken_iterations: Self::DEFAULT_THICKEN_ITERATIONS,
            median_kernel: Self::DEFAULT_MEDIAN_KERNEL,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn serde_round_trip() {
        let mut config = PipelineConfig::default();
        config.line.style = LineStyle::Tracing;
        config.refine.style = RefineStyle::Stylized;
        config.refine.speck_area = 40;
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"line": {"canny_low": 30.0}, "denoise_kernel": 7}"#).unwrap();
        assert!((config.line.canny_low - 30.0).abs() < f32::EPSILON);
        assert!((config.line.canny_high - LineConfig::DEFAULT_CANNY_HIGH).abs() < f32::EPSILON);
        assert_eq!(config.denoise_kernel, 7);
        assert_eq!(config.refine, RefineConfig::default());
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let mut config = PipelineConfig::default();
        config.line.inner_weight = f32::NAN;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(ref msg) if msg.contains("inner_weight")));
    }

    #[test]
    fn non_positive_sigma_is_rejected() {
        let mut config = PipelineConfig::default();
        config.line.xdog_sigma = 0.0;
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn negative_counts_clamp_to_zero() {
        let config = RefineConfig {
            speck_area: -5,
            thicken_iterations: -2,
            ..RefineConfig::default()
        };
        assert_eq!(config.speck_area(), 0);
        assert_eq!(config.thicken_iterations(), 0);
    }
}
