//! inkline-bench: run the line-art pipeline on a photo and report diagnostics.
//!
//! Runs segmentation, denoising, luminance reduction, line extraction and
//! refinement on one image with configurable parameters, printing
//! per-stage timings and metrics. Useful for:
//!
//! - Comparing line styles (`hybrid` vs `tracing`) and refine styles
//! - Tuning Canny thresholds, XDoG response and speck area
//! - Inspecting every intermediate via `--output-dir`
//!
//! The matting model is not bundled. Pass a cut-out matte with `--matte`,
//! or feed an RGBA image whose alpha channel already holds the matte.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin inkline-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use inkline_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use inkline_pipeline::{LineConfig, PipelineConfig, PrecomputedMatte, RefineConfig};
use tracing_subscriber::EnvFilter;

/// Accepted input file extensions (lowercase).
const ACCEPTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Photo to coloring-book line art, with per-stage diagnostics.
#[derive(Parser)]
#[command(name = "inkline-bench", version)]
struct Cli {
    /// Path to the input photo (JPEG or PNG).
    image_path: PathBuf,

    /// Matte PNG for the subject (alpha channel, or luminance if opaque).
    ///
    /// Defaults to the input image's own alpha channel.
    #[arg(long)]
    matte: Option<PathBuf>,

    /// Write stage images to `<OUTPUT_DIR>/<image stem>/`.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Gaussian denoise kernel size (made odd and at least 3).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_DENOISE_KERNEL)]
    denoise_kernel: i32,

    /// Line extraction style.
    #[arg(long, value_enum, default_value_t = Style::Hybrid)]
    style: Style,

    /// Canny low threshold.
    #[arg(long, default_value_t = LineConfig::DEFAULT_CANNY_LOW)]
    canny_low: f32,

    /// Canny high threshold.
    #[arg(long, default_value_t = LineConfig::DEFAULT_CANNY_HIGH)]
    canny_high: f32,

    /// Bilateral filter diameter for the hybrid style.
    #[arg(long, default_value_t = LineConfig::DEFAULT_BILATERAL_DIAMETER)]
    bilateral_diameter: i32,

    /// Bilateral filter color sigma for the hybrid style.
    #[arg(long, default_value_t = LineConfig::DEFAULT_BILATERAL_SIGMA_COLOR)]
    bilateral_sigma_color: f32,

    /// Bilateral filter spatial sigma for the hybrid style.
    #[arg(long, default_value_t = LineConfig::DEFAULT_BILATERAL_SIGMA_SPACE)]
    bilateral_sigma_space: f32,

    /// XDoG narrow Gaussian sigma.
    #[arg(long, default_value_t = LineConfig::DEFAULT_XDOG_SIGMA)]
    xdog_sigma: f32,

    /// XDoG wide/narrow sigma ratio.
    #[arg(long, default_value_t = LineConfig::DEFAULT_XDOG_K)]
    xdog_k: f32,

    /// XDoG wide Gaussian weight.
    #[arg(long, default_value_t = LineConfig::DEFAULT_XDOG_GAMMA)]
    xdog_gamma: f32,

    /// XDoG soft-threshold offset.
    #[arg(long, default_value_t = LineConfig::DEFAULT_XDOG_EPS)]
    xdog_eps: f32,

    /// XDoG soft-threshold steepness.
    #[arg(long, default_value_t = LineConfig::DEFAULT_XDOG_PHI)]
    xdog_phi: f32,

    /// XDoG response level above which a pixel is an interior stroke.
    #[arg(long, default_value_t = LineConfig::DEFAULT_INNER_CUTOFF)]
    inner_cutoff: u8,

    /// Combined outline/stroke level above which a pixel is inked.
    #[arg(long, default_value_t = LineConfig::DEFAULT_COMBINE_CUTOFF)]
    combine_cutoff: u8,

    /// Weight of Canny outlines in the combination.
    #[arg(long, default_value_t = LineConfig::DEFAULT_OUTER_WEIGHT)]
    outer_weight: f32,

    /// Weight of XDoG strokes in the combination.
    #[arg(long, default_value_t = LineConfig::DEFAULT_INNER_WEIGHT)]
    inner_weight: f32,

    /// Restrict strokes to the exact subject mask instead of a dilated one.
    #[arg(long)]
    strict_mask: bool,

    /// Dilation kernel for the loose subject mask.
    #[arg(long, default_value_t = LineConfig::DEFAULT_LOOSE_KERNEL)]
    loose_kernel: i32,

    /// Bilateral filter diameter for the tracing style.
    #[arg(long, default_value_t = LineConfig::DEFAULT_TRACING_BILATERAL_DIAMETER)]
    tracing_bilateral_diameter: i32,

    /// Bilateral filter color sigma for the tracing style.
    #[arg(long, default_value_t = LineConfig::DEFAULT_TRACING_SIGMA_COLOR)]
    tracing_sigma_color: f32,

    /// Bilateral filter spatial sigma for the tracing style.
    #[arg(long, default_value_t = LineConfig::DEFAULT_TRACING_SIGMA_SPACE)]
    tracing_sigma_space: f32,

    /// Adaptive threshold block size for the tracing style.
    #[arg(long, default_value_t = LineConfig::DEFAULT_TRACING_BLOCK_SIZE)]
    tracing_block_size: i32,

    /// Adaptive threshold offset for the tracing style.
    #[arg(long, default_value_t = LineConfig::DEFAULT_TRACING_OFFSET)]
    tracing_offset: f32,

    /// Refinement style.
    #[arg(long, value_enum, default_value_t = Finish::Standard)]
    refine_style: Finish,

    /// Keep soft input as-is instead of Otsu-binarizing it.
    #[arg(long)]
    no_auto_binarize: bool,

    /// Never flip white-on-black input.
    #[arg(long)]
    no_auto_invert: bool,

    /// Ink components smaller than this many pixels are removed.
    #[arg(long, default_value_t = RefineConfig::DEFAULT_SPECK_AREA)]
    speck_area: i64,

    /// Closing kernel for bridging stroke gaps.
    #[arg(long, default_value_t = RefineConfig::DEFAULT_CLOSE_KERNEL)]
    close_kernel: i32,

    /// Thickening kernel.
    #[arg(long, default_value_t = RefineConfig::DEFAULT_THICKEN_KERNEL)]
    thicken_kernel: i32,

    /// Thickening iterations.
    #[arg(long, default_value_t = RefineConfig::DEFAULT_THICKEN_ITERATIONS)]
    thicken_iterations: i32,

    /// Median kernel for the stylized refine style.
    #[arg(long, default_value_t = RefineConfig::DEFAULT_MEDIAN_KERNEL)]
    median_kernel: i32,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Line extraction style selection.
#[derive(Clone, Copy, ValueEnum)]
enum Style {
    /// Canny outlines combined with XDoG interior strokes.
    Hybrid,
    /// Adaptive-threshold tracing.
    Tracing,
}

/// Refinement style selection.
#[derive(Clone, Copy, ValueEnum)]
enum Finish {
    /// Speck removal, closing and thickening.
    Standard,
    /// Standard plus median rounding.
    Stylized,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        denoise_kernel: cli.denoise_kernel,
        line: LineConfig {
            style: match cli.style {
                Style::Hybrid => inkline_pipeline::LineStyle::Hybrid,
                Style::Tracing => inkline_pipeline::LineStyle::Tracing,
            },
            canny_low: cli.canny_low,
            canny_high: cli.canny_high,
            bilateral_diameter: cli.bilateral_diameter,
            bilateral_sigma_color: cli.bilateral_sigma_color,
            bilateral_sigma_space: cli.bilateral_sigma_space,
            xdog_sigma: cli.xdog_sigma,
            xdog_k: cli.xdog_k,
            xdog_gamma: cli.xdog_gamma,
            xdog_eps: cli.xdog_eps,
            xdog_phi: cli.xdog_phi,
            inner_cutoff: cli.inner_cutoff,
            combine_cutoff: cli.combine_cutoff,
            outer_weight: cli.outer_weight,
            inner_weight: cli.inner_weight,
            use_loose_mask: !cli.strict_mask,
            loose_kernel: cli.loose_kernel,
            tracing_bilateral_diameter: cli.tracing_bilateral_diameter,
            tracing_sigma_color: cli.tracing_sigma_color,
            tracing_sigma_space: cli.tracing_sigma_space,
            tracing_block_size: cli.tracing_block_size,
            tracing_offset: cli.tracing_offset,
        },
        refine: RefineConfig {
            style: match cli.refine_style {
                Finish::Standard => inkline_pipeline::RefineStyle::Standard,
                Finish::Stylized => inkline_pipeline::RefineStyle::Stylized,
            },
            auto_binarize: !cli.no_auto_binarize,
            auto_invert: !cli.no_auto_invert,
            speck_area: cli.speck_area,
            close_kernel: cli.close_kernel,
            thicken_kernel: cli.thicken_kernel,
            thicken_iterations: cli.thicken_iterations,
            median_kernel: cli.median_kernel,
        },
    })
}

/// Reject anything that is not a JPEG or PNG by extension.
fn check_extension(path: &Path) -> Result<(), String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(format!(
            "Invalid file type {}: expected one of {}",
            path.display(),
            ACCEPTED_EXTENSIONS.join(", "),
        ))
    }
}

fn read_image(path: &Path) -> Result<image::DynamicImage, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "read image");
    inkline_pipeline::grayscale::decode(&bytes).map_err(|e| format!("{}: {e}", path.display()))
}

/// Matte from `--matte`, else from the photo's alpha channel.
fn load_matte(cli: &Cli, photo: &image::DynamicImage) -> Result<PrecomputedMatte, String> {
    if let Some(ref path) = cli.matte {
        let matte = read_image(path)?;
        return Ok(if matte.color().has_alpha() {
            PrecomputedMatte::from_alpha_channel(&matte.to_rgba8())
        } else {
            PrecomputedMatte::new(matte.to_luma8())
        });
    }
    if photo.color().has_alpha() {
        return Ok(PrecomputedMatte::from_alpha_channel(&photo.to_rgba8()));
    }
    Err(format!(
        "{} has no alpha channel; pass a subject matte with --matte",
        cli.image_path.display()
    ))
}

/// Write every stage artifact to `<dir>/<stem>/NN_stage.png`.
fn write_artifacts(
    dir: &Path,
    stem: &str,
    staged: &inkline_pipeline::StagedResult,
) -> Result<PathBuf, String> {
    let out = dir.join(stem);
    std::fs::create_dir_all(&out).map_err(|e| format!("Error creating {}: {e}", out.display()))?;
    for (name, artifact) in staged.artifacts() {
        let path = out.join(format!("{name}.png"));
        artifact
            .save(&path)
            .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
        tracing::debug!(path = %path.display(), "wrote stage");
    }
    Ok(out)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = config_from_cli(cli)?;
    check_extension(&cli.image_path)?;

    let photo = read_image(&cli.image_path)?;
    let matte = load_matte(cli, &photo)?;
    let rgb = photo.to_rgb8();

    eprintln!(
        "Image: {} ({}x{})",
        cli.image_path.display(),
        rgb.width(),
        rgb.height(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let (staged, diagnostics) = inkline_pipeline::diagnostics::process_staged_with_diagnostics(
            rgb.clone(),
            &config,
            &matte,
            &StdClock,
        )
        .map_err(|e| format!("Pipeline error ({:?}): {e}", e.kind()))?;

        if cli.json {
            let json = serde_json::to_string_pretty(&diagnostics)
                .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
            println!("{json}");
        } else {
            println!("{}", diagnostics.report());
        }

        // Stage images on the first run only.
        if run == 0
            && let Some(ref dir) = cli.output_dir
        {
            let stem = cli
                .image_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("image");
            let out = write_artifacts(dir, stem, &staged)?;
            tracing::info!(dir = %out.display(), "stage images written");
        }

        all_diagnostics.push(diagnostics);

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&PipelineDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Segment", |d| d.segment.duration),
        ("Denoise", |d| d.denoise.duration),
        ("Luminance", |d| d.luminance.duration),
        ("Line Extraction", |d| d.line_extraction.duration),
        ("Refine", |d| d.refine.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
