//! woundcare: analyze one wound photograph from the command line.
//!
//! Extracts metrics from the image, classifies them (optionally against
//! a prior metrics file written by an earlier run) and prints the
//! status, its explanation trail and a template rationale.
//!
//! # Usage
//!
//! ```text
//! woundcare [OPTIONS] <IMAGE>
//! woundcare today.jpg --previous last_week.json --save-metrics today.json
//! ```
//!
//! Set `RUST_LOG=debug` to trace each extraction stage and rule.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use log::info;
use serde::Serialize;
use woundcare_core::{
    AnalysisConfig, Clock, Decision, DownsampleFilter, ExtractConfig, MetricSet, MetricSummary,
    PatientContext, RationaleInput, TemplateRationale,
};

/// Wound-photo metrics and rule-based triage status.
#[derive(Parser)]
#[command(name = "woundcare", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image: PathBuf,

    /// Metrics JSON of the previous observation of the same wound.
    #[arg(long)]
    previous: Option<PathBuf>,

    /// Write this observation's metrics JSON (for a later `--previous`).
    #[arg(long)]
    save_metrics: Option<PathBuf>,

    /// Write the abnormal-tissue mask as a PNG.
    #[arg(long)]
    mask_out: Option<PathBuf>,

    /// Patient context as a JSON object, e.g.
    /// `{"age": 67, "diabetes": true, "pain": "mild", "notes": "..."}`.
    ///
    /// Echoed in the output and quoted in rationale prompts. Never
    /// affects the status.
    #[arg(long)]
    context_json: Option<String>,

    /// Print `{metrics, decision, rationale, context}` as JSON.
    #[arg(long)]
    json: bool,

    /// Print per-stage extraction diagnostics to stderr.
    #[arg(long)]
    diagnostics: bool,

    /// Full analysis config as a JSON file.
    ///
    /// When provided, `--max-dimension` and `--downsample-filter` are
    /// ignored.
    #[arg(long, conflicts_with = "config_json")]
    config: Option<PathBuf>,

    /// Full analysis config as a JSON string.
    ///
    /// Same shape as the `--config` file.
    #[arg(long)]
    config_json: Option<String>,

    /// Working resolution (longest axis in pixels after downsampling).
    #[arg(long, default_value_t = ExtractConfig::DEFAULT_MAX_DIMENSION, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    max_dimension: u32,

    /// Downsample filter.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    downsample_filter: Filter,
}

/// Downsample resampling filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Disabled: analyze at full resolution.
    Disabled,
    /// Area averaging (box filter over covered pixels).
    Area,
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation.
    Triangle,
    /// Bicubic Catmull-Rom.
    CatmullRom,
    /// Gaussian.
    Gaussian,
    /// Lanczos with 3 lobes.
    Lanczos3,
}

impl From<Filter> for DownsampleFilter {
    fn from(f: Filter) -> Self {
        match f {
            Filter::Disabled => Self::Disabled,
            Filter::Area => Self::Area,
            Filter::Nearest => Self::Nearest,
            Filter::Triangle => Self::Triangle,
            Filter::CatmullRom => Self::CatmullRom,
            Filter::Gaussian => Self::Gaussian,
            Filter::Lanczos3 => Self::Lanczos3,
        }
    }
}

const fn filter_from_core(f: DownsampleFilter) -> Filter {
    match f {
        DownsampleFilter::Disabled => Filter::Disabled,
        DownsampleFilter::Area => Filter::Area,
        DownsampleFilter::Nearest => Filter::Nearest,
        DownsampleFilter::Triangle => Filter::Triangle,
        DownsampleFilter::CatmullRom => Filter::CatmullRom,
        DownsampleFilter::Gaussian => Filter::Gaussian,
        DownsampleFilter::Lanczos3 => Filter::Lanczos3,
    }
}

/// Tied to [`ExtractConfig::DEFAULT_DOWNSAMPLE_FILTER`].
const CLI_DEFAULT_FILTER: Filter = filter_from_core(ExtractConfig::DEFAULT_DOWNSAMPLE_FILTER);

/// Build an [`AnalysisConfig`] from CLI arguments.
///
/// A `--config` file or `--config-json` string replaces the individual
/// flags entirely.
fn config_from_cli(cli: &Cli) -> Result<AnalysisConfig, String> {
    if let Some(ref path) = cli.config {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
        return serde_json::from_str(&text)
            .map_err(|e| format!("Error parsing {}: {e}", path.display()));
    }
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(AnalysisConfig {
        extract: ExtractConfig {
            max_dimension: cli.max_dimension,
            downsample_filter: cli.downsample_filter.into(),
            ..ExtractConfig::default()
        },
        ..AnalysisConfig::default()
    })
}

/// Load a prior observation. Missing or malformed fields read as zero.
fn load_previous(path: &Path) -> Result<MetricSummary, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("Error parsing {}: {e}", path.display()))
}

fn context_from_cli(cli: &Cli) -> Result<Option<PatientContext>, String> {
    cli.context_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| format!("Error parsing --context-json: {e}"))
}

/// Everything printed by `--json`.
#[derive(Serialize)]
struct Report<'a> {
    metrics: MetricSummary,
    decision: &'a Decision,
    rationale: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a PatientContext>,
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = config_from_cli(cli)?;
    let previous = cli.previous.as_deref().map(load_previous).transpose()?;
    let context = context_from_cli(cli)?;

    let image_bytes = std::fs::read(&cli.image)
        .map_err(|e| format!("Error reading {}: {e}", cli.image.display()))?;
    info!("image {} ({} bytes)", cli.image.display(), image_bytes.len());

    let (metrics, diagnostics) = woundcare_core::extract_bytes_with_diagnostics(
        &image_bytes,
        &config.extract,
        &StdClock,
    )
    .map_err(|e| format!("Analysis error: {e}"))?;
    if cli.diagnostics {
        eprintln!("{}", diagnostics.report());
    }

    let summary = metrics.summary();
    let decision = woundcare_core::classify(&summary, previous.as_ref(), &config.classifier);
    let rationale = woundcare_core::rationale_or_template(
        &TemplateRationale,
        &RationaleInput {
            current: &summary,
            previous: previous.as_ref(),
            decision: &decision,
            context: context.as_ref(),
        },
    );
    info!("status {} ({})", decision.status, decision.explanation_string());

    if cli.json {
        let report = Report {
            metrics: summary,
            decision: &decision,
            rationale: &rationale,
            context: context.as_ref(),
        };
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Error serializing report: {e}"))?;
        println!("{json}");
    } else {
        print_human(
            &metrics,
            &decision,
            previous.as_ref(),
            context.as_ref(),
            &rationale,
        );
    }

    if let Some(ref path) = cli.save_metrics {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| format!("Error serializing metrics: {e}"))?;
        std::fs::write(path, json)
            .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
        eprintln!("Metrics written to {}", path.display());
    }

    if let Some(ref path) = cli.mask_out {
        metrics
            .mask()
            .as_image()
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
        eprintln!("Mask written to {}", path.display());
    }

    Ok(())
}

fn print_human(
    metrics: &MetricSet,
    decision: &Decision,
    previous: Option<&MetricSummary>,
    context: Option<&PatientContext>,
    rationale: &str,
) {
    let dims = metrics.dimensions();
    println!("Analyzed at {}x{}", dims.width, dims.height);
    println!(
        "  area           {} px ({:.3}%)",
        metrics.area(),
        metrics.area_pct()
    );
    println!("  redness        {:.1}", metrics.redness());
    println!("  exudate_ratio  {:.4}", metrics.exudate_ratio());
    println!("  brightness     {:.1}", metrics.brightness());
    println!("  blur_var       {:.1}", metrics.blur_var());
    println!();
    println!("Status:      {}", decision.status);
    if let Some(prev) = previous {
        println!(
            "Change:      {:+.1}% (previous area {} px)",
            decision.delta_pct, prev.area
        );
    }
    println!("Quality:     {}", decision.quality);
    println!("Explanation: {}", decision.explanation_string());
    println!();
    println!("{rationale}");
    if let Some(ctx) = context {
        let mut entries = ctx.clinical_entries();
        if let Some(name) = ctx.name.as_deref().filter(|n| !n.trim().is_empty()) {
            entries.insert(0, format!("name={name}"));
        }
        if !entries.is_empty() {
            println!();
            println!("Context:     {}", entries.join(", "));
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("woundcare").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flags_build_default_config() {
        let config = config_from_cli(&parse(&["img.png"])).unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn flags_override_extraction() {
        let cli = parse(&[
            "img.png",
            "--max-dimension",
            "256",
            "--downsample-filter",
            "lanczos3",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.extract.max_dimension, 256);
        assert_eq!(config.extract.downsample_filter, DownsampleFilter::Lanczos3);
    }

    #[test]
    fn config_json_replaces_flags() {
        let cli = parse(&[
            "img.png",
            "--max-dimension",
            "256",
            "--config-json",
            r#"{"classifier": {"redness_urgent": 140.0}}"#,
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(
            config.extract.max_dimension,
            ExtractConfig::DEFAULT_MAX_DIMENSION
        );
        assert!((config.classifier.redness_urgent - 140.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bad_config_json_is_reported() {
        let cli = parse(&["img.png", "--config-json", "{not json"]);
        assert!(config_from_cli(&cli).unwrap_err().contains("--config-json"));
    }

    #[test]
    fn context_json_is_optional() {
        assert!(context_from_cli(&parse(&["img.png"])).unwrap().is_none());
    }

    #[test]
    fn context_json_is_parsed() {
        let cli = parse(&[
            "img.png",
            "--context-json",
            r#"{"age": 71, "diabetes": true, "notes": "heel ulcer"}"#,
        ]);
        let context = context_from_cli(&cli).unwrap().unwrap();
        assert_eq!(context.age, Some(71));
        assert_eq!(context.diabetes, Some(true));
        assert_eq!(context.notes.as_deref(), Some("heel ulcer"));
    }

    #[test]
    fn bad_context_json_is_reported() {
        let cli = parse(&["img.png", "--context-json", "[1, 2]"]);
        assert!(context_from_cli(&cli).unwrap_err().contains("--context-json"));
    }

    #[test]
    fn report_includes_context_only_when_given() {
        let decision = Decision {
            status: woundcare_core::Status::Monitor,
            delta_pct: 0.0,
            quality: woundcare_core::Quality::Ok,
            explanation: vec!["heuristic_default".to_string()],
        };
        let context = PatientContext {
            pain: Some("mild".to_string()),
            ..PatientContext::default()
        };
        let with = Report {
            metrics: MetricSummary::default(),
            decision: &decision,
            rationale: "r",
            context: Some(&context),
        };
        let json = serde_json::to_value(&with).unwrap();
        assert_eq!(json["context"]["pain"], "mild");

        let without = Report { context: None, ..with };
        let json = serde_json::to_value(&without).unwrap();
        assert!(json.get("context").is_none());
        assert_eq!(json["decision"]["quality"], "ok");
    }

    #[test]
    fn zero_max_dimension_is_rejected() {
        let args = ["woundcare", "img.png", "--max-dimension", "0"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn config_file_and_json_conflict() {
        let args = ["woundcare", "img.png", "--config", "a.json", "--config-json", "{}"];
        assert!(Cli::try_parse_from(args).is_err());
    }
}
