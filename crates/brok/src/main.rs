//! brok: turn a raster part outline into plasma-cutter G-code.
//!
//! Reads an image, runs the extraction, planning and compile pipeline,
//! and writes a G-code program plus optional QC renderings and a JSON
//! validation report. Useful for:
//!
//! - Producing a cuttable program from a scanned or drawn outline
//! - Checking where teeth landed before sending anything to the table
//! - Measuring per-stage durations with `--diagnostics`
//!
//! # Usage
//!
//! ```text
//! brok [OPTIONS] <IMAGE> -o <PROGRAM>
//! ```
//!
//! Hard errors (unreadable input, bad configuration, a stage failure)
//! write nothing and exit non-zero. A failing validation still writes
//! every output and is flagged on stderr; it only changes the exit code
//! with `--strict`.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use brok_export::{GcodeMetadata, QcScene, QcStyle, SvgMetadata};
use brok_pipeline::diagnostics::{Clock, process_with_diagnostics};
use brok_pipeline::{PipelineConfig, RingSpec, RunOutput};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Convert a raster part outline into validated plasma-cutter G-code.
///
/// Dark pixels are material. Teeth are placed inside the configured
/// regions, snapped to the part's skeleton and validated against the
/// tolerance before the program is written.
#[derive(Parser)]
#[command(name = "brok", version)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    #[arg(required_unless_present = "print_config")]
    image_path: Option<PathBuf>,

    /// Write the G-code program to this file.
    #[arg(short, long, required_unless_present = "print_config")]
    output: Option<PathBuf>,

    /// Write a raster QC overlay (PNG).
    #[arg(long)]
    qc: Option<PathBuf>,

    /// Write the QC overlay as SVG.
    #[arg(long)]
    qc_svg: Option<PathBuf>,

    /// Write the validation report as JSON.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Load the pipeline config from a JSON file.
    #[arg(long, conflicts_with = "config_json")]
    config: Option<PathBuf>,

    /// Full pipeline config as a JSON string.
    ///
    /// Missing fields take their defaults. Individual override flags
    /// below still apply on top.
    #[arg(long)]
    config_json: Option<String>,

    /// Cutting feed rate in inches per minute.
    #[arg(long)]
    feed: Option<f64>,

    /// Add (or resize) the circular ring cut, diameter in inches.
    #[arg(long)]
    ring_diameter: Option<f64>,

    /// Pierce directly on the contour instead of on a lead-in.
    #[arg(long)]
    no_lead_in: bool,

    /// Exit non-zero when validation fails.
    #[arg(long)]
    strict: bool,

    /// Print per-stage timing and counts to stderr.
    #[arg(long)]
    diagnostics: bool,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,

    /// More logging (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Build the effective [`PipelineConfig`] from CLI arguments.
///
/// Starts from `--config` or `--config-json` (or the defaults) and
/// applies the individual override flags on top.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    let mut config: PipelineConfig = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else if let Some(ref path) = cli.config {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
        serde_json::from_str(&text)
            .map_err(|e| format!("Error parsing {}: {e}", path.display()))?
    } else {
        PipelineConfig::default()
    };

    if let Some(feed) = cli.feed {
        config.machine.feed_rate = feed;
    }
    if let Some(diameter) = cli.ring_diameter {
        config.ring = Some(RingSpec {
            diameter,
            ..config.ring.take().unwrap_or_default()
        });
    }
    if cli.no_lead_in {
        config.machine.lead_in = 0.0;
        if let Some(ring) = config.ring.as_mut() {
            ring.lead_in = 0.0;
        }
    }
    Ok(config)
}

/// Install the `fmt` subscriber on stderr.
///
/// `RUST_LOG` wins when set; otherwise the level follows `-v`/`-q`.
fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    if cli.print_config {
        return match serde_json::to_string_pretty(&config) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error serializing config: {e}");
                ExitCode::FAILURE
            }
        };
    }

    match run(&cli, &config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) if !cli.strict => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

/// Run the pipeline and write every requested output.
///
/// Returns whether validation passed. Nothing is left on disk unless the
/// pipeline completes and every output is written.
fn run(cli: &Cli, config: &PipelineConfig) -> Result<bool, String> {
    let (Some(image_path), Some(output)) = (cli.image_path.as_deref(), cli.output.as_deref())
    else {
        return Err("An input image and --output are required".to_owned());
    };

    let image_bytes = std::fs::read(image_path)
        .map_err(|e| format!("Error reading {}: {e}", image_path.display()))?;
    info!(
        image = %image_path.display(),
        bytes = image_bytes.len(),
        regions = config.regions.len(),
        "loaded input"
    );

    let run = if cli.diagnostics {
        let (run, diagnostics) = process_with_diagnostics(&image_bytes, config, &StdClock)
            .map_err(|e| format!("Pipeline error: {e}"))?;
        eprintln!("{}", diagnostics.report());
        run
    } else {
        brok_pipeline::process(&image_bytes, config).map_err(|e| format!("Pipeline error: {e}"))?
    };

    write_outputs(cli, config, image_path, output, &run)?;

    if run.report.passed {
        info!(attempts = run.attempts, "validation passed");
    } else {
        for issue in run.report.issues() {
            warn!("{issue}");
        }
        eprintln!("Validation FAILED: {}", run.report.summary());
    }
    Ok(run.report.passed)
}

fn write_outputs(
    cli: &Cli,
    config: &PipelineConfig,
    image_path: &Path,
    output: &Path,
    run: &RunOutput,
) -> Result<(), String> {
    let title = image_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let description = region_summary(config);

    let gcode = brok_export::to_gcode(
        &run.program,
        &config.machine,
        &GcodeMetadata {
            title: Some(title),
            description: description.as_deref(),
            timestamp: Some(&timestamp),
        },
    );
    let mut files: Vec<(&Path, Vec<u8>)> = vec![(output, gcode.into_bytes())];

    if cli.qc.is_some() || cli.qc_svg.is_some() {
        let scene = QcScene::from_run(run);
        if let Some(ref path) = cli.qc {
            let img = brok_export::render_qc(&scene, &QcStyle::default())
                .ok_or_else(|| "Error rendering QC image: canvas too large".to_owned())?;
            let png = brok_export::encode_png(&img)
                .map_err(|e| format!("Error encoding QC image: {e}"))?;
            files.push((path.as_path(), png));
        }
        if let Some(ref path) = cli.qc_svg {
            let stem = image_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("image");
            let svg = brok_export::to_qc_svg(
                &scene,
                &SvgMetadata {
                    title: Some(stem),
                    description: Some(&run.report.summary()),
                },
            );
            files.push((path.as_path(), svg.into_bytes()));
        }
    }

    if let Some(ref path) = cli.report {
        let json = serde_json::to_string_pretty(&run.report)
            .map_err(|e| format!("Error serializing report: {e}"))?;
        files.push((path.as_path(), json.into_bytes()));
    }

    write_all(&files)
}

/// Write every file, removing the ones already written if any write fails.
fn write_all(files: &[(&Path, Vec<u8>)]) -> Result<(), String> {
    for (i, (path, contents)) in files.iter().enumerate() {
        if let Err(e) = std::fs::write(path, contents) {
            for (written, _) in &files[..i] {
                let _ = std::fs::remove_file(written);
            }
            return Err(format!("Error writing {}: {e}", path.display()));
        }
        info!(path = %path.display(), bytes = contents.len(), "wrote");
    }
    Ok(())
}

/// `regions: a, b` for the program header, or `None` with no regions.
fn region_summary(config: &PipelineConfig) -> Option<String> {
    if config.regions.is_empty() {
        return None;
    }
    let names: Vec<&str> = config.regions.iter().map(|r| r.name.as_str()).collect();
    Some(format!("regions: {}", names.join(", ")))
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
