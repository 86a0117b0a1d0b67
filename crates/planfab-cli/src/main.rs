//! planfab CLI - fabrication-plan detection for PDF documents
//!
//! Runs the detection pipeline over one or more PDF files and prints one
//! JSON result per input. Deployment tunables come from the environment
//! (`TOP_K`, `MIN_SCORE`, `MAX_PDF_MB`); command-line flags override
//! them per invocation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::error;

use planfab_core::{DetectionConfig, DetectionResult};
use planfab_pipeline::PlanDetector;

#[derive(Debug, Parser)]
#[command(
    name = "planfab",
    version,
    about = "Detect fabrication-plan pages in PDF documents"
)]
struct Cli {
    /// PDF files to analyze
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Maximum number of candidate pages in the result
    #[arg(long)]
    top_k: Option<usize>,

    /// Verdict threshold on the normalized [0, 1] score scale
    #[arg(long)]
    min_score: Option<f32>,

    /// Maximum accepted document size in megabytes
    #[arg(long)]
    max_mb: Option<f64>,

    /// Rasterization resolution in DPI
    #[arg(long)]
    dpi: Option<f32>,

    /// Tesseract language pack
    #[arg(long)]
    lang: Option<String>,

    /// OCR worker threads per document
    #[arg(long)]
    ocr_workers: Option<usize>,

    /// Per-page extraction deadline in seconds
    #[arg(long)]
    page_timeout_secs: Option<u64>,

    /// Emit compact single-line JSON
    #[arg(long)]
    compact: bool,

    /// Parallel workers for multi-file batches (default: CPU cores)
    #[arg(long)]
    parallel: Option<usize>,
}

/// One line of batch output: the input file plus its result or error.
#[derive(Debug, Serialize)]
struct FileReport<'a> {
    file: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<DetectionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "warn"
                    .parse()
                    .expect("directive is compile-time constant"),
            ),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    if cli.inputs.len() == 1 {
        return run_single(&cli.inputs[0], &config, cli.compact);
    }
    run_batch(&cli, &config)
}

/// Merge environment defaults with command-line overrides.
fn build_config(cli: &Cli) -> Result<DetectionConfig> {
    let mut config = DetectionConfig::from_env();
    if let Some(top_k) = cli.top_k {
        config.top_k = top_k;
    }
    if let Some(min_score) = cli.min_score {
        config.min_score = min_score;
    }
    if let Some(max_mb) = cli.max_mb {
        config.max_pdf_mb = max_mb;
    }
    if let Some(dpi) = cli.dpi {
        config.render_dpi = dpi;
    }
    if let Some(lang) = &cli.lang {
        config.ocr_language = lang.clone();
    }
    if let Some(workers) = cli.ocr_workers {
        config.ocr_workers = workers;
    }
    if let Some(secs) = cli.page_timeout_secs {
        config.page_timeout = Duration::from_secs(secs);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Single file: result JSON on stdout, fatal errors on stderr.
fn run_single(input: &Path, config: &DetectionConfig, compact: bool) -> Result<()> {
    let detector = PlanDetector::new(config.clone()).context("failed to start detector")?;
    let result = detector
        .detect_file(input)
        .with_context(|| format!("failed to process {}", input.display()))?;

    let json = if compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{json}");
    Ok(())
}

/// Multiple files: one JSON report per line, parallel across files.
///
/// Each worker builds its own detector; pdfium documents and Tesseract
/// engines never cross threads.
fn run_batch(cli: &Cli, config: &DetectionConfig) -> Result<()> {
    use rayon::prelude::*;

    if let Some(n) = cli.parallel {
        if n > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build_global()
                .ok(); // Ignore error if pool already built
        }
    }

    let reports: Vec<(String, bool)> = cli
        .inputs
        .par_iter()
        .map(|input| {
            let file = input.display().to_string();
            let (report, failed) = match process_one(input, config) {
                Ok(result) => (
                    FileReport {
                        file: &file,
                        result: Some(result),
                        error: None,
                    },
                    false,
                ),
                Err(e) => {
                    error!(file = %file, error = %e, "Document failed");
                    (
                        FileReport {
                            file: &file,
                            result: None,
                            error: Some(format!("{e:#}")),
                        },
                        true,
                    )
                }
            };
            let line = serde_json::to_string(&report).unwrap_or_else(|e| {
                format!(r#"{{"file":{file:?},"error":"serialization failed: {e}"}}"#)
            });
            (line, failed)
        })
        .collect();

    let failures = reports.iter().filter(|(_, failed)| *failed).count();
    for (line, _) in &reports {
        println!("{line}");
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} documents failed", cli.inputs.len());
    }
    Ok(())
}

fn process_one(input: &Path, config: &DetectionConfig) -> Result<DetectionResult> {
    let detector = PlanDetector::new(config.clone())?;
    Ok(detector.detect_file(input)?)
}
