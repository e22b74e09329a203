//! Batch processing command for multiple invoice documents.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use chrono::NaiveDate;
use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use irex_core::models::record::InvoiceRecord;
use irex_core::validate::{FormatValidator, Validate};
use irex_core::HybridExtractor;

use super::process::{self, OutputFormat};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Reference date for date plausibility checks (YYYY-MM-DD, default: today)
    #[arg(long)]
    reference_date: Option<NaiveDate>,

    /// Skip the invoice format gate
    #[arg(long)]
    force: bool,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing a single file.
struct ProcessResult {
    path: PathBuf,
    record: Option<InvoiceRecord>,
    error: Option<String>,
}

pub fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = process::load_config(config_path)?;

    // Expand glob pattern
    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            matches!(ext.to_lowercase().as_str(), "txt" | "json")
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut extractor = HybridExtractor::new(config.extraction.clone());
    if let Some(reference) = args.reference_date {
        extractor = extractor.with_reference_date(reference);
    }
    let gate = FormatValidator::new(config.format_gate.clone());

    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let result = process_single_file(&path, &extractor, &gate, &args);

        match result {
            Ok(record) => {
                results.push(ProcessResult {
                    path: path.clone(),
                    record: Some(record),
                    error: None,
                });
            }
            Err(e) => {
                let error_msg = e.to_string();
                if args.continue_on_error {
                    warn!("Failed to process {}: {}", path.display(), error_msg);
                    results.push(ProcessResult {
                        path: path.clone(),
                        record: None,
                        error: Some(error_msg),
                    });
                } else {
                    error!("Failed to process {}: {}", path.display(), error_msg);
                    anyhow::bail!("Processing failed: {}", error_msg);
                }
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Complete");

    let successful: Vec<_> = results.iter().filter(|r| r.record.is_some()).collect();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    // Per-file outputs
    for result in &successful {
        if let (Some(record), Some(output_dir)) = (&result.record, &args.output_dir) {
            let output_name = result
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("invoice");

            let extension = match args.format {
                OutputFormat::Json => "json",
                OutputFormat::Csv => "csv",
                OutputFormat::Text => "txt",
            };

            let output_path = output_dir.join(format!("{}.{}", output_name, extension));
            let content = process::format_record(record, args.format)?;
            fs::write(&output_path, content)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(successful.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn process_single_file(
    path: &PathBuf,
    extractor: &HybridExtractor,
    gate: &FormatValidator,
    args: &BatchArgs,
) -> anyhow::Result<InvoiceRecord> {
    let source = process::read_source(path)?;

    if !args.force {
        if let Some(text) = source.ocr_text.as_deref() {
            let problems = gate.problems(text);
            if !problems.is_empty() {
                anyhow::bail!("format gate rejected document: {}", problems.join("; "));
            }
        }
    }

    Ok(extractor.extract(&source))
}

fn write_summary(path: &PathBuf, results: &[ProcessResult]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "file",
        "status",
        "vendor_name",
        "invoice_number",
        "date",
        "line_items",
        "total",
        "error",
    ])?;

    for result in results {
        match (&result.record, &result.error) {
            (Some(record), _) => {
                let file = result.path.display().to_string();
                let items = record.line_items.len().to_string();
                let total: f64 = record.line_items.iter().map(|i| i.total).sum();
                let total = format!("{:.2}", total);
                writer.write_record([
                    file.as_str(),
                    "ok",
                    record.vendor_name.as_str(),
                    record.invoice_number.as_str(),
                    record.date.as_str(),
                    items.as_str(),
                    total.as_str(),
                    "",
                ])?;
            }
            (None, error) => {
                let file = result.path.display().to_string();
                writer.write_record([
                    file.as_str(),
                    "error",
                    "",
                    "",
                    "",
                    "",
                    "",
                    error.as_deref().unwrap_or("unknown"),
                ])?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}
