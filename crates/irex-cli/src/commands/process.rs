//! Process command - extract a record from a single invoice document.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::NaiveDate;
use clap::Args;
use console::style;
use tracing::{debug, info};

use irex_core::models::config::IrexConfig;
use irex_core::models::record::InvoiceRecord;
use irex_core::validate::{FormatValidator, RecordValidator, Validate};
use irex_core::{HybridExtractor, SourceData};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file: OCR text (.txt) or structured response (.json)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Reference date for date plausibility checks (YYYY-MM-DD, default: today)
    #[arg(long)]
    reference_date: Option<NaiveDate>,

    /// Skip the invoice format gate
    #[arg(long)]
    force: bool,

    /// Validate the extracted record
    #[arg(long)]
    validate: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output (one row per line item)
    Csv,
    /// Plain text summary
    Text,
}

pub fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());
    let source = read_source(&args.input)?;

    if !args.force {
        if let Some(text) = source.ocr_text.as_deref() {
            let gate = FormatValidator::new(config.format_gate.clone());
            let problems = gate.problems(text);
            if !problems.is_empty() {
                eprintln!("{}", style("Document does not look like an invoice:").red());
                for problem in &problems {
                    eprintln!("  - {}", problem);
                }
                anyhow::bail!("format gate rejected {}", args.input.display());
            }
        }
    }

    let mut extractor = HybridExtractor::new(config.extraction.clone());
    if let Some(reference) = args.reference_date {
        extractor = extractor.with_reference_date(reference);
    }
    let record = extractor.extract(&source);

    if args.validate {
        let issues = RecordValidator::new().problems(&record);
        if !issues.is_empty() {
            eprintln!("{}", style("Validation issues:").yellow());
            for issue in &issues {
                eprintln!("  - {}", issue);
            }
        }
    }

    let output = format_record(&record, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Load configuration from an explicit path, or defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<IrexConfig> {
    match config_path {
        Some(path) => Ok(IrexConfig::from_file(Path::new(path))?),
        None => Ok(IrexConfig::default()),
    }
}

/// Build the extraction source from the input file. A `.json` file is a
/// structured response (which may embed its own `ocr_text`); anything
/// else is treated as raw OCR text.
pub fn read_source(path: &Path) -> anyhow::Result<SourceData> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    if extension == "json" {
        let content = fs::read_to_string(path)?;
        let response: serde_json::Value = serde_json::from_str(&content)?;
        Ok(SourceData::from_response(response))
    } else {
        Ok(SourceData::from_text(fs::read_to_string(path)?))
    }
}

/// Render a record in the selected output format.
pub fn format_record(record: &InvoiceRecord, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(record)?),
        OutputFormat::Csv => format_record_csv(record),
        OutputFormat::Text => Ok(format_record_text(record)),
    }
}

fn format_record_csv(record: &InvoiceRecord) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "vendor_name",
        "invoice_number",
        "date",
        "sku",
        "description",
        "quantity",
        "price",
        "tax_rate",
        "total",
    ])?;
    for item in &record.line_items {
        let quantity = item.quantity.to_string();
        let price = item.price.to_string();
        let tax_rate = item.tax_rate.to_string();
        let total = item.total.to_string();
        writer.write_record([
            record.vendor_name.as_str(),
            record.invoice_number.as_str(),
            record.date.as_str(),
            item.sku.as_str(),
            item.description.as_str(),
            quantity.as_str(),
            price.as_str(),
            tax_rate.as_str(),
            total.as_str(),
        ])?;
    }
    Ok(String::from_utf8(writer.into_inner()?)?)
}

fn format_record_text(record: &InvoiceRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("Vendor:         {}\n", record.vendor_name));
    out.push_str(&format!("Address:        {}\n", record.vendor_address));
    out.push_str(&format!("Bill to:        {}\n", record.bill_to_name));
    out.push_str(&format!("Invoice number: {}\n", record.invoice_number));
    out.push_str(&format!("Date:           {}\n", record.date));
    out.push_str(&format!("Line items:     {}\n", record.line_items.len()));
    for item in &record.line_items {
        out.push_str(&format!(
            "  - {} [{}] qty {} @ {} = {}\n",
            item.description, item.sku, item.quantity, item.price, item.total
        ));
    }
    out
}
