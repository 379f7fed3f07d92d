//! Scan command - extract the QR-bill from a single PDF.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use swissqr_core::{ScanResult, ScannedInvoice, Scanner, document_stem};

use super::config::load_config;

/// Arguments for the scan command.
#[derive(Args)]
pub struct ScanArgs {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Output directory (default: ./output/<file stem>)
    #[arg(short, long)]
    outdir: Option<PathBuf>,

    /// Search text artifacts in the output directory for an IBAN when no QR code is found
    #[arg(long)]
    heuristic: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Model directory (overrides config)
    #[arg(short, long)]
    model_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

pub async fn run(args: ScanArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(model_dir) = args.model_dir {
        config.decoders.model_dir = model_dir;
    }
    let heuristic = args.heuristic || config.heuristic.enabled;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let output_dir = args
        .outdir
        .unwrap_or_else(|| default_output_dir(&args.input));

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Scanning {}...", args.input.display()));

    let input = args.input.clone();
    let outdir = output_dir.clone();
    let result = tokio::task::spawn_blocking(move || {
        let scanner = Scanner::new(config);
        scanner.scan(&input, &outdir, heuristic)
    })
    .await?;

    pb.finish_and_clear();
    let result = result.map_err(|e| anyhow::anyhow!("Failed to scan {}: {}", args.input.display(), e))?;

    info!("Scanned {} in {:?}", args.input.display(), start.elapsed());

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print!("{}", format_result_text(&result)),
    }

    if result.is_found() {
        eprintln!(
            "{} Wrote {}",
            style("✓").green(),
            result.output_file.display()
        );
    } else {
        eprintln!(
            "{} No QR code found in {}",
            style("⚠").yellow(),
            args.input.display()
        );
    }

    Ok(())
}

/// `./output/<stem>` relative to the working directory.
pub fn default_output_dir(input: &Path) -> PathBuf {
    PathBuf::from("output").join(document_stem(input))
}

fn format_result_text(result: &ScanResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("Method:      {}\n", result.method));
    output.push_str(&format!("Output file: {}\n", result.output_file.display()));

    match &result.invoice {
        Some(ScannedInvoice::Parsed(invoice)) => {
            output.push_str(&format!("IBAN:        {}\n", invoice.iban));
            if let Some(creditor) = &invoice.creditor {
                output.push_str(&format!("Creditor:    {}\n", creditor.format()));
            }
            output.push_str(&format!(
                "Amount:      {} {}\n",
                invoice.amount_text().unwrap_or("-"),
                invoice.currency
            ));
            if let Some(debtor) = &invoice.ultimate_debtor {
                output.push_str(&format!("Debtor:      {}\n", debtor.format()));
            }
            if !invoice.reference.is_empty() {
                output.push_str(&format!(
                    "Reference:   {} ({})\n",
                    invoice.reference,
                    invoice.reference_type.as_str()
                ));
            }
            if !invoice.unstructured_message.is_empty() {
                output.push_str(&format!("Message:     {}\n", invoice.unstructured_message));
            }
        }
        Some(ScannedInvoice::Heuristic(stub)) => {
            output.push_str(&format!("IBAN:        {} (heuristic)\n", stub.iban));
        }
        None => {
            if let Some(text) = &result.qr_text {
                output.push_str(&format!("QR text:     {}\n", text.replace('\n', "\\n")));
            }
        }
    }

    output
}
