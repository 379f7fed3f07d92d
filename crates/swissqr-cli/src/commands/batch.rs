//! Batch command - scan many PDF files concurrently.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use swissqr_core::{ScanResult, Scanner, document_stem};

use super::config::load_config;

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory; each document gets its own `<folder>_<stem>` subdirectory
    #[arg(short, long, default_value = "output")]
    outdir: PathBuf,

    /// Search text artifacts for an IBAN when no QR code is found
    #[arg(long)]
    heuristic: bool,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,

    /// Model directory (overrides config)
    #[arg(short, long)]
    model_dir: Option<PathBuf>,
}

/// Outcome of scanning a single file.
struct FileOutcome {
    path: PathBuf,
    result: Option<ScanResult>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(model_dir) = args.model_dir.clone() {
        config.decoders.model_dir = model_dir;
    }
    let heuristic = args.heuristic || config.heuristic.enabled;

    let files = collect_pdfs(&args.input)?;
    if files.is_empty() {
        anyhow::bail!("No PDF files found for pattern: {}", args.input);
    }

    eprintln!(
        "{} Found {} files to scan",
        style("ℹ").blue(),
        files.len()
    );

    fs::create_dir_all(&args.outdir)?;

    // Models load once; every worker shares the chain read-only.
    let scanner = Arc::new(tokio::task::spawn_blocking(move || Scanner::new(config)).await?);
    let permits = Arc::new(Semaphore::new(args.jobs.max(1)));

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let mut taken = HashSet::new();
    let mut handles = Vec::with_capacity(files.len());
    for path in files {
        let scanner = Arc::clone(&scanner);
        let permits = Arc::clone(&permits);
        let output_dir = unique_output_dir(&args.outdir, &path, &mut taken);
        debug!("{} -> {}", path.display(), output_dir.display());

        handles.push(tokio::spawn(async move {
            let _permit = permits.acquire_owned().await?;
            let file_start = Instant::now();
            let scanned = path.clone();
            let result = tokio::task::spawn_blocking(move || {
                scanner.scan(&scanned, &output_dir, heuristic)
            })
            .await?;
            let processing_time_ms = file_start.elapsed().as_millis() as u64;

            Ok::<_, anyhow::Error>(match result {
                Ok(result) => FileOutcome {
                    path,
                    result: Some(result),
                    error: None,
                    processing_time_ms,
                },
                Err(e) => FileOutcome {
                    path,
                    result: None,
                    error: Some(e.to_string()),
                    processing_time_ms,
                },
            })
        }));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        let outcome = handle.await??;
        pb.inc(1);

        if let Some(error_msg) = &outcome.error {
            if args.continue_on_error {
                warn!("Failed to scan {}: {}", outcome.path.display(), error_msg);
            } else {
                pb.abandon();
                error!("Failed to scan {}: {}", outcome.path.display(), error_msg);
                anyhow::bail!("Scanning {} failed: {}", outcome.path.display(), error_msg);
            }
        } else {
            debug!(
                "Scanned {} in {}ms",
                outcome.path.display(),
                outcome.processing_time_ms
            );
        }
        outcomes.push(outcome);
    }

    pb.finish_with_message("Complete");

    if args.summary {
        let summary_path = args.outdir.join("summary.csv");
        write_summary(&summary_path, &outcomes)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let found = outcomes
        .iter()
        .filter(|o| o.result.as_ref().is_some_and(|r| r.is_found()))
        .count();
    let failed: Vec<_> = outcomes.iter().filter(|o| o.error.is_some()).collect();
    let not_found = outcomes.len() - found - failed.len();

    println!();
    println!(
        "{} Scanned {} files in {:?}",
        style("✓").green(),
        outcomes.len(),
        start.elapsed()
    );
    println!(
        "   {} found, {} without QR code, {} failed",
        style(found).green(),
        style(not_found).yellow(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for outcome in &failed {
            println!(
                "  - {}: {}",
                outcome.path.display(),
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

/// PDF files matching `pattern`, sorted.
fn collect_pdfs(pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = glob(pattern)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// `<base>/<parent folder>_<stem>`, suffixed `_2`, `_3`, ... when that
/// directory exists or was already handed out in this run.
fn unique_output_dir(base: &Path, input: &Path, taken: &mut HashSet<PathBuf>) -> PathBuf {
    let stem = document_stem(input);
    let folder = match input.parent().and_then(|p| p.file_name()) {
        Some(parent) => format!("{}_{}", parent.to_string_lossy(), stem),
        None => stem,
    };

    let mut candidate = base.join(&folder);
    let mut n = 2;
    while candidate.exists() || taken.contains(&candidate) {
        candidate = base.join(format!("{}_{}", folder, n));
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

fn write_summary(path: &Path, outcomes: &[FileOutcome]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "file",
        "method",
        "iban",
        "amount",
        "currency",
        "output_file",
        "error",
    ])?;

    for outcome in outcomes {
        let file = outcome.path.display().to_string();

        match &outcome.result {
            Some(result) => {
                let invoice = result.invoice.as_ref();
                let amount = invoice.and_then(|i| i.amount()).unwrap_or_default();
                let output_file = result.output_file.display().to_string();
                wtr.write_record([
                    file.as_str(),
                    result.method.as_str(),
                    invoice.map(|i| i.iban()).unwrap_or(""),
                    amount.as_str(),
                    invoice.and_then(|i| i.currency()).unwrap_or(""),
                    output_file.as_str(),
                    "",
                ])?;
            }
            None => {
                wtr.write_record([
                    file.as_str(),
                    "error",
                    "",
                    "",
                    "",
                    "",
                    outcome.error.as_deref().unwrap_or(""),
                ])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}
