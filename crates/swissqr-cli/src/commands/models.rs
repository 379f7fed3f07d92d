//! Models command - inspect the QR decoder models.

use std::fs;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;

use swissqr_core::{DecoderChain, DecoderKind};

use super::config::load_config;

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// Check which model files are present and which decoders will run
    Status(StatusArgs),
}

#[derive(Args)]
struct StatusArgs {
    /// Model directory (overrides config)
    #[arg(short, long)]
    model_dir: Option<PathBuf>,
}

pub async fn run(args: ModelsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::Status(status_args) => check_status(status_args, config_path),
    }
}

fn check_status(args: StatusArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(model_dir) = args.model_dir {
        config.decoders.model_dir = model_dir;
    }
    let decoders = &config.decoders;

    println!("{}", style("Model Status").bold());
    println!("Model directory: {}", style(decoders.model_dir.display()).cyan());
    println!();

    let files = [
        ("detector", decoders.detector_path()),
        ("super-resolution", decoders.sr_path()),
    ];

    let mut all_present = true;
    for (role, path) in &files {
        if path.exists() {
            let size = fs::metadata(path)?.len();
            println!(
                "  {} {:<17} {} ({})",
                style("✓").green(),
                role,
                path.display(),
                format_size(size)
            );
        } else {
            all_present = false;
            println!(
                "  {} {:<17} {} {}",
                style("✗").red(),
                role,
                path.display(),
                style("missing").dim()
            );
        }
    }

    if !decoders.enable_model {
        println!();
        println!("{} Model decoder disabled in configuration", style("ℹ").blue());
    } else if !all_present {
        println!();
        println!(
            "{} Model decoder unavailable, scans use the general-purpose reader only",
            style("⚠").yellow()
        );
    }

    let chain = DecoderChain::from_config(decoders);
    let kinds: Vec<&str> = chain.kinds().iter().map(|k| kind_name(*k)).collect();

    println!();
    if kinds.is_empty() {
        println!("Decoder chain: {}", style("(empty)").red());
    } else {
        println!("Decoder chain: {}", kinds.join(" -> "));
    }

    Ok(())
}

fn kind_name(kind: DecoderKind) -> &'static str {
    match kind {
        DecoderKind::SpecializedModel => "model",
        DecoderKind::GeneralPurpose => "general",
    }
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1_000_000_000 {
        format!("{:.1}GB", bytes as f64 / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.1}MB", bytes as f64 / 1_000_000.0)
    } else if bytes >= 1_000 {
        format!("{:.1}KB", bytes as f64 / 1_000.0)
    } else {
        format!("{}B", bytes)
    }
}
