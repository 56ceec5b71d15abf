//! Command-line interface for the reconciliation pipeline.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};

use crate::processors::{ReconciliationPipeline, ReconciliationReport};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "soil-recon")]
#[command(
    about = "Prune soil spectra and tables down to samples with spectrum, chemistry and an in-boundary georeference",
    version
)]
pub struct Cli {
    /// Root of the dataset tree
    root: Option<PathBuf>,

    /// Path to YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Boundary geometry file (.geojson or .shp); overrides the config
    #[arg(short, long)]
    boundary: Option<PathBuf>,

    /// Preview changes without rewriting tables or deleting files
    #[arg(long)]
    dry_run: bool,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(String, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<60} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_key = truncate(key, 20);
        let display_value = truncate(value, 38);
        println!("║ {:<20}: {:<38} ║", display_key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let head: String = text.chars().take(width - 3).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let cfg = PipelineConfig::from_yaml(path)
                .map_err(|e| anyhow::anyhow!("{}", e))
                .with_context(|| format!("loading config {}", path.display()))?;
            info!("Loaded config from: {}", path.display());
            cfg
        }
        None => PipelineConfig::default(),
    };

    if let Some(boundary) = &cli.boundary {
        config.boundary = Some(boundary.clone());
    }

    Ok(config)
}

fn report_items(report: &ReconciliationReport) -> Vec<(String, String)> {
    let mut items = vec![
        ("Spectrum ids".to_string(), report.spectrum_ids.to_string()),
        (
            "Georeferences".to_string(),
            format!(
                "{} -> {} rows",
                report.georeferences.rows_before, report.georeferences.rows_after
            ),
        ),
    ];

    for table in &report.chemistry {
        let name = table
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| table.path.display().to_string());
        items.push((name, format!("{} -> {} rows", table.rows_before, table.rows_after)));
    }

    items.push(("No georeference".to_string(), report.removed_by_georef.len().to_string()));
    items.push(("No chemistry".to_string(), report.removed_by_chemistry.len().to_string()));
    items.push(("Files removed".to_string(), report.removed_files.len().to_string()));
    items.push(("Samples kept".to_string(), report.surviving_ids.len().to_string()));
    items.push(("Dry run".to_string(), report.dry_run.to_string()));
    items
}

/// The summary box is only shown with `-v`; a plain run succeeds silently.
fn show_summary(cli: &Cli) -> bool {
    cli.verbose >= 1
}

fn execute(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;

    if cli.print_config {
        let yaml = config
            .to_yaml_string()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .context("serializing config")?;
        print!("{}", yaml);
        return Ok(());
    }

    let root = cli
        .root
        .clone()
        .context("missing dataset root (usage: soil-recon <ROOT>)")?;

    let start = Instant::now();

    if cli.dry_run {
        println!("DRY RUN: No tables will be rewritten and no files deleted");
    }

    let pipeline = ReconciliationPipeline::from_config(&root, config)
        .with_context(|| format!("preparing reconciliation of {}", root.display()))?;

    let spinner = create_spinner("Reconciling spectra, georeferences and chemistry...");
    let result = pipeline.run(cli.dry_run);
    spinner.finish_and_clear();

    let report = result.with_context(|| format!("reconciling {}", root.display()))?;

    if cli.dry_run {
        for path in &report.removed_files {
            println!("Would delete {}", path.display());
        }
    }

    if show_summary(cli) {
        let mut items = vec![("Dataset".to_string(), root.display().to_string())];
        items.extend(report_items(&report));
        items.push(("Duration".to_string(), format!("{:.2?}", start.elapsed())));
        print_summary("Reconciliation Complete", &items);
    }

    Ok(())
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    if let Err(e) = execute(&cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
