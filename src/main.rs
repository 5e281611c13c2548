use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod browser;
mod config;
mod error;
mod export;
mod extract;
mod scrape;
mod sheets;
mod types;
mod utils;

use config::{Config, DEFAULT_CONFIG_FILE};
use sheets::{merge_snapshot, sync_snapshot, ServiceAccountKey, SheetStore, SheetsClient};
use types::{collect_metrics, ScrapeResult};
use utils::{osc8_link, snapshot_timestamp};

#[derive(Parser)]
#[command(name = "outage-tracker")]
#[command(about = "Scrape operator outage complaints into a Google Sheet")]
struct Cli {
    /// CONL config file; built-in defaults are used if it does not exist
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape all operators and append a snapshot column to the sheet (default)
    Run,
    /// Scrape all operators and print the results without touching the sheet
    Scrape,
    /// Scrape and merge, then print the resulting sheet as CSV instead of writing it
    Preview {
        /// Write the CSV here instead of stdout
        #[arg(long, value_name = "PATH")]
        csv: Option<PathBuf>,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn report_failures(results: &[ScrapeResult]) {
    let failed: Vec<&str> = results
        .iter()
        .filter(|r| r.regions.is_failed())
        .map(|r| r.operator.as_str())
        .collect();
    if !failed.is_empty() {
        warn!(
            "{} of {} operators failed: {}",
            failed.len(),
            results.len(),
            failed.join(", ")
        );
    }
}

fn connect(config: &Config) -> Result<SheetsClient> {
    let key = ServiceAccountKey::load(&config.credentials)?;
    SheetsClient::connect(&key, &config.spreadsheet_id)
}

fn run_update(config: &Config) -> Result<()> {
    let timestamp = snapshot_timestamp();
    let results = scrape::run_scrape(config)?;
    report_failures(&results);

    let metrics = collect_metrics(&results);
    let client = connect(config)?;
    let grid = sync_snapshot(
        &client,
        &config.sheet_name,
        &config.header_label,
        &timestamp,
        &metrics,
    )?;

    println!(
        "Wrote {} rows for {} to {}",
        grid.len() - 1,
        timestamp,
        osc8_link(&config.spreadsheet_url(), &config.sheet_name)
    );
    Ok(())
}

fn run_scrape_only(config: &Config) -> Result<()> {
    let results = scrape::run_scrape(config)?;
    for result in &results {
        println!(
            "{}: hourly {}, daily {}, level {}",
            result.operator,
            result.hourly_complaints,
            result.daily_complaints,
            result.complaint_level.as_str()
        );
        for line in result.regions.to_cell_text().lines() {
            println!("  {}", line);
        }
    }
    report_failures(&results);
    Ok(())
}

fn run_preview(config: &Config, csv: Option<PathBuf>) -> Result<()> {
    let timestamp = snapshot_timestamp();
    let results = scrape::run_scrape(config)?;
    report_failures(&results);

    let client = connect(config)?;
    let current = client.get_values(&config.sheet_name)?;
    let grid = merge_snapshot(
        current,
        &config.header_label,
        &timestamp,
        &collect_metrics(&results),
    );

    match csv {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            export::write_csv(&grid, file)?;
            info!("Preview written to {}", path.display());
        }
        None => export::write_csv(&grid, io::stdout().lock())?,
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_update(&config),
        Commands::Scrape => run_scrape_only(&config),
        Commands::Preview { csv } => run_preview(&config, csv),
    }
}
