//! Address enrichment CLI.
//!
//! Reads a CSV with an `address` column, geocodes each row, and writes a copy
//! with one column per region attribute plus `in_region`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use regionmatch::batch::{BatchProgress, BatchRunner};
use regionmatch::config::Config;
use regionmatch::geocode::NominatimGeocoder;
use regionmatch::matching::RegionMatcher;
use regionmatch::models::MatchReport;
use regionmatch::regions::{DatasetCatalog, DatasetErrorPolicy};
use regionmatch::table::{default_output_path, read_addresses, write_enriched, AddressTable};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "enrich")]
#[command(about = "Attach region attributes to a CSV of addresses")]
struct Args {
    /// Input CSV with an `address` column
    input: PathBuf,

    /// Directory searched recursively for region datasets
    #[arg(short, long)]
    datasets: Option<PathBuf>,

    /// Output CSV (default: <input>_with_regions.csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path segment after which dataset prefixes start
    #[arg(long)]
    root_marker: Option<String>,

    /// What to do when a dataset fails to load (skip or abort)
    #[arg(long)]
    on_dataset_error: Option<DatasetErrorPolicy>,

    /// Minimum milliseconds between geocoder requests
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Geocoder requests allowed in flight
    #[arg(long)]
    concurrency: Option<usize>,

    /// Geocoder base URL
    #[arg(long)]
    geocoder_url: Option<String>,

    /// Also write the run summary as JSON
    #[arg(long)]
    json_report: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(root) = &self.datasets {
            config.datasets.root = root.clone();
        }
        if let Some(marker) = &self.root_marker {
            config.datasets.root_marker = marker.clone();
        }
        if let Some(policy) = self.on_dataset_error {
            config.datasets.on_error = policy;
        }
        if let Some(delay_ms) = self.delay_ms {
            config.batch.delay_ms = delay_ms;
        }
        if let Some(concurrency) = self.concurrency {
            config.batch.concurrency = concurrency;
        }
        if let Some(url) = &self.geocoder_url {
            config.geocoder.endpoint = url.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::default(),
    };
    args.apply(&mut config);

    info!("Region enrichment");
    info!("Input: {}", args.input.display());
    info!("Datasets: {}", config.datasets.root.display());

    let catalog = DatasetCatalog::discover(
        &config.datasets.root,
        &config.datasets.root_marker,
        config.datasets.on_error,
    )
    .context("Failed to load region datasets")?;
    info!(
        "Loaded {} datasets with {} regions",
        catalog.len(),
        catalog.total_regions()
    );

    let matcher = RegionMatcher::new(catalog);
    let region_columns = matcher.region_columns();

    let AddressTable { headers, records } =
        read_addresses(&args.input).context("Failed to read address table")?;

    let geocoder = NominatimGeocoder::new(
        &config.geocoder.endpoint,
        &config.geocoder.user_agent,
        config.geocoder.timeout(),
    )
    .context("Failed to create geocoder")?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing current records and writing partial output");
            ctrl_c.cancel();
        }
    });

    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    let progress_task = tokio::spawn(render_progress(records.len(), progress_rx));

    let runner = BatchRunner::new(&geocoder, &matcher)
        .with_options(config.batch.options())
        .with_cancellation(cancel)
        .with_progress(progress_tx);
    let result = runner.run(records).await;
    drop(runner);
    let _ = progress_task.await;

    let (records, report) = result?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));
    write_enriched(&output, &headers, &region_columns, &records)
        .context("Failed to write enriched table")?;

    if let Some(path) = &args.json_report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    print_summary(&report, &output);
    Ok(())
}

async fn render_progress(total: usize, mut rx: mpsc::UnboundedReceiver<BatchProgress>) {
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);

    while let Some(progress) = rx.recv().await {
        pb.set_position(progress.processed as u64);
        pb.set_message(format!("~{} left", format_duration(progress.estimated_remaining)));
    }
    pb.finish_and_clear();
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

fn print_summary(report: &MatchReport, output: &std::path::Path) {
    if report.cancelled {
        println!(
            "Cancelled: {} records processed, {} skipped",
            report.total, report.skipped
        );
    }
    println!("Total addresses:  {}", report.total);
    println!("Found in regions: {}", report.matched);
    println!("Not found:        {}", report.unmatched);
    println!("Not geocoded:     {}", report.unresolved);
    println!("Elapsed:          {}", format_duration(report.elapsed));
    println!("Output:           {}", output.display());
}
