mod config;
mod dedup;
mod error;
mod ledger;
mod normalize;
mod parser;
mod persist;
mod pipeline;
mod report;
mod snapshot;
mod store;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::ledger::CollectionStamp;
use crate::pipeline::Pipeline;
use crate::snapshot::PageSnapshot;

#[derive(Parser)]
#[command(name = "trend_ledger", about = "Capture trending searches into an append-only ledger")]
struct Cli {
    /// Config file; missing is fine, TRENDS_* environment variables override it
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
    /// Read a saved page instead of fetching
    #[arg(short, long)]
    snapshot: Option<PathBuf>,
    /// Page to fetch (default: source_url from config)
    #[arg(short, long)]
    url: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let settings = config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;
    info!(
        locale = ?settings.locale,
        target = settings.target_record_count,
        json = settings.save_to_json_file,
        workbook = settings.save_to_excel_file,
        sheet = settings.save_to_remote_sheet,
        "Settings loaded"
    );

    let stamp = CollectionStamp::now();
    let page = load_page(&cli, &settings)?;

    let mut stores = store::from_settings(&settings);
    let report = Pipeline::from_settings(&settings).run(&page, &mut stores, &stamp)?;

    debug!(stages = ?report.stages, "Run finished");
    report::print_trends(&report.records, &stamp);
    report::print_summary(&report);
    if report.failed_stores() > 0 {
        warn!("{} of {} stores failed to merge", report.failed_stores(), report.stores.len());
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", report::format_duration(elapsed));
    }
    Ok(())
}

fn load_page(cli: &Cli, settings: &Settings) -> anyhow::Result<PageSnapshot> {
    if let Some(path) = cli.snapshot.as_ref().or(settings.snapshot_path.as_ref()) {
        return PageSnapshot::load(path);
    }
    let url = cli.url.as_deref().unwrap_or(&settings.source_url);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    spinner.set_message(format!("Fetching {}", url));
    spinner.enable_steady_tick(Duration::from_millis(120));
    let page = PageSnapshot::fetch(url);
    spinner.finish_and_clear();
    page
}
