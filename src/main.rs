use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use disposable_domains::driver::{Aggregator, RunPlan};
use disposable_domains::fetcher::SourceFetcher;
use disposable_domains::output::write_sets;
use disposable_domains::scraper::WebDriverLauncher;
use disposable_domains::settings::Settings;
use disposable_domains::utils::logger::init_logger;
use disposable_domains::validator::{DomainValidator, TldRegistry};

/// Builds the disposable-email-domain list and its allowlist.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file (TOML); `disposable.toml` is used if present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory the two lists are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Directory for log files
    #[arg(long)]
    log_dir: Option<String>,

    /// Only ingest static sources; skip browser scraping
    #[arg(long)]
    no_scrape: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(dir) = cli.output_dir {
        settings.output_dir = dir;
    }
    if let Some(dir) = cli.log_dir {
        settings.log_dir = dir;
    }
    if cli.no_scrape {
        settings.scraping.enabled = false;
    }

    init_logger(&settings.log_dir)?;

    let registry = match &settings.tld_file {
        Some(path) => TldRegistry::from_file(path)?,
        None => TldRegistry::builtin(),
    };
    info!("Loaded {} known TLDs", registry.len());
    let validator = DomainValidator::new(registry);

    let fetcher = SourceFetcher::new(&settings.fetcher)?;
    let launcher = Arc::new(WebDriverLauncher::new(
        settings.scraping.endpoints(),
        settings.scraping.headless,
    ));

    let aggregator = Aggregator::new(RunPlan::from_settings(&settings), fetcher, launcher, validator);
    let (published, _summary) = aggregator.run().await?;

    write_sets(
        &settings.output_dir,
        &settings.allow_filename,
        &settings.disposable_filename,
        &published,
    )
    .await
    .context("Failed to publish domain lists")?;

    Ok(())
}
