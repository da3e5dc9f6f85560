mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use zoopla_client::{PageParser, ReqwestFetcher};
use zoopla_core::{
    ConcurrentExtractor, ExtractionTarget, Mode, OutputFormat, RecordKind, ScraperConfig,
};

#[derive(Parser)]
#[command(name = "zoopla", version, about = "Zoopla property, agent and house price scraper")]
struct Cli {
    /// Path to a JSON config file (the built-in London defaults are used if omitted)
    #[arg(short, long, env = "ZOOPLA_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured mode: property, agent, house_prices or all
    #[arg(short, long)]
    mode: Option<Mode>,

    /// Override the configured output format: json or csv
    #[arg(short, long)]
    output_format: Option<OutputFormat>,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match ScraperConfig::load(cli.config.as_deref()) {
        Ok(config) => config.with_overrides(cli.mode, cli.output_format),
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Scraper failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "zoopla=debug" } else { "zoopla=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(config: ScraperConfig) -> Result<()> {
    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            config.output_dir.display()
        )
    })?;

    let rotator = Arc::new(config.proxy_rotator());
    let fetcher =
        ReqwestFetcher::with_timeout(config.timeout()).context("Failed to create HTTP client")?;
    let targets = config.targets();

    tracing::info!(
        mode = %config.mode,
        format = %config.output_format,
        proxies = rotator.len(),
        "Starting run with {} target URL(s)",
        targets.len()
    );

    for &kind in config.mode.kinds() {
        let extractor = ConcurrentExtractor::new(
            fetcher.clone(),
            PageParser::for_kind(kind),
            Arc::clone(&rotator),
            config.extractor_config(),
        );

        tracing::info!(
            "Starting {kind} extraction for {} URL(s)",
            count_targets(&targets, kind)
        );
        let records = extractor.extract_targets(&targets).await;

        let path = config.output_dir.join(config.output_format.file_name(kind));
        output::write_records(config.output_format, &records, &path)?;
    }

    tracing::info!("Run complete");
    Ok(())
}

fn count_targets(targets: &[ExtractionTarget], kind: RecordKind) -> usize {
    targets.iter().filter(|t| t.kind == kind).count()
}
