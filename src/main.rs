use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newsdrift::config::{Config, LoggingConfig};
use newsdrift::crawler::{CrawlPipeline, NewsFetcher};
use newsdrift::parser::RuleSet;
use newsdrift::NewsRecord;

#[derive(Parser)]
#[command(
    name = "newsdrift",
    version,
    about = "Drift-tolerant news listing crawler with aggregate statistics",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json), overrides `logging.format`
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl one listing page and its detail pages
    Crawl {
        /// TOML configuration file (defaults to NEWSDRIFT_* environment variables)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Listing page URL
        #[arg(short, long)]
        url: Option<String>,

        /// Category stamped on every record
        #[arg(long)]
        category: Option<String>,

        /// Maximum number of listing items to follow
        #[arg(short, long)]
        max_items: Option<usize>,

        /// Retries after the first attempt of each fetch
        #[arg(long)]
        max_retries: Option<u32>,

        /// Detail fetches in flight at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Build records from the listing page only
        #[arg(long, default_value = "false")]
        no_details: bool,

        /// Output JSON file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print Prometheus metrics to stderr when done
        #[arg(long, default_value = "false")]
        dump_metrics: bool,
    },

    /// Recompute statistics over a saved record set
    Stats {
        /// JSON file holding a record array or a crawl output
        #[arg(short, long)]
        input: PathBuf,

        /// TOML configuration file for analytics settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output JSON file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Either a bare record array or a full crawl output
#[derive(Deserialize)]
#[serde(untagged)]
enum SavedRecords {
    Records(Vec<NewsRecord>),
    Run { records: Vec<NewsRecord> },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config_path = match &cli.command {
        Commands::Crawl { config, .. } | Commands::Stats { config, .. } => config.clone(),
    };
    let mut config = load_config(config_path.as_deref())?;
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    setup_tracing(&config.logging, cli.verbose)?;

    if let Err(e) = newsdrift::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed, continuing without metrics");
    }

    match cli.command {
        Commands::Crawl {
            config: _,
            url,
            category,
            max_items,
            max_retries,
            concurrency,
            no_details,
            output,
            dump_metrics,
        } => {
            if let Some(url) = url {
                config.crawler.listing_url = url;
            }
            if let Some(category) = category {
                config.crawler.category = category;
            }
            if max_items.is_some() {
                config.crawler.max_items = max_items;
            }
            if let Some(max_retries) = max_retries {
                config.retry.max_retries = max_retries;
            }
            if let Some(concurrency) = concurrency {
                config.crawler.detail_concurrency = concurrency;
            }
            if no_details {
                config.crawler.fetch_details = false;
            }

            tracing::info!(
                url = %config.crawler.listing_url,
                category = %config.crawler.category,
                max_items = ?config.crawler.max_items,
                max_retries = config.retry.max_retries,
                "Starting crawl command"
            );

            let exit = crawl(&config, output.as_deref()).await?;

            if dump_metrics {
                match newsdrift::metrics::encode_metrics() {
                    Ok(text) => eprintln!("{text}"),
                    Err(e) => tracing::warn!(error = %e, "Failed to encode metrics"),
                }
            }

            Ok(exit)
        }

        Commands::Stats {
            input,
            config: _,
            output,
        } => {
            tracing::info!(input = %input.display(), "Starting stats command");
            stats(&config, &input, output.as_deref()).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// `RUST_LOG` wins over `logging.level`; `--verbose` wins over both
fn setup_tracing(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new(logging.filter_directive(true))
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(logging.filter_directive(false)))
    };

    // Logs go to stderr so JSON output on stdout stays clean
    match logging.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => Config::from_env(),
    }
}

async fn crawl(config: &Config, output: Option<&Path>) -> Result<ExitCode> {
    config.validate().context("Invalid configuration")?;

    let fetcher = NewsFetcher::new(config.fetcher_settings()).context("Failed to create fetcher")?;
    let rules = RuleSet::from_config(&config.rules).context("Invalid extraction rules")?;

    let pipeline = CrawlPipeline::new(config.pipeline_config(), Arc::new(fetcher))
        .with_rules(rules)
        .with_aggregator(config.aggregator()?);

    let run = pipeline.run().await;

    let json = serde_json::to_string_pretty(&run).context("Failed to serialize crawl output")?;
    write_output(output, &json).await?;

    match run.terminal.listing_failure() {
        None => Ok(ExitCode::SUCCESS),
        Some(failure) => {
            tracing::error!(code = failure.code(), "Listing unavailable, no records produced");
            Ok(ExitCode::from(2))
        }
    }
}

async fn stats(config: &Config, input: &Path, output: Option<&Path>) -> Result<()> {
    let content = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read records: {}", input.display()))?;

    let records = match serde_json::from_str::<SavedRecords>(&content)
        .with_context(|| format!("Failed to parse records: {}", input.display()))?
    {
        SavedRecords::Records(records) | SavedRecords::Run { records } => records,
    };

    let stats = config.aggregator()?.aggregate(&records);
    tracing::info!(records = stats.total_records, "Statistics computed");

    let json = serde_json::to_string_pretty(&stats).context("Failed to serialize statistics")?;
    write_output(output, &json).await
}

async fn write_output(output: Option<&Path>, json: &str) -> Result<()> {
    match output {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write output: {}", path.display()))?;
            tracing::info!(path = %path.display(), "Output written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
