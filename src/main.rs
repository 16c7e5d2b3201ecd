//! Harvest-Crawl main entry point
//!
//! This is the command-line interface for the Harvest-Crawl catalog crawler.

use anyhow::Context;
use clap::Parser;
use harvest_crawl::config::{load_config_with_hash, Config};
use harvest_crawl::crawler::{classify_start_urls, Coordinator};
use harvest_crawl::extension::ExtensionRegistry;
use harvest_crawl::output::{load_statistics, print_statistics};
use harvest_crawl::storage::open_storage;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Harvest-Crawl: a bounded, resumable catalog crawler
///
/// Harvest-Crawl walks category listings of a single shop, enqueues product
/// pages up to an item quota, and writes one record per product. Progress is
/// checkpointed to SQLite so an interrupted crawl picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "harvest-crawl")]
#[command(version)]
#[command(about = "A bounded, resumable catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start a fresh crawl, discarding saved progress
    #[arg(long)]
    fresh: bool,

    /// Validate config and show how start URLs are classified without crawling
    #[arg(long, conflicts_with_all = ["stats", "fresh"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "fresh"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::debug!(hash = %config_hash, "Configuration loaded");

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config, &config_hash, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("harvest_crawl=info,warn"),
            1 => EnvFilter::new("harvest_crawl=debug,info"),
            2 => EnvFilter::new("harvest_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: prints the configuration and start URL classification
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Harvest-Crawl Dry Run ===\n");

    println!("Input:");
    match config.input.max_items {
        Some(limit) => println!("  Max items: {}", limit),
        None => println!("  Max items: unlimited"),
    }
    if let Some(extension) = &config.input.extend_output {
        ExtensionRegistry::with_builtins()
            .resolve(extension)
            .context("Invalid extend-output")?;
        println!("  Output extension: {}", extension);
    }

    println!("\nCrawler:");
    println!(
        "  Concurrency: {}..{}",
        config.crawler.min_concurrency, config.crawler.max_concurrency
    );
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Page timeout: {}s", config.crawler.page_timeout_secs);
    println!("  Politeness delay: {}ms", config.crawler.politeness_delay_ms);
    println!("  Listing pages per seed: {}", config.crawler.max_listing_pages);

    println!("\nSite:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  Item links: {}", config.site.item_link_selector);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    match &config.output.dataset_path {
        Some(path) => println!("  Dataset: {}", path),
        None => println!("  Dataset: (items table in database)"),
    }

    let classified = classify_start_urls(config).context("Failed to classify start URLs")?;
    println!("\nStart URLs ({}):", classified.len());
    for (url, label) in &classified {
        match label {
            Some(label) => println!("  - [{}] {}", label.to_db_string(), url),
            None => println!("  - [skipped] {}", url),
        }
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let stats = load_statistics(&storage).context("Failed to load statistics")?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str, fresh: bool) -> anyhow::Result<()> {
    tracing::info!(
        start_urls = config.input.start_urls.len(),
        max_items = ?config.input.max_items,
        "Preparing crawl"
    );

    let coordinator =
        Coordinator::new(config, config_hash, fresh).context("Failed to initialize crawler")?;

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::warn!("Interrupt received, saving progress"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for interrupt");
                std::future::pending::<()>().await
            }
        }
    };

    let summary = coordinator
        .run_until(shutdown)
        .await
        .context("Crawl failed")?;

    if summary.status.is_resumable() {
        tracing::info!("Crawl interrupted; run again to resume");
    } else {
        tracing::info!("Crawl completed successfully");
    }

    Ok(())
}
