//! Skimmer command-line entry point

use clap::Parser;
use skimmer::config::load_config_with_hash;
use skimmer::output::print_stats;
use skimmer::store::MemoryPageStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Skimmer: a focused web crawler feeding a content-curation pipeline
///
/// Crawls the configured seeds while honoring robots.txt, expands sitemaps
/// and feeds, deduplicates by normalized URL, and prints a run summary.
#[derive(Parser, Debug)]
#[command(name = "skimmer")]
#[command(version)]
#[command(about = "A focused web crawler and content-acquisition engine", long_about = None)]
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

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)?;
    tracing::info!("Configuration loaded (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let store = Arc::new(MemoryPageStore::new());
    let stats = skimmer::crawler::crawl(config, store).await?;

    if !cli.quiet {
        print_stats(&stats);
    }

    Ok(())
}

/// Sets up the tracing subscriber based on verbosity level.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("skimmer=info,warn"),
            1 => EnvFilter::new("skimmer=debug,info"),
            2 => EnvFilter::new("skimmer=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Prints what a run with this configuration would do.
fn handle_dry_run(config: &skimmer::Config) {
    println!("=== Skimmer Dry Run ===\n");

    println!("Crawler:");
    println!("  Workers: {}", config.crawler.workers);
    println!("  Queue capacity: {}", config.crawler.queue_capacity);
    println!("  Fetch strategy: {:?}", config.crawler.fetch_strategy);
    println!("  Domain scope: {:?}", config.crawler.domain_scope);
    println!("  Cache freshness: {}h", config.crawler.cache_freshness_hours);
    println!(
        "  Follow: links={} sitemaps={} feeds={}",
        config.crawler.follow_links, config.crawler.follow_sitemaps, config.crawler.follow_feeds
    );

    if !config.filter.include_paths.is_empty() || !config.filter.exclude_paths.is_empty() {
        println!("\nPath filter:");
        for pattern in &config.filter.include_paths {
            println!("  include: {}", pattern);
        }
        for pattern in &config.filter.exclude_paths {
            println!("  exclude: {}", pattern);
        }
    }

    println!("\nSeeds:");
    for seed in &config.seeds {
        println!(
            "  {:?} {} (max-depth {}{})",
            seed.kind,
            seed.url,
            seed.max_depth,
            if seed.no_cache { ", no-cache" } else { "" }
        );
    }
}
