//! PharmGKB Harvest main entry point
//!
//! This is the command-line interface for the PharmGKB crawl pipeline.

use anyhow::{bail, Context};
use clap::Parser;
use pharmgkb_harvest::config::{load_config_with_hash, Config, GeneEntry};
use pharmgkb_harvest::crawler::{crawl, user_agent_string};
use pharmgkb_harvest::output::{
    export_records_jsonl, latest_run, latest_statistics, print_statistics,
};
use pharmgkb_harvest::storage::SqliteStorage;
use pharmgkb_harvest::url::validate_gene_url;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// PharmGKB Harvest: a pharmacogenomics crawl pipeline
///
/// Crawls PharmGKB gene pages, follows their guideline annotations through
/// every haplotype pair, and stores haplotype alleles, genotype phenotypes
/// and drug recommendations in SQLite.
#[derive(Parser, Debug)]
#[command(name = "pharmgkb-harvest")]
#[command(version)]
#[command(about = "A pharmacogenomics crawl pipeline for PharmGKB", long_about = None)]
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

    /// Gene page to crawl instead of the configured genes (repeatable)
    #[arg(long = "gene", value_name = "URL")]
    genes: Vec<String>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export"])]
    dry_run: bool,

    /// Show statistics of the latest run and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export"])]
    stats: bool,

    /// Export records of the latest run to the configured export path and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e).context("invalid configuration");
        }
    };

    if !cli.genes.is_empty() {
        config.genes = override_genes(&cli.genes)?;
    }

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export {
        handle_export(&config)?;
    } else {
        handle_crawl(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pharmgkb_harvest=info,warn"),
            1 => EnvFilter::new("pharmgkb_harvest=debug,info"),
            2 => EnvFilter::new("pharmgkb_harvest=trace,debug"),
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

/// Validates gene URLs given on the command line
fn override_genes(urls: &[String]) -> anyhow::Result<Vec<GeneEntry>> {
    urls.iter()
        .map(|url| {
            validate_gene_url(url).with_context(|| format!("invalid --gene URL '{}'", url))?;
            Ok(GeneEntry { url: url.clone() })
        })
        .collect()
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== PharmGKB Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Max genotype requests per annotation: {}",
        config.crawler.max_genotype_requests
    );
    println!("  Overflow policy: {:?}", config.crawler.overflow_policy);
    println!(
        "  Minimum request interval: {}ms",
        config.crawler.minimum_request_interval
    );
    match config.crawler.max_total_requests {
        Some(budget) => println!("  Request budget: {}", budget),
        None => println!("  Request budget: unlimited"),
    }

    println!("\nUser Agent:");
    println!("  {}", user_agent_string(&config.user_agent));

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    if let Some(export_path) = &config.output.export_path {
        println!("  Export: {}", export_path);
    }

    println!(
        "\nPhenotype Exceptions ({}):",
        config.phenotype_exceptions.len()
    );
    for (gene, label) in &config.phenotype_exceptions {
        println!("  - {} -> {}", gene, label);
    }

    println!("\nGenes ({}):", config.genes.len());
    for gene in &config.genes {
        println!("  - {}", gene.url);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling with {} gene pages", config.genes.len());
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = latest_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export mode: writes the latest run's records as JSON lines
fn handle_export(config: &Config) -> anyhow::Result<()> {
    let Some(export_path) = &config.output.export_path else {
        bail!("--export requires output.export-path in the configuration");
    };

    println!("=== Exporting Harvested Records ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", export_path);
    println!();

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let run = latest_run(&storage)?;

    tracing::info!("Loading records of run {}...", run.id);
    let written = export_records_jsonl(&storage, run.id, Path::new(export_path))?;

    println!("✓ {} records exported to: {}", written, export_path);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> anyhow::Result<()> {
    if config.genes.is_empty() {
        tracing::warn!("No gene pages configured; nothing to crawl");
    }
    tracing::info!(
        "Genes: {}, max genotype requests per annotation: {}",
        config.genes.len(),
        config.crawler.max_genotype_requests
    );

    match crawl(config, config_hash).await {
        Ok(summary) => {
            tracing::info!(
                "Crawl completed successfully: run {}, {} requests, {} records, {} warnings, {} fetch failures, {} skipped",
                summary.run_id,
                summary.requests_issued,
                summary.records_stored,
                summary.warnings,
                summary.fetch_failures,
                summary.skipped
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
