//! Crawler module hosting the extraction stages
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching (GET for gene pages, form POSTs for the rest)
//! - Request scheduling, duplicate suppression and rate limiting
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod scheduler;

pub use coordinator::{run_crawl, Coordinator, CrawlSummary};
pub use fetcher::{build_http_client, fetch, user_agent_string, FetchResult};
pub use scheduler::Scheduler;

use crate::config::Config;
use crate::HarvestError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Initialize the storage layer and start a run
/// 2. Build the HTTP client
/// 3. Fetch gene pages, picker data and genotype pages in turn
/// 4. Store every record the stages extract
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration file
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - Crawl completed successfully
/// * `Err(HarvestError)` - Crawl failed
pub async fn crawl(config: Config, config_hash: &str) -> Result<CrawlSummary, HarvestError> {
    run_crawl(config, config_hash).await
}
