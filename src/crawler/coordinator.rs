//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that hosts the extraction stages:
//! - Initializing storage and the run record
//! - Seeding the frontier with gene pages
//! - Fetching each request and dispatching its body to the right stage
//! - Persisting records, warnings and the request log
//! - Feeding follow-up requests back into the frontier

use crate::config::Config;
use crate::crawler::scheduler::Scheduler;
use crate::crawler::{build_http_client, fetch, FetchResult};
use crate::output::export_records_jsonl;
use crate::stages::{dispatch, CrawlRequest, PipelineSettings, StageOutput};
use crate::storage::{RequestLogEntry, RequestOutcome, RunStatus, SqliteStorage, Storage};
use crate::HarvestError;
use reqwest::Client;
use std::path::Path;
use std::time::Instant;

/// Totals of one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub run_id: i64,
    pub requests_issued: u32,
    pub records_stored: u64,
    pub warnings: u64,
    pub fetch_failures: u64,
    pub skipped: u64,
    pub duplicates_dropped: u64,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    settings: PipelineSettings,
    storage: SqliteStorage,
    scheduler: Scheduler,
    client: Client,
    run_id: i64,
    summary: CrawlSummary,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Opens the database named in the config, starts a new run and seeds the
    /// frontier with one request per configured gene page.
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `config_hash` - Hash of the configuration file, recorded on the run
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - Failed to initialize
    pub fn new(config: Config, config_hash: &str) -> Result<Self, HarvestError> {
        let storage_path = Path::new(&config.output.database_path);
        let mut storage = SqliteStorage::new(storage_path)?;

        let run_id = storage.create_run(config_hash)?;
        tracing::info!("Starting run {}", run_id);

        let seeds: Vec<CrawlRequest> = config
            .genes
            .iter()
            .map(|gene| CrawlRequest::gene_page(gene.url.clone()))
            .collect();
        tracing::info!("Seeding frontier with {} gene pages", seeds.len());

        let scheduler = Scheduler::new(&config.crawler, seeds);
        let client = build_http_client(&config.user_agent)?;
        let settings = PipelineSettings::from_config(&config);

        Ok(Self {
            config,
            settings,
            storage,
            scheduler,
            client,
            run_id,
            summary: CrawlSummary {
                run_id,
                ..CrawlSummary::default()
            },
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Runs the main crawl loop
    ///
    /// The run is marked completed when the frontier empties (or the budget
    /// runs out) and failed if a storage error aborts it.
    pub async fn run(mut self) -> Result<CrawlSummary, HarvestError> {
        match self.crawl_loop().await {
            Ok(()) => {
                self.storage.complete_run(self.run_id)?;
            }
            Err(e) => {
                tracing::error!("Run {} failed: {}", self.run_id, e);
                self.storage
                    .update_run_status(self.run_id, RunStatus::Failed)?;
                return Err(e);
            }
        }

        if let Some(export_path) = &self.config.output.export_path {
            let written = export_records_jsonl(&self.storage, self.run_id, Path::new(export_path))?;
            tracing::info!("Exported {} records to {}", written, export_path);
        }

        self.summary.duplicates_dropped = self.scheduler.duplicates();
        Ok(self.summary)
    }

    async fn crawl_loop(&mut self) -> Result<(), HarvestError> {
        let start_time = Instant::now();

        while let Some(request) = self.scheduler.next_request().await {
            self.process_request(&request).await?;
            self.summary.requests_issued += 1;

            if self.summary.requests_issued % 25 == 0 {
                let rate =
                    self.summary.requests_issued as f64 / start_time.elapsed().as_secs_f64();
                tracing::info!(
                    "Progress: {} requests, {} records, {} in frontier, {:.2} requests/sec",
                    self.summary.requests_issued,
                    self.summary.records_stored,
                    self.scheduler.frontier_size(),
                    rate
                );
            }
        }

        if self.scheduler.budget_exhausted() {
            let remaining = self.scheduler.drain_remaining();
            if !remaining.is_empty() {
                tracing::warn!(
                    "Request budget reached; skipping {} queued requests",
                    remaining.len()
                );
            }
            for request in &remaining {
                self.log(request, RequestOutcome::Skipped, None, None, 0, 0)?;
                self.summary.skipped += 1;
            }
        } else {
            tracing::info!("Frontier is empty, crawl complete");
        }

        tracing::info!(
            "Crawl finished: {} requests, {} records in {:?}",
            self.summary.requests_issued,
            self.summary.records_stored,
            start_time.elapsed()
        );

        Ok(())
    }

    /// Fetches one request and hands its body to the stage it names
    async fn process_request(&mut self, request: &CrawlRequest) -> Result<(), HarvestError> {
        let stage = request.continuation.stage_name();
        tracing::debug!("Fetching {} ({} stage)", request.url, stage);

        match fetch(&self.client, request).await {
            FetchResult::Success {
                final_url,
                status_code,
                body,
            } => {
                let output = dispatch(&request.continuation, &final_url, &body, &self.settings);
                self.handle_output(request, &final_url, status_code, output)?;
            }

            FetchResult::HttpError { status_code } => {
                tracing::warn!("HTTP {} for {}", status_code, request.url);
                self.summary.fetch_failures += 1;
                self.log(
                    request,
                    RequestOutcome::HttpError,
                    Some(status_code),
                    Some(format!("HTTP {}", status_code)),
                    0,
                    0,
                )?;
            }

            FetchResult::NetworkError { error } => {
                tracing::warn!("Failed to fetch {}: {}", request.url, error);
                self.summary.fetch_failures += 1;
                self.log(request, RequestOutcome::NetworkError, None, Some(error), 0, 0)?;
            }
        }

        Ok(())
    }

    /// Persists what a stage produced and schedules its follow-ups
    fn handle_output(
        &mut self,
        request: &CrawlRequest,
        final_url: &str,
        status_code: u16,
        output: StageOutput,
    ) -> Result<(), HarvestError> {
        let outcome = if output.is_empty() {
            tracing::debug!("Nothing to extract from {}", final_url);
            RequestOutcome::Empty
        } else {
            RequestOutcome::Processed
        };

        for warning in &output.warnings {
            tracing::warn!("{}: {}", final_url, warning);
            self.storage
                .record_warning(self.run_id, final_url, warning)?;
            self.summary.warnings += 1;
        }

        self.storage.insert_records(self.run_id, &output.records)?;
        self.summary.records_stored += output.records.len() as u64;

        let mut follow_ups = 0u32;
        for follow_up in output.requests {
            if self.scheduler.add_to_frontier(follow_up) {
                follow_ups += 1;
            }
        }

        self.log(
            request,
            outcome,
            Some(status_code),
            None,
            output.records.len() as u32,
            follow_ups,
        )
    }

    fn log(
        &mut self,
        request: &CrawlRequest,
        outcome: RequestOutcome,
        status_code: Option<u16>,
        error_message: Option<String>,
        record_count: u32,
        follow_up_count: u32,
    ) -> Result<(), HarvestError> {
        let entry = RequestLogEntry {
            url: request.url.clone(),
            stage: request.continuation.stage_name().to_string(),
            outcome,
            status_code,
            error_message,
            record_count,
            follow_up_count,
        };
        self.storage.log_request(self.run_id, &entry)?;
        Ok(())
    }
}

/// Runs the main crawl operation
///
/// This function orchestrates the entire crawl process:
///
/// 1. Open storage and start a new run
/// 2. Build the HTTP client
/// 3. Seed the scheduler with the configured gene pages
/// 4. Main crawl loop:
///    a. Get the next request from the scheduler
///    b. Fetch it (GET or form POST)
///    c. Dispatch the body to the stage named by its continuation
///    d. Store records and warnings, log the request
///    e. Add follow-up requests to the frontier
/// 5. Mark the run as completed
/// 6. Export records if an export path is configured
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration file
///
/// # Example
///
/// ```no_run
/// use pharmgkb_harvest::config::load_config_with_hash;
/// use pharmgkb_harvest::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("config.toml"))?;
/// let summary = run_crawl(config, &hash).await?;
/// println!("{} records", summary.records_stored);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, config_hash: &str) -> Result<CrawlSummary, HarvestError> {
    let coordinator = Coordinator::new(config, config_hash)?;
    coordinator.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        default_phenotype_exceptions, CrawlerConfig, GeneEntry, OutputConfig, UserAgentConfig,
    };
    use crate::storage::open_storage;
    use tempfile::TempDir;

    fn create_test_config(database_path: &Path, genes: Vec<&str>) -> Config {
        Config {
            crawler: CrawlerConfig::default(),
            user_agent: UserAgentConfig {
                crawler_name: "TestCrawler".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "admin@example.com".to_string(),
            },
            output: OutputConfig {
                database_path: database_path.to_string_lossy().to_string(),
                export_path: None,
            },
            genes: genes
                .into_iter()
                .map(|url| GeneEntry {
                    url: url.to_string(),
                })
                .collect(),
            phenotype_exceptions: default_phenotype_exceptions(),
        }
    }

    #[test]
    fn test_coordinator_creation() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let config = create_test_config(
            &db_path,
            vec![
                "https://www.pharmgkb.org/gene/PA128",
                "https://www.pharmgkb.org/gene/PA128",
            ],
        );

        let coordinator = Coordinator::new(config, "hash").unwrap();
        assert_eq!(coordinator.scheduler.frontier_size(), 1);

        let storage = open_storage(&db_path).unwrap();
        let run = storage.get_run(coordinator.run_id()).unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.config_hash, "hash");
    }

    #[tokio::test]
    async fn test_run_with_no_genes_completes() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let config = create_test_config(&db_path, vec![]);

        let summary = run_crawl(config, "hash").await.unwrap();
        assert_eq!(summary.requests_issued, 0);
        assert_eq!(summary.records_stored, 0);

        let storage = open_storage(&db_path).unwrap();
        let run = storage.get_run(summary.run_id).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_logged_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let config = create_test_config(&db_path, vec!["http://127.0.0.1:1/gene/PA128"]);

        let summary = run_crawl(config, "hash").await.unwrap();
        assert_eq!(summary.requests_issued, 1);
        assert_eq!(summary.fetch_failures, 1);

        let storage = open_storage(&db_path).unwrap();
        let outcomes = storage.count_requests_by_outcome(summary.run_id).unwrap();
        assert_eq!(outcomes.get(&RequestOutcome::NetworkError), Some(&1));
    }
}
