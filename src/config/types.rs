use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for a harvest run
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "gene")]
    pub genes: Vec<GeneEntry>,
    /// Genes whose phenotype is published under an alternate label
    #[serde(
        default = "default_phenotype_exceptions",
        rename = "phenotype-exceptions"
    )]
    pub phenotype_exceptions: BTreeMap<String, String>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Upper bound on genotype requests issued for one annotation
    #[serde(
        rename = "max-genotype-requests",
        default = "default_max_genotype_requests"
    )]
    pub max_genotype_requests: u32,

    /// What to do when an annotation has too many haplotypes to pair
    #[serde(rename = "overflow-policy", default)]
    pub overflow_policy: OverflowPolicy,

    /// Minimum time between two requests (milliseconds)
    #[serde(rename = "minimum-request-interval", default)]
    pub minimum_request_interval: u64,

    /// Total number of requests allowed in one run
    #[serde(rename = "max-total-requests", default)]
    pub max_total_requests: Option<u32>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_genotype_requests: default_max_genotype_requests(),
            overflow_policy: OverflowPolicy::default(),
            minimum_request_interval: 0,
            max_total_requests: None,
        }
    }
}

/// Policy for an annotation whose haplotype catalog exceeds the pairing cap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Issue no genotype requests for the annotation
    #[default]
    Skip,
    /// Pair only the first haplotypes that fit under the cap
    Truncate,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path of the JSON-lines export written after a crawl
    #[serde(rename = "export-path", default)]
    pub export_path: Option<String>,
}

/// A gene page to start from
#[derive(Debug, Clone, Deserialize)]
pub struct GeneEntry {
    /// Gene page URL, e.g. "https://www.pharmgkb.org/gene/PA128"
    pub url: String,
}

pub const DEFAULT_MAX_GENOTYPE_REQUESTS: u32 = 100;

fn default_max_genotype_requests() -> u32 {
    DEFAULT_MAX_GENOTYPE_REQUESTS
}

/// CYP2C19 and CYP2D6 report "Metabolizer Status" instead of "Phenotype (Genotype)"
pub fn default_phenotype_exceptions() -> BTreeMap<String, String> {
    [
        ("CYP2C19", "Metabolizer Status"),
        ("CYP2D6", "Metabolizer Status"),
    ]
    .into_iter()
    .map(|(gene, label)| (gene.to_string(), label.to_string()))
    .collect()
}
