//! Extraction stages of the crawl pipeline
//!
//! Three stages run strictly forward:
//! - [`gene`]: gene page to haplotype variants and picker requests
//! - [`haplotype_phenotype`]: picker JSON to one request per haplotype pair
//! - [`genotype`]: recommendation page to phenotype and recommendation records
//!
//! Stages are pure. They never fetch, sleep or touch storage; the host calls
//! [`dispatch`] with a response body and gets back a [`StageOutput`].

pub mod gene;
pub mod genotype;
pub mod haplotype_phenotype;
mod request;

pub use request::{Continuation, CrawlRequest, GenotypePairRequest};

use crate::config::{
    default_phenotype_exceptions, Config, OverflowPolicy, DEFAULT_MAX_GENOTYPE_REQUESTS,
};
use crate::records::Record;
use std::collections::BTreeMap;
use thiserror::Error;

/// Settings threaded into the stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Upper bound on genotype requests per annotation
    pub max_genotype_requests: u32,
    pub overflow_policy: OverflowPolicy,
    /// Gene name to the label that carries its phenotype
    pub phenotype_exceptions: BTreeMap<String, String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_genotype_requests: DEFAULT_MAX_GENOTYPE_REQUESTS,
            overflow_policy: OverflowPolicy::Skip,
            phenotype_exceptions: default_phenotype_exceptions(),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_genotype_requests: config.crawler.max_genotype_requests,
            overflow_policy: config.crawler.overflow_policy,
            phenotype_exceptions: config.phenotype_exceptions.clone(),
        }
    }
}

/// Data problems a stage detected and worked around
///
/// These are reported, not propagated: the stage still returns whatever it
/// could extract from the rest of the response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageWarning {
    #[error(
        "haplotype table for {gene_name}: row '{haplotype_name}' has {found} allele cells, header has {expected} SNP ids; row dropped"
    )]
    ColumnMismatch {
        gene_name: String,
        haplotype_name: String,
        expected: usize,
        found: usize,
    },

    #[error(
        "annotation {annotation_id} ({gene_name}): {haplotypes} haplotypes exceed the pairing limit of {max_haplotypes}; {policy:?} applied"
    )]
    FanOutOverflow {
        gene_name: String,
        annotation_id: String,
        haplotypes: usize,
        max_haplotypes: usize,
        policy: OverflowPolicy,
    },

    #[error("cannot derive base URL from {url}: no /gene/ segment; annotations not followed")]
    MissingBaseUrl { url: String },
}

impl StageWarning {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ColumnMismatch { .. } => "column_mismatch",
            Self::FanOutOverflow { .. } => "fan_out_overflow",
            Self::MissingBaseUrl { .. } => "missing_base_url",
        }
    }
}

/// Everything one stage invocation produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageOutput {
    pub records: Vec<Record>,
    pub requests: Vec<CrawlRequest>,
    pub warnings: Vec<StageWarning>,
}

impl StageOutput {
    /// Output of a response that had nothing to extract
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.requests.is_empty() && self.warnings.is_empty()
    }
}

/// Routes a response body to the stage named by its continuation
///
/// # Arguments
///
/// * `continuation` - Stage identifier and bound parameters of the request
/// * `url` - URL the body was fetched from
/// * `body` - Response body
/// * `settings` - Cap, overflow policy and phenotype exception table
pub fn dispatch(
    continuation: &Continuation,
    url: &str,
    body: &str,
    settings: &PipelineSettings,
) -> StageOutput {
    match continuation {
        Continuation::Gene => gene::parse_gene_page(body, url),
        Continuation::HaplotypePhenotype {
            base_url,
            annotation_id,
            gene_name,
        } => haplotype_phenotype::parse_picker_data(
            body,
            base_url,
            annotation_id,
            gene_name,
            settings,
        ),
        Continuation::Genotype(pair) => genotype::parse_genotype_page(body, pair, settings),
    }
}
