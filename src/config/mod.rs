//! Configuration module for PharmGKB Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use pharmgkb_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Seeding {} gene pages", config.genes.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    default_phenotype_exceptions, Config, CrawlerConfig, GeneEntry, OutputConfig,
    OverflowPolicy, UserAgentConfig, DEFAULT_MAX_GENOTYPE_REQUESTS,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, hash_config_content, load_config, load_config_with_hash, parse_config,
};
