//! Output module for reporting harvest results
//!
//! This module handles:
//! - Loading and printing per-run statistics
//! - Exporting harvested records as JSON lines

mod export;
pub mod stats;

pub use export::export_records_jsonl;
pub use stats::{load_statistics, print_statistics, HarvestStatistics};

use crate::storage::{RunRecord, Storage};
use crate::HarvestError;

/// Returns the most recent run, or an error if the database has none
///
/// # Arguments
///
/// * `storage` - The storage backend containing harvest data
pub fn latest_run(storage: &dyn Storage) -> Result<RunRecord, HarvestError> {
    storage
        .get_latest_run()?
        .ok_or_else(|| HarvestError::Storage("No harvest runs found in database".to_string()))
}

/// Loads statistics for the most recent run
pub fn latest_statistics(storage: &dyn Storage) -> Result<HarvestStatistics, HarvestError> {
    let run = latest_run(storage)?;
    load_statistics(storage, run)
}
