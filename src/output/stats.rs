//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! run statistics from the storage layer.

use crate::records::RecordKind;
use crate::storage::{RequestOutcome, RunRecord, Storage};
use crate::HarvestError;
use std::collections::{BTreeMap, HashMap};

/// Harvest statistics for one run
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    pub run: RunRecord,

    /// Wall time of the run, if it finished
    pub duration_seconds: Option<u64>,

    /// Count of stored records by kind
    pub records_by_kind: BTreeMap<RecordKind, u64>,

    /// Count of logged requests by outcome
    pub requests_by_outcome: HashMap<RequestOutcome, u64>,

    /// Count of logged requests by stage
    pub requests_by_stage: HashMap<String, u64>,

    /// Count of stage warnings by kind
    pub warnings_by_kind: HashMap<String, u64>,
}

impl HarvestStatistics {
    pub fn total_records(&self) -> u64 {
        self.records_by_kind.values().sum()
    }

    pub fn total_requests(&self) -> u64 {
        self.requests_by_outcome.values().sum()
    }

    pub fn total_errors(&self) -> u64 {
        self.requests_by_outcome
            .iter()
            .filter(|(outcome, _)| outcome.is_error())
            .map(|(_, count)| count)
            .sum()
    }
}

fn run_duration(run: &RunRecord) -> Option<u64> {
    let started = run
        .started_at
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()?;
    let finished = run
        .finished_at
        .as_ref()?
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()?;
    Some((finished - started).num_seconds().max(0) as u64)
}

/// Loads statistics for one run from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `run` - The run to summarize
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(
    storage: &dyn Storage,
    run: RunRecord,
) -> Result<HarvestStatistics, HarvestError> {
    let mut records_by_kind = BTreeMap::new();
    for kind in RecordKind::ALL {
        records_by_kind.insert(kind, storage.count_records(run.id, kind)?);
    }

    let requests_by_outcome = storage.count_requests_by_outcome(run.id)?;
    let requests_by_stage = storage.count_requests_by_stage(run.id)?;
    let warnings_by_kind = storage.count_warnings_by_kind(run.id)?;

    Ok(HarvestStatistics {
        duration_seconds: run_duration(&run),
        run,
        records_by_kind,
        requests_by_outcome,
        requests_by_stage,
        warnings_by_kind,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Run {}:", stats.run.id);
    println!("  Status: {}", stats.run.status.to_db_string());
    println!("  Started: {}", stats.run.started_at);
    if let Some(finished) = &stats.run.finished_at {
        println!("  Finished: {}", finished);
    }
    if let Some(seconds) = stats.duration_seconds {
        println!("  Duration: {}s", seconds);
    }
    println!("  Config hash: {}", stats.run.config_hash);
    println!();

    println!("Records ({}):", stats.total_records());
    for (kind, count) in &stats.records_by_kind {
        println!("  {}: {}", kind.as_str(), count);
    }
    println!();

    println!("Requests ({}):", stats.total_requests());
    let mut outcome_counts: Vec<_> = stats.requests_by_outcome.iter().collect();
    outcome_counts.sort_by(|a, b| b.1.cmp(a.1));
    for (outcome, count) in outcome_counts {
        let percentage = if stats.total_requests() > 0 {
            (*count as f64 / stats.total_requests() as f64) * 100.0
        } else {
            0.0
        };
        println!(
            "  {}: {} ({:.1}%)",
            outcome.to_db_string(),
            count,
            percentage
        );
    }
    println!();

    if !stats.requests_by_stage.is_empty() {
        println!("Requests by Stage:");
        let mut stage_counts: Vec<_> = stats.requests_by_stage.iter().collect();
        stage_counts.sort();
        for (stage, count) in stage_counts {
            println!("  {}: {}", stage, count);
        }
        println!();
    }

    if !stats.warnings_by_kind.is_empty() {
        println!("Warnings:");
        let mut warning_counts: Vec<_> = stats.warnings_by_kind.iter().collect();
        warning_counts.sort_by(|a, b| b.1.cmp(a.1));
        for (kind, count) in warning_counts {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    println!(
        "Fetch errors: {} / {} requests",
        stats.total_errors(),
        stats.total_requests()
    );
}
