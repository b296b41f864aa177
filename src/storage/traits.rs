//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::records::{Record, RecordKind};
use crate::stages::StageWarning;
use crate::storage::{RequestLogEntry, RequestOutcome, RunRecord, RunStatus};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This is the persistence collaborator of the pipeline: stages hand their
/// records to the host, and the host hands them here.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new run and returns its ID
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run, stamping the finish time for final states
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        self.update_run_status(run_id, RunStatus::Completed)
    }

    // ===== Records =====

    /// Stores one record
    fn insert_record(&mut self, run_id: i64, record: &Record) -> StorageResult<()>;

    /// Stores the records of one response together
    ///
    /// Either all records are stored or none.
    fn insert_records(&mut self, run_id: i64, records: &[Record]) -> StorageResult<()>;

    /// Loads every record of a run, grouped by kind in insertion order
    fn load_records(&self, run_id: i64) -> StorageResult<Vec<Record>>;

    /// Counts the records of one kind in a run
    fn count_records(&self, run_id: i64, kind: RecordKind) -> StorageResult<u64>;

    // ===== Request Log =====

    /// Appends an entry to the request log
    fn log_request(&mut self, run_id: i64, entry: &RequestLogEntry) -> StorageResult<()>;

    /// Counts logged requests per outcome
    fn count_requests_by_outcome(&self, run_id: i64)
        -> StorageResult<HashMap<RequestOutcome, u64>>;

    /// Counts logged requests per stage
    fn count_requests_by_stage(&self, run_id: i64) -> StorageResult<HashMap<String, u64>>;

    // ===== Warnings =====

    /// Stores a warning reported by a stage
    fn record_warning(
        &mut self,
        run_id: i64,
        url: &str,
        warning: &StageWarning,
    ) -> StorageResult<()>;

    /// Counts warnings per kind
    fn count_warnings_by_kind(&self, run_id: i64) -> StorageResult<HashMap<String, u64>>;
}
