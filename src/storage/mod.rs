//! Storage module for persisting harvest data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Run tracking
//! - Record persistence and reload for export
//! - The request log and stage warnings

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::HarvestError;

use std::path::Path;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// What happened to one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestOutcome {
    /// Fetched and produced records, follow-ups or warnings
    Processed,
    /// Fetched but the stage found nothing to extract
    Empty,
    /// Non-success HTTP status
    HttpError,
    /// Connection, timeout or body read failure
    NetworkError,
    /// Never fetched because the request budget ran out
    Skipped,
}

impl RequestOutcome {
    pub const ALL: [RequestOutcome; 5] = [
        Self::Processed,
        Self::Empty,
        Self::HttpError,
        Self::NetworkError,
        Self::Skipped,
    ];

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Empty => "empty",
            Self::HttpError => "http_error",
            Self::NetworkError => "network_error",
            Self::Skipped => "skipped",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "processed" => Some(Self::Processed),
            "empty" => Some(Self::Empty),
            "http_error" => Some(Self::HttpError),
            "network_error" => Some(Self::NetworkError),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::HttpError | Self::NetworkError)
    }
}

/// One row of the request log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLogEntry {
    pub url: String,
    /// Stage the response was (or would have been) dispatched to
    pub stage: String,
    pub outcome: RequestOutcome,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
    pub record_count: u32,
    pub follow_up_count: u32,
}
