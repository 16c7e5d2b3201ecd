//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{Label, RequestRecord, RequestStatus};
use crate::storage::{RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Holds the durable half of the crawl: run bookkeeping, the frontier
/// snapshot, the quota counter and (optionally) emitted items. Callers share
/// one instance behind a mutex.
pub trait Storage: Send {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()>;

    // ===== Checkpointing =====

    /// Loads every persisted request, ordered by insertion sequence
    fn load_frontier(&self) -> StorageResult<Vec<RequestRecord>>;

    /// Persists a frontier snapshot and the quota counter atomically
    ///
    /// # Arguments
    ///
    /// * `records` - Every record known to the frontier
    /// * `quota_count` - Current value of the quota counter
    fn save_checkpoint(&mut self, records: &[RequestRecord], quota_count: u64)
        -> StorageResult<()>;

    /// Loads the persisted quota counter, if one was ever saved
    fn load_quota_count(&self) -> StorageResult<Option<u64>>;

    /// Discards the frontier snapshot and quota counter
    fn clear_crawl_state(&mut self) -> StorageResult<()>;

    // ===== Items =====

    /// Appends one emitted item record
    ///
    /// # Arguments
    ///
    /// * `run_id` - The run that produced the item
    /// * `url` - The item page URL
    /// * `item_id` - Site identifier of the item, when extracted
    /// * `payload` - The full record serialized as JSON
    fn insert_item(
        &mut self,
        run_id: i64,
        url: &str,
        item_id: Option<&str>,
        payload: &str,
    ) -> StorageResult<()>;

    /// Counts stored item records across all runs
    fn count_items(&self) -> StorageResult<u64>;

    // ===== Statistics =====

    /// Counts persisted requests in a given status
    fn count_requests_by_status(&self, status: RequestStatus) -> StorageResult<u64>;

    /// Counts persisted requests with a given label
    fn count_requests_by_label(&self, label: Label) -> StorageResult<u64>;

    /// Gets requests that exhausted their retries
    fn get_failed_requests(&self) -> StorageResult<Vec<RequestRecord>>;
}
