//! Output sink traits and types
//!
//! This module defines the trait interface for output sinks and the
//! end-of-run summary.

use crate::output::record::ItemRecord;
use crate::storage::RunStatus;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Trait for append-only output sinks
///
/// Sinks are shared by every worker task, so `push` takes `&self` and
/// implementations serialize writes internally.
pub trait OutputSink: Send + Sync {
    /// Appends one finished record
    ///
    /// # Arguments
    ///
    /// * `record` - The record to store
    fn push(&self, record: &ItemRecord) -> OutputResult<()>;

    /// Flushes buffered records; called once when the run ends
    fn finish(&self) -> OutputResult<()> {
        Ok(())
    }
}

/// Summary of a single crawl run
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub run_id: i64,
    pub status: RunStatus,

    /// Requests handled successfully in this run
    pub handled: u64,

    /// Failed attempts that were re-enqueued
    pub retried: u64,

    /// Requests dropped after exhausting their retries
    pub dropped: u64,

    /// Records pushed to the output sink in this run
    pub items_emitted: u64,

    /// Item requests admitted so far, across restarts
    pub quota_count: u64,
    pub quota_limit: Option<u64>,

    /// Highest number of simultaneously running handlers
    pub peak_concurrency: usize,

    /// Requests still pending when the run stopped
    pub pending: usize,

    pub duration_seconds: u64,
}

impl CrawlSummary {
    /// Returns true when the quota stopped item discovery
    pub fn quota_reached(&self) -> bool {
        matches!(self.quota_limit, Some(limit) if self.quota_count >= limit)
    }

    /// Logs the summary through `tracing`
    pub fn log(&self) {
        tracing::info!(
            run_id = self.run_id,
            status = self.status.to_db_string(),
            handled = self.handled,
            retried = self.retried,
            dropped = self.dropped,
            items = self.items_emitted,
            quota = self.quota_count,
            peak_concurrency = self.peak_concurrency,
            pending = self.pending,
            duration_secs = self.duration_seconds,
            "Crawl finished"
        );

        if self.quota_reached() {
            tracing::info!("Item quota of {:?} reached", self.quota_limit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(quota_count: u64, quota_limit: Option<u64>) -> CrawlSummary {
        CrawlSummary {
            run_id: 1,
            status: RunStatus::Completed,
            handled: 0,
            retried: 0,
            dropped: 0,
            items_emitted: 0,
            quota_count,
            quota_limit,
            peak_concurrency: 0,
            pending: 0,
            duration_seconds: 0,
        }
    }

    #[test]
    fn test_quota_reached() {
        assert!(summary(3, Some(3)).quota_reached());
        assert!(!summary(2, Some(3)).quota_reached());
        assert!(!summary(500, None).quota_reached());
    }
}
