//! SQLite-based output sink implementation
//!
//! This module provides an output sink that records items directly to the
//! crawl database when no dataset file is configured.

use crate::output::record::ItemRecord;
use crate::output::traits::{OutputError, OutputResult, OutputSink};
use crate::storage::Storage;
use std::sync::{Arc, Mutex};

/// SQLite-based output sink
///
/// Items are written to the `items` table of the same database that holds
/// the crawl state, tagged with the current run.
pub struct SqliteItemSink {
    storage: Arc<Mutex<dyn Storage>>,
    run_id: i64,
}

impl SqliteItemSink {
    /// Creates a new SQLite item sink
    ///
    /// # Arguments
    ///
    /// * `storage` - The storage backend to use
    /// * `run_id` - The current run ID
    pub fn new(storage: Arc<Mutex<dyn Storage>>, run_id: i64) -> Self {
        Self { storage, run_id }
    }
}

impl OutputSink for SqliteItemSink {
    fn push(&self, record: &ItemRecord) -> OutputResult<()> {
        let payload = serde_json::to_string(&record.to_json())?;

        let mut storage = self
            .storage
            .lock()
            .map_err(|e| OutputError::Storage(format!("Failed to lock storage: {}", e)))?;

        let item_id = Some(record.fields.item_id.as_str()).filter(|id| !id.is_empty());

        storage
            .insert_item(self.run_id, &record.fields.url, item_id, &payload)
            .map_err(|e| OutputError::Storage(e.to_string()))?;

        Ok(())
    }
}
