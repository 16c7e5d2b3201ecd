//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{Label, RequestRecord, RequestStatus};
use crate::storage::schema::{initialize_schema, QUOTA_COUNT_KEY};
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const REQUEST_COLUMNS: &str =
    "url, label, depth, retry_count, status, seq, error_message";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

/// Maps a row selected with `REQUEST_COLUMNS` to a record
fn request_from_row(row: &Row<'_>) -> rusqlite::Result<RequestRecord> {
    Ok(RequestRecord {
        url: row.get(0)?,
        label: Label::from_db_string(&row.get::<_, String>(1)?).unwrap_or(Label::Seed),
        depth: row.get::<_, i64>(2)? as u32,
        retry_count: row.get::<_, i64>(3)? as u32,
        status: RequestStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RequestStatus::Pending),
        seq: row.get::<_, i64>(5)? as u64,
        last_error: row.get(6)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![RunStatus::Completed.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Checkpointing =====

    fn load_frontier(&self) -> StorageResult<Vec<RequestRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM requests ORDER BY seq",
            REQUEST_COLUMNS
        ))?;

        let records = stmt
            .query_map([], request_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn save_checkpoint(
        &mut self,
        records: &[RequestRecord],
        quota_count: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        {
            // Membership is monotonic, so an upsert per record is a full snapshot
            let mut stmt = tx.prepare_cached(
                "INSERT INTO requests
                 (url, label, depth, retry_count, status, seq, error_message, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(url) DO UPDATE SET
                    label = excluded.label,
                    depth = excluded.depth,
                    retry_count = excluded.retry_count,
                    status = excluded.status,
                    seq = excluded.seq,
                    error_message = excluded.error_message,
                    updated_at = excluded.updated_at",
            )?;

            for record in records {
                stmt.execute(params![
                    record.url,
                    record.label.to_db_string(),
                    record.depth as i64,
                    record.retry_count as i64,
                    record.status.to_db_string(),
                    record.seq as i64,
                    record.last_error,
                    now,
                ])?;
            }
        }

        tx.execute(
            "INSERT OR REPLACE INTO crawl_state (key, value) VALUES (?1, ?2)",
            params![QUOTA_COUNT_KEY, quota_count.to_string()],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn load_quota_count(&self) -> StorageResult<Option<u64>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM crawl_state WHERE key = ?1",
                params![QUOTA_COUNT_KEY],
                |row| row.get(0),
            )
            .optional()?;

        value
            .map(|v| {
                v.parse::<u64>().map_err(|e| {
                    StorageError::Serialization(format!(
                        "Invalid {} '{}': {}",
                        QUOTA_COUNT_KEY, v, e
                    ))
                })
            })
            .transpose()
    }

    fn clear_crawl_state(&mut self) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM requests", [])?;
        tx.execute("DELETE FROM crawl_state", [])?;
        tx.commit()?;
        Ok(())
    }

    // ===== Items =====

    fn insert_item(
        &mut self,
        run_id: i64,
        url: &str,
        item_id: Option<&str>,
        payload: &str,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO items (run_id, url, item_id, payload, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id, url, item_id, payload, now],
        )?;
        Ok(())
    }

    fn count_items(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Statistics =====

    fn count_requests_by_status(&self, status: RequestStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM requests WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_requests_by_label(&self, label: Label) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM requests WHERE label = ?1",
            params![label.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_failed_requests(&self) -> StorageResult<Vec<RequestRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM requests WHERE status = ?1 ORDER BY seq",
            REQUEST_COLUMNS
        ))?;

        let records = stmt
            .query_map(
                params![RequestStatus::Failed.to_db_string()],
                request_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, label: Label, status: RequestStatus, seq: u64) -> RequestRecord {
        let mut record = RequestRecord::new(url, label, 0);
        record.status = status;
        record.seq = seq;
        record
    }

    #[test]
    fn test_create_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("test_hash").unwrap();
        assert!(run_id > 0);

        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.config_hash, "test_hash");
    }

    #[test]
    fn test_latest_run_and_completion() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage.get_latest_run().unwrap().is_none());

        let first = storage.create_run("a").unwrap();
        let second = storage.create_run("b").unwrap();
        storage.complete_run(second).unwrap();

        let latest = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(latest.id, second);
        assert_eq!(latest.status, RunStatus::Completed);
        assert!(latest.finished_at.is_some());

        storage
            .update_run_status(first, RunStatus::Interrupted)
            .unwrap();
        assert_eq!(
            storage.get_run(first).unwrap().status,
            RunStatus::Interrupted
        );
    }

    #[test]
    fn test_missing_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.get_run(42),
            Err(StorageError::RunNotFound(42))
        ));
        assert!(storage.complete_run(42).is_err());
    }

    #[test]
    fn test_checkpoint_roundtrip() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert_eq!(storage.load_quota_count().unwrap(), None);

        let mut failed = record("https://example.com/p/2", Label::Item, RequestStatus::Failed, 2);
        failed.retry_count = 2;
        failed.last_error = Some("HTTP 500".to_string());

        let records = vec![
            record("https://example.com/c", Label::Seed, RequestStatus::Handled, 0),
            record("https://example.com/p/1", Label::Item, RequestStatus::InProgress, 1),
            failed.clone(),
        ];
        storage.save_checkpoint(&records, 2).unwrap();

        let loaded = storage.load_frontier().unwrap();
        assert_eq!(loaded, records);
        assert_eq!(storage.load_quota_count().unwrap(), Some(2));
        assert_eq!(storage.get_failed_requests().unwrap(), vec![failed]);
    }

    #[test]
    fn test_checkpoint_upserts_existing_records() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();

        let mut item = record("https://example.com/p/1", Label::Item, RequestStatus::Pending, 0);
        storage.save_checkpoint(&[item.clone()], 1).unwrap();

        item.status = RequestStatus::Handled;
        storage.save_checkpoint(&[item.clone()], 1).unwrap();

        let loaded = storage.load_frontier().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].status, RequestStatus::Handled);
        assert_eq!(
            storage
                .count_requests_by_status(RequestStatus::Handled)
                .unwrap(),
            1
        );
        assert_eq!(storage.count_requests_by_label(Label::Item).unwrap(), 1);
    }

    #[test]
    fn test_clear_crawl_state() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let records = vec![record(
            "https://example.com/c",
            Label::Seed,
            RequestStatus::Pending,
            0,
        )];
        storage.save_checkpoint(&records, 7).unwrap();

        storage.clear_crawl_state().unwrap();

        assert!(storage.load_frontier().unwrap().is_empty());
        assert_eq!(storage.load_quota_count().unwrap(), None);
    }

    #[test]
    fn test_items() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("hash").unwrap();

        storage
            .insert_item(run_id, "https://example.com/p/1", Some("1"), "{\"itemId\":\"1\"}")
            .unwrap();
        storage
            .insert_item(run_id, "https://example.com/p/2", None, "{}")
            .unwrap();

        assert_eq!(storage.count_items().unwrap(), 2);
    }
}
