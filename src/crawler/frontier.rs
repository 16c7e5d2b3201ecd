//! Frontier store for the crawl
//!
//! This module handles:
//! - Deduplicated admission of requests keyed by normalized URL
//! - FIFO hand-out of pending requests to workers
//! - The retry decision after a failed attempt
//! - Snapshots for checkpointing and restoring after a restart
//!
//! Every operation takes the lock once, so check-and-insert and
//! check-and-transition are atomic with respect to concurrent workers.

use crate::state::{RequestRecord, RequestStatus};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// Outcome of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The request went back to the end of the pending queue
    Retry {
        /// Number of failed attempts so far
        attempt: u32,
    },

    /// Retries are exhausted; the request is now `failed`
    GiveUp,
}

/// Point-in-time copy of every known request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontierSnapshot {
    /// All records, ordered by insertion sequence
    pub records: Vec<RequestRecord>,
}

#[derive(Debug, Default)]
struct FrontierInner {
    /// Every URL ever admitted
    records: HashMap<String, RequestRecord>,

    /// URLs waiting for a worker, in ascending `seq` order
    pending: VecDeque<String>,

    in_progress: usize,

    next_seq: u64,
}

impl FrontierInner {
    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// The shared crawl frontier
#[derive(Debug)]
pub struct Frontier {
    inner: Mutex<FrontierInner>,
    max_retries: u32,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `max_retries` - Retries allowed after the first failed attempt
    pub fn new(max_retries: u32) -> Self {
        Self {
            inner: Mutex::new(FrontierInner::default()),
            max_retries,
        }
    }

    /// Rebuilds a frontier from a checkpoint
    ///
    /// Records that were in progress when the snapshot was taken go back to
    /// pending. Pending order follows the original insertion sequence, so
    /// interrupted work runs before anything discovered after the restart.
    /// Handled and failed records stay known and are never handed out again.
    pub fn restore(max_retries: u32, snapshot: FrontierSnapshot) -> Self {
        let mut records = snapshot.records;
        records.sort_by_key(|record| record.seq);

        let mut inner = FrontierInner::default();
        for mut record in records {
            if inner.records.contains_key(&record.url) {
                continue;
            }

            if record.status == RequestStatus::InProgress {
                record.status = RequestStatus::Pending;
            }
            if record.status == RequestStatus::Pending {
                inner.pending.push_back(record.url.clone());
            }

            inner.next_seq = inner.next_seq.max(record.seq + 1);
            inner.records.insert(record.url.clone(), record);
        }

        tracing::info!(
            known = inner.records.len(),
            pending = inner.pending.len(),
            "Restored frontier from checkpoint"
        );

        Self {
            inner: Mutex::new(inner),
            max_retries,
        }
    }

    /// Admits a request unless its URL is already known
    ///
    /// The record's status is forced to pending and its sequence number is
    /// assigned here.
    ///
    /// # Returns
    ///
    /// `true` if the request was new and is now pending
    pub fn add_request(&self, mut record: RequestRecord) -> bool {
        let mut inner = self.inner.lock();
        if inner.records.contains_key(&record.url) {
            tracing::trace!(url = %record.url, "Skipping known request");
            return false;
        }

        record.status = RequestStatus::Pending;
        record.seq = inner.take_seq();
        inner.pending.push_back(record.url.clone());
        tracing::trace!(url = %record.url, label = %record.label, seq = record.seq, "Admitted request");
        inner.records.insert(record.url.clone(), record);
        true
    }

    /// Returns true if the URL was ever admitted
    pub fn contains(&self, url: &str) -> bool {
        self.inner.lock().records.contains_key(url)
    }

    /// Hands out the oldest pending request and marks it in progress
    ///
    /// `None` only means nothing is pending right now; in-flight work may
    /// still add more.
    pub fn fetch_next(&self) -> Option<RequestRecord> {
        let mut inner = self.inner.lock();
        let url = inner.pending.pop_front()?;

        let record = inner.records.get_mut(&url)?;
        record.status = RequestStatus::InProgress;
        let record = record.clone();

        inner.in_progress += 1;
        Some(record)
    }

    /// Marks an in-progress request as permanently done
    pub fn mark_handled(&self, url: &str) {
        let mut inner = self.inner.lock();
        let was_in_progress = match inner.records.get_mut(url) {
            Some(record) if record.status == RequestStatus::InProgress => {
                record.status = RequestStatus::Handled;
                true
            }
            _ => false,
        };

        if was_in_progress {
            inner.in_progress -= 1;
        } else {
            tracing::warn!(url = %url, "mark_handled on a request that is not in progress");
        }
    }

    /// Records a failed attempt and decides whether to retry
    ///
    /// The retry count is incremented first. While it stays within
    /// `max_retries` the request is re-queued at the back of the pending
    /// queue; otherwise it becomes `failed` for good.
    pub fn mark_failed(&self, url: &str, error: &str) -> RetryDecision {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;

        let Some(record) = inner.records.get_mut(url) else {
            tracing::warn!(url = %url, "mark_failed on an unknown request");
            return RetryDecision::GiveUp;
        };
        if record.status != RequestStatus::InProgress {
            tracing::warn!(url = %url, status = %record.status, "mark_failed on a request that is not in progress");
            return RetryDecision::GiveUp;
        }

        record.retry_count += 1;
        record.last_error = Some(error.to_string());

        let decision = if record.retry_count <= self.max_retries {
            record.status = RequestStatus::Pending;
            // Re-sequenced so pending order and seq order never disagree
            record.seq = seq;
            RetryDecision::Retry {
                attempt: record.retry_count,
            }
        } else {
            record.status = RequestStatus::Failed;
            RetryDecision::GiveUp
        };

        inner.in_progress -= 1;
        if let RetryDecision::Retry { .. } = decision {
            inner.next_seq += 1;
            inner.pending.push_back(url.to_string());
        }

        decision
    }

    /// Number of requests waiting for a worker
    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Number of requests handed out and not yet resolved
    pub fn in_progress_len(&self) -> usize {
        self.inner.lock().in_progress
    }

    /// Number of URLs ever admitted
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true when nothing is pending and nothing is in flight
    pub fn is_drained(&self) -> bool {
        let inner = self.inner.lock();
        inner.pending.is_empty() && inner.in_progress == 0
    }

    /// Copies every known record for checkpointing
    pub fn snapshot(&self) -> FrontierSnapshot {
        let inner = self.inner.lock();
        let mut records: Vec<RequestRecord> = inner.records.values().cloned().collect();
        records.sort_by_key(|record| record.seq);
        FrontierSnapshot { records }
    }
}
