use std::sync::atomic::{AtomicU64, Ordering};

/// Tracks how many item requests have been admitted to the frontier
///
/// The count advances at enqueue time, not at completion time, so concurrent
/// listing pages cannot over-enqueue items while earlier ones are still being
/// fetched. The count never decreases.
///
/// The persisted value is injected through [`QuotaTracker::restore`] and read
/// back through [`QuotaTracker::checkpoint`]; the tracker itself never touches
/// storage.
#[derive(Debug)]
pub struct QuotaTracker {
    /// Maximum number of item requests; `None` means unlimited
    limit: Option<u64>,

    /// Item requests admitted so far
    count: AtomicU64,
}

impl QuotaTracker {
    /// Creates a tracker starting at zero
    ///
    /// A limit of `Some(0)` is treated as unlimited, matching an unset
    /// `max-items`.
    pub fn new(limit: Option<u64>) -> Self {
        Self::restore(limit, None)
    }

    /// Creates a tracker from a persisted count (defaults to 0 when absent)
    pub fn restore(limit: Option<u64>, persisted: Option<u64>) -> Self {
        Self {
            limit: limit.filter(|l| *l > 0),
            count: AtomicU64::new(persisted.unwrap_or(0)),
        }
    }

    /// Atomically reserves `n` slots
    ///
    /// Succeeds when the tracker is unlimited or `count < limit`; on success
    /// the count grows by `n`. On failure nothing is mutated. A reservation
    /// that starts below the limit may end above it when `n > 1`.
    pub fn try_reserve(&self, n: u64) -> bool {
        let Some(limit) = self.limit else {
            self.count.fetch_add(n, Ordering::SeqCst);
            return true;
        };

        self.count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < limit).then(|| current.saturating_add(n))
            })
            .is_ok()
    }

    /// Returns the current count for persistence
    pub fn checkpoint(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    /// Returns the current count
    pub fn count(&self) -> u64 {
        self.checkpoint()
    }

    /// Returns the configured limit, if any
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Returns true once no further reservation can succeed
    pub fn is_exhausted(&self) -> bool {
        match self.limit {
            Some(limit) => self.count() >= limit,
            None => false,
        }
    }
}
