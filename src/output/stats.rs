//! Statistics generation from crawl database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::state::{Label, RequestStatus};
use crate::storage::{RunRecord, Storage};
use crate::HarvestError;
use std::collections::HashMap;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Total number of requests ever admitted
    pub total_requests: u64,

    /// Count of requests by lifecycle status
    pub requests_by_status: HashMap<RequestStatus, u64>,

    /// Count of requests by label
    pub requests_by_label: HashMap<Label, u64>,

    /// Persisted quota counter
    pub quota_count: Option<u64>,

    /// Items stored in the database sink
    pub items_stored: u64,

    /// Requests that exhausted their retries, with the last error
    pub failed: Vec<(String, Option<String>)>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<CrawlStatistics, HarvestError> {
    let mut requests_by_status = HashMap::new();
    for status in RequestStatus::all_statuses() {
        let count = storage.count_requests_by_status(status)?;
        if count > 0 {
            requests_by_status.insert(status, count);
        }
    }

    let mut requests_by_label = HashMap::new();
    for label in [Label::Seed, Label::Listing, Label::Item] {
        let count = storage.count_requests_by_label(label)?;
        if count > 0 {
            requests_by_label.insert(label, count);
        }
    }

    let failed = storage
        .get_failed_requests()?
        .into_iter()
        .map(|record| (record.url, record.last_error))
        .collect();

    Ok(CrawlStatistics {
        latest_run: storage.get_latest_run()?,
        total_requests: requests_by_status.values().sum(),
        requests_by_status,
        requests_by_label,
        quota_count: storage.load_quota_count()?,
        items_stored: storage.count_items()?,
        failed,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    if let Some(run) = &stats.latest_run {
        println!("Latest run:");
        println!("  ID: {}", run.id);
        println!("  Status: {}", run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!();
    }

    println!("Overview:");
    println!("  Total requests: {}", stats.total_requests);
    println!(
        "  Item quota counter: {}",
        stats
            .quota_count
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("  Items stored in database: {}", stats.items_stored);
    println!();

    println!("Requests by Status:");
    for status in RequestStatus::all_statuses() {
        let count = stats.requests_by_status.get(&status).copied().unwrap_or(0);
        let percentage = if stats.total_requests > 0 {
            (count as f64 / stats.total_requests as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    println!("Requests by Label:");
    for label in [Label::Seed, Label::Listing, Label::Item] {
        let count = stats.requests_by_label.get(&label).copied().unwrap_or(0);
        println!("  {}: {}", label, count);
    }
    println!();

    if !stats.failed.is_empty() {
        println!("Failed Requests ({}):", stats.failed.len());
        for (url, error) in &stats.failed {
            match error {
                Some(error) => println!("  - {} ({})", url, error),
                None => println!("  - {}", url),
            }
        }
        println!();
    }
}
