//! Crawler coordinator - run lifecycle and wiring
//!
//! This module contains the top-level crawl orchestration:
//! - Opening storage and deciding between resuming and starting a new run
//! - Restoring the frontier and quota counter from the last checkpoint
//! - Seeding start URLs idempotently
//! - Running the dispatcher and recording the run outcome

use crate::config::Config;
use crate::crawler::dispatcher::{Checkpointer, Dispatcher, DispatcherConfig, PageHandler};
use crate::crawler::fetcher::build_http_client;
use crate::crawler::frontier::{Frontier, FrontierSnapshot};
use crate::crawler::handler::{ContinuationPolicy, TraversalHandler};
use crate::crawler::parser::{SelectorSite, SiteParser};
use crate::extension::ExtensionRegistry;
use crate::output::{CrawlSummary, JsonLinesSink, OutputSink, SqliteItemSink};
use crate::state::{Label, QuotaTracker, RequestRecord};
use crate::storage::{open_storage, RunStatus, SqliteStorage, Storage, StorageError};
use crate::url::normalize_url;
use crate::HarvestError;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: Arc<Mutex<dyn Storage>>,
    frontier: Arc<Frontier>,
    quota: Arc<QuotaTracker>,
    handler: Arc<TraversalHandler>,
    sink: Arc<dyn OutputSink>,
    run_id: i64,
}

impl Coordinator {
    /// Creates a coordinator for the configured site
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `config_hash` - Hash of the configuration file, stored on new runs
    /// * `fresh` - Discard saved progress instead of resuming
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Storage opened, progress restored, start URLs seeded
    /// * `Err(HarvestError)` - Configuration or storage failure
    pub fn new(config: Config, config_hash: &str, fresh: bool) -> Result<Self, HarvestError> {
        let site = SelectorSite::from_config(&config.site)?;
        Self::with_parts(
            config,
            config_hash,
            fresh,
            &ExtensionRegistry::with_builtins(),
            Arc::new(site),
        )
    }

    /// Creates a coordinator with a custom extension registry and site parser
    pub fn with_parts(
        config: Config,
        config_hash: &str,
        fresh: bool,
        registry: &ExtensionRegistry,
        site: Arc<dyn SiteParser>,
    ) -> Result<Self, HarvestError> {
        // Configuration problems surface before the database is touched
        let extension = config
            .input
            .extend_output
            .as_deref()
            .map(|name| registry.resolve(name))
            .transpose()?;
        let client = build_http_client(&config.network)?;

        let mut storage = open_storage(Path::new(&config.output.database_path))?;
        let run_id = open_run(&mut storage, config_hash, fresh)?;

        let snapshot = FrontierSnapshot {
            records: storage.load_frontier()?,
        };
        let frontier = Arc::new(Frontier::restore(config.crawler.max_retries, snapshot));
        let quota = Arc::new(QuotaTracker::restore(
            config.input.max_items,
            storage.load_quota_count()?,
        ));
        tracing::info!(
            count = quota.count(),
            limit = ?quota.limit(),
            "Item quota restored"
        );

        let storage: Arc<Mutex<dyn Storage>> = Arc::new(Mutex::new(storage));

        let sink: Arc<dyn OutputSink> = match &config.output.dataset_path {
            Some(path) => {
                let sink = JsonLinesSink::open(Path::new(path))?;
                tracing::info!(path = %sink.path().display(), "Writing items to dataset file");
                Arc::new(sink)
            }
            None => Arc::new(SqliteItemSink::new(Arc::clone(&storage), run_id)),
        };

        seed_start_urls(&config, site.as_ref(), &frontier, &quota);

        let handler = TraversalHandler::new(
            client,
            site,
            Arc::clone(&frontier),
            Arc::clone(&quota),
            Arc::clone(&sink),
        )
        .with_policy(ContinuationPolicy {
            max_listing_pages: config.crawler.max_listing_pages,
        })
        .with_extension(extension);

        let coordinator = Self {
            config: Arc::new(config),
            storage,
            frontier,
            quota,
            handler: Arc::new(handler),
            sink,
            run_id,
        };

        // Seeds are durable before the first page is fetched
        coordinator.checkpointer().checkpoint()?;

        Ok(coordinator)
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn frontier(&self) -> &Arc<Frontier> {
        &self.frontier
    }

    pub fn quota(&self) -> &Arc<QuotaTracker> {
        &self.quota
    }

    /// Runs the crawl until the frontier drains
    pub async fn run(&self) -> Result<CrawlSummary, HarvestError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs the crawl until the frontier drains or `shutdown` resolves
    ///
    /// A shutdown leaves the run `interrupted` with a fresh checkpoint; a
    /// fatal error leaves it `failed`. Both are resumed on the next start.
    pub async fn run_until<S>(&self, shutdown: S) -> Result<CrawlSummary, HarvestError>
    where
        S: Future<Output = ()>,
    {
        tracing::info!(
            run_id = self.run_id,
            pending = self.frontier.pending_len(),
            known = self.frontier.len(),
            "Starting crawl"
        );

        let started = Instant::now();
        let checkpointer = self.checkpointer();
        let handler: Arc<dyn PageHandler> = Arc::clone(&self.handler) as Arc<dyn PageHandler>;
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.frontier),
            handler,
            DispatcherConfig::from(&self.config.crawler),
        );

        let outcome = dispatcher.run(&checkpointer, shutdown).await;
        let finished = self.sink.finish().map_err(HarvestError::from);

        let report = match outcome.and_then(|report| finished.map(|()| report)) {
            Ok(report) => report,
            Err(e) => {
                if let Err(status_error) = lock_storage(&self.storage)
                    .and_then(|mut s| Ok(s.update_run_status(self.run_id, RunStatus::Failed)?))
                {
                    tracing::error!(error = %status_error, "Failed to record run failure");
                }
                return Err(e);
            }
        };

        let status = if report.interrupted {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };

        {
            let mut storage = lock_storage(&self.storage)?;
            match status {
                RunStatus::Completed => storage.complete_run(self.run_id)?,
                other => storage.update_run_status(self.run_id, other)?,
            }
        }

        let summary = CrawlSummary {
            run_id: self.run_id,
            status,
            handled: report.handled,
            retried: report.retried,
            dropped: report.dropped,
            items_emitted: self.handler.items_emitted(),
            quota_count: self.quota.count(),
            quota_limit: self.quota.limit(),
            peak_concurrency: report.peak_concurrency,
            pending: self.frontier.pending_len(),
            duration_seconds: started.elapsed().as_secs(),
        };
        summary.log();

        Ok(summary)
    }

    fn checkpointer(&self) -> StateCheckpointer {
        StateCheckpointer {
            storage: Arc::clone(&self.storage),
            frontier: Arc::clone(&self.frontier),
            quota: Arc::clone(&self.quota),
        }
    }
}

/// Resumes the latest unfinished run or starts a new one
///
/// A new run always starts from empty crawl state.
fn open_run(
    storage: &mut SqliteStorage,
    config_hash: &str,
    fresh: bool,
) -> Result<i64, HarvestError> {
    let latest = storage.get_latest_run()?;

    if !fresh {
        if let Some(run) = latest.filter(|run| run.status.is_resumable()) {
            if run.config_hash != config_hash {
                tracing::warn!(
                    run_id = run.id,
                    "Configuration changed since this run started; resuming anyway"
                );
            }
            tracing::info!(run_id = run.id, status = run.status.to_db_string(), "Resuming run");
            storage.update_run_status(run.id, RunStatus::Running)?;
            return Ok(run.id);
        }
    } else {
        tracing::info!("Fresh start requested, discarding saved progress");
    }

    storage.clear_crawl_state()?;
    let run_id = storage.create_run(config_hash)?;
    tracing::info!(run_id, "Starting new run");
    Ok(run_id)
}

/// Offers every start URL to the frontier
///
/// Already-known URLs are skipped without touching the quota, so seeding is
/// safe to repeat on every start. Item start URLs reserve quota; once the
/// quota is exhausted no further start URLs are considered.
fn seed_start_urls(
    config: &Config,
    site: &dyn SiteParser,
    frontier: &Frontier,
    quota: &QuotaTracker,
) {
    let mut seeded = 0usize;

    for start in &config.input.start_urls {
        if quota.is_exhausted() {
            tracing::info!("Item quota reached, ignoring remaining start URLs");
            break;
        }

        let url = match normalize_url(&start.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(url = %start.url, error = %e, "Skipping invalid start URL");
                continue;
            }
        };

        let Some(label) = site.classify_start_url(&url) else {
            tracing::warn!(url = %url, base = %config.site.base_url, "Start URL is not on the configured site, skipping");
            continue;
        };

        if frontier.contains(url.as_str()) {
            tracing::debug!(url = %url, "Start URL already known");
            continue;
        }

        let record = match label {
            Label::Item => {
                if !quota.try_reserve(1) {
                    break;
                }
                RequestRecord::item(url.as_str())
            }
            _ => RequestRecord::seed(url.as_str()),
        };

        if frontier.add_request(record) {
            seeded += 1;
        }
    }

    tracing::info!(seeded, "Start URLs seeded");
}

/// Classifies the configured start URLs without touching storage
///
/// Used by `--dry-run`. URLs that would be skipped map to `None`.
pub fn classify_start_urls(config: &Config) -> Result<Vec<(String, Option<Label>)>, HarvestError> {
    let site = SelectorSite::from_config(&config.site)?;

    Ok(config
        .input
        .start_urls
        .iter()
        .map(|start| {
            let label = normalize_url(&start.url)
                .ok()
                .and_then(|url| site.classify_start_url(&url));
            (start.url.clone(), label)
        })
        .collect())
}

fn lock_storage<'a>(
    storage: &'a Mutex<dyn Storage + 'static>,
) -> Result<MutexGuard<'a, dyn Storage + 'static>, HarvestError> {
    storage.lock().map_err(|e| {
        HarvestError::Storage(StorageError::Database(format!(
            "Failed to lock storage: {}",
            e
        )))
    })
}

/// Writes the frontier snapshot and quota counter in one transaction
struct StateCheckpointer {
    storage: Arc<Mutex<dyn Storage>>,
    frontier: Arc<Frontier>,
    quota: Arc<QuotaTracker>,
}

impl Checkpointer for StateCheckpointer {
    fn checkpoint(&self) -> Result<(), HarvestError> {
        // Snapshot before reading the counter: reservations precede admission,
        // so the saved count is never lower than the items in the snapshot.
        let snapshot = self.frontier.snapshot();
        let quota_count = self.quota.checkpoint();

        let mut storage = lock_storage(&self.storage)?;
        storage.save_checkpoint(&snapshot.records, quota_count)?;

        tracing::trace!(
            records = snapshot.records.len(),
            quota_count,
            "Checkpoint saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::state::RequestStatus;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir, start_urls: &[&str], max_items: Option<u64>) -> Config {
        let starts = start_urls
            .iter()
            .map(|u| format!("{{ url = \"{}\" }}", u))
            .collect::<Vec<_>>()
            .join(", ");
        let max_items = max_items
            .map(|m| format!("max-items = {}", m))
            .unwrap_or_default();

        parse_config(&format!(
            r#"
[input]
start-urls = [{starts}]
{max_items}

[crawler]
politeness-delay-ms = 0

[site]
base-url = "https://shop.example.com"
item-link-selector = "a.product"
continuation-url = "https://shop.example.com/c/booties?page=2"

[output]
database-path = "{db}"
"#,
            db = dir.path().join("harvest.db").display()
        ))
        .unwrap()
    }

    #[test]
    fn test_seeding_classifies_and_reserves() {
        let dir = TempDir::new().unwrap();
        let config = test_config(
            &dir,
            &[
                "https://shop.example.com/c/booties",
                "https://shop.example.com/s/boot/123",
                "https://elsewhere.example.com/c/booties",
            ],
            None,
        );

        let coordinator = Coordinator::new(config, "hash", false).unwrap();
        let snapshot = coordinator.frontier().snapshot();

        let labels: Vec<(&str, Label)> = snapshot
            .records
            .iter()
            .map(|r| (r.url.as_str(), r.label))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("https://shop.example.com/c/booties", Label::Seed),
                ("https://shop.example.com/s/boot/123", Label::Item),
            ]
        );
        assert_eq!(coordinator.quota().count(), 1);
    }

    #[test]
    fn test_item_start_urls_respect_quota() {
        let dir = TempDir::new().unwrap();
        let config = test_config(
            &dir,
            &[
                "https://shop.example.com/s/boot/1",
                "https://shop.example.com/s/boot/2",
                "https://shop.example.com/s/boot/3",
            ],
            Some(2),
        );

        let coordinator = Coordinator::new(config, "hash", false).unwrap();
        assert_eq!(coordinator.frontier().len(), 2);
        assert_eq!(coordinator.quota().count(), 2);
    }

    #[test]
    fn test_reopening_resumes_without_reseeding() {
        let dir = TempDir::new().unwrap();
        let starts = [
            "https://shop.example.com/c/booties",
            "https://shop.example.com/s/boot/1",
        ];

        let first = Coordinator::new(test_config(&dir, &starts, Some(10)), "hash", false).unwrap();
        let run_id = first.run_id();
        let record = first.frontier().fetch_next().unwrap();
        first.checkpointer().checkpoint().unwrap();
        drop(first);

        let second = Coordinator::new(test_config(&dir, &starts, Some(10)), "hash", false).unwrap();
        assert_eq!(second.run_id(), run_id);
        assert_eq!(second.quota().count(), 1);
        assert_eq!(second.frontier().len(), 2);

        // The request that was in flight is pending again, and first in line
        let next = second.frontier().fetch_next().unwrap();
        assert_eq!(next.url, record.url);
        assert_eq!(next.status, RequestStatus::InProgress);
    }

    #[test]
    fn test_fresh_discards_progress() {
        let dir = TempDir::new().unwrap();
        let starts = ["https://shop.example.com/s/boot/1"];

        let first = Coordinator::new(test_config(&dir, &starts, None), "hash", false).unwrap();
        let run_id = first.run_id();
        drop(first);

        let fresh = Coordinator::new(test_config(&dir, &starts, None), "hash", true).unwrap();
        assert_ne!(fresh.run_id(), run_id);
        assert_eq!(fresh.quota().count(), 1);
        assert_eq!(fresh.frontier().len(), 1);
    }

    #[test]
    fn test_unknown_extension_is_rejected_before_storage() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir, &["https://shop.example.com/c/booties"], None);
        config.input.extend_output = Some("does-not-exist".to_string());

        let result = Coordinator::new(config, "hash", false);
        assert!(matches!(
            result,
            Err(HarvestError::Config(crate::ConfigError::UnknownExtension(_)))
        ));
        assert!(!dir.path().join("harvest.db").exists());
    }

    #[test]
    fn test_lock_storage_hands_out_the_shared_connection() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &["https://shop.example.com/c/booties"], None);
        let coordinator = Coordinator::new(config, "hash", false).unwrap();

        let storage = lock_storage(&coordinator.storage).unwrap();
        let run = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(run.id, coordinator.run_id());
        assert_eq!(run.status, RunStatus::Running);
    }

    #[test]
    fn test_classify_start_urls() {
        let dir = TempDir::new().unwrap();
        let config = test_config(
            &dir,
            &[
                "https://shop.example.com/c/booties",
                "https://other.example.com/c/booties",
            ],
            None,
        );

        let classified = classify_start_urls(&config).unwrap();
        assert_eq!(classified[0].1, Some(Label::Seed));
        assert_eq!(classified[1].1, None);
    }
}
