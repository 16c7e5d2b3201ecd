//! Dispatcher and worker pool
//!
//! The dispatcher pulls pending requests from the shared [`Frontier`], runs
//! the page handler for each one on a tokio task and feeds the outcome back
//! into the frontier's retry policy. It owns the checkpoint cadence: every
//! `checkpoint_interval`, when the shutdown future resolves, on a fatal error
//! and when the crawl drains.

use crate::config::CrawlerConfig;
use crate::crawler::frontier::{Frontier, RetryDecision};
use crate::crawler::pool::PoolSizer;
use crate::state::RequestRecord;
use crate::HarvestError;
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{Id, JoinSet};
use tokio::time::MissedTickBehavior;

/// Processes one request
///
/// Returning an error counts as a failed attempt unless the error is fatal,
/// in which case the whole crawl stops.
#[async_trait]
pub trait PageHandler: Send + Sync {
    async fn handle(&self, request: &RequestRecord) -> Result<(), HarvestError>;
}

/// Persists crawl progress
pub trait Checkpointer: Send + Sync {
    fn checkpoint(&self) -> Result<(), HarvestError>;
}

/// Dispatcher tuning
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub min_concurrency: usize,
    pub max_concurrency: usize,

    /// Budget for one handler invocation, excluding the politeness delay
    pub page_timeout: Duration,

    /// Pause before each handler invocation
    pub politeness_delay: Duration,

    pub checkpoint_interval: Duration,
}

impl From<&CrawlerConfig> for DispatcherConfig {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            min_concurrency: config.min_concurrency as usize,
            max_concurrency: config.max_concurrency as usize,
            page_timeout: Duration::from_secs(config.page_timeout_secs),
            politeness_delay: Duration::from_millis(config.politeness_delay_ms),
            checkpoint_interval: Duration::from_secs(config.checkpoint_interval_secs),
        }
    }
}

/// What happened during one dispatcher run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub handled: u64,
    pub retried: u64,
    pub dropped: u64,
    pub peak_concurrency: usize,

    /// True when the run stopped on the shutdown signal
    pub interrupted: bool,
}

/// Runs page handlers over the frontier with bounded concurrency
pub struct Dispatcher {
    frontier: Arc<Frontier>,
    handler: Arc<dyn PageHandler>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        frontier: Arc<Frontier>,
        handler: Arc<dyn PageHandler>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            frontier,
            handler,
            config,
        }
    }

    /// Runs until the frontier drains, a fatal error occurs or `shutdown` resolves
    ///
    /// On shutdown, in-flight tasks are aborted; their requests are still
    /// in progress in the final checkpoint and return to pending on the next
    /// start.
    ///
    /// # Arguments
    ///
    /// * `checkpointer` - Persists the frontier and quota
    /// * `shutdown` - Resolves when the crawl should stop early
    pub async fn run<S>(
        &self,
        checkpointer: &dyn Checkpointer,
        shutdown: S,
    ) -> Result<DispatchReport, HarvestError>
    where
        S: Future<Output = ()>,
    {
        let mut report = DispatchReport::default();
        let mut sizer = PoolSizer::new(self.config.min_concurrency, self.config.max_concurrency);
        let mut tasks: JoinSet<Result<(), HarvestError>> = JoinSet::new();
        let mut in_flight: HashMap<Id, RequestRecord> = HashMap::new();

        let mut ticker = tokio::time::interval(self.config.checkpoint_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        tokio::pin!(shutdown);

        tracing::info!(
            pending = self.frontier.pending_len(),
            min_concurrency = sizer.current(),
            max_concurrency = sizer.max(),
            "Dispatcher started"
        );

        loop {
            let limit = sizer.adjust(self.frontier.pending_len());
            while tasks.len() < limit {
                let Some(request) = self.frontier.fetch_next() else {
                    break;
                };
                let handle = tasks.spawn(self.invoke(request.clone()));
                in_flight.insert(handle.id(), request);
                report.peak_concurrency = report.peak_concurrency.max(tasks.len());
            }

            if tasks.is_empty() {
                // Nothing pending and nothing left that could add more
                break;
            }

            tokio::select! {
                joined = tasks.join_next_with_id() => {
                    let Some(joined) = joined else { continue };

                    let (id, outcome) = match joined {
                        Ok((id, result)) => (id, result),
                        Err(join_error) => {
                            let id = join_error.id();
                            let message = if join_error.is_panic() {
                                panic_message(join_error.into_panic())
                            } else {
                                "task cancelled".to_string()
                            };
                            let url = in_flight
                                .get(&id)
                                .map(|request| request.url.clone())
                                .unwrap_or_default();
                            (id, Err(HarvestError::WorkerPanic { url, message }))
                        }
                    };

                    let Some(request) = in_flight.remove(&id) else {
                        tracing::warn!(task = %id, "Finished task has no request attached");
                        continue;
                    };

                    self.settle(&request, outcome, &mut report, checkpointer)?;
                }
                _ = ticker.tick() => {
                    checkpointer.checkpoint()?;
                    tracing::debug!(
                        pending = self.frontier.pending_len(),
                        in_flight = tasks.len(),
                        "Periodic checkpoint written"
                    );
                }
                _ = &mut shutdown => {
                    tracing::warn!(in_flight = tasks.len(), "Shutdown requested, saving progress");
                    tasks.abort_all();
                    checkpointer.checkpoint()?;
                    report.interrupted = true;
                    return Ok(report);
                }
            }
        }

        checkpointer.checkpoint()?;
        tracing::info!(
            handled = report.handled,
            retried = report.retried,
            dropped = report.dropped,
            "Frontier drained"
        );

        Ok(report)
    }

    /// Builds the task body for one request
    fn invoke(
        &self,
        request: RequestRecord,
    ) -> impl Future<Output = Result<(), HarvestError>> + Send + 'static {
        let handler = Arc::clone(&self.handler);
        let delay = self.config.politeness_delay;
        let timeout = self.config.page_timeout;

        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            tracing::debug!(url = %request.url, label = %request.label, attempt = request.retry_count + 1, "Processing request");

            match tokio::time::timeout(timeout, handler.handle(&request)).await {
                Ok(result) => result,
                Err(_) => Err(HarvestError::Timeout {
                    url: request.url.clone(),
                    seconds: timeout.as_secs(),
                }),
            }
        }
    }

    /// Applies the outcome of one attempt to the frontier
    fn settle(
        &self,
        request: &RequestRecord,
        outcome: Result<(), HarvestError>,
        report: &mut DispatchReport,
        checkpointer: &dyn Checkpointer,
    ) -> Result<(), HarvestError> {
        let error = match outcome {
            Ok(()) => {
                self.frontier.mark_handled(&request.url);
                report.handled += 1;
                return Ok(());
            }
            Err(error) => error,
        };

        if error.is_fatal() {
            tracing::error!(url = %request.url, error = %error, "Fatal error, stopping crawl");
            if let Err(checkpoint_error) = checkpointer.checkpoint() {
                tracing::error!(error = %checkpoint_error, "Failed to save progress after fatal error");
            }
            return Err(error);
        }

        match self.frontier.mark_failed(&request.url, &error.to_string()) {
            RetryDecision::Retry { attempt } => {
                report.retried += 1;
                tracing::warn!(url = %request.url, attempt, error = %error, "Request failed, retrying");
            }
            RetryDecision::GiveUp => {
                report.dropped += 1;
                tracing::error!(
                    url = %request.url,
                    attempts = request.retry_count + 1,
                    error = %error,
                    "Request failed too many times, dropping"
                );
            }
        }

        Ok(())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
