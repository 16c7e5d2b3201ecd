//! Label-driven page handler
//!
//! | Label | Work |
//! |-------|------|
//! | `seed` | enqueue item links (quota-gated), then the configured continuation listing |
//! | `listing` | enqueue item links (quota-gated); follows a next-page anchor only if the policy allows |
//! | `item` | extract fields, apply the output extension, push to the sink |

use crate::crawler::dispatcher::PageHandler;
use crate::crawler::fetcher::fetch_page;
use crate::crawler::frontier::Frontier;
use crate::crawler::parser::SiteParser;
use crate::extension::{self, OutputExtension};
use crate::output::{ItemRecord, OutputSink};
use crate::state::{Label, QuotaTracker, RequestRecord};
use crate::url::normalize_url;
use crate::HarvestError;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use url::Url;

/// Decides whether a page spawns a listing continuation
///
/// A seed always continues into the configured continuation URL. Deeper
/// hops follow next-page anchors up to `max_listing_pages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuationPolicy {
    /// Deepest listing page a seed may chain into
    pub max_listing_pages: u32,
}

impl Default for ContinuationPolicy {
    fn default() -> Self {
        Self {
            max_listing_pages: 1,
        }
    }
}

impl ContinuationPolicy {
    /// Returns true if a page with this label and depth enqueues the next listing page
    pub fn spawns_listing(&self, label: Label, depth: u32) -> bool {
        match label {
            Label::Seed => true,
            Label::Listing => depth < self.max_listing_pages,
            Label::Item => false,
        }
    }
}

/// The crawl's page handler
pub struct TraversalHandler {
    client: Client,
    site: Arc<dyn SiteParser>,
    frontier: Arc<Frontier>,
    quota: Arc<QuotaTracker>,
    policy: ContinuationPolicy,
    extension: Option<OutputExtension>,
    sink: Arc<dyn OutputSink>,
    items_emitted: AtomicU64,
}

impl TraversalHandler {
    pub fn new(
        client: Client,
        site: Arc<dyn SiteParser>,
        frontier: Arc<Frontier>,
        quota: Arc<QuotaTracker>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            client,
            site,
            frontier,
            quota,
            policy: ContinuationPolicy::default(),
            extension: None,
            sink,
            items_emitted: AtomicU64::new(0),
        }
    }

    pub fn with_policy(mut self, policy: ContinuationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_extension(mut self, extension: Option<OutputExtension>) -> Self {
        self.extension = extension;
        self
    }

    /// Number of records pushed to the sink by this handler
    pub fn items_emitted(&self) -> u64 {
        self.items_emitted.load(Ordering::SeqCst)
    }

    async fn handle_listing(&self, request: &RequestRecord) -> Result<(), HarvestError> {
        let url = Url::parse(&request.url)?;
        let page = fetch_page(&self.client, &url).await?;
        let listing = self.site.parse_listing(&page);

        if let Some(total) = &listing.total {
            tracing::info!(url = %request.url, total = %total, "Listing reports result count");
        }

        if listing.item_links.is_empty() {
            tracing::debug!(url = %request.url, "No item links found");
            return Ok(());
        }

        let mut enqueued = 0usize;
        for link in &listing.item_links {
            let item_url = match normalize_url(link.as_str()) {
                Ok(normalized) => normalized.to_string(),
                Err(e) => {
                    tracing::debug!(link = %link, error = %e, "Skipping unusable item link");
                    continue;
                }
            };

            if self.frontier.contains(&item_url) {
                continue;
            }

            if !self.quota.try_reserve(1) {
                tracing::info!(url = %request.url, "Item quota reached, not enqueueing more items");
                break;
            }

            // Another worker may have admitted the same URL since the check above;
            // the reservation is then spent without an item, which is accepted.
            if self.frontier.add_request(RequestRecord::item(item_url)) {
                enqueued += 1;
            }
        }

        tracing::debug!(
            url = %request.url,
            found = listing.item_links.len(),
            enqueued,
            "Enqueued item links"
        );

        if self.policy.spawns_listing(request.label, request.depth) {
            let next = match request.label {
                Label::Seed => Some(self.site.continuation_url()),
                _ => listing.next_page.as_ref(),
            };
            if let Some(next) = next {
                let next_url = normalize_url(next.as_str())?.to_string();
                if self
                    .frontier
                    .add_request(RequestRecord::listing(next_url.clone(), request.depth + 1))
                {
                    tracing::debug!(url = %next_url, depth = request.depth + 1, "Enqueued listing continuation");
                }
            }
        }

        Ok(())
    }

    async fn handle_item(&self, request: &RequestRecord) -> Result<(), HarvestError> {
        let url = Url::parse(&request.url)?;
        let page = fetch_page(&self.client, &url).await?;
        let fields = self.site.extract_item(&page, &request.url)?;

        let mut record = ItemRecord::new(fields, request);
        if let Some(extension) = &self.extension {
            record.merge(extension::apply(extension, &record.fields)?);
        }

        self.sink.push(&record)?;
        self.items_emitted.fetch_add(1, Ordering::SeqCst);

        tracing::info!(url = %request.url, item_id = %record.fields.item_id, "Item stored");
        Ok(())
    }
}

#[async_trait]
impl PageHandler for TraversalHandler {
    async fn handle(&self, request: &RequestRecord) -> Result<(), HarvestError> {
        match request.label {
            Label::Seed | Label::Listing => self.handle_listing(request).await,
            Label::Item => self.handle_item(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_one_level() {
        let policy = ContinuationPolicy::default();
        assert!(policy.spawns_listing(Label::Seed, 0));
        assert!(!policy.spawns_listing(Label::Listing, 1));
        assert!(!policy.spawns_listing(Label::Item, 0));
    }

    #[test]
    fn test_seed_always_continues() {
        let policy = ContinuationPolicy {
            max_listing_pages: 0,
        };
        assert!(policy.spawns_listing(Label::Seed, 0));
        assert!(!policy.spawns_listing(Label::Listing, 0));
    }

    #[test]
    fn test_deeper_policy() {
        let policy = ContinuationPolicy {
            max_listing_pages: 3,
        };
        assert!(policy.spawns_listing(Label::Seed, 0));
        assert!(policy.spawns_listing(Label::Listing, 1));
        assert!(policy.spawns_listing(Label::Listing, 2));
        assert!(!policy.spawns_listing(Label::Listing, 3));
        assert!(!policy.spawns_listing(Label::Item, 0));
    }
}
