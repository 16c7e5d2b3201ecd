//! Crawler module for page fetching and traversal
//!
//! This module contains the core crawling logic, including:
//! - The request frontier with deduplication and bounded retries
//! - The dispatcher that drives a resizable worker pool
//! - HTTP fetching and site-specific page parsing
//! - Overall run coordination and checkpointing

mod coordinator;
mod dispatcher;
mod fetcher;
mod frontier;
mod handler;
mod parser;
mod pool;

pub use coordinator::{classify_start_urls, Coordinator};
pub use dispatcher::{Checkpointer, DispatchReport, Dispatcher, DispatcherConfig, PageHandler};
pub use fetcher::{build_http_client, fetch_page, FetchedPage};
pub use frontier::{Frontier, FrontierSnapshot, RetryDecision};
pub use handler::{ContinuationPolicy, TraversalHandler};
pub use parser::{ListingPage, SelectorSite, SiteParser};
pub use pool::PoolSizer;
