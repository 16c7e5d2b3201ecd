//! Output module for emitted items and crawl summaries
//!
//! This module handles:
//! - The item record format (extracted fields, `#debug` block, extension keys)
//! - Append-only sinks: a JSON-lines dataset file or the crawl database
//! - Crawl statistics and end-of-run summaries

mod jsonl;
mod record;
mod sqlite_output;
pub mod stats;
mod traits;

pub use jsonl::JsonLinesSink;
pub use record::{DebugInfo, ItemFields, ItemRecord};
pub use sqlite_output::SqliteItemSink;
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use traits::{CrawlSummary, OutputError, OutputResult, OutputSink};
