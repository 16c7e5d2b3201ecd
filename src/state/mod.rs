//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `RequestRecord`: One unit of frontier work (URL, label, retry count)
//! - `Label`: Which traversal branch handles a request (seed, listing, item)
//! - `RequestStatus`: Where a request is in its lifecycle
//! - `QuotaTracker`: Process-wide counter of item requests admitted so far

mod quota;
mod request;

// Re-export main types
pub use quota::QuotaTracker;
pub use request::{Label, RequestRecord, RequestStatus};
