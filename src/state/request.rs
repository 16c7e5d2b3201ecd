//! Request records and their lifecycle states
//!
//! A request is admitted to the frontier once per normalized URL and then
//! moves through `Pending -> InProgress -> Handled | Failed`, possibly
//! bouncing back to `Pending` while retries remain.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a request, selecting the handler branch that processes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    /// A start page: yields item links plus one pagination continuation
    Seed,

    /// A paginated listing page: yields item links only
    Listing,

    /// A detail page: yields one output record
    Item,
}

impl Label {
    /// Converts the label to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Seed => "seed",
            Self::Listing => "listing",
            Self::Item => "item",
        }
    }

    /// Parses a label from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "seed" => Some(Self::Seed),
            "listing" => Some(Self::Listing),
            "item" => Some(Self::Item),
            _ => None,
        }
    }

    /// Returns true for labels whose pages are scanned for item links
    pub fn discovers_items(&self) -> bool {
        matches!(self, Self::Seed | Self::Listing)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Represents the current state of a request in the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    // ===== Active States =====
    /// Waiting to be picked up by a worker
    Pending,

    /// Picked up by a worker and not yet resolved
    InProgress,

    // ===== Terminal States =====
    /// Handled successfully
    Handled,

    /// Retries exhausted; dropped
    Failed,
}

impl RequestStatus {
    /// Returns true if no further processing will happen for this request
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Handled | Self::Failed)
    }

    /// Converts the status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Handled => "handled",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from a database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "handled" => Some(Self::Handled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all_statuses() -> [Self; 4] {
        [Self::Pending, Self::InProgress, Self::Handled, Self::Failed]
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// A unit of crawl work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    /// Normalized absolute URL; the deduplication key
    pub url: String,

    /// Which handler branch processes this request
    pub label: Label,

    /// Number of failed attempts so far
    pub retry_count: u32,

    /// Pagination depth (0 for seeds and items)
    pub depth: u32,

    /// Lifecycle status inside the frontier
    pub status: RequestStatus,

    /// Insertion sequence assigned by the frontier
    pub seq: u64,

    /// Message of the most recent failed attempt
    pub last_error: Option<String>,
}

impl RequestRecord {
    /// Creates a fresh pending record
    ///
    /// `url` must already be normalized; the frontier assigns `seq` on insert.
    pub fn new(url: impl Into<String>, label: Label, depth: u32) -> Self {
        Self {
            url: url.into(),
            label,
            retry_count: 0,
            depth,
            status: RequestStatus::Pending,
            seq: 0,
            last_error: None,
        }
    }

    /// Creates a seed record
    pub fn seed(url: impl Into<String>) -> Self {
        Self::new(url, Label::Seed, 0)
    }

    /// Creates an item record
    pub fn item(url: impl Into<String>) -> Self {
        Self::new(url, Label::Item, 0)
    }

    /// Creates a listing continuation record at the given depth
    pub fn listing(url: impl Into<String>, depth: u32) -> Self {
        Self::new(url, Label::Listing, depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_db_strings() {
        for label in [Label::Seed, Label::Listing, Label::Item] {
            assert_eq!(Label::from_db_string(label.to_db_string()), Some(label));
        }
        assert_eq!(Label::from_db_string("start"), None);
    }

    #[test]
    fn test_label_discovers_items() {
        assert!(Label::Seed.discovers_items());
        assert!(Label::Listing.discovers_items());
        assert!(!Label::Item.discovers_items());
    }

    #[test]
    fn test_status_roundtrip_db_string() {
        for status in RequestStatus::all_statuses() {
            let parsed = RequestStatus::from_db_string(status.to_db_string());
            assert_eq!(Some(status), parsed, "Failed roundtrip for {:?}", status);
        }
        assert_eq!(RequestStatus::from_db_string("invalid"), None);
    }

    #[test]
    fn test_is_terminal() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(!RequestStatus::InProgress.is_terminal());
        assert!(RequestStatus::Handled.is_terminal());
        assert!(RequestStatus::Failed.is_terminal());
    }

    #[test]
    fn test_new_record_defaults() {
        let record = RequestRecord::listing("https://example.com/c?page=2", 1);
        assert_eq!(record.label, Label::Listing);
        assert_eq!(record.depth, 1);
        assert_eq!(record.retry_count, 0);
        assert_eq!(record.status, RequestStatus::Pending);
        assert!(record.last_error.is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Label::Item), "item");
        assert_eq!(format!("{}", RequestStatus::InProgress), "in_progress");
    }
}
