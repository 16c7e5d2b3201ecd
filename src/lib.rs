//! Harvest-Crawl: a bounded, resumable item crawler
//!
//! This crate walks seed pages breadth-first, follows listing pagination to
//! item pages, extracts one record per item and stops enqueueing items once a
//! quota is reached. Progress (the frontier and the quota counter) is
//! checkpointed to SQLite so an interrupted crawl resumes where it left off.

pub mod config;
pub mod crawler;
pub mod extension;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Harvest-Crawl operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Page handler timed out after {seconds}s for {url}")]
    Timeout { url: String, seconds: u64 },

    #[error("Parse error for {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Worker panicked while handling {url}: {message}")]
    WorkerPanic { url: String, message: String },

    #[error("Output extension error: {0}")]
    Extension(String),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Returns true if the error must abort the whole crawl
    ///
    /// Everything else is treated as a per-request failure and goes through
    /// the retry policy.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Extension(_)
                | Self::Output(_)
                | Self::Database(_)
                | Self::Storage(_)
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Unknown output extension '{0}'")]
    UnknownExtension(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

// Re-export commonly used types
pub use config::Config;
pub use state::{Label, QuotaTracker, RequestRecord, RequestStatus};
pub use url::normalize_url;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(HarvestError::Extension("not an object".to_string()).is_fatal());
        assert!(HarvestError::Config(ConfigError::Validation("x".to_string())).is_fatal());

        let transient = HarvestError::HttpStatus {
            url: "https://example.com/".to_string(),
            status: 503,
        };
        assert!(!transient.is_fatal());

        let timeout = HarvestError::Timeout {
            url: "https://example.com/".to_string(),
            seconds: 60,
        };
        assert!(!timeout.is_fatal());
    }
}
