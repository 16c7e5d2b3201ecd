//! URL handling module for Harvest-Crawl
//!
//! Every URL that enters the frontier goes through [`normalize_url`] first, so
//! the normalized form is the deduplication key for the whole crawl.

mod normalize;

pub use normalize::normalize_url;
