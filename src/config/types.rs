use serde::Deserialize;

/// Main configuration structure for Harvest-Crawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub input: InputConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    pub site: SiteConfig,
    pub output: OutputConfig,
}

/// What to crawl and how much of it
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// Start URLs; must contain at least one entry
    #[serde(rename = "start-urls", default)]
    pub start_urls: Vec<StartUrl>,

    /// Maximum number of item requests to enqueue (unset or 0 = unlimited)
    #[serde(rename = "max-items", default)]
    pub max_items: Option<u64>,

    /// Name of a registered output extension merged into every record
    #[serde(rename = "extend-output", default)]
    pub extend_output: Option<String>,
}

/// A single start URL entry
#[derive(Debug, Clone, Deserialize)]
pub struct StartUrl {
    pub url: String,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Worker pool floor
    #[serde(rename = "min-concurrency")]
    pub min_concurrency: u32,

    /// Hard cap on concurrent handler invocations
    #[serde(rename = "max-concurrency")]
    pub max_concurrency: u32,

    /// Retries per request after the first failed attempt
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Time budget for one handler invocation (seconds)
    #[serde(rename = "page-timeout-secs")]
    pub page_timeout_secs: u64,

    /// Pause before each handler invocation (milliseconds)
    #[serde(rename = "politeness-delay-ms")]
    pub politeness_delay_ms: u64,

    /// How many listing pages a seed may chain into
    #[serde(rename = "max-listing-pages")]
    pub max_listing_pages: u32,

    /// Interval between periodic checkpoints (seconds)
    #[serde(rename = "checkpoint-interval-secs")]
    pub checkpoint_interval_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            min_concurrency: 2,
            max_concurrency: 5,
            max_retries: 1,
            page_timeout_secs: 60,
            politeness_delay_ms: 1000,
            max_listing_pages: 1,
            checkpoint_interval_secs: 30,
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Proxy passed through to the HTTP client unchanged
    #[serde(rename = "proxy-url")]
    pub proxy_url: Option<String>,

    /// Transport-level timeout per HTTP request (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("harvest-crawl/{}", env!("CARGO_PKG_VERSION")),
            proxy_url: None,
            request_timeout_secs: 30,
        }
    }
}

/// Site-specific parsing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Origin of the target site; start URLs on other hosts are skipped
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// CSS selector matching item anchors on seed and listing pages
    #[serde(rename = "item-link-selector")]
    pub item_link_selector: String,

    /// CSS selector for the element holding the result count
    #[serde(rename = "listing-count-selector", default)]
    pub listing_count_selector: Option<String>,

    /// CSS selector for a "next page" anchor, followed from listing pages
    /// when `max-listing-pages` allows more than one hop
    #[serde(rename = "next-page-selector", default)]
    pub next_page_selector: Option<String>,

    /// Listing page every seed enqueues after its item links
    #[serde(rename = "continuation-url", default)]
    pub continuation_url: String,

    /// Name of the script variable holding the item page's JSON state
    #[serde(rename = "state-marker", default = "default_state_marker")]
    pub state_marker: String,
}

fn default_state_marker() -> String {
    "__INITIAL_CONFIG__".to_string()
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database holding crawl state
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// JSON-lines file receiving item records; items go to the database when unset
    #[serde(rename = "dataset-path", default)]
    pub dataset_path: Option<String>,
}
