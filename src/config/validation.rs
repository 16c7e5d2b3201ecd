use crate::config::types::{
    Config, CrawlerConfig, InputConfig, NetworkConfig, OutputConfig, SiteConfig,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_input_config(&config.input)?;
    validate_crawler_config(&config.crawler)?;
    validate_network_config(&config.network)?;
    validate_site_config(&config.site)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates start URLs and the extension name
fn validate_input_config(config: &InputConfig) -> Result<(), ConfigError> {
    if config.start_urls.is_empty() {
        return Err(ConfigError::Validation(
            "Invalid input, 'start-urls' must contain at least one url".to_string(),
        ));
    }

    for entry in &config.start_urls {
        validate_http_url(&entry.url, "start URL")?;
    }

    if let Some(name) = &config.extend_output {
        if name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "extend-output cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrency < 1 || config.max_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrency must be between 1 and 100, got {}",
            config.max_concurrency
        )));
    }

    if config.min_concurrency < 1 || config.min_concurrency > config.max_concurrency {
        return Err(ConfigError::Validation(format!(
            "min-concurrency must be between 1 and max-concurrency ({}), got {}",
            config.max_concurrency, config.min_concurrency
        )));
    }

    if config.page_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "page-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.politeness_delay_ms > 60_000 {
        return Err(ConfigError::Validation(format!(
            "politeness-delay-ms must be <= 60000, got {}",
            config.politeness_delay_ms
        )));
    }

    if config.max_listing_pages < 1 {
        return Err(ConfigError::Validation(
            "max-listing-pages must be >= 1".to_string(),
        ));
    }

    if config.checkpoint_interval_secs < 1 {
        return Err(ConfigError::Validation(
            "checkpoint-interval-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates network configuration
fn validate_network_config(config: &NetworkConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if let Some(proxy) = &config.proxy_url {
        Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy-url '{}': {}", proxy, e)))?;
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates site selectors and URLs
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_http_url(&config.base_url, "base-url")?;

    validate_selector(&config.item_link_selector)?;
    if let Some(selector) = &config.listing_count_selector {
        validate_selector(selector)?;
    }
    if let Some(selector) = &config.next_page_selector {
        validate_selector(selector)?;
    }

    if config.continuation_url.trim().is_empty() {
        return Err(ConfigError::Validation(
            "continuation-url is required".to_string(),
        ));
    }
    validate_http_url(&config.continuation_url, "continuation-url")?;

    if config.state_marker.trim().is_empty() {
        return Err(ConfigError::Validation(
            "state-marker cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if matches!(&config.dataset_path, Some(path) if path.is_empty()) {
        return Err(ConfigError::Validation(
            "dataset-path cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Checks that a URL parses and uses http or https
fn validate_http_url(value: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            what, value
        )));
    }

    Ok(())
}

/// Checks that a CSS selector parses
fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector {
            selector: selector.to_string(),
            message: format!("{:?}", e),
        })
}
