use crate::UrlError;
use url::Url;

/// List of tracking query parameters to remove during normalization
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "_ga", "srsltid"];

/// Normalizes a URL into its deduplication form
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only http and https
/// 3. Require a host (the parser already lowercases it and drops default ports)
/// 4. Collapse repeated slashes in the path
/// 5. Remove fragment (everything after #)
/// 6. Remove tracking query parameters
/// 7. Sort remaining query parameters by key, keeping the order of values
/// 8. Remove empty query string (trailing ?)
///
/// Query pairs are reordered as written; their encoding is left alone.
///
/// Unlike link-graph crawlers this keeps the scheme, `www.` and trailing
/// slashes: the normalized URL is also the URL that gets fetched.
///
/// # Examples
///
/// ```
/// use harvest_crawl::url::normalize_url;
///
/// let url = normalize_url("https://Shop.Example.com/c/boots?page=2&origin=nav#top").unwrap();
/// assert_eq!(url.as_str(), "https://shop.example.com/c/boots?origin=nav&page=2");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if let Some(query) = url.query().map(str::to_string) {
        let params = filter_and_sort_query_params(&query);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&params.join("&")));
        }
    }

    Ok(url)
}

/// Collapses runs of slashes; an empty path becomes `/`
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut normalized = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        normalized.push(c);
    }

    normalized
}

/// Filters out tracking parameters and sorts the remaining raw `key=value` pairs
fn filter_and_sort_query_params(query: &str) -> Vec<&str> {
    let mut params: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| !is_tracking_param(query_key(pair)))
        .collect();

    // Stable sort: repeated keys keep their relative order
    params.sort_by(|a, b| query_key(a).cmp(query_key(b)));

    params
}

fn query_key(pair: &str) -> &str {
    pair.split_once('=').map_or(pair, |(key, _)| key)
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
