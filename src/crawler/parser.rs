//! Site parsing
//!
//! Everything that depends on the target site's markup sits behind the
//! [`SiteParser`] trait. [`SelectorSite`] is the configuration-driven
//! implementation: CSS selectors for listing pages and an embedded JSON state
//! object for item pages.

use crate::config::SiteConfig;
use crate::crawler::fetcher::FetchedPage;
use crate::output::ItemFields;
use crate::state::Label;
use crate::{ConfigError, HarvestError};
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use url::Url;

/// What a seed or listing page yields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    /// Text of the result-count element, when present
    pub total: Option<String>,

    /// Absolute item URLs in document order
    pub item_links: Vec<Url>,

    /// Next listing page, when the site exposes one
    pub next_page: Option<Url>,
}

/// Site-specific page understanding
///
/// Implementations are called from worker tasks, so they must be shareable;
/// parsed documents never cross an await point.
pub trait SiteParser: Send + Sync {
    /// Classifies a start URL, or returns `None` when it is not on this site
    fn classify_start_url(&self, url: &Url) -> Option<Label>;

    /// Listing page every seed continues into
    fn continuation_url(&self) -> &Url;

    /// Extracts item links and pagination from a seed or listing page
    fn parse_listing(&self, page: &FetchedPage) -> ListingPage;

    /// Extracts the output fields from an item page
    ///
    /// `request_url` is the URL that was enqueued; the page itself may have
    /// been served from a redirect target.
    fn extract_item(
        &self,
        page: &FetchedPage,
        request_url: &str,
    ) -> Result<ItemFields, HarvestError>;
}

/// CSS-selector driven site parser
#[derive(Debug)]
pub struct SelectorSite {
    base_host: String,
    item_link: Selector,
    listing_count: Option<Selector>,
    next_page: Option<Selector>,
    continuation_url: Url,
    state_marker: String,
}

impl SelectorSite {
    /// Builds a parser from the `[site]` configuration section
    pub fn from_config(config: &SiteConfig) -> Result<Self, ConfigError> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", config.base_url, e))
        })?;
        let base_host = base
            .host_str()
            .ok_or_else(|| ConfigError::InvalidUrl(format!("base-url '{}' has no host", base)))?
            .to_string();

        let continuation_url = Url::parse(&config.continuation_url).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "Invalid continuation-url '{}': {}",
                config.continuation_url, e
            ))
        })?;

        Ok(Self {
            base_host,
            item_link: parse_selector(&config.item_link_selector)?,
            listing_count: config
                .listing_count_selector
                .as_deref()
                .map(parse_selector)
                .transpose()?,
            next_page: config
                .next_page_selector
                .as_deref()
                .map(parse_selector)
                .transpose()?,
            continuation_url,
            state_marker: config.state_marker.clone(),
        })
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

impl SiteParser for SelectorSite {
    fn classify_start_url(&self, url: &Url) -> Option<Label> {
        if url.host_str() != Some(self.base_host.as_str()) {
            return None;
        }

        let has_numeric_segment = url
            .path_segments()
            .map(|mut segments| {
                segments.any(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
            })
            .unwrap_or(false);

        Some(if has_numeric_segment {
            Label::Item
        } else {
            Label::Seed
        })
    }

    fn parse_listing(&self, page: &FetchedPage) -> ListingPage {
        let document = Html::parse_document(&page.body);

        let total = self.listing_count.as_ref().and_then(|selector| {
            document.select(selector).next().and_then(|element| {
                let text = element.text().collect::<String>();
                text.split_whitespace().next().map(str::to_string)
            })
        });

        let item_links = document
            .select(&self.item_link)
            .filter_map(|element| element.value().attr("href"))
            .filter_map(|href| resolve_href(&page.url, href))
            .collect();

        let next_page = self.next_page.as_ref().and_then(|selector| {
            document
                .select(selector)
                .filter_map(|element| element.value().attr("href"))
                .find_map(|href| resolve_href(&page.url, href))
        });

        ListingPage {
            total,
            item_links,
            next_page,
        }
    }

    fn continuation_url(&self) -> &Url {
        &self.continuation_url
    }

    fn extract_item(
        &self,
        page: &FetchedPage,
        request_url: &str,
    ) -> Result<ItemFields, HarvestError> {
        let parse_error = |message: String| HarvestError::Parse {
            url: request_url.to_string(),
            message,
        };

        let state = extract_state_object(&page.body, &self.state_marker).ok_or_else(|| {
            parse_error(format!("no '{} = {{...}}' state object found", self.state_marker))
        })?;

        item_from_state(&state, request_url).map_err(parse_error)
    }
}

/// Resolves an anchor href against the page URL, keeping only http(s) targets
fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let url = base.join(href).ok()?;
    let is_http = matches!(url.scheme(), "http" | "https");
    is_http.then_some(url)
}

/// Finds `<marker> = { ... }` in a page body and parses the object
///
/// Parsing stops at the end of the first complete JSON value, so trailing
/// script text after the object is ignored.
fn extract_state_object(body: &str, marker: &str) -> Option<Value> {
    body.match_indices(marker).find_map(|(index, _)| {
        let rest = body[index + marker.len()..].trim_start();
        let rest = rest.strip_prefix('=')?.trim_start();
        if !rest.starts_with('{') {
            return None;
        }

        serde_json::Deserializer::from_str(rest)
            .into_iter::<Value>()
            .next()?
            .ok()
            .filter(Value::is_object)
    })
}

/// Maps the embedded page state to output fields
fn item_from_state(state: &Value, url: &str) -> Result<ItemFields, String> {
    let view = state
        .get("viewData")
        .ok_or_else(|| "missing viewData".to_string())?;

    let item_id = view
        .get("id")
        .and_then(value_to_key)
        .ok_or_else(|| "missing viewData.id".to_string())?;

    let colors = lookup_map(view, &["filters", "color", "byId"])?;
    let sizes_by_id = lookup_map(view, &["filters", "size", "byId"])?;
    let skus = lookup_map(view, &["skus", "byId"])?;

    let mut sizes = Vec::with_capacity(skus.len());
    let mut color = String::new();
    let mut price = String::new();

    for sku in ordered_values(skus) {
        sizes.push(display_value(sizes_by_id, sku.get("sizeId"), "size")?);
        color = display_value(colors, sku.get("colorId"), "color")?;
        price = sku.get("price").and_then(value_to_key).unwrap_or_default();
    }

    Ok(ItemFields {
        url: url.to_string(),
        name: view
            .get("productName")
            .and_then(Value::as_str)
            .map(str::to_string),
        description: view
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        item_id,
        color,
        sizes,
        price,
    })
}

fn lookup_map<'a>(value: &'a Value, path: &[&str]) -> Result<&'a Map<String, Value>, String> {
    path.iter()
        .try_fold(value, |current, key| current.get(*key))
        .and_then(Value::as_object)
        .ok_or_else(|| format!("missing viewData.{}", path.join(".")))
}

/// Looks up `map[id].displayValue`
fn display_value(
    map: &Map<String, Value>,
    id: Option<&Value>,
    what: &str,
) -> Result<String, String> {
    let key = id
        .and_then(value_to_key)
        .ok_or_else(|| format!("sku without {}Id", what))?;

    map.get(&key)
        .and_then(|entry| entry.get("displayValue"))
        .and_then(value_to_key)
        .ok_or_else(|| format!("unknown {} id '{}'", what, key))
}

/// Renders a string or number as a plain string
fn value_to_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Iterates object values with integer-like keys first in numeric order
///
/// This matches the property order a browser reports for the same object.
fn ordered_values(map: &Map<String, Value>) -> impl Iterator<Item = &Value> {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by_key(|(key, _)| match key.parse::<u64>() {
        Ok(n) => (0, n, String::new()),
        Err(_) => (1, 0, (*key).clone()),
    });
    entries.into_iter().map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SelectorSite {
        SelectorSite::from_config(&SiteConfig {
            base_url: "https://shop.example.com".to_string(),
            item_link_selector: "._1AOd3.QIjwE ._5lXiG".to_string(),
            listing_count_selector: Some("._2Frdy._3gp2P".to_string()),
            next_page_selector: Some("a.next".to_string()),
            continuation_url: "https://shop.example.com/c/booties?page=2".to_string(),
            state_marker: "__INITIAL_CONFIG__".to_string(),
        })
        .unwrap()
    }

    fn page(url: &str, body: &str) -> FetchedPage {
        FetchedPage {
            url: Url::parse(url).unwrap(),
            status: 200,
            body: body.to_string(),
        }
    }

    const ITEM_BODY: &str = r#"<html><head><script>window.__INITIAL_CONFIG__ = {
        "viewData": {
            "id": 5512345,
            "productName": "Ankle Boot",
            "description": "Leather bootie",
            "filters": {
                "color": {"byId": {"100": {"displayValue": "BLACK"}, "200": {"displayValue": "TAN"}}},
                "size": {"byId": {"7": {"displayValue": "7 M"}, "10": {"displayValue": "10 M"}}}
            },
            "skus": {"byId": {
                "10": {"sizeId": "10", "colorId": 200, "price": "$130.00"},
                "9": {"sizeId": 7, "colorId": "100", "price": "$120.00"}
            }}
        }
    };</script></head><body></body></html>"#;

    #[test]
    fn test_classify_start_url() {
        let site = site();
        let classify = |u: &str| site.classify_start_url(&Url::parse(u).unwrap());

        assert_eq!(
            classify("https://shop.example.com/c/booties?origin=topnav"),
            Some(Label::Seed)
        );
        assert_eq!(
            classify("https://shop.example.com/s/ankle-boot/5512345"),
            Some(Label::Item)
        );
        assert_eq!(classify("https://other.example.com/c/booties"), None);
    }

    #[test]
    fn test_parse_listing() {
        let body = r#"
            <div class="_2Frdy _3gp2P">1,234 items</div>
            <div class="_1AOd3 QIjwE">
                <a class="_5lXiG" href="/s/boot/1">One</a>
                <a class="_5lXiG" href="https://shop.example.com/s/boot/2">Two</a>
                <a class="_5lXiG">No href</a>
                <a class="_5lXiG" href="mailto:shop@example.com">Mail</a>
            </div>
            <a class="_5lXiG" href="/s/outside/3">Outside the grid</a>
        "#;

        let listing = site().parse_listing(&page("https://shop.example.com/c/booties", body));

        assert_eq!(listing.total.as_deref(), Some("1,234"));
        let links: Vec<&str> = listing.item_links.iter().map(Url::as_str).collect();
        assert_eq!(
            links,
            vec![
                "https://shop.example.com/s/boot/1",
                "https://shop.example.com/s/boot/2"
            ]
        );
        // No next-page anchor on the page
        assert_eq!(listing.next_page, None);
    }

    #[test]
    fn test_without_next_page_selector_only_continuation_is_known() {
        let config = SiteConfig {
            base_url: "https://shop.example.com".to_string(),
            item_link_selector: "a.product".to_string(),
            listing_count_selector: None,
            next_page_selector: None,
            continuation_url: "https://shop.example.com/c/booties?page=2".to_string(),
            state_marker: "__INITIAL_CONFIG__".to_string(),
        };
        let site = SelectorSite::from_config(&config).unwrap();

        let body = r#"<a class="product" href="/s/boot/1">One</a><a class="next" href="?page=3">Next</a>"#;
        let listing = site.parse_listing(&page("https://shop.example.com/c/booties", body));

        assert_eq!(listing.item_links.len(), 1);
        assert_eq!(listing.next_page, None);
        assert_eq!(
            site.continuation_url().as_str(),
            "https://shop.example.com/c/booties?page=2"
        );
    }

    #[test]
    fn test_next_page_anchor_is_resolved() {
        let body = r#"<a class="next" href="?page=3">Next</a>"#;
        let listing = site().parse_listing(&page("https://shop.example.com/c/booties", body));

        assert!(listing.item_links.is_empty());
        assert_eq!(
            listing.next_page.as_ref().map(Url::as_str),
            Some("https://shop.example.com/c/booties?page=3")
        );
    }

    #[test]
    fn test_extract_item() {
        let url = "https://shop.example.com/s/ankle-boot/5512345";
        let fields = site().extract_item(&page(url, ITEM_BODY), url).unwrap();

        assert_eq!(fields.url, url);
        assert_eq!(fields.item_id, "5512345");
        assert_eq!(fields.name.as_deref(), Some("Ankle Boot"));
        assert_eq!(fields.description.as_deref(), Some("Leather bootie"));
        // SKU "9" sorts before "10"; color and price come from the last SKU
        assert_eq!(fields.sizes, vec!["7 M", "10 M"]);
        assert_eq!(fields.color, "TAN");
        assert_eq!(fields.price, "$130.00");
    }

    #[test]
    fn test_extract_item_keeps_request_url_after_redirect() {
        let requested = "https://shop.example.com/s/ankle-boot/5512345";
        let served = page("https://shop.example.com/s/ankle-boot/5512345/landing", ITEM_BODY);

        let fields = site().extract_item(&served, requested).unwrap();
        assert_eq!(fields.url, requested);
    }

    #[test]
    fn test_extract_item_without_state_is_parse_error() {
        let err = site()
            .extract_item(
                &page("https://shop.example.com/s/x/1", "<html></html>"),
                "https://shop.example.com/s/x/1",
            )
            .unwrap_err();
        assert!(matches!(err, HarvestError::Parse { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_extract_state_object_ignores_trailing_script() {
        let body = r#"var a = "__INITIAL_CONFIG__"; window.__INITIAL_CONFIG__ = {"a": {"b": 1}}; foo();"#;
        let state = extract_state_object(body, "__INITIAL_CONFIG__").unwrap();
        assert_eq!(state["a"]["b"], 1);
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let config = SiteConfig {
            base_url: "https://shop.example.com".to_string(),
            item_link_selector: "a[[[".to_string(),
            listing_count_selector: None,
            next_page_selector: None,
            continuation_url: "https://shop.example.com/c/booties?page=2".to_string(),
            state_marker: "__INITIAL_CONFIG__".to_string(),
        };
        assert!(matches!(
            SelectorSite::from_config(&config),
            Err(ConfigError::InvalidSelector { .. })
        ));
    }
}
