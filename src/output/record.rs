//! Item records emitted by the crawl

use crate::state::{Label, RequestRecord};
use serde::Serialize;
use serde_json::{Map, Value};

/// Fields extracted from one item page
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFields {
    pub url: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub item_id: String,
    /// Color of the last SKU listed on the page
    pub color: String,
    /// One entry per SKU, in page order
    pub sizes: Vec<String>,
    /// Price of the last SKU listed on the page
    pub price: String,
}

/// Request metadata attached to every record under the `#debug` key
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub request_url: String,
    pub retry_count: u32,
    pub label: Label,
}

impl From<&RequestRecord> for DebugInfo {
    fn from(request: &RequestRecord) -> Self {
        Self {
            request_url: request.url.clone(),
            retry_count: request.retry_count,
            label: request.label,
        }
    }
}

/// A finished output record
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub fields: ItemFields,
    pub debug: DebugInfo,
    /// Keys merged in by the output extension
    pub extra: Map<String, Value>,
}

impl ItemRecord {
    pub fn new(fields: ItemFields, request: &RequestRecord) -> Self {
        Self {
            fields,
            debug: DebugInfo::from(request),
            extra: Map::new(),
        }
    }

    /// Merges extension output into the record
    ///
    /// Later merges win on key collision, and extension keys win over the
    /// extracted fields when the record is rendered.
    pub fn merge(&mut self, extra: Map<String, Value>) {
        self.extra.extend(extra);
    }

    /// Renders the record as a single JSON object
    pub fn to_json(&self) -> Value {
        let mut object = match serde_json::to_value(&self.fields) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        if let Ok(debug) = serde_json::to_value(&self.debug) {
            object.insert("#debug".to_string(), debug);
        }

        for (key, value) in &self.extra {
            object.insert(key.clone(), value.clone());
        }

        Value::Object(object)
    }
}
