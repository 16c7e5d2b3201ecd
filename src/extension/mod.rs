//! Output extensions
//!
//! An extension is a named callable that receives the extracted fields of an
//! item and returns a JSON object whose keys are merged into the output
//! record. Extensions are resolved by name when the crawl is configured, so a
//! typo in `extend-output` fails before any page is fetched.

use crate::output::ItemFields;
use crate::{ConfigError, HarvestError};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A registered output extension
pub type OutputExtension = Arc<dyn Fn(&ItemFields) -> Value + Send + Sync>;

/// Name-to-extension lookup table
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    extensions: HashMap<String, OutputExtension>,
}

impl ExtensionRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in extensions
    ///
    /// - `scraped-at`: adds `scrapedAt` with the current UTC time
    /// - `size-count`: adds `sizeCount` with the number of listed sizes
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register("scraped-at", |_fields: &ItemFields| {
            json!({ "scrapedAt": chrono::Utc::now().to_rfc3339() })
        });

        registry.register("size-count", |fields: &ItemFields| {
            json!({ "sizeCount": fields.sizes.len() })
        });

        registry
    }

    /// Registers an extension, replacing any previous one with the same name
    pub fn register<F>(&mut self, name: impl Into<String>, extension: F)
    where
        F: Fn(&ItemFields) -> Value + Send + Sync + 'static,
    {
        self.extensions.insert(name.into(), Arc::new(extension));
    }

    /// Looks up an extension by name
    pub fn resolve(&self, name: &str) -> Result<OutputExtension, ConfigError> {
        self.extensions
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownExtension(name.to_string()))
    }

    /// Returns the registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.extensions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Runs an extension and returns the keys to merge
///
/// A result that is not a JSON object violates the extension contract and is
/// fatal for the whole crawl.
pub fn apply(
    extension: &OutputExtension,
    fields: &ItemFields,
) -> Result<Map<String, Value>, HarvestError> {
    match extension(fields) {
        Value::Object(map) => Ok(map),
        other => Err(HarvestError::Extension(format!(
            "extension has to return an object, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
