//! Plugin configuration nodes
//!
//! A `PluginConfig` is one entry of the declarative configuration
//! document: the `Type` name selecting the plugin, the `Enable` flag, the
//! streams the plugin attaches to, and a bag of plugin-specific options.
//! Option keys are case-insensitive at this boundary; values are raw TOML
//! values interpreted through the typed getters.
//!
//! Nodes are built during config parse, consumed during plugin init and
//! then discarded.

use std::collections::HashMap;

use crate::error::ConfigError;
use crate::message::{StreamId, WILDCARD_STREAM, WILDCARD_STREAM_NAME};

/// Reserved node keys that are not plugin options.
const KEY_TYPE: &str = "type";
const KEY_ENABLE: &str = "enable";

/// Replace the escape sequences `\n`, `\r` and `\t` in a configured
/// string with the characters they name.
///
/// Configuration documents cannot always carry control characters
/// literally, so options like delimiters and envelope affixes accept the
/// escaped spelling.
pub fn unescape(value: &str) -> String {
    value
        .replace("\\n", "\n")
        .replace("\\r", "\r")
        .replace("\\t", "\t")
}

/// One plugin's configuration node.
#[derive(Debug, Clone, Default)]
pub struct PluginConfig {
    type_name: String,
    enabled: bool,
    values: HashMap<String, toml::Value>,
}

impl PluginConfig {
    /// Create an empty node for the given plugin type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            enabled: true,
            values: HashMap::new(),
        }
    }

    /// Build a node from a decoded TOML table.
    ///
    /// `type` is mandatory; `enable` defaults to true. All other keys are
    /// stored as options under their lowercased name.
    pub fn from_table(table: toml::Table) -> Result<Self, ConfigError> {
        let mut node = Self {
            type_name: String::new(),
            enabled: true,
            values: HashMap::with_capacity(table.len()),
        };

        for (key, value) in table {
            match key.to_ascii_lowercase().as_str() {
                KEY_TYPE => match value.as_str() {
                    Some(name) => node.type_name = name.to_string(),
                    None => {
                        return Err(ConfigError::MalformedNode(
                            "'Type' must be a string".into(),
                        ))
                    }
                },
                KEY_ENABLE => node.enabled = value.as_bool().unwrap_or(true),
                normalized => {
                    node.values.insert(normalized.to_string(), value);
                }
            }
        }

        if node.type_name.is_empty() {
            return Err(ConfigError::MalformedNode(
                "plugin node has no 'Type'".into(),
            ));
        }

        Ok(node)
    }

    /// The plugin type name selecting the registry entry.
    #[inline]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Whether this plugin should be instantiated at all.
    #[inline]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Whether an option is present, regardless of its type.
    pub fn has_value(&self, key: &str) -> bool {
        self.values.contains_key(&key.to_ascii_lowercase())
    }

    /// Force an option value before handing the node to a base
    /// `configure`, so embedding plugins can replace defaults.
    pub fn override_value(&mut self, key: &str, value: impl Into<toml::Value>) {
        self.values
            .insert(key.to_ascii_lowercase(), value.into());
    }

    /// String option, falling back to `default` when absent or not a
    /// string.
    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.value(key)
            .and_then(toml::Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    /// Integer option with default.
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.value(key)
            .and_then(toml::Value::as_integer)
            .unwrap_or(default)
    }

    /// Boolean option with default.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.value(key)
            .and_then(toml::Value::as_bool)
            .unwrap_or(default)
    }

    /// String-array option. A plain string is treated as a one-element
    /// array; anything else yields `default`.
    pub fn get_string_array(&self, key: &str, default: &[&str]) -> Vec<String> {
        match self.value(key) {
            Some(toml::Value::String(single)) => vec![single.clone()],
            Some(toml::Value::Array(items)) => items
                .iter()
                .filter_map(toml::Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => default.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Stream-map option: a table of stream name to string, returned
    /// keyed by stream id. When the table has no `*` entry, the wildcard
    /// id is populated from `default` (unless `default` is empty).
    pub fn get_stream_map(&self, key: &str, default: &str) -> HashMap<StreamId, String> {
        let mut map = HashMap::new();
        if !default.is_empty() {
            map.insert(WILDCARD_STREAM, default.to_string());
        }

        if let Some(toml::Value::Table(table)) = self.value(key) {
            for (name, value) in table {
                if let Some(text) = value.as_str() {
                    map.insert(StreamId::from_name(name), text.to_string());
                }
            }
        }

        map
    }

    /// Names of the streams this plugin attaches to; defaults to the
    /// wildcard stream.
    pub fn stream_names(&self) -> Vec<String> {
        self.get_string_array("Stream", &[WILDCARD_STREAM_NAME])
    }

    /// Ids of the streams this plugin attaches to.
    pub fn stream_ids(&self) -> Vec<StreamId> {
        self.stream_names()
            .iter()
            .map(|name| StreamId::from_name(name))
            .collect()
    }

    fn value(&self, key: &str) -> Option<&toml::Value> {
        self.values.get(&key.to_ascii_lowercase())
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
