//! Configuration document loading
//!
//! The document is a TOML file with an array of `[[plugin]]` tables.
//! Each table becomes one plugin configuration node; a malformed node is
//! logged and skipped so the rest of the pipeline still loads.

use std::path::Path;

use serde::Deserialize;

use spool_core::config::PluginConfig;
use spool_core::error::ConfigError;

#[derive(Debug, Default, Deserialize)]
struct Document {
    #[serde(default)]
    plugin: Vec<toml::Table>,
}

/// Read and parse the configuration file into plugin nodes.
pub fn load_plugin_nodes(path: &Path) -> Result<Vec<PluginConfig>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_document(&text)
}

/// Parse a configuration document. Malformed plugin nodes fail
/// individually, not the whole document.
pub fn parse_document(text: &str) -> Result<Vec<PluginConfig>, ConfigError> {
    let document: Document = toml::from_str(text)?;

    let mut nodes = Vec::with_capacity(document.plugin.len());
    for table in document.plugin {
        match PluginConfig::from_table(table) {
            Ok(node) => nodes.push(node),
            Err(err) => tracing::error!(%err, "skipping malformed plugin node"),
        }
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plugin_nodes() {
        let nodes = parse_document(
            r#"
            [[plugin]]
            Type = "consumer.file"
            Stream = "accesslog"
            File = "/var/log/access.log"
            Offset = "Current"

            [[plugin]]
            Type = "producer.null"
            Enable = false
            "#,
        )
        .expect("valid document");

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].type_name(), "consumer.file");
        assert_eq!(nodes[0].get_string("Offset", "End"), "Current");
        assert!(!nodes[1].enabled());
    }

    #[test]
    fn empty_document_is_valid() {
        assert!(parse_document("").expect("valid").is_empty());
    }

    #[test]
    fn malformed_nodes_are_skipped() {
        let nodes = parse_document(
            r#"
            [[plugin]]
            File = "no type here"

            [[plugin]]
            Type = "producer.null"
            "#,
        )
        .expect("document still loads");

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].type_name(), "producer.null");
    }

    #[test]
    fn broken_toml_is_fatal() {
        assert!(parse_document("[[plugin").is_err());
    }
}
