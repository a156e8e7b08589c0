//! Tests for plugin configuration nodes

use std::collections::HashMap;

use crate::config::{unescape, PluginConfig};
use crate::message::{StreamId, WILDCARD_STREAM};

fn node_from(doc: &str) -> PluginConfig {
    let table: toml::Table = toml::from_str(doc).expect("valid toml");
    PluginConfig::from_table(table).expect("valid node")
}

#[test]
fn type_and_enable_are_extracted() {
    let node = node_from(
        r#"
        Type = "consumer.file"
        Enable = false
        File = "/var/log/messages"
        "#,
    );
    assert_eq!(node.type_name(), "consumer.file");
    assert!(!node.enabled());
    assert!(node.has_value("File"));
}

#[test]
fn enable_defaults_to_true() {
    let node = node_from(r#"Type = "producer.null""#);
    assert!(node.enabled());
}

#[test]
fn missing_type_is_rejected() {
    let table: toml::Table = toml::from_str(r#"File = "x""#).expect("valid toml");
    assert!(PluginConfig::from_table(table).is_err());
}

#[test]
fn keys_are_case_insensitive() {
    let node = node_from(
        r#"
        Type = "consumer.file"
        DELIMITER = ";"
        "#,
    );
    assert!(node.has_value("Delimiter"));
    assert!(node.has_value("delimiter"));
    assert_eq!(node.get_string("deLiMiTer", "\n"), ";");
}

#[test]
fn typed_getters_fall_back_to_defaults() {
    let node = node_from(
        r#"
        Type = "producer.file"
        BatchTimeoutSec = 9
        Append = true
        "#,
    );
    assert_eq!(node.get_int("BatchTimeoutSec", 5), 9);
    assert_eq!(node.get_int("BatchSizeByte", 8192), 8192);
    assert!(node.get_bool("Append", false));
    assert_eq!(node.get_string("File", "out.log"), "out.log");
}

#[test]
fn wrong_typed_value_yields_default() {
    let node = node_from(
        r#"
        Type = "producer.file"
        BatchTimeoutSec = "soon"
        "#,
    );
    assert_eq!(node.get_int("BatchTimeoutSec", 5), 5);
}

#[test]
fn string_array_accepts_single_string() {
    let node = node_from(
        r#"
        Type = "consumer.console"
        Stream = "stdin"
        "#,
    );
    assert_eq!(node.get_string_array("Stream", &[]), vec!["stdin"]);
}

#[test]
fn string_array_accepts_list() {
    let node = node_from(
        r#"
        Type = "consumer.console"
        Stream = ["a", "b"]
        "#,
    );
    assert_eq!(node.get_string_array("Stream", &[]), vec!["a", "b"]);
}

#[test]
fn stream_names_default_to_wildcard() {
    let node = node_from(r#"Type = "producer.null""#);
    assert_eq!(node.stream_names(), vec!["*"]);
    assert_eq!(node.stream_ids(), vec![WILDCARD_STREAM]);
}

#[test]
fn stream_map_populates_wildcard_from_default() {
    let node = node_from(
        r#"
        Type = "producer.file"
        [Category]
        accesslog = "access"
        "#,
    );
    let map = node.get_stream_map("Category", "misc");
    let mut expected = HashMap::new();
    expected.insert(WILDCARD_STREAM, "misc".to_string());
    expected.insert(StreamId::from_name("accesslog"), "access".to_string());
    assert_eq!(map, expected);
}

#[test]
fn stream_map_explicit_wildcard_wins() {
    let node = node_from(
        r#"
        Type = "producer.file"
        [Category]
        "*" = "everything"
        "#,
    );
    let map = node.get_stream_map("Category", "misc");
    assert_eq!(map.get(&WILDCARD_STREAM), Some(&"everything".to_string()));
}

#[test]
fn empty_default_leaves_wildcard_unset() {
    let node = node_from(r#"Type = "producer.file""#);
    let map = node.get_stream_map("Category", "");
    assert!(map.is_empty());
}

#[test]
fn override_value_replaces_options() {
    let mut node = node_from(
        r#"
        Type = "producer.console"
        Delimiter = ";"
        "#,
    );
    node.override_value("Delimiter", "");
    assert_eq!(node.get_string("Delimiter", "\n"), "");
}

#[test]
fn unescape_handles_control_sequences() {
    assert_eq!(unescape("\\n"), "\n");
    assert_eq!(unescape("a\\tb"), "a\tb");
    assert_eq!(unescape("\\r\\n"), "\r\n");
    assert_eq!(unescape("plain"), "plain");
}
