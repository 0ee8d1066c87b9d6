//! Configuration Module Tests
//!
//! Covers the version gate, the type-bucketed handler option parsing, and the
//! ranker weight sanity check.

#[cfg(test)]
mod tests {
    use crate::config::{load, TaskHandlerOptions};
    use std::fs;

    const VALID_CONFIG: &str = r#"
[General]
version = "1.0"
listen_addr = "127.0.0.1"
listen_port = 8080
server_timeout_in_seconds = 10
file_bulk_output_qty = 65536
metric_output_per_seconds = 5
connection_protocol = "https"
request_timeout_in_seconds = 5
min_content_length_in_bytes = 1024
max_content_length_in_bytes = 1048576
content_read_limit_in_bytes = 262144
concurrent_connections = 16
indexer_output_limit = 100

[[PreCrawlFilters]]
type = "builtin.unique_domain"
nameserver_check = true
discard_properties = false

[[PreCrawlFilters]]
type = "builtin.length_filter"
min_length = 4
max_length = 40

[Indexer]
type = "builtin.basic_indexer"

[[Rankers]]
type = "builtin.indexer_ranker"
weight = 1.0
"#;

    fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    // ============================================================
    // TEST 1: Full parse
    // ============================================================

    #[test]
    fn test_load_valid_config() {
        // ARRANGE
        let (_dir, path) = write_config(VALID_CONFIG);

        // ACT
        let config = load(&path).unwrap();

        // ASSERT
        assert_eq!(config.general.listen_port, 8080);
        assert_eq!(config.general.concurrent_connections, 16);
        assert_eq!(config.pre_crawl_filters.len(), 2);
        assert_eq!(config.indexer.type_tag, "builtin.basic_indexer");
        assert_eq!(config.rankers.len(), 1);
        assert!(config.post_crawl_filters.is_empty());

        // Option bucketing follows the TOML value type
        let unique = &config.pre_crawl_filters[0];
        assert_eq!(unique.bool_options.get("nameserver_check"), Some(&true));
        let length = &config.pre_crawl_filters[1];
        assert_eq!(length.int_options.get("min_length"), Some(&4));
        assert_eq!(
            config.rankers[0].float_options.get("weight"),
            Some(&1.0)
        );
    }

    // ============================================================
    // TEST 2: Version gate
    // ============================================================

    #[test]
    fn test_version_mismatch_is_fatal() {
        let stale = VALID_CONFIG.replace("version = \"1.0\"", "version = \"0.9\"");
        let (_dir, path) = write_config(&stale);

        let error = load(&path).unwrap_err();
        assert!(error.to_string().contains("does not match"));
    }

    #[test]
    fn test_missing_general_table_is_fatal() {
        let (_dir, path) = write_config("[Indexer]\ntype = \"builtin.basic_indexer\"\n");

        assert!(load(&path).is_err());
    }

    // ============================================================
    // TEST 3: Ranker weight check
    // ============================================================

    #[test]
    fn test_ranker_without_weight_is_rejected() {
        let broken = VALID_CONFIG.replace("weight = 1.0", "");
        let (_dir, path) = write_config(&broken);

        let error = load(&path).unwrap_err();
        assert!(error.to_string().contains("weight"));
    }

    // ============================================================
    // TEST 4: Handler table parsing
    // ============================================================

    #[test]
    fn test_handler_table_requires_type_tag() {
        let table: toml::Table = "discard_ratio = 0.8".parse().unwrap();
        assert!(TaskHandlerOptions::from_table(&table).is_err());
    }

    #[test]
    fn test_handler_table_buckets_by_value_type() {
        let table: toml::Table = r#"
type = "builtin.discard_high_entropy"
discard_ratio = 0.8
max_length = 40
enabled = true
label = "entropy"
"#
        .parse()
        .unwrap();

        let options = TaskHandlerOptions::from_table(&table).unwrap();

        assert_eq!(options.type_tag, "builtin.discard_high_entropy");
        assert_eq!(options.require_float("discard_ratio").unwrap(), 0.8);
        assert_eq!(options.require_int("max_length").unwrap(), 40);
        assert!(options.require_bool("enabled").unwrap());
        assert_eq!(options.require_string("label").unwrap(), "entropy");
        assert!(options.require_float("missing").is_err());
    }
}
