use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub general: GeneralOptions,
    pub pre_crawl_filters: Vec<TaskHandlerOptions>,
    pub post_crawl_filters: Vec<TaskHandlerOptions>,
    pub indexer: TaskHandlerOptions,
    pub rankers: Vec<TaskHandlerOptions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralOptions {
    pub version: String,

    pub listen_addr: String,
    pub listen_port: u16,
    pub server_timeout_in_seconds: u64,

    pub file_bulk_output_qty: usize,

    #[serde(default)]
    pub log_file: bool,
    #[serde(default = "default_log_console")]
    pub log_console: bool,
    pub metric_output_per_seconds: u64,

    pub connection_protocol: String,
    pub request_timeout_in_seconds: u64,
    pub min_content_length_in_bytes: u64,
    pub max_content_length_in_bytes: u64,
    pub content_read_limit_in_bytes: u64,
    pub concurrent_connections: usize,

    pub indexer_output_limit: usize,
}

fn default_log_console() -> bool {
    true
}

/// A handler's configuration: its registry type tag plus four typed option
/// maps, filled from the raw TOML table by value type. Built once at startup
/// and immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct TaskHandlerOptions {
    pub type_tag: String,
    pub string_options: BTreeMap<String, String>,
    pub int_options: BTreeMap<String, i64>,
    pub float_options: BTreeMap<String, f64>,
    pub bool_options: BTreeMap<String, bool>,
}

impl TaskHandlerOptions {
    pub fn from_table(table: &toml::Table) -> anyhow::Result<Self> {
        let type_tag = table
            .get("type")
            .and_then(toml::Value::as_str)
            .context("handler table is missing the mandatory type field")?
            .to_string();

        let mut options = Self {
            type_tag,
            ..Self::default()
        };

        for (key, value) in table {
            match value {
                toml::Value::String(text) => {
                    options.string_options.insert(key.clone(), text.clone());
                }
                toml::Value::Integer(int_value) => {
                    options.int_options.insert(key.clone(), *int_value);
                }
                toml::Value::Float(float_value) => {
                    options.float_options.insert(key.clone(), *float_value);
                }
                toml::Value::Boolean(flag) => {
                    options.bool_options.insert(key.clone(), *flag);
                }
                _ => {}
            }
        }

        Ok(options)
    }

    pub fn require_string(&self, key: &str) -> anyhow::Result<&str> {
        self.string_options
            .get(key)
            .map(String::as_str)
            .with_context(|| format!("unable to find {key} config option"))
    }

    pub fn require_int(&self, key: &str) -> anyhow::Result<i64> {
        self.int_options
            .get(key)
            .copied()
            .with_context(|| format!("unable to find {key} config option"))
    }

    pub fn require_float(&self, key: &str) -> anyhow::Result<f64> {
        self.float_options
            .get(key)
            .copied()
            .with_context(|| format!("unable to find {key} config option"))
    }

    pub fn require_bool(&self, key: &str) -> anyhow::Result<bool> {
        self.bool_options
            .get(key)
            .copied()
            .with_context(|| format!("unable to find {key} config option"))
    }
}
