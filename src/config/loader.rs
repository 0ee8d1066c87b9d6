use super::types::{AppConfig, GeneralOptions, TaskHandlerOptions};
use anyhow::{bail, Context};
use std::fs;
use std::path::Path;

const CURRENT_CONFIG_VERSION: &str = "1.0";

pub fn load(path: &Path) -> anyhow::Result<AppConfig> {
    tracing::info!("Started parsing configuration.");

    let raw = fs::read_to_string(path)
        .with_context(|| format!("unable to read config file {}", path.display()))?;
    let table: toml::Table = raw
        .parse()
        .with_context(|| format!("config file {} is not valid TOML", path.display()))?;

    let general_value = table
        .get("General")
        .context("config file is missing the [General] table")?;

    // The version is checked before anything else is interpreted, so a stale
    // config fails with a clear message instead of a field-level parse error.
    let version = general_value
        .get("version")
        .and_then(toml::Value::as_str)
        .unwrap_or_default();
    if version != CURRENT_CONFIG_VERSION {
        bail!(
            "config version {:?} does not match the current version {:?}; \
             either migrate the existing configuration or delete it and re-run init",
            version,
            CURRENT_CONFIG_VERSION
        );
    }

    let general: GeneralOptions = general_value
        .clone()
        .try_into()
        .context("invalid [General] table")?;

    let pre_crawl_filters = handler_tables(&table, "PreCrawlFilters")?;
    let post_crawl_filters = handler_tables(&table, "PostCrawlFilters")?;
    let rankers = handler_tables(&table, "Rankers")?;

    let indexer = match table.get("Indexer") {
        Some(toml::Value::Table(indexer_table)) => TaskHandlerOptions::from_table(indexer_table)
            .context("invalid [Indexer] table")?,
        _ => bail!("config file is missing the [Indexer] table"),
    };

    // Every ranker needs a float "weight" option so the fused score stays well
    // defined after normalization.
    for ranker in &rankers {
        if !ranker.float_options.contains_key("weight") {
            bail!(
                "invalid ranker configuration for {:?}: \"weight\" option of float type is not specified",
                ranker.type_tag
            );
        }
    }

    tracing::info!("Finished parsing configuration.");

    Ok(AppConfig {
        general,
        pre_crawl_filters,
        post_crawl_filters,
        indexer,
        rankers,
    })
}

fn handler_tables(table: &toml::Table, key: &str) -> anyhow::Result<Vec<TaskHandlerOptions>> {
    let Some(value) = table.get(key) else {
        return Ok(Vec::new());
    };

    let entries = value
        .as_array()
        .with_context(|| format!("[[{key}]] must be an array of tables"))?;

    entries
        .iter()
        .map(|entry| {
            let entry_table = entry
                .as_table()
                .with_context(|| format!("every [[{key}]] entry must be a table"))?;
            TaskHandlerOptions::from_table(entry_table)
                .with_context(|| format!("invalid [[{key}]] entry"))
        })
        .collect()
}
