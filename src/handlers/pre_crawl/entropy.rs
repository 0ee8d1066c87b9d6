use super::label_before_last_dot;
use crate::common::DomainProperties;
use crate::config::TaskHandlerOptions;
use crate::handlers::PreCrawlFilter;
use std::collections::HashSet;

/// Drops machine-generated-looking domains: the more distinct characters a
/// label uses relative to its length, the more it resembles a random string.
#[derive(Default)]
pub struct EntropyFilter {
    discard_ratio: f64,
}

impl PreCrawlFilter for EntropyFilter {
    fn initialize(&mut self, options: &TaskHandlerOptions) -> anyhow::Result<()> {
        self.discard_ratio = options.require_float("discard_ratio")?;
        Ok(())
    }

    fn input(&mut self, properties: DomainProperties) -> Option<DomainProperties> {
        let label = label_before_last_dot(&properties.domain_name);
        if label.is_empty() {
            return Some(properties);
        }

        let unique_characters: HashSet<char> = label.chars().collect();
        let ratio = unique_characters.len() as f64 / label.chars().count() as f64;

        if ratio >= self.discard_ratio {
            None
        } else {
            Some(properties)
        }
    }

    fn type_tag(&self) -> &'static str {
        "builtin.discard_high_entropy"
    }
}
