use super::label_before_last_dot;
use crate::common::DomainProperties;
use crate::config::TaskHandlerOptions;
use crate::handlers::PreCrawlFilter;

/// Drops domains whose label falls outside a configured length band.
#[derive(Default)]
pub struct LengthFilter {
    min_length: i64,
    max_length: i64,
}

impl PreCrawlFilter for LengthFilter {
    fn initialize(&mut self, options: &TaskHandlerOptions) -> anyhow::Result<()> {
        self.min_length = options.require_int("min_length")?;
        self.max_length = options.require_int("max_length")?;
        Ok(())
    }

    fn input(&mut self, properties: DomainProperties) -> Option<DomainProperties> {
        let label_length = label_before_last_dot(&properties.domain_name).chars().count() as i64;

        if label_length < self.min_length || label_length > self.max_length {
            None
        } else {
            Some(properties)
        }
    }

    fn type_tag(&self) -> &'static str {
        "builtin.length_filter"
    }
}
