use crate::common::DomainProperties;
use crate::config::TaskHandlerOptions;
use crate::handlers::PreCrawlFilter;
use std::collections::HashSet;

/// Zone files repeat a domain once per record (several NS lines, glue records
/// and so on), clustered alphabetically. The running set only needs to be
/// large enough to span one such cluster, so it is cleared wholesale once it
/// outgrows this bound.
const DOMAIN_SET_LIMIT: usize = 1024;

/// Emits a record the first time its domain is seen.
#[derive(Default)]
pub struct UniqueDomainFilter {
    domain_set: HashSet<String>,
    nameserver_check: bool,
    discard_properties: bool,
}

impl PreCrawlFilter for UniqueDomainFilter {
    fn initialize(&mut self, options: &TaskHandlerOptions) -> anyhow::Result<()> {
        self.nameserver_check = options.require_bool("nameserver_check")?;
        self.discard_properties = options.require_bool("discard_properties")?;
        Ok(())
    }

    fn input(&mut self, mut properties: DomainProperties) -> Option<DomainProperties> {
        if self.nameserver_check {
            let is_nameserver_record = properties
                .string_properties
                .get("record_type")
                .is_some_and(|record_type| record_type.eq_ignore_ascii_case("ns"));
            if !is_nameserver_record {
                return None;
            }
        }

        if self.domain_set.contains(&properties.domain_name) {
            return None;
        }

        if self.domain_set.len() > DOMAIN_SET_LIMIT {
            self.domain_set.clear();
        }
        self.domain_set.insert(properties.domain_name.clone());

        if self.discard_properties {
            properties.string_properties.clear();
            properties.int_properties.clear();
            properties.float_properties.clear();
            properties.bool_properties.clear();
        }

        Some(properties)
    }

    fn type_tag(&self) -> &'static str {
        "builtin.unique_domain"
    }
}
