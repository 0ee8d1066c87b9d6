use crate::common::DomainProperties;
use crate::config::TaskHandlerOptions;
use crate::handlers::PostCrawlFilter;
use regex::Regex;
use reqwest::header::HeaderMap;
use scraper::{Html, Selector};

/// Keeps records whose page carries a `<meta name="description">` matching the
/// configured regex, and writes the matched description back into the record.
#[derive(Default)]
pub struct DescriptionFilter {
    description_regex: Option<Regex>,
    meta_selector: Option<Selector>,
}

impl PostCrawlFilter for DescriptionFilter {
    fn initialize(&mut self, options: &TaskHandlerOptions) -> anyhow::Result<()> {
        let pattern = options.require_string("description_regex")?;
        let description_regex = Regex::new(pattern)
            .map_err(|error| anyhow::anyhow!("unable to compile description_regex: {error}"))?;

        let meta_selector = Selector::parse(r#"meta[name="description"]"#)
            .map_err(|error| anyhow::anyhow!("unable to compile meta selector: {error}"))?;

        self.description_regex = Some(description_regex);
        self.meta_selector = Some(meta_selector);
        Ok(())
    }

    fn input(
        &self,
        mut properties: DomainProperties,
        _headers: &HeaderMap,
        document: &Html,
    ) -> Option<DomainProperties> {
        let description_regex = self.description_regex.as_ref()?;
        let meta_selector = self.meta_selector.as_ref()?;

        // First matching element in document order, skipping tags without a
        // content attribute.
        let description = document
            .select(meta_selector)
            .filter_map(|element| element.value().attr("content"))
            .next()
            .unwrap_or("");

        if description_regex.is_match(description) {
            properties
                .string_properties
                .insert("description".to_string(), description.to_string());
            Some(properties)
        } else {
            None
        }
    }

    fn type_tag(&self) -> &'static str {
        "builtin.description_filter"
    }
}
