//! Post-Crawl Filter Tests

#[cfg(test)]
mod tests {
    use crate::common::DomainProperties;
    use crate::config::TaskHandlerOptions;
    use crate::handlers::post_crawl::DescriptionFilter;
    use crate::handlers::PostCrawlFilter;
    use reqwest::header::HeaderMap;
    use scraper::Html;

    fn description_filter(pattern: &str) -> DescriptionFilter {
        let mut options = TaskHandlerOptions::default();
        options
            .string_options
            .insert("description_regex".to_string(), pattern.to_string());

        let mut filter = DescriptionFilter::default();
        filter.initialize(&options).unwrap();
        filter
    }

    fn record(domain_name: &str) -> DomainProperties {
        let mut properties = DomainProperties::new();
        properties.domain_name = domain_name.to_string();
        properties
    }

    // ============================================================
    // TEST 1: Description extraction and regex match
    // ============================================================

    #[test]
    fn test_matching_description_is_written_back() {
        // ARRANGE
        let filter = description_filter("(?i)electronics");
        let document = Html::parse_document(
            "<html><head>\
<meta charset=\"utf-8\">\
<meta name=\"description\" content=\"Cheap Electronics and gadgets\">\
</head><body></body></html>",
        );

        // ACT
        let output = filter.input(record("example.com"), &HeaderMap::new(), &document);

        // ASSERT
        let output = output.unwrap();
        assert_eq!(
            output.string_properties.get("description"),
            Some(&"Cheap Electronics and gadgets".to_string())
        );
    }

    #[test]
    fn test_non_matching_description_drops_record() {
        let filter = description_filter("^news");
        let document = Html::parse_document(
            "<html><head><meta name=\"description\" content=\"a shop\"></head></html>",
        );

        assert!(filter
            .input(record("example.com"), &HeaderMap::new(), &document)
            .is_none());
    }

    // ============================================================
    // TEST 2: Document walking edge cases
    // ============================================================

    #[test]
    fn test_first_description_with_content_wins() {
        let filter = description_filter(".+");
        let document = Html::parse_document(
            "<html><head>\
<meta name=\"description\">\
<meta name=\"description\" content=\"second one counts\">\
<meta name=\"description\" content=\"third is ignored\">\
</head></html>",
        );

        let output = filter
            .input(record("example.com"), &HeaderMap::new(), &document)
            .unwrap();
        assert_eq!(
            output.string_properties.get("description"),
            Some(&"second one counts".to_string())
        );
    }

    #[test]
    fn test_page_without_description_matches_only_empty_pattern() {
        let document = Html::parse_document("<html><head><title>t</title></head></html>");

        // Missing description behaves as an empty string: ".+" rejects it...
        let strict = description_filter(".+");
        assert!(strict
            .input(record("example.com"), &HeaderMap::new(), &document)
            .is_none());

        // ...while ".*" accepts it.
        let lenient = description_filter(".*");
        assert!(lenient
            .input(record("example.com"), &HeaderMap::new(), &document)
            .is_some());
    }

    #[test]
    fn test_truncated_html_is_still_searched() {
        let filter = description_filter("landing");
        let document = Html::parse_document(
            "<html><head><meta name=\"description\" content=\"landing page\"><body><p>cut off",
        );

        assert!(filter
            .input(record("example.com"), &HeaderMap::new(), &document)
            .is_some());
    }
}
