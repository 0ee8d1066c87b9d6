//! Pipeline Module Tests
//!
//! Covers the lifecycle state machine, score normalization, index id parsing,
//! zone-file line parsing, and the resumable stage runners over real temp
//! files (with the random indexer, so no text index or network is involved).

#[cfg(test)]
mod tests {
    use crate::checkpoint::{Stage, StageCheckpoint};
    use crate::common::DomainProperties;
    use crate::config::{AppConfig, GeneralOptions, TaskHandlerOptions};
    use crate::handlers::PreCrawlFilter;
    use crate::paths::PathLayout;
    use crate::pipeline::index::create_index_id;
    use crate::pipeline::pre_crawl::parse_zone_file_line;
    use crate::pipeline::query::{normalize_indexer_scores, parse_index_id};
    use crate::pipeline::state::StateManager;
    use crate::pipeline::{Application, ApplicationTask};
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Arc;

    fn test_general_options() -> GeneralOptions {
        GeneralOptions {
            version: "1.0".to_string(),
            listen_addr: "127.0.0.1".to_string(),
            listen_port: 0,
            server_timeout_in_seconds: 5,
            file_bulk_output_qty: 64,
            log_file: false,
            log_console: true,
            metric_output_per_seconds: 5,
            connection_protocol: "http".to_string(),
            request_timeout_in_seconds: 1,
            min_content_length_in_bytes: 1,
            max_content_length_in_bytes: 1024 * 1024,
            content_read_limit_in_bytes: 64 * 1024,
            concurrent_connections: 4,
            indexer_output_limit: 100,
        }
    }

    fn test_config() -> AppConfig {
        let mut indexer = TaskHandlerOptions::default();
        indexer.type_tag = "builtin.random_indexer".to_string();

        let mut ranker = TaskHandlerOptions::default();
        ranker.type_tag = "builtin.indexer_ranker".to_string();
        ranker.float_options.insert("weight".to_string(), 1.0);

        AppConfig {
            general: test_general_options(),
            pre_crawl_filters: Vec::new(),
            post_crawl_filters: Vec::new(),
            indexer,
            rankers: vec![ranker],
        }
    }

    /// Builds an application over a temp workspace with one zone file.
    fn test_application(dir: &tempfile::TempDir, zone_lines: &str) -> Arc<Application> {
        let zone_files_dir = dir.path().join("zone-files");
        fs::create_dir_all(&zone_files_dir).unwrap();
        fs::write(zone_files_dir.join("com.txt"), zone_lines).unwrap();

        let paths = PathLayout::new(
            &dir.path().join("config.toml"),
            &dir.path().join("cache"),
            &zone_files_dir,
        )
        .unwrap();

        Application::new(test_config(), paths).unwrap()
    }

    // ============================================================
    // TEST 1: State machine
    // ============================================================

    #[test]
    fn test_state_machine_walks_the_full_lifecycle() {
        let manager = StateManager::new();
        assert_eq!(manager.current_task(), ApplicationTask::Initializing);

        manager.on_pre_crawl_filters_started();
        manager.on_pre_crawl_filters_finished();
        manager.on_post_crawl_filters_started();
        manager.on_post_crawl_filters_finished();
        manager.on_indexing_started();
        manager.on_ready_to_search();
        assert!(manager.try_ranking_started());
        manager.on_ranking_finished();

        assert_eq!(manager.current_task(), ApplicationTask::ReadyToSearch);
    }

    #[test]
    fn test_ranking_guard_refuses_instead_of_panicking() {
        let manager = StateManager::new();

        // Not searchable yet
        assert!(!manager.try_ranking_started());
        assert_eq!(manager.current_task(), ApplicationTask::Initializing);

        manager.on_pre_crawl_filters_started();
        manager.on_pre_crawl_filters_finished();
        manager.on_post_crawl_filters_started();
        manager.on_post_crawl_filters_finished();
        manager.on_indexing_started();
        manager.on_ready_to_search();

        // A ranking in flight refuses the next one; it does not panic
        assert!(manager.try_ranking_started());
        assert!(!manager.try_ranking_started());
        manager.on_ranking_finished();
        assert!(manager.try_ranking_started());
    }

    #[test]
    fn test_ranking_finish_yields_to_mid_ranking_shutdown() {
        let manager = StateManager::new();
        manager.on_pre_crawl_filters_started();
        manager.on_pre_crawl_filters_finished();
        manager.on_post_crawl_filters_started();
        manager.on_post_crawl_filters_finished();
        manager.on_indexing_started();
        manager.on_ready_to_search();
        assert!(manager.try_ranking_started());

        manager.on_shutdown();
        manager.on_ranking_finished();

        assert_eq!(manager.current_task(), ApplicationTask::Shutdown);
    }

    #[test]
    #[should_panic(expected = "state transition violation")]
    fn test_invalid_transition_panics() {
        let manager = StateManager::new();
        // Post-crawl cannot start from Initializing
        manager.on_post_crawl_filters_started();
    }

    #[test]
    fn test_errored_and_shutdown_are_reachable_from_any_state() {
        let manager = StateManager::new();
        manager.on_pre_crawl_filters_started();
        manager.on_errored("boom");
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.task, ApplicationTask::Errored);
        assert_eq!(snapshot.error_details, "boom");

        manager.on_shutdown();
        assert_eq!(manager.current_task(), ApplicationTask::Shutdown);
    }

    #[test]
    fn test_progress_is_monotonic_and_bounded_by_total() {
        let manager = StateManager::new();
        manager.on_pre_crawl_filters_started();
        manager.set_total_work_items(10);

        let mut last_processed = 0;
        for _ in 0..10 {
            manager.increment_processed(1);
            let snapshot = manager.snapshot();
            assert!(snapshot.processed_work_items > last_processed);
            assert!(snapshot.processed_work_items <= snapshot.total_work_items);
            last_processed = snapshot.processed_work_items;
        }

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.remaining_work_items, 0);
    }

    // ============================================================
    // TEST 2: Score normalization
    // ============================================================

    #[test]
    fn test_normalize_maps_extremes_to_zero_and_one() {
        let mut scores = HashMap::new();
        scores.insert("com_0".to_string(), 2.0);
        scores.insert("com_1".to_string(), 4.0);
        scores.insert("com_2".to_string(), 6.0);

        let normalized = normalize_indexer_scores(&scores);

        assert_eq!(normalized["com_0"], 0.0);
        assert_eq!(normalized["com_1"], 0.5);
        assert_eq!(normalized["com_2"], 1.0);
    }

    #[test]
    fn test_normalize_zero_range_maps_everything_to_one() {
        let mut scores = HashMap::new();
        scores.insert("com_0".to_string(), 3.0);
        scores.insert("com_1".to_string(), 3.0);

        let normalized = normalize_indexer_scores(&scores);

        assert_eq!(normalized["com_0"], 1.0);
        assert_eq!(normalized["com_1"], 1.0);
    }

    #[test]
    fn test_normalize_empty_scores() {
        assert!(normalize_indexer_scores(&HashMap::new()).is_empty());
    }

    // ============================================================
    // TEST 3: Index ids
    // ============================================================

    #[test]
    fn test_index_id_round_trip() {
        let index_id = create_index_id("com", 42);
        assert_eq!(index_id, "com_42");
        assert_eq!(parse_index_id(&index_id).unwrap(), ("com".to_string(), 42));
    }

    #[test]
    fn test_index_id_zone_names_may_contain_underscores() {
        // Split happens at the last underscore; the suffix must integer-parse
        let (zone_name, line_index) = parse_index_id("my_zone_7").unwrap();
        assert_eq!(zone_name, "my_zone");
        assert_eq!(line_index, 7);
    }

    #[test]
    fn test_index_id_rejects_malformed_input() {
        assert!(parse_index_id("nounderscore").is_err());
        assert!(parse_index_id("zone_notanumber").is_err());
    }

    // ============================================================
    // TEST 4: Zone-file line parsing
    // ============================================================

    #[test]
    fn test_parse_canonical_ns_record() {
        let properties = parse_zone_file_line("example.com. 3600 IN NS ns1.example.net.").unwrap();

        assert_eq!(properties.domain_name, "example.com");
        assert_eq!(
            properties.string_properties.get("ttl"),
            Some(&"3600".to_string())
        );
        assert_eq!(
            properties.string_properties.get("record_class"),
            Some(&"IN".to_string())
        );
        assert_eq!(
            properties.string_properties.get("record_type"),
            Some(&"NS".to_string())
        );
        assert_eq!(
            properties.string_properties.get("record_data"),
            Some(&"ns1.example.net.".to_string())
        );
    }

    #[test]
    fn test_parse_joins_extra_fields_into_record_data() {
        let properties =
            parse_zone_file_line("example.com. 3600 IN TXT \"v=spf1\" include:other -all").unwrap();
        assert_eq!(
            properties.string_properties.get("record_data"),
            Some(&"\"v=spf1\" include:other -all".to_string())
        );
    }

    #[test]
    fn test_parse_skips_comments_blanks_and_short_lines() {
        assert!(parse_zone_file_line("").is_none());
        assert!(parse_zone_file_line("   ").is_none());
        assert!(parse_zone_file_line("; a comment line that would otherwise parse").is_none());
        assert!(parse_zone_file_line("example.com. 3600 IN").is_none());
    }

    // ============================================================
    // TEST 5: Pre-crawl runner over a real zone file
    // ============================================================

    #[tokio::test]
    async fn test_pre_crawl_pass_writes_one_record_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_application(
            &dir,
            "a.com. 3600 in ns ns1.example.net.\n\
b.com. 3600 in ns ns1.example.net.\n\
; comment\n\
c.com. 3600 in ns ns1.example.net.\n",
        );

        app.ctx.state.on_pre_crawl_filters_started();
        app.pre_crawl_pass().await.unwrap();

        assert_eq!(
            app.ctx.state.current_task(),
            ApplicationTask::FinishedPreCrawlFilters
        );

        let output = fs::read_to_string(app.ctx.paths.pre_crawl_output("com")).unwrap();
        let records: Vec<DomainProperties> = output
            .lines()
            .map(|line| DomainProperties::from_json_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].domain_name, "a.com");
        assert_eq!(records[2].domain_name, "c.com");

        let checkpoint = app.ctx.checkpoints.get("com", Stage::PreCrawl).unwrap();
        assert!(checkpoint.is_finished);
    }

    #[tokio::test]
    async fn test_pre_crawl_pass_resumes_from_checkpoint_without_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_application(
            &dir,
            "a.com. 3600 in ns ns1.example.net.\n\
b.com. 3600 in ns ns1.example.net.\n\
c.com. 3600 in ns ns1.example.net.\n\
d.com. 3600 in ns ns1.example.net.\n",
        );

        // Simulate a prior run that durably processed the first two lines
        let partial = "{\"domainName\":\"a.com\"}\n{\"domainName\":\"b.com\"}\n";
        let output_path = app.ctx.paths.pre_crawl_output("com");
        fs::create_dir_all(output_path.parent().unwrap()).unwrap();
        fs::write(&output_path, partial).unwrap();
        app.ctx
            .checkpoints
            .save("com", Stage::PreCrawl, &StageCheckpoint::at_line(2))
            .unwrap();

        app.ctx.state.on_pre_crawl_filters_started();
        app.pre_crawl_pass().await.unwrap();

        let output = fs::read_to_string(&output_path).unwrap();
        let domains: Vec<String> = output
            .lines()
            .map(|line| {
                DomainProperties::from_json_str(line)
                    .unwrap()
                    .domain_name
            })
            .collect();

        // Exactly what a non-crashing run would have produced
        assert_eq!(domains, vec!["a.com", "b.com", "c.com", "d.com"]);
    }

    /// Passes records through untouched and panics partway in, simulating a
    /// crash between an auto-flush and the next checkpoint write.
    #[derive(Default)]
    struct CrashingFilter {
        inputs_seen: usize,
    }

    impl PreCrawlFilter for CrashingFilter {
        fn initialize(&mut self, _options: &TaskHandlerOptions) -> anyhow::Result<()> {
            Ok(())
        }

        fn input(&mut self, properties: DomainProperties) -> Option<DomainProperties> {
            self.inputs_seen += 1;
            if self.inputs_seen > 3 {
                panic!("simulated crash mid-stage");
            }
            Some(properties)
        }

        fn type_tag(&self) -> &'static str {
            "test.crashing_filter"
        }
    }

    #[tokio::test]
    async fn test_pre_crawl_auto_flush_checkpoint_resumes_without_duplicates() {
        let zone_lines = "a.com. 3600 in ns ns1.example.net.\n\
b.com. 3600 in ns ns1.example.net.\n\
c.com. 3600 in ns ns1.example.net.\n\
d.com. 3600 in ns ns1.example.net.\n\
e.com. 3600 in ns ns1.example.net.\n\
f.com. 3600 in ns ns1.example.net.\n";

        let dir = tempfile::tempdir().unwrap();
        // The fixture's bulk output limit (64 bytes) is smaller than one
        // encoded record, so every append flushes and writes a checkpoint.
        let app = test_application(&dir, zone_lines);
        *app.pre_crawl_filters.lock().await = vec![Box::new(CrashingFilter::default())];

        app.ctx.state.on_pre_crawl_filters_started();
        let crashed_pass = {
            let app = Arc::clone(&app);
            tokio::spawn(async move { app.pre_crawl_pass().await })
        };
        assert!(crashed_pass.await.is_err());

        // Three records hit the disk before the crash; the last runner-written
        // checkpoint must point past the last durable line.
        let checkpoint = app.ctx.checkpoints.get("com", Stage::PreCrawl).unwrap();
        assert!(!checkpoint.is_finished);
        assert_eq!(checkpoint.line_index, 3);

        // Restart with a fresh application over the same cache
        drop(app);
        let app = test_application(&dir, zone_lines);
        app.ctx.state.on_pre_crawl_filters_started();
        app.pre_crawl_pass().await.unwrap();

        let output = fs::read_to_string(app.ctx.paths.pre_crawl_output("com")).unwrap();
        let domains: Vec<String> = output
            .lines()
            .map(|line| {
                DomainProperties::from_json_str(line)
                    .unwrap()
                    .domain_name
            })
            .collect();

        assert_eq!(
            domains,
            vec!["a.com", "b.com", "c.com", "d.com", "e.com", "f.com"]
        );
    }

    #[tokio::test]
    async fn test_pre_crawl_pass_stops_without_advancing_state_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_application(&dir, "a.com. 3600 in ns ns1.example.net.\n");

        app.ctx.state.on_pre_crawl_filters_started();
        app.ctx.shutdown.cancel();
        app.pre_crawl_pass().await.unwrap();

        // The stage neither finished nor errored; a later run resumes it
        assert_eq!(
            app.ctx.state.current_task(),
            ApplicationTask::RunningPreCrawlFilters
        );
        assert!(!app
            .ctx
            .checkpoints
            .get("com", Stage::PreCrawl)
            .unwrap()
            .is_finished);
    }

    // ============================================================
    // TEST 6: Post-crawl runner error path (no network involved)
    // ============================================================

    #[tokio::test]
    async fn test_post_crawl_pass_with_no_input_enters_errored() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_application(&dir, "a.com. 3600 in ns ns1.example.net.\n");

        // Pre-crawl never ran, so there is no pre-crawl cache at all
        app.ctx.state.on_pre_crawl_filters_started();
        app.ctx.state.on_pre_crawl_filters_finished();
        app.ctx.state.on_post_crawl_filters_started();
        app.post_crawl_pass().await.unwrap();

        let snapshot = app.ctx.state.snapshot();
        assert_eq!(snapshot.task, ApplicationTask::Errored);
        assert!(snapshot.error_details.contains("didn't produce any output"));
    }

    // ============================================================
    // TEST 7: Indexer runner and the query path
    // ============================================================

    #[tokio::test]
    async fn test_index_pass_and_rank_over_post_crawl_cache() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_application(&dir, "a.com. 3600 in ns ns1.example.net.\n");

        // Hand-write a post-crawl cache as if the crawl stage had succeeded
        let cache_path = app.ctx.paths.post_crawl_output("com");
        fs::create_dir_all(cache_path.parent().unwrap()).unwrap();
        fs::write(
            &cache_path,
            "{\"domainName\":\"a.com\",\"description\":\"first\"}\n\
{\"domainName\":\"b.com\",\"description\":\"second\"}\n",
        )
        .unwrap();

        app.ctx.state.on_pre_crawl_filters_started();
        app.ctx.state.on_pre_crawl_filters_finished();
        app.ctx.state.on_post_crawl_filters_started();
        app.ctx.state.on_post_crawl_filters_finished();
        app.ctx.state.on_indexing_started();
        app.index_pass().await.unwrap();

        assert_eq!(app.ctx.state.current_task(), ApplicationTask::ReadyToSearch);
        assert!(app
            .ctx
            .checkpoints
            .get("com", Stage::Indexer)
            .unwrap()
            .is_finished);

        // The random indexer scored both records; ranking hydrates them back
        // from the cache file and writes the ranking output.
        app.rank("anything").await.unwrap();
        assert_eq!(app.ctx.state.current_task(), ApplicationTask::ReadyToSearch);

        let ranking = fs::read_to_string(app.ctx.paths.ranking_output()).unwrap();
        let ranked: Vec<DomainProperties> = ranking
            .lines()
            .map(|line| DomainProperties::from_json_str(line).unwrap())
            .collect();
        assert_eq!(ranked.len(), 2);
        for properties in &ranked {
            assert!(properties.float_properties.contains_key("indexer_score"));
            assert!(properties
                .float_properties
                .contains_key("normalized_indexer_score"));
        }

        // Overlapping queries are serialized, not a process-killing
        // transition violation; both complete and the pipeline stays
        // searchable.
        let (first, second) = tokio::join!(app.rank("one"), app.rank("two"));
        first.unwrap();
        second.unwrap();
        assert_eq!(app.ctx.state.current_task(), ApplicationTask::ReadyToSearch);
    }

    // ============================================================
    // TEST 8: Ranker fusion
    // ============================================================

    #[tokio::test]
    async fn test_fused_score_applies_normalized_weight() {
        let dir = tempfile::tempdir().unwrap();
        // The test config has a single indexer ranker with weight 1.0, so the
        // fused score equals the normalized indexer score.
        let app = test_application(&dir, "a.com. 3600 in ns ns1.example.net.\n");

        let mut properties = DomainProperties::new();
        properties.domain_name = "a.com".to_string();
        properties
            .float_properties
            .insert("normalized_indexer_score".to_string(), 0.6);

        assert_eq!(app.fused_score(&properties, "query"), 0.6);

        let mut unscored = DomainProperties::new();
        unscored.domain_name = "b.com".to_string();
        assert_eq!(app.fused_score(&unscored, "query"), 0.0);
    }

    #[tokio::test]
    async fn test_run_rankers_sorts_descending_by_fused_score() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_application(&dir, "a.com. 3600 in ns ns1.example.net.\n");

        let record = |domain_name: &str, normalized_score: f64| {
            let mut properties = DomainProperties::new();
            properties.domain_name = domain_name.to_string();
            properties
                .float_properties
                .insert("normalized_indexer_score".to_string(), normalized_score);
            properties
        };

        let ranked = app.run_rankers(
            vec![record("low.com", 0.2), record("high.com", 0.9), record("mid.com", 0.5)],
            "query",
        );

        let order: Vec<&str> = ranked
            .iter()
            .map(|properties| properties.domain_name.as_str())
            .collect();
        assert_eq!(order, vec!["high.com", "mid.com", "low.com"]);
    }
}
