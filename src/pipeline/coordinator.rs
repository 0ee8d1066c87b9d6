use super::context::{discover_zone_files, PipelineContext};
use super::state::{ApplicationState, ApplicationTask, StateManager};
use crate::checkpoint::CheckpointStore;
use crate::config::AppConfig;
use crate::crawler::{Crawler, CrawlerOptions};
use crate::handlers::{
    normalized_ranker_weights, HandlerRegistry, Indexer, PostCrawlFilter, PreCrawlFilter, Ranker,
};
use crate::paths::PathLayout;
use crate::server;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The pipeline coordinator: owns the handler chains, the crawler and the
/// shared context, sequences the three stages through the state machine, and
/// serves rankings once the index is ready.
pub struct Application {
    pub(super) ctx: Arc<PipelineContext>,
    pub(super) crawler: Crawler,
    pub(super) pre_crawl_filters: tokio::sync::Mutex<Vec<Box<dyn PreCrawlFilter>>>,
    pub(super) post_crawl_filters: Vec<Box<dyn PostCrawlFilter>>,
    pub(super) indexer: tokio::sync::Mutex<Box<dyn Indexer>>,
    pub(super) rankers: Vec<Box<dyn Ranker>>,
    pub(super) ranker_weights: HashMap<String, f64>,
    // Rankings run one at a time; overlapping queries queue here instead of
    // racing the state machine.
    pub(super) ranking_lock: tokio::sync::Mutex<()>,
}

impl Application {
    pub fn new(config: AppConfig, paths: PathLayout) -> anyhow::Result<Arc<Self>> {
        let registry = HandlerRegistry::with_builtins();

        tracing::info!("Initializing task handlers");
        let pre_crawl_filters = registry.resolve_pre_crawl_chain(&config.pre_crawl_filters)?;
        let post_crawl_filters = registry.resolve_post_crawl_chain(&config.post_crawl_filters)?;
        let indexer = registry.resolve_indexer(
            &config.indexer,
            &paths.indexer_dir(&config.indexer.type_tag),
            config.general.indexer_output_limit,
        )?;
        let rankers = registry.resolve_rankers(&config.rankers)?;
        let ranker_weights = normalized_ranker_weights(&config.rankers);

        let zone_registry = discover_zone_files(paths.zone_files_dir())?;
        tracing::info!("Discovered {} zone file(s)", zone_registry.len());

        let checkpoints = CheckpointStore::open(&paths.checkpoint_db_dir())?;

        let crawler = Crawler::new(CrawlerOptions {
            timeout: Duration::from_secs(config.general.request_timeout_in_seconds),
            min_content_length: config.general.min_content_length_in_bytes,
            max_content_length: config.general.max_content_length_in_bytes,
            content_read_limit: config.general.content_read_limit_in_bytes,
        })?;

        Ok(Arc::new(Self {
            ctx: Arc::new(PipelineContext {
                config,
                paths,
                zone_registry,
                state: StateManager::new(),
                checkpoints,
                shutdown: CancellationToken::new(),
            }),
            crawler,
            pre_crawl_filters: tokio::sync::Mutex::new(pre_crawl_filters),
            post_crawl_filters,
            indexer: tokio::sync::Mutex::new(indexer),
            rankers,
            ranker_weights,
            ranking_lock: tokio::sync::Mutex::new(()),
        }))
    }

    pub fn state_snapshot(&self) -> ApplicationState {
        self.ctx.state.snapshot()
    }

    pub fn config(&self) -> &AppConfig {
        &self.ctx.config
    }

    /// Drives the whole pipeline: installs the signal handlers, starts the
    /// HTTP listener and the metrics ticker, then ticks the state machine
    /// until shutdown. `user_query` (from the CLI) triggers a single ranking
    /// once the pipeline first reaches `ReadyToSearch`.
    pub async fn run(self: Arc<Self>, user_query: Option<String>) -> anyhow::Result<()> {
        self.spawn_signal_handler()?;
        self.spawn_metrics_ticker();
        let server_task = self.spawn_http_server();

        let mut stage_tasks: Vec<JoinHandle<()>> = Vec::new();
        let mut query_issued = false;

        loop {
            let current_task = self.ctx.state.current_task();
            match current_task {
                ApplicationTask::Shutdown => break,
                ApplicationTask::Initializing => {
                    self.ctx.state.on_pre_crawl_filters_started();
                    stage_tasks.push(tokio::spawn(Arc::clone(&self).run_pre_crawl_filters()));
                }
                ApplicationTask::FinishedPreCrawlFilters => {
                    self.ctx.state.on_post_crawl_filters_started();
                    stage_tasks.push(tokio::spawn(Arc::clone(&self).run_post_crawl_filters()));
                }
                ApplicationTask::FinishedPostCrawlFilters => {
                    self.ctx.state.on_indexing_started();
                    stage_tasks.push(tokio::spawn(Arc::clone(&self).run_indexer()));
                }
                ApplicationTask::ReadyToSearch => {
                    if let Some(query) = user_query.as_deref() {
                        if !query_issued {
                            query_issued = true;
                            if let Err(error) = self.rank(query).await {
                                tracing::error!("Ranking failed: {error:#}");
                            }
                        }
                    }
                }
                _ => {}
            }

            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        // Bounded graceful HTTP shutdown, then wait for stage runners to
        // flush and persist their checkpoints.
        if tokio::time::timeout(Duration::from_secs(5), server_task)
            .await
            .is_err()
        {
            tracing::error!("HTTP server did not shut down within 5 seconds.");
        }

        for stage_task in stage_tasks {
            let _ = stage_task.await;
        }

        tracing::info!("Application shut down.");
        Ok(())
    }

    /// First signal: graceful shutdown. Second signal: immediate exit.
    fn spawn_signal_handler(&self) -> anyhow::Result<()> {
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let ctx = Arc::clone(&self.ctx);

        tokio::spawn(async move {
            let mut signals_seen = 0u32;
            loop {
                tokio::select! {
                    _ = interrupt.recv() => {}
                    _ = terminate.recv() => {}
                }

                signals_seen += 1;
                if signals_seen == 1 {
                    tracing::warn!("Received interrupt signal. Starting graceful shutdown...");
                    ctx.state.on_shutdown();
                    ctx.shutdown.cancel();
                } else {
                    tracing::warn!("Received second interrupt signal. Quitting immediately...");
                    std::process::exit(1);
                }
            }
        });

        Ok(())
    }

    fn spawn_metrics_ticker(&self) {
        let ctx = Arc::clone(&self.ctx);
        let period = Duration::from_secs(ctx.config.general.metric_output_per_seconds.max(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ctx.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let state = ctx.state.snapshot();
                        tracing::info!(
                            "Metrics task={} total_work_items={} processed_work_items={} \
remaining_work_items={} estimate_remaining_seconds={}",
                            state.task,
                            state.total_work_items,
                            state.processed_work_items,
                            state.remaining_work_items,
                            state.estimated_remaining_seconds,
                        );
                    }
                }
            }
        });
    }

    fn spawn_http_server(self: &Arc<Self>) -> JoinHandle<()> {
        let app = Arc::clone(self);
        let shutdown = self.ctx.shutdown.clone();

        tokio::spawn(async move {
            if let Err(error) = server::serve(app, shutdown).await {
                tracing::error!("Server launch failed: {error:#}");
                std::process::exit(1);
            }
        })
    }
}
