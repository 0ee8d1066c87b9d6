use super::coordinator::Application;
use super::zone_line_totals;
use crate::checkpoint::{Stage, StageCheckpoint};
use crate::common::DomainProperties;
use crate::filebuf::{FileOutputBuffer, FileOutputBufferOptions};

use anyhow::Context;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

impl Application {
    pub(super) async fn run_post_crawl_filters(self: Arc<Self>) {
        if let Err(error) = self.post_crawl_pass().await {
            tracing::error!("Post-crawl stage failed: {error:#}");
            self.ctx.state.on_errored(&error.to_string());
            return;
        }

        if self.ctx.state.current_task() == super::ApplicationTask::FinishedPostCrawlFilters {
            tracing::info!("Post-crawl filter tasks are finished.");
        }
    }

    pub(super) async fn post_crawl_pass(self: &Arc<Self>) -> anyhow::Result<()> {
        let totals = zone_line_totals(&self.ctx.zone_registry, |zone_name, _| {
            self.ctx.paths.pre_crawl_output(zone_name)
        })?;
        self.ctx.state.set_total_work_items(totals.values().sum());

        let concurrent_connections = self.ctx.config.general.concurrent_connections.max(1);
        let connectors = Arc::new(Semaphore::new(concurrent_connections));

        // Child token: cancelling it aborts in-flight crawls without
        // disturbing the rest of the application.
        let crawl_cancel = self.ctx.shutdown.child_token();
        let has_appended_once = Arc::new(AtomicBool::new(false));

        for zone_name in self.ctx.zone_registry.keys() {
            let checkpoint = self.ctx.checkpoints.get(zone_name, Stage::PostCrawl)?;
            if checkpoint.is_finished {
                has_appended_once.store(true, Ordering::SeqCst);
                self.ctx.state.increment_processed(totals[zone_name]);
                continue;
            }

            let input_path = self.ctx.paths.pre_crawl_output(zone_name);
            if !input_path.exists() {
                // The zone cleanly produced no pre-crawl output; nothing to do.
                self.ctx
                    .checkpoints
                    .save(zone_name, Stage::PostCrawl, &StageCheckpoint::finished())?;
                continue;
            }

            let start_line_index = checkpoint.line_index;

            // Appends land out of input order, so the checkpoint can only be
            // derived from the durable append count: resuming skips
            // `start_line + appended` input lines, which trades exact replay
            // for a bounded, well-defined one.
            let buffer = {
                let ctx = Arc::clone(&self.ctx);
                let zone_name = zone_name.clone();
                Arc::new(FileOutputBuffer::new(FileOutputBufferOptions {
                    bulk_output_limit: ctx.config.general.file_bulk_output_qty,
                    file_path: ctx.paths.post_crawl_output(&zone_name),
                    on_append: Some(Box::new({
                        let ctx = Arc::clone(&ctx);
                        move || ctx.state.increment_processed(1)
                    })),
                    on_flush: Some(Box::new(move |appended| {
                        let checkpoint = StageCheckpoint::at_line(start_line_index + appended);
                        if let Err(error) =
                            ctx.checkpoints
                                .save(&zone_name, Stage::PostCrawl, &checkpoint)
                        {
                            tracing::error!("Unable to save post-crawl checkpoint: {error}");
                        }
                    })),
                }))
            };

            let file = tokio::fs::File::open(&input_path).await.with_context(|| {
                format!("unable to open pre-crawl cache {}", input_path.display())
            })?;
            let mut lines = tokio::io::BufReader::new(file).lines();

            let mut line_index: u64 = 0;
            while let Some(line) = lines.next_line().await.with_context(|| {
                format!("error reading pre-crawl cache {}", input_path.display())
            })? {
                if self.ctx.shutdown.is_cancelled() {
                    crawl_cancel.cancel();
                    self.drain_connectors(&connectors, concurrent_connections).await;
                    buffer.flush()?;
                    return Ok(());
                }

                if line_index < start_line_index {
                    line_index += 1;
                    self.ctx.state.increment_processed(1);
                    continue;
                }

                let trimmed = line.trim();
                if trimmed.is_empty() {
                    line_index += 1;
                    self.ctx.state.increment_processed(1);
                    continue;
                }

                // On-disk JSON that fails to decode means data corruption, not
                // a record to skip.
                let properties = DomainProperties::from_json_str(trimmed).with_context(|| {
                    format!(
                        "corrupt pre-crawl record at line {} of {}",
                        line_index,
                        input_path.display()
                    )
                })?;

                let permit = Arc::clone(&connectors)
                    .acquire_owned()
                    .await
                    .context("connector semaphore closed")?;

                let app = Arc::clone(self);
                let cancel = crawl_cancel.clone();
                let task_buffer = Arc::clone(&buffer);
                let appended_flag = Arc::clone(&has_appended_once);
                tokio::spawn(async move {
                    let _permit = permit;
                    app.crawl_one(cancel, properties, task_buffer, appended_flag)
                        .await;
                });

                line_index += 1;
            }

            self.drain_connectors(&connectors, concurrent_connections).await;
            buffer.flush()?;
            self.ctx
                .checkpoints
                .save(zone_name, Stage::PostCrawl, &StageCheckpoint::finished())?;
        }

        if !has_appended_once.load(Ordering::SeqCst) {
            self.ctx.state.on_errored(
                "Post-crawl filters didn't produce any output. Unable to continue indexing.",
            );
            return Ok(());
        }

        self.ctx.state.on_post_crawl_filters_finished();
        Ok(())
    }

    /// Waits until every connector permit is back, i.e. all spawned crawl
    /// tasks have finished or been cancelled.
    async fn drain_connectors(&self, connectors: &Arc<Semaphore>, count: usize) {
        if let Ok(all_permits) = connectors.acquire_many(count as u32).await {
            drop(all_permits);
        }
    }

    /// One bounded-concurrency crawl task: DNS probe, robots gate, fetch,
    /// post-crawl filter chain, append. Progress advances exactly once per
    /// input record, on the first drop or on the durable append.
    async fn crawl_one(
        &self,
        cancel: CancellationToken,
        properties: DomainProperties,
        buffer: Arc<FileOutputBuffer>,
        has_appended_once: Arc<AtomicBool>,
    ) {
        if !self.crawler.has_dns_a(&cancel, &properties.domain_name).await {
            metrics::counter!("zfse_crawl_dns_miss").increment(1);
            self.ctx.state.increment_processed(1);
            return;
        }

        let url = format!(
            "{}://{}",
            self.ctx.config.general.connection_protocol, properties.domain_name
        );

        if !self.crawler.can_crawl(&cancel, &url).await {
            metrics::counter!("zfse_crawl_robots_denied").increment(1);
            self.ctx.state.increment_processed(1);
            return;
        }

        let (headers, document) = match self.crawler.crawl(&cancel, &url).await {
            Ok(page) => page,
            Err(error) => {
                tracing::debug!("Crawl failed for {url}: {error}");
                metrics::counter!("zfse_crawl_fetch_failed").increment(1);
                self.ctx.state.increment_processed(1);
                return;
            }
        };

        let mut current = properties;
        for filter in &self.post_crawl_filters {
            match filter.input(current, &headers, &document) {
                Some(output) => current = output,
                None => {
                    metrics::counter!("zfse_crawl_filtered").increment(1);
                    self.ctx.state.increment_processed(1);
                    return;
                }
            }
        }

        match current.to_json_string() {
            Ok(json) => {
                if let Err(error) = buffer.append(&json) {
                    tracing::error!("Unable to append post-crawl record: {error}");
                    self.ctx.state.increment_processed(1);
                    return;
                }
                has_appended_once.store(true, Ordering::SeqCst);
                metrics::counter!("zfse_crawl_appended").increment(1);
            }
            Err(error) => {
                tracing::error!("Unable to encode post-crawl record: {error}");
                self.ctx.state.increment_processed(1);
            }
        }
    }
}
