use super::coordinator::Application;
use super::zone_line_totals;
use crate::checkpoint::{Stage, StageCheckpoint};
use crate::common::DomainProperties;
use crate::filebuf::{FileOutputBuffer, FileOutputBufferOptions};
use crate::handlers::PreCrawlFilter;

use anyhow::Context;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;

impl Application {
    pub(super) async fn run_pre_crawl_filters(self: Arc<Self>) {
        if let Err(error) = self.pre_crawl_pass().await {
            tracing::error!("Pre-crawl stage failed: {error:#}");
            self.ctx.state.on_errored(&error.to_string());
            return;
        }

        if self.ctx.state.current_task() == super::ApplicationTask::FinishedPreCrawlFilters {
            tracing::info!("Pre-crawl filter tasks are finished.");
        }
    }

    pub(super) async fn pre_crawl_pass(&self) -> anyhow::Result<()> {
        let totals = zone_line_totals(&self.ctx.zone_registry, |_, zone_path| zone_path.clone())?;
        self.ctx
            .state
            .set_total_work_items(totals.values().sum());

        let mut filters = self.pre_crawl_filters.lock().await;
        let mut has_appended_once = false;

        for (zone_name, zone_path) in &self.ctx.zone_registry {
            let checkpoint = self.ctx.checkpoints.get(zone_name, Stage::PreCrawl)?;
            if checkpoint.is_finished {
                has_appended_once = true;
                self.ctx.state.increment_processed(totals[zone_name]);
                continue;
            }

            let start_line_index = checkpoint.line_index;

            // Shared with the flush callback: the runner is the only writer,
            // so the value read at flush time is the current resume point.
            let current_line = Arc::new(AtomicU64::new(0));
            let buffer = {
                let ctx = Arc::clone(&self.ctx);
                let zone_name = zone_name.clone();
                let current_line = Arc::clone(&current_line);
                FileOutputBuffer::new(FileOutputBufferOptions {
                    bulk_output_limit: ctx.config.general.file_bulk_output_qty,
                    file_path: ctx.paths.pre_crawl_output(&zone_name),
                    on_flush: Some(Box::new(move |_appended| {
                        let checkpoint =
                            StageCheckpoint::at_line(current_line.load(Ordering::SeqCst));
                        if let Err(error) =
                            ctx.checkpoints.save(&zone_name, Stage::PreCrawl, &checkpoint)
                        {
                            tracing::error!("Unable to save pre-crawl checkpoint: {error}");
                        }
                    })),
                    ..Default::default()
                })
            };

            let file = tokio::fs::File::open(zone_path)
                .await
                .with_context(|| format!("unable to open zone file {}", zone_path.display()))?;
            let mut lines = tokio::io::BufReader::new(file).lines();

            let mut line_index: u64 = 0;
            while let Some(line) = lines
                .next_line()
                .await
                .with_context(|| format!("error reading zone file {}", zone_path.display()))?
            {
                if self.ctx.shutdown.is_cancelled() {
                    buffer.flush()?;
                    return Ok(());
                }

                if line_index >= start_line_index {
                    if let Some(properties) = parse_zone_file_line(&line) {
                        if let Some(output) = run_filter_chain(&mut filters, properties) {
                            // If this append tips the buffer over the bulk
                            // limit, the flush makes this line durable, so the
                            // checkpoint it persists must point past it.
                            current_line.store(line_index + 1, Ordering::SeqCst);
                            buffer.append(&output.to_json_string()?)?;
                            has_appended_once = true;
                        }
                    }
                }

                line_index += 1;
                current_line.store(line_index, Ordering::SeqCst);
                self.ctx.state.increment_processed(1);
            }

            buffer.flush()?;
            self.ctx
                .checkpoints
                .save(zone_name, Stage::PreCrawl, &StageCheckpoint::finished())?;
        }

        if !has_appended_once {
            self.ctx.state.on_errored(
                "Pre-crawl filters didn't produce any output. Unable to continue indexing.",
            );
            return Ok(());
        }

        self.ctx.state.on_pre_crawl_filters_finished();
        Ok(())
    }
}

/// Parses one zone-file line into the initial record. Comment lines, blank
/// lines, and lines with fewer than the five standard master-file fields
/// (domain, TTL, class, type, data) are silently skipped.
pub(super) fn parse_zone_file_line(line: &str) -> Option<DomainProperties> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(';') {
        return None;
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 {
        return None;
    }

    let mut properties = DomainProperties::new();
    // Strip the DNS-canonical trailing dot: "example.com." -> "example.com"
    properties.domain_name = fields[0].strip_suffix('.').unwrap_or(fields[0]).to_string();
    properties
        .string_properties
        .insert("ttl".to_string(), fields[1].to_string());
    properties
        .string_properties
        .insert("record_class".to_string(), fields[2].to_string());
    properties
        .string_properties
        .insert("record_type".to_string(), fields[3].to_string());
    properties
        .string_properties
        .insert("record_data".to_string(), fields[4..].join(" "));

    Some(properties)
}

/// Chains the record through the filters; a `None` from any filter drops it.
pub(super) fn run_filter_chain(
    filters: &mut [Box<dyn PreCrawlFilter>],
    properties: DomainProperties,
) -> Option<DomainProperties> {
    let mut current = properties;
    for filter in filters.iter_mut() {
        current = filter.input(current)?;
    }
    Some(current)
}
