use super::coordinator::Application;
use super::zone_line_totals;
use crate::checkpoint::{Stage, StageCheckpoint};
use crate::common::DomainProperties;

use anyhow::Context;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;

/// Checkpoint cadence for the indexer stage. Matches the indexer's own commit
/// batching, so a resume replays at most one batch of records.
const LINES_UNTIL_CHECKPOINT_SAVE: u64 = 1024;

impl Application {
    pub(super) async fn run_indexer(self: Arc<Self>) {
        if let Err(error) = self.index_pass().await {
            tracing::error!("Indexer stage failed: {error:#}");
            self.ctx.state.on_errored(&error.to_string());
            return;
        }

        if self.ctx.state.current_task() == super::ApplicationTask::ReadyToSearch {
            tracing::info!("Indexer tasks are finished. Ready to search!");
        }
    }

    pub(super) async fn index_pass(&self) -> anyhow::Result<()> {
        let totals = zone_line_totals(&self.ctx.zone_registry, |zone_name, _| {
            self.ctx.paths.post_crawl_output(zone_name)
        })?;
        self.ctx.state.set_total_work_items(totals.values().sum());

        let mut indexer = self.indexer.lock().await;
        let mut indexed_any_record = false;

        for zone_name in self.ctx.zone_registry.keys() {
            let mut checkpoint = self.ctx.checkpoints.get(zone_name, Stage::Indexer)?;
            if checkpoint.is_finished {
                indexed_any_record = true;
                self.ctx.state.increment_processed(totals[zone_name]);
                continue;
            }

            let input_path = self.ctx.paths.post_crawl_output(zone_name);
            if !input_path.exists() {
                self.ctx
                    .checkpoints
                    .save(zone_name, Stage::Indexer, &StageCheckpoint::finished())?;
                continue;
            }

            let start_line_index = checkpoint.line_index;

            let file = tokio::fs::File::open(&input_path).await.with_context(|| {
                format!("unable to open post-crawl cache {}", input_path.display())
            })?;
            let mut lines = tokio::io::BufReader::new(file).lines();

            let mut line_index: u64 = 0;
            let mut lines_until_save = LINES_UNTIL_CHECKPOINT_SAVE;
            while let Some(line) = lines.next_line().await.with_context(|| {
                format!("error reading post-crawl cache {}", input_path.display())
            })? {
                if self.ctx.shutdown.is_cancelled() {
                    // The checkpoint was last persisted at a batch boundary;
                    // resuming from there re-submits at most one batch.
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

                let properties = DomainProperties::from_json_str(trimmed).with_context(|| {
                    format!(
                        "corrupt post-crawl record at line {} of {}",
                        line_index,
                        input_path.display()
                    )
                })?;

                let index_id = create_index_id(zone_name, line_index);
                indexer
                    .index(&index_id, &properties)
                    .with_context(|| format!("unable to index record {index_id}"))?;
                indexed_any_record = true;

                line_index += 1;
                self.ctx.state.increment_processed(1);

                lines_until_save -= 1;
                if lines_until_save == 0 {
                    lines_until_save = LINES_UNTIL_CHECKPOINT_SAVE;
                    checkpoint = StageCheckpoint::at_line(line_index);
                    self.ctx
                        .checkpoints
                        .save(zone_name, Stage::Indexer, &checkpoint)?;
                }
            }

            self.ctx
                .checkpoints
                .save(zone_name, Stage::Indexer, &StageCheckpoint::finished())?;
        }

        if !indexed_any_record {
            self.ctx.state.on_errored(
                "Indexer didn't receive any records. Unable to continue to search.",
            );
            return Ok(());
        }

        self.ctx.state.on_ready_to_search();
        Ok(())
    }
}

/// Ids are `<zone>_<lineIndex>`; the zone's post-crawl output file plus the
/// line number is all the query path needs to recover the full record.
pub(super) fn create_index_id(zone_name: &str, line_index: u64) -> String {
    format!("{zone_name}_{line_index}")
}
