use super::coordinator::Application;
use crate::common::DomainProperties;
use crate::filebuf::{FileOutputBuffer, FileOutputBufferOptions};
use crate::util;

use anyhow::Context;
use std::cmp::Ordering;
use std::collections::HashMap;

impl Application {
    /// Runs one ranking: indexer query, score normalization, record hydration
    /// from the post-crawl caches, ranker fusion, and output to the ranking
    /// cache file. Rankings are serialized; a query that arrives while the
    /// pipeline is not searchable fails with an error, never a panic.
    pub async fn rank(&self, user_query: &str) -> anyhow::Result<()> {
        let _ranking = self.ranking_lock.lock().await;

        if !self.ctx.state.try_ranking_started() {
            anyhow::bail!("index not yet ready");
        }
        tracing::info!("Starting query: {:?}", user_query);

        let result = self.rank_inner(user_query).await;

        // Ranking leaves the index untouched, so the pipeline returns to
        // searchable regardless of how this particular query fared.
        self.ctx.state.on_ranking_finished();

        if result.is_ok() {
            tracing::info!("Ranking finished. Ready to search.");
        }
        result
    }

    async fn rank_inner(&self, user_query: &str) -> anyhow::Result<()> {
        let scores = {
            let mut indexer = self.indexer.lock().await;
            indexer
                .query(user_query)
                .context("indexer query failed")?
        };
        let normalized_scores = normalize_indexer_scores(&scores);

        // Hydrate records in raw-score order
        let mut id_scores: Vec<(&String, &f64)> = scores.iter().collect();
        id_scores.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(Ordering::Equal));

        let mut ranker_input = Vec::with_capacity(id_scores.len());
        for (index_id, raw_score) in id_scores {
            let (zone_name, line_index) = parse_index_id(index_id)?;

            let cache_path = self.ctx.paths.post_crawl_output(&zone_name);
            let line = util::read_line(&cache_path, line_index)
                .with_context(|| format!("unable to read record for index id {index_id}"))?;
            let mut properties = DomainProperties::from_json_str(line.trim())
                .with_context(|| format!("corrupt post-crawl record for index id {index_id}"))?;

            properties
                .float_properties
                .insert("indexer_score".to_string(), *raw_score);
            properties.float_properties.insert(
                "normalized_indexer_score".to_string(),
                normalized_scores.get(index_id).copied().unwrap_or(0.0),
            );
            ranker_input.push(properties);
        }

        let ranked = self.run_rankers(ranker_input, user_query);

        let buffer = FileOutputBuffer::new(FileOutputBufferOptions {
            bulk_output_limit: self.ctx.config.general.file_bulk_output_qty,
            file_path: self.ctx.paths.ranking_output(),
            ..Default::default()
        });
        for properties in &ranked {
            buffer.append(&properties.to_json_string()?)?;
        }
        buffer.flush()?;

        let summary: Vec<String> = ranked
            .iter()
            .enumerate()
            .map(|(rank, properties)| format!("{}: {}", rank, properties.domain_name))
            .collect();
        tracing::info!("Ranker results [{}]", summary.join(", "));

        Ok(())
    }

    /// Fuses the configured rankers: `final = Σ ranker(record, query) *
    /// normalized_weight`, sorted descending.
    pub(super) fn run_rankers(
        &self,
        input: Vec<DomainProperties>,
        user_query: &str,
    ) -> Vec<DomainProperties> {
        let mut scored: Vec<(DomainProperties, f64)> = input
            .into_iter()
            .map(|properties| {
                let fused_score = self.fused_score(&properties, user_query);
                (properties, fused_score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.into_iter().map(|(properties, _)| properties).collect()
    }

    pub(super) fn fused_score(&self, properties: &DomainProperties, user_query: &str) -> f64 {
        self.rankers
            .iter()
            .map(|ranker| {
                let weight = self
                    .ranker_weights
                    .get(ranker.type_tag())
                    .copied()
                    .unwrap_or(0.0);
                ranker.input(properties, user_query) * weight
            })
            .sum()
    }
}

/// Min-max normalizes raw indexer scores into `[0, 1]`. A zero range (all
/// scores equal, or a single hit) maps everything to 1.0.
pub(super) fn normalize_indexer_scores(scores: &HashMap<String, f64>) -> HashMap<String, f64> {
    let Some(first) = scores.values().next() else {
        return HashMap::new();
    };

    let mut min_score = *first;
    let mut max_score = *first;
    for score in scores.values() {
        min_score = min_score.min(*score);
        max_score = max_score.max(*score);
    }

    let score_range = max_score - min_score;
    scores
        .iter()
        .map(|(id, score)| {
            let normalized = if score_range == 0.0 {
                1.0
            } else {
                (score - min_score) / score_range
            };
            (id.clone(), normalized)
        })
        .collect()
}

/// Splits `<zone>_<lineIndex>` at the last underscore. Zone names containing
/// underscores parse correctly because the suffix must be an integer.
pub(super) fn parse_index_id(index_id: &str) -> anyhow::Result<(String, u64)> {
    let (zone_name, line_part) = index_id
        .rsplit_once('_')
        .with_context(|| format!("invalid index id format: {index_id:?}"))?;
    let line_index = line_part
        .parse::<u64>()
        .with_context(|| format!("invalid line index in index id {index_id:?}"))?;
    Ok((zone_name.to_string(), line_index))
}
