//! Pipeline Module
//!
//! The four-stage resumable pipeline and its coordination layer.
//!
//! ## Overview
//! Data flows strictly linearly per zone:
//!
//! ```text
//! zone file -> pre-crawl cache -> post-crawl cache -> indexer DB
//! ```
//!
//! Each stage streams its input line by line, far larger than memory, and
//! persists a `(finished?, line_index)` checkpoint per zone so a crash or
//! shutdown resumes at record granularity. The query path is orthogonal:
//! `user query -> indexer -> ranker fusion -> ranking cache + HTTP reply`.
//!
//! ## Submodules
//! - **`state`**: the lifecycle state machine and progress accounting.
//! - **`context`**: the shared handle (config, paths, zones, state,
//!   checkpoints, shutdown token) passed to every runner.
//! - **`coordinator`**: `Application` construction and the tick loop that
//!   sequences stages, signals, metrics and the HTTP listener.
//! - **`pre_crawl`**: zone-file parsing and the pre-crawl filter chain.
//! - **`post_crawl`**: the bounded-concurrency network crawl stage.
//! - **`index`**: feeding surviving records into the indexer.
//! - **`query`**: indexer scoring, normalization and ranker fusion.

pub mod context;
pub mod coordinator;
pub mod index;
pub mod post_crawl;
pub mod pre_crawl;
pub mod query;
pub mod state;

pub use context::PipelineContext;
pub use coordinator::Application;
pub use state::{ApplicationState, ApplicationTask, StateManager};

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Sums per-zone line counts of the stage's input files; the total is what
/// progress reporting calls `total_work_items`.
fn zone_line_totals<F>(
    zone_registry: &BTreeMap<String, PathBuf>,
    input_path_for: F,
) -> anyhow::Result<BTreeMap<String, u64>>
where
    F: Fn(&str, &PathBuf) -> PathBuf,
{
    let mut totals = BTreeMap::new();
    for (zone_name, zone_path) in zone_registry {
        let input_path = input_path_for(zone_name, zone_path);
        let lines = crate::util::count_lines(&input_path)?;
        totals.insert(zone_name.clone(), lines);
    }
    Ok(totals)
}

#[cfg(test)]
mod tests;
