use super::state::StateManager;
use crate::checkpoint::CheckpointStore;
use crate::config::AppConfig;
use crate::paths::PathLayout;

use anyhow::Context;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Everything a stage runner needs from the coordinator, passed as one shared
/// handle instead of a back-reference: configuration, the path layout, the
/// zone registry, progress/state reporting, checkpoints, and the shutdown
/// token that every loop iteration polls.
pub struct PipelineContext {
    pub config: AppConfig,
    pub paths: PathLayout,
    pub zone_registry: BTreeMap<String, PathBuf>,
    pub state: StateManager,
    pub checkpoints: CheckpointStore,
    pub shutdown: CancellationToken,
}

/// Builds the zone registry: one entry per regular file in the zone-files
/// folder, keyed by file name without extension. At least one zone file must
/// exist or startup fails.
pub fn discover_zone_files(
    zone_files_dir: &std::path::Path,
) -> anyhow::Result<BTreeMap<String, PathBuf>> {
    let entries = std::fs::read_dir(zone_files_dir).with_context(|| {
        format!(
            "unable to read zone files directory {}",
            zone_files_dir.display()
        )
    })?;

    let mut zone_registry = BTreeMap::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(zone_name) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        zone_registry.insert(zone_name.to_string(), path);
    }

    if zone_registry.is_empty() {
        anyhow::bail!(
            "no zone files found; please ensure that zone files are located under {}",
            zone_files_dir.display()
        );
    }

    Ok(zone_registry)
}
