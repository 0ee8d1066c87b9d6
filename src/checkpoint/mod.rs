//! Checkpoint Store
//!
//! A schema-versioned wrapper around an embedded key-value store. Each
//! `(stage, zone)` pair owns one `StageCheckpoint` recording whether the stage
//! finished that zone and, if not, the first input line not yet durably
//! processed. Stage runners read their checkpoint on entry and persist it on
//! every output flush, which is what makes mid-file crash recovery possible.
//!
//! On open, a missing or mismatched schema-version key wipes the store and
//! rewrites the current version; stale checkpoints from an incompatible layout
//! are never reinterpreted.

use redb::{Database, TableDefinition};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

const TASK_STATE: TableDefinition<&str, &str> = TableDefinition::new("task_state");

const SCHEMA_VERSION_KEY: &str = "db_schema_version";
const SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] redb::DatabaseError),

    #[error(transparent)]
    Transaction(#[from] redb::TransactionError),

    #[error(transparent)]
    Table(#[from] redb::TableError),

    #[error(transparent)]
    Commit(#[from] redb::CommitError),

    #[error(transparent)]
    Storage(#[from] redb::StorageError),

    #[error("checkpoint payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The three resumable pipeline stages, as they appear in checkpoint keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PreCrawl,
    PostCrawl,
    Indexer,
}

impl Stage {
    fn key_fragment(&self) -> &'static str {
        match self {
            Stage::PreCrawl => "pre_crawl_filter",
            Stage::PostCrawl => "post_crawl_filter",
            Stage::Indexer => "indexer",
        }
    }
}

/// Resume point for one `(stage, zone)` pair. When `is_finished` is set the
/// line index is irrelevant: the stage's output file for that zone is complete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCheckpoint {
    #[serde(rename = "b_is_finished")]
    pub is_finished: bool,
    pub line_index: u64,
}

impl StageCheckpoint {
    pub fn finished() -> Self {
        Self {
            is_finished: true,
            line_index: 0,
        }
    }

    pub fn at_line(line_index: u64) -> Self {
        Self {
            is_finished: false,
            line_index,
        }
    }
}

pub struct CheckpointStore {
    db: Database,
}

impl CheckpointStore {
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        let db = Database::create(dir.join("task_state.redb"))?;
        let store = Self { db };

        match store.get_raw(SCHEMA_VERSION_KEY)? {
            Some(version) if version == SCHEMA_VERSION => {}
            Some(version) => {
                tracing::warn!(
                    "Checkpoint store schema version changed ({} -> {}). Resetting the store.",
                    version,
                    SCHEMA_VERSION
                );
                store.reset()?;
            }
            None => {
                tracing::info!("Initializing the checkpoint store for the first time.");
                store.reset()?;
            }
        }

        Ok(store)
    }

    /// Returns the checkpoint for `(zone, stage)`, or the zero checkpoint
    /// (`finished = false`, `line_index = 0`) when none was ever saved.
    pub fn get(&self, zone_name: &str, stage: Stage) -> Result<StageCheckpoint, StoreError> {
        match self.get_raw(&checkpoint_key(zone_name, stage))? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(StageCheckpoint::default()),
        }
    }

    pub fn save(
        &self,
        zone_name: &str,
        stage: Stage,
        checkpoint: &StageCheckpoint,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(checkpoint)?;
        self.set_raw(&checkpoint_key(zone_name, stage), &payload)
    }

    /// Drops every key, schema version included; the next open reinitializes.
    pub fn purge(&self) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        txn.delete_table(TASK_STATE)?;
        txn.commit()?;
        Ok(())
    }

    fn reset(&self) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        txn.delete_table(TASK_STATE)?;
        {
            let mut table = txn.open_table(TASK_STATE)?;
            table.insert(SCHEMA_VERSION_KEY, SCHEMA_VERSION)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(TASK_STATE) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        Ok(table.get(key)?.map(|guard| guard.value().to_string()))
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(TASK_STATE)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }
}

fn checkpoint_key(zone_name: &str, stage: Stage) -> String {
    format!("{}_{}_task_state_json", zone_name, stage.key_fragment())
}
