//! Durable per-item progress for batch runs.
//!
//! Records live in a single JSON file. A restarted run reloads the
//! file and skips items already marked succeeded or skipped; failed
//! and pending items are eligible again.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GraftResult;

/// Terminal-or-pending state of one batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Succeeded,
    Failed,
    Skipped,
}

/// One item's progress record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub item_id: String,
    pub status: ItemStatus,
    pub last_attempt: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// JSON-file-backed checkpoint store.
pub struct CheckpointStore {
    path: PathBuf,
    records: Mutex<BTreeMap<String, CheckpointRecord>>,
}

impl CheckpointStore {
    /// Open a store at `path`, loading existing records. A missing
    /// file is an empty store, not an error.
    pub fn open(path: impl AsRef<Path>) -> GraftResult<Self> {
        let path = path.as_ref().to_path_buf();
        let records = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let list: Vec<CheckpointRecord> = serde_json::from_str(&content)?;
            list.into_iter().map(|r| (r.item_id.clone(), r)).collect()
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    /// Whether the item must not be reprocessed. Succeeded and
    /// deliberately skipped items are done; failed and pending items
    /// are eligible again.
    pub fn is_done(&self, item_id: &str) -> bool {
        matches!(
            self.status(item_id),
            Some(ItemStatus::Succeeded | ItemStatus::Skipped)
        )
    }

    pub fn status(&self, item_id: &str) -> Option<ItemStatus> {
        self.records
            .lock()
            .expect("checkpoint lock poisoned")
            .get(item_id)
            .map(|r| r.status)
    }

    /// Upsert an item's record, stamped with the current time.
    pub fn record(&self, item_id: &str, status: ItemStatus, error: Option<String>) {
        let mut records = self.records.lock().expect("checkpoint lock poisoned");
        records.insert(
            item_id.to_string(),
            CheckpointRecord {
                item_id: item_id.to_string(),
                status,
                last_attempt: Utc::now(),
                error,
            },
        );
    }

    /// Write all records to disk. Writes a sibling temp file and
    /// renames it over the target, so readers never see a torn file.
    ///
    /// The record lock is held across the write and rename: concurrent
    /// flushes share one temp path, so they must not interleave.
    pub fn flush(&self) -> GraftResult<()> {
        let records = self.records.lock().expect("checkpoint lock poisoned");
        let list: Vec<&CheckpointRecord> = records.values().collect();
        let json = serde_json::to_string_pretty(&list)?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("checkpoint lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
