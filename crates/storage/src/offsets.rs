// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted topic cursors
//!
//! One cursor per topic: the sequence number of the next record to deliver.
//! The whole mapping is written as a single JSON snapshot on every save —
//! a full rewrite, never a delta.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::info;

use crate::error::StorageError;

/// Topic cursor store with snapshot persistence
pub struct OffsetStore {
    path: PathBuf,
    offsets: RwLock<HashMap<String, i64>>,
}

impl OffsetStore {
    /// Create a store that snapshots to `path`. Nothing is read until
    /// [`OffsetStore::load`] is called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offsets: RwLock::new(HashMap::new()),
        }
    }

    /// Current cursor for a topic, 0 if the topic has never been seen
    pub fn get(&self, topic: &str) -> i64 {
        self.offsets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(topic)
            .copied()
            .unwrap_or(0)
    }

    /// Create a topic's cursor at 0 if no entry exists yet.
    ///
    /// Idempotent: an existing cursor is never regressed.
    pub fn init_topic(&self, topic: &str) {
        let mut offsets = self.offsets.write().unwrap_or_else(|e| e.into_inner());
        offsets.entry(topic.to_string()).or_insert(0);
    }

    /// Add one to a topic's cursor (creating it at 0 first if absent) and
    /// return the new value
    pub fn increment(&self, topic: &str) -> i64 {
        let mut offsets = self.offsets.write().unwrap_or_else(|e| e.into_inner());
        let offset = offsets.entry(topic.to_string()).or_insert(0);
        *offset += 1;
        *offset
    }

    /// Write the entire mapping as one snapshot, overwriting the previous
    /// file, then force it durable
    pub fn save(&self) -> Result<(), StorageError> {
        let json = {
            let offsets = self.offsets.read().unwrap_or_else(|e| e.into_inner());
            serde_json::to_string(&*offsets)?
        };

        let mut file = File::create(&self.path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    /// Merge the snapshot file into memory. A missing file is not an error;
    /// the store just starts empty.
    pub fn load(&self) -> Result<(), StorageError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no offsets snapshot, starting empty");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: HashMap<String, i64> = serde_json::from_str(&content)?;
        let mut offsets = self.offsets.write().unwrap_or_else(|e| e.into_inner());
        for (topic, offset) in snapshot {
            offsets.insert(topic, offset);
        }
        info!(topics = offsets.len(), path = %self.path.display(), "loaded topic cursors");
        Ok(())
    }

    /// Clone of the in-memory mapping
    pub fn entries(&self) -> HashMap<String, i64> {
        self.offsets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
#[path = "offsets_tests.rs"]
mod tests;
