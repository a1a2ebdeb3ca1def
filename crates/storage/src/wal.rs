// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log: one append-only record file per topic
//!
//! Each topic's log is newline-delimited JSON under the WAL directory. A
//! record's sequence number is its line position, so sequences are dense
//! from 0 and reads are a linear scan from the start — fine while topics
//! stay short; an index from sequence to byte offset is the first thing to
//! add if they don't.

use relay_core::Record;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StorageError;

/// Durable per-topic record log
pub struct Wal {
    dir: PathBuf,
    // Serializes appends and reads across all topics; sequence assignment
    // must never race with a concurrent append
    lock: Mutex<()>,
}

impl Wal {
    /// Open a WAL rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    /// Append a message to `topic`'s log and return the stored record.
    ///
    /// The assigned sequence is the count of records already in the log
    /// (0 for a fresh topic). The write is fsync'd before this returns.
    pub fn append(&self, topic: &str, message: &str) -> Result<Record, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let path = self.log_path(topic)?;
        let id = count_records(&path)?;
        let record = Record {
            topic: topic.to_string(),
            message: message.to_string(),
            id,
        };

        let line = serde_json::to_string(&record)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", line)?;
        file.sync_all()?;

        Ok(record)
    }

    /// Read the record at `sequence` in `topic`'s log.
    ///
    /// Returns `None` when the log does not exist yet or `sequence` is past
    /// the end — both mean "nothing to deliver", not an error.
    pub fn read_at(&self, topic: &str, sequence: i64) -> Result<Option<Record>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let path = self.log_path(topic)?;
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if sequence < 0 {
            return Ok(None);
        }

        let reader = BufReader::new(file);
        for (position, line) in reader.lines().enumerate() {
            let line = line?;
            if position as i64 == sequence {
                return Ok(Some(serde_json::from_str(&line)?));
            }
        }

        Ok(None)
    }

    /// Path of `topic`'s log file.
    ///
    /// Topic names become file stems, so anything that could escape the WAL
    /// directory is rejected here, before any file is touched.
    fn log_path(&self, topic: &str) -> Result<PathBuf, StorageError> {
        if topic.is_empty() || topic == "." || topic == ".." || topic.contains(['/', '\\']) {
            return Err(StorageError::InvalidTopic(topic.to_string()));
        }
        Ok(self.dir.join(format!("{}.log", topic)))
    }
}

/// Count the records already stored in a log file (0 if absent)
fn count_records(path: &Path) -> Result<u32, StorageError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut count = 0u32;
    for line in BufReader::new(file).lines() {
        line?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
