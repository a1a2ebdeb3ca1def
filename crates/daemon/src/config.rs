// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration

use std::path::{Path, PathBuf};

/// Default TCP listen address; override with `RELAY_LISTEN_ADDR`
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP listen address
    pub listen_addr: String,
    /// Directory holding the per-topic logs
    pub wal_dir: PathBuf,
    /// Cursor snapshot file
    pub offsets_path: PathBuf,
    /// Single-instance lock file
    pub lock_path: PathBuf,
}

impl Config {
    /// Config rooted at a data directory
    pub fn for_data_dir(data_dir: &Path) -> Self {
        Self {
            listen_addr: std::env::var("RELAY_LISTEN_ADDR")
                .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string()),
            wal_dir: data_dir.join("wal"),
            offsets_path: data_dir.join("offsets.json"),
            lock_path: data_dir.join("relayd.lock"),
        }
    }

    /// Same layout with an explicit listen address (ignores the env)
    pub fn with_listen_addr(data_dir: &Path, listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            ..Self::for_data_dir(data_dir)
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
