//-
// Copyright (c) 2026, Mailidx contributors
//
// This file is part of Mailidx.
//
// Mailidx is free software: you can  redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Mailidx is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Mailidx. If not, see <http://www.gnu.org/licenses/>.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::Error;

/// The process-wide configuration for the index cache.
///
/// This is typically stored in a file named `mailidx.toml`. Every section
/// may be omitted, in which case the defaults are used.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Limits on the registry of loaded mailboxes.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// When idle mailboxes are unloaded.
    #[serde(default)]
    pub eviction: EvictionConfig,

    /// Layout and tuning of the per-mailbox databases.
    #[serde(default)]
    pub storage: StorageConfig,

    /// The notification worker pool.
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Where log output goes.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// The maximum number of mailboxes that may be loaded at once.
    ///
    /// Requests for a mailbox that is not already loaded fail with
    /// `CapacityExceeded` once this many are resident.
    pub table_size: usize,

    /// The number of callers that may already be queued on one mailbox
    /// before further callers are turned away instead of waiting.
    pub max_waiters: usize,

    /// How long, in seconds, a caller waits for a mailbox that another
    /// caller is using before giving up.
    pub lock_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            table_size: 5000,
            max_waiters: 5,
            lock_timeout_secs: 60,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct EvictionConfig {
    /// Seconds a mailbox may sit unused before it is unloaded.
    pub cache_interval_secs: u64,

    /// Seconds after loading at which an unused mailbox is unloaded
    /// regardless of activity, forcing a full resync on next use.
    pub reload_interval_secs: u64,

    /// Milliseconds between wake-ups of the scanner thread.
    ///
    /// This only bounds how quickly the scanner notices shutdown.
    pub poll_interval_ms: u64,

    /// Seconds between eviction passes.
    pub sweep_interval_secs: u64,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            cache_interval_secs: 7200,
            reload_interval_secs: 3600,
            poll_interval_ms: 1000,
            sweep_interval_secs: 10,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the index database, relative to the mailbox directory.
    pub db_path: PathBuf,

    /// Directory holding cached digests, relative to the mailbox directory.
    pub ext_dir: PathBuf,

    /// Use write-ahead logging instead of a rollback journal.
    pub wal: bool,

    /// Value for `PRAGMA synchronous`.
    pub synchronous: bool,

    /// Value for `PRAGMA mmap_size`. 0 disables memory mapping.
    pub mmap_size: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("exmdb/midb.sqlite3"),
            ext_dir: PathBuf::from("ext"),
            wal: true,
            synchronous: false,
            mmap_size: 0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Number of threads applying store notifications.
    ///
    /// Notifications for one mailbox always land on the same thread.
    pub workers: usize,

    /// How many notifications may be queued per worker before the store
    /// side blocks.
    pub queue_depth: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_depth: 256,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// If set, a log4rs configuration file to load instead of the settings
    /// below.
    pub config_file: Option<PathBuf>,

    /// One of `error`, `warn`, `info`, `debug` or `trace`.
    pub level: String,

    /// If set, log to this file in addition to standard error.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            level: "info".to_owned(),
            file: None,
        }
    }
}

impl CacheConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if 0 == self.registry.table_size {
            return Err(Error::BadConfig(
                "registry.table_size must be at least 1".to_owned(),
            ));
        }
        if 0 == self.notify.workers {
            return Err(Error::BadConfig(
                "notify.workers must be at least 1".to_owned(),
            ));
        }
        if 0 == self.eviction.poll_interval_ms {
            return Err(Error::BadConfig(
                "eviction.poll_interval_ms must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

impl RegistryConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }
}

impl EvictionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
