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


use std::path::Path;

use log::warn;

use crate::digest::cache::DigestStore;
use crate::storage::cachedb::CacheDb;
use crate::store::StoreClient;
use crate::support::{
    config::StorageConfig, error::Error, log_prefix::LogPrefix,
};
use crate::sync::SyncContext;

/// The local index of one mailbox.
///
/// A `CacheEntry` is only ever reachable through an `EntryGuard`, so holding
/// one implies holding the entry's lock.
pub struct CacheEntry {
    key: String,
    username: String,
    db: CacheDb,
    digests: DigestStore,
    log_prefix: LogPrefix,
}

impl CacheEntry {
    /// Open the cache database of the mailbox at `key`.
    ///
    /// The database must already have been provisioned with an owner.
    pub fn open(key: &str, config: &StorageConfig) -> Result<Self, Error> {
        let root = Path::new(key);
        let log_prefix = LogPrefix::new(key);
        let db = CacheDb::open(&root.join(&config.db_path), config, &log_prefix)?;

        let username = match db.tables().username()? {
            Some(username) => username,
            None => {
                warn!("{} Cache database has no owner", log_prefix);
                return Err(Error::LoadFailed);
            }
        };
        log_prefix.set_user(&username);

        Ok(Self {
            key: key.to_owned(),
            username,
            db,
            digests: DigestStore::new(root.join(&config.ext_dir)),
            log_prefix,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn log_prefix(&self) -> &LogPrefix {
        &self.log_prefix
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn digests(&self) -> &DigestStore {
        &self.digests
    }

    /// Split the entry into its database and everything else a sync pass
    /// needs alongside it.
    pub fn sync_parts<'a>(
        &'a mut self,
        store: &'a dyn StoreClient,
    ) -> (&'a mut CacheDb, SyncContext<'a>) {
        let CacheEntry {
            ref key,
            ref mut db,
            ref digests,
            ref log_prefix,
            ..
        } = *self;

        (
            db,
            SyncContext {
                mailbox: key,
                store,
                digests,
                log_prefix,
            },
        )
    }
}
