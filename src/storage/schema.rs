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


//! Versioning of the cache database schema.
//!
//! The version lives in SQLite's `user_version` header field: version `n`
//! means the first `n` of `STEPS` have been applied. A file claiming a
//! version this build does not know, or one missing any of the cache
//! tables, is refused; the cache is disposable and is rebuilt from the
//! store instead of being coerced into shape.

use std::collections::HashSet;

use log::{error, info};

use super::types::from_single;
use crate::support::{error::Error, log_prefix::LogPrefix};

/// Element `n` takes a database from version `n` to version `n + 1`.
static STEPS: &[&str] = &[include_str!("cachedb.v1.sql")];

/// Tables every cache database must hold once upgraded.
const TABLES: &[&str] = &["configurations", "folders", "messages", "mapping"];

fn latest_version() -> u32 {
    STEPS.len() as u32
}

fn user_version(cxn: &rusqlite::Connection) -> Result<u32, Error> {
    cxn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(Into::into)
}

fn refuse_newer(log_prefix: &LogPrefix, found: u32) -> Result<(), Error> {
    if found > latest_version() {
        error!(
            "{} Cache schema version {} is newer than the supported {}",
            log_prefix,
            found,
            latest_version()
        );
        return Err(Error::LoadFailed);
    }

    Ok(())
}

/// Bring the schema of `cxn` up to the latest version.
///
/// Returns the version the database was at beforehand. All steps commit
/// together; on failure the file is left as it was.
pub fn upgrade(
    log_prefix: &LogPrefix,
    cxn: &mut rusqlite::Connection,
) -> Result<u32, Error> {
    let found = user_version(cxn)?;
    refuse_newer(log_prefix, found)?;
    if found == latest_version() {
        check_tables(log_prefix, cxn)?;
        return Ok(found);
    }

    let txn = cxn
        .transaction_with_behavior(rusqlite::TransactionBehavior::Exclusive)?;
    // Someone else may have upgraded the file while we waited for the lock
    let found = user_version(&txn)?;
    refuse_newer(log_prefix, found)?;

    for (ix, step) in STEPS.iter().enumerate().skip(found as usize) {
        let version = ix as u32 + 1;
        info!("{} Upgrading cache schema to version {}", log_prefix, version);
        txn.execute_batch(step)?;
        txn.pragma_update(None, "user_version", version)?;
    }

    check_tables(log_prefix, &txn)?;
    txn.commit()?;
    Ok(found)
}

fn check_tables(
    log_prefix: &LogPrefix,
    cxn: &rusqlite::Connection,
) -> Result<(), Error> {
    let present = cxn
        .prepare_cached(
            "SELECT `name` FROM `sqlite_master` WHERE `type` = 'table'",
        )?
        .query_map((), from_single::<String>)?
        .collect::<rusqlite::Result<HashSet<_>>>()?;

    match TABLES.iter().find(|&&table| !present.contains(table)) {
        None => Ok(()),
        Some(missing) => {
            error!(
                "{} Cache database has no `{}` table",
                log_prefix, missing
            );
            Err(Error::LoadFailed)
        }
    }
}
