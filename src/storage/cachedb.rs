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
use std::path::Path;
use std::time::Duration;

use log::info;
use rusqlite::OptionalExtension as _;

use super::types::*;
use crate::model::*;
use crate::support::{
    config::StorageConfig, error::Error, log_prefix::LogPrefix,
};

/// `configurations.config_id` of the mailbox owner's name.
const CONFIG_USERNAME: i64 = 1;

/// A connection to one mailbox's cache database.
///
/// All access goes through `Tables`, either directly via `tables()` for
/// single-statement reads or via `write()` for anything that must appear
/// atomic to later readers.
pub struct CacheDb {
    cxn: rusqlite::Connection,
}

impl CacheDb {
    /// Open (creating if necessary) the database at `path`.
    ///
    /// Pending `mapping` rows from a previous life are discarded.
    pub fn open(
        path: &Path,
        config: &StorageConfig,
        log_prefix: &LogPrefix,
    ) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut cxn = rusqlite::Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        cxn.pragma_update(None, "foreign_keys", true)?;
        cxn.pragma_update(
            None,
            "synchronous",
            if config.synchronous { "NORMAL" } else { "OFF" },
        )?;
        cxn.pragma_update(
            None,
            "journal_mode",
            if config.wal { "WAL" } else { "DELETE" },
        )?;
        if config.mmap_size > 0 {
            cxn.pragma_update(None, "mmap_size", config.mmap_size as i64)?;
        }
        cxn.busy_timeout(Duration::from_secs(10))?;

        super::schema::upgrade(log_prefix, &mut cxn)?;

        cxn.execute("DELETE FROM `mapping`", ())?;

        Ok(Self { cxn })
    }

    /// Read-only access outside any explicit transaction.
    pub fn tables(&self) -> Tables<'_> {
        Tables { cxn: &self.cxn }
    }

    /// Run `f` inside a write transaction, committing only if it succeeds.
    pub fn write<R>(
        &mut self,
        f: impl FnOnce(&Tables<'_>) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let txn = self
            .cxn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let result = f(&Tables { cxn: &txn })?;
        txn.commit()?;
        Ok(result)
    }
}

/// Create the database for a new mailbox owned by `username`.
pub fn provision(path: &Path, username: &str) -> Result<(), Error> {
    let log_prefix = LogPrefix::new(&path.to_string_lossy());
    let mut db = CacheDb::open(path, &StorageConfig::default(), &log_prefix)?;
    db.write(|t| t.set_username(username))?;
    info!("{} Provisioned cache database for {}", log_prefix, username);
    Ok(())
}

/// Statement-level access to the cache tables.
pub struct Tables<'a> {
    cxn: &'a rusqlite::Connection,
}

impl Tables<'_> {
    pub fn username(&self) -> Result<Option<String>, Error> {
        self.cxn
            .prepare_cached(
                "SELECT `config_value` FROM `configurations` \
                 WHERE `config_id` = ?",
            )?
            .query_row((CONFIG_USERNAME,), from_single)
            .optional()
            .map_err(Into::into)
    }

    pub fn set_username(&self, username: &str) -> Result<(), Error> {
        self.cxn.execute(
            "INSERT OR REPLACE INTO `configurations` \
             (`config_id`, `config_value`) VALUES (?, ?)",
            (CONFIG_USERNAME, username),
        )?;
        Ok(())
    }

    pub fn folder(&self, folder: FolderId) -> Result<Option<FolderRow>, Error> {
        self.cxn
            .prepare_cached("SELECT * FROM `folders` WHERE `folder_id` = ?")?
            .query_row((folder,), from_row)
            .optional()
            .map_err(Into::into)
    }

    pub fn folder_by_name(&self, name: &str) -> Result<Option<FolderRow>, Error> {
        self.cxn
            .prepare_cached("SELECT * FROM `folders` WHERE `name` = ? LIMIT 1")?
            .query_row((name,), from_row)
            .optional()
            .map_err(Into::into)
    }

    /// All folders, in id order.
    pub fn all_folders(&self) -> Result<Vec<FolderRow>, Error> {
        self.cxn
            .prepare_cached("SELECT * FROM `folders` ORDER BY `folder_id`")?
            .query_map((), from_row)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    pub fn insert_folder(
        &self,
        folder: FolderId,
        parent: FolderId,
        name: &str,
        commit_max: i64,
    ) -> Result<(), Error> {
        self.cxn
            .prepare_cached(
                "INSERT INTO `folders` \
                 (`folder_id`, `parent_fid`, `name`, `commit_max`) \
                 VALUES (?, ?, ?, ?)",
            )?
            .execute((folder, parent, name, commit_max))?;
        Ok(())
    }

    /// Change the parent and name of a folder. Returns whether it exists.
    pub fn relocate_folder(
        &self,
        folder: FolderId,
        parent: FolderId,
        name: &str,
    ) -> Result<bool, Error> {
        let n = self
            .cxn
            .prepare_cached(
                "UPDATE `folders` SET `parent_fid` = ?, `name` = ? \
                 WHERE `folder_id` = ?",
            )?
            .execute((parent, name, folder))?;
        Ok(n > 0)
    }

    /// Rewrite every folder name starting with `old_prefix` to start with
    /// `new_prefix` instead.
    pub fn replace_name_prefix(
        &self,
        old_prefix: &str,
        new_prefix: &str,
    ) -> Result<usize, Error> {
        self.cxn
            .prepare_cached(
                "UPDATE `folders` \
                 SET `name` = ?2 || SUBSTR(`name`, LENGTH(?1) + 1) \
                 WHERE SUBSTR(`name`, 1, LENGTH(?1)) = ?1",
            )?
            .execute((old_prefix, new_prefix))
            .map_err(Into::into)
    }

    pub fn set_commit_max(
        &self,
        folder: FolderId,
        commit_max: i64,
    ) -> Result<(), Error> {
        self.cxn
            .prepare_cached(
                "UPDATE `folders` SET `commit_max` = ? WHERE `folder_id` = ?",
            )?
            .execute((commit_max, folder))?;
        Ok(())
    }

    /// Delete a folder and everything in it. Returns whether it existed.
    pub fn delete_folder(&self, folder: FolderId) -> Result<bool, Error> {
        self.cxn
            .prepare_cached("DELETE FROM `messages` WHERE `folder_id` = ?")?
            .execute((folder,))?;
        let n = self
            .cxn
            .prepare_cached("DELETE FROM `folders` WHERE `folder_id` = ?")?
            .execute((folder,))?;
        Ok(n > 0)
    }

    pub fn set_unsub(&self, folder: FolderId, unsub: bool) -> Result<bool, Error> {
        let n = self
            .cxn
            .prepare_cached(
                "UPDATE `folders` SET `unsub` = ? WHERE `folder_id` = ?",
            )?
            .execute((unsub, folder))?;
        Ok(n > 0)
    }

    /// Mark the display index of `folder` as needing recomputation.
    pub fn invalidate_sort(&self, folder: FolderId) -> Result<(), Error> {
        self.cxn
            .prepare_cached(
                "UPDATE `folders` SET `sort_field` = 0 WHERE `folder_id` = ?",
            )?
            .execute((folder,))?;
        Ok(())
    }

    /// Allocate the next uid of `folder`.
    fn next_uid(&self, folder: FolderId) -> Result<u32, Error> {
        self.cxn
            .prepare_cached(
                "UPDATE `folders` SET `uidnext` = `uidnext` + 1 \
                 WHERE `folder_id` = ? RETURNING `uidnext` - 1",
            )?
            .query_row((folder,), from_single)
            .optional()?
            .ok_or(Error::NoSuchFolder)
    }

    pub fn message(&self, message: MessageId) -> Result<Option<MessageRow>, Error> {
        self.cxn
            .prepare_cached("SELECT * FROM `messages` WHERE `message_id` = ?")?
            .query_row((message,), from_row)
            .optional()
            .map_err(Into::into)
    }

    pub fn message_by_mid(&self, mid: &str) -> Result<Option<MessageRow>, Error> {
        self.cxn
            .prepare_cached(
                "SELECT * FROM `messages` WHERE `mid_string` = ? LIMIT 1",
            )?
            .query_row((mid,), from_row)
            .optional()
            .map_err(Into::into)
    }

    /// All messages of `folder`, in uid order.
    pub fn folder_messages(&self, folder: FolderId) -> Result<Vec<MessageRow>, Error> {
        self.cxn
            .prepare_cached(
                "SELECT * FROM `messages` WHERE `folder_id` = ? ORDER BY `uid`",
            )?
            .query_map((folder,), from_row)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Insert a message under the next uid of its folder, returning that
    /// uid.
    pub fn insert_message(&self, message: &NewMessage) -> Result<u32, Error> {
        let uid = self.next_uid(message.folder_id)?;
        let flag = |f: MessageFlags| message.flags.contains(f);
        self.cxn
            .prepare_cached(
                "INSERT INTO `messages` (\
                 `message_id`, `folder_id`, `mid_string`, `mod_time`, `uid`, \
                 `unsent`, `read`, `flagged`, `replied`, `forwarded`, \
                 `deleted`, `recent`, `subject`, `sender`, `rcpt`, `size`, \
                 `received`\
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?
            .execute(rusqlite::params![
                message.message_id,
                message.folder_id,
                message.mid_string,
                message.mod_time,
                uid,
                flag(MessageFlags::UNSENT),
                flag(MessageFlags::SEEN),
                flag(MessageFlags::FLAGGED),
                flag(MessageFlags::ANSWERED),
                flag(MessageFlags::FORWARDED),
                flag(MessageFlags::DELETED),
                flag(MessageFlags::RECENT),
                message.fields.subject,
                message.fields.sender,
                message.fields.rcpt,
                message.fields.size as i64,
                message.received,
            ])?;
        self.invalidate_sort(message.folder_id)?;
        Ok(uid)
    }

    /// Delete `message` if it is (still) in `folder`. Returns whether
    /// anything was deleted.
    pub fn delete_message(
        &self,
        folder: FolderId,
        message: MessageId,
    ) -> Result<bool, Error> {
        let n = self
            .cxn
            .prepare_cached(
                "DELETE FROM `messages` \
                 WHERE `message_id` = ? AND `folder_id` = ?",
            )?
            .execute((message, folder))?;
        if n > 0 {
            self.invalidate_sort(folder)?;
        }
        Ok(n > 0)
    }

    /// Bring the store-controlled flags of a message up to date.
    ///
    /// Returns whether anything actually changed.
    pub fn update_store_flags(
        &self,
        message: MessageId,
        read: bool,
        unsent: bool,
    ) -> Result<bool, Error> {
        let folder = self
            .cxn
            .prepare_cached(
                "UPDATE `messages` SET `read` = ?1, `unsent` = ?2 \
                 WHERE `message_id` = ?3 \
                 AND (`read` <> ?1 OR `unsent` <> ?2) \
                 RETURNING `folder_id`",
            )?
            .query_row((read, unsent, message), from_single::<FolderId>)
            .optional()?;

        match folder {
            Some(folder) => {
                self.invalidate_sort(folder)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Set or clear every flag in `flags` on `message`.
    ///
    /// Returns whether the message exists.
    pub fn set_message_flags(
        &self,
        message: MessageId,
        flags: MessageFlags,
        value: bool,
    ) -> Result<bool, Error> {
        let folder = match self.message(message)? {
            Some(row) => row.folder_id,
            None => return Ok(false),
        };

        for &(flag, column) in FLAG_COLUMNS {
            if flags.contains(flag) {
                self.cxn
                    .prepare_cached(&format!(
                        "UPDATE `messages` SET `{}` = ? WHERE `message_id` = ?",
                        column
                    ))?
                    .execute((value, message))?;
            }
        }

        if !flags.is_empty() {
            self.invalidate_sort(folder)?;
        }
        Ok(true)
    }

    /// Recompute the display index of `folder` for `field`, unless it is
    /// already ordered that way.
    pub fn sort_folder(&self, folder: FolderId, field: SortField) -> Result<(), Error> {
        let field = field.effective();
        let current = self.folder(folder)?.ok_or(Error::NoSuchFolder)?;
        if current.sort_field == field {
            return Ok(());
        }

        let ids = self
            .cxn
            .prepare_cached(&format!(
                "SELECT `message_id` FROM `messages` WHERE `folder_id` = ? \
                 ORDER BY `{}`, `uid`",
                field.column()
            ))?
            .query_map((folder,), from_single::<MessageId>)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut update = self.cxn.prepare_cached(
            "UPDATE `messages` SET `idx` = ? WHERE `message_id` = ?",
        )?;
        for (ix, id) in ids.into_iter().enumerate() {
            update.execute((ix as i64 + 1, id))?;
        }

        self.cxn
            .prepare_cached(
                "UPDATE `folders` SET `sort_field` = ? WHERE `folder_id` = ?",
            )?
            .execute((field, folder))?;
        Ok(())
    }

    /// The messages of `folder` whose display index lies within
    /// `first..=last`, in index order.
    pub fn messages_by_idx(
        &self,
        folder: FolderId,
        first: u32,
        last: u32,
        order: SortOrder,
    ) -> Result<Vec<MessageRow>, Error> {
        let query = match order {
            SortOrder::Ascending => {
                "SELECT * FROM `messages` WHERE `folder_id` = ? \
                 AND `idx` BETWEEN ? AND ? ORDER BY `idx` ASC"
            }
            SortOrder::Descending => {
                "SELECT * FROM `messages` WHERE `folder_id` = ? \
                 AND `idx` BETWEEN ? AND ? ORDER BY `idx` DESC"
            }
        };

        self.cxn
            .prepare_cached(query)?
            .query_map((folder, first, last), from_row)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Summarise `folder`. `first_unseen_idx` is only meaningful after
    /// `sort_folder`.
    pub fn folder_stats(&self, folder: FolderId) -> Result<FolderStats, Error> {
        let (total, recent, unread, first_unseen_idx) = self
            .cxn
            .prepare_cached(
                "SELECT COUNT(*), \
                 COALESCE(SUM(`recent`), 0), \
                 COALESCE(SUM(1 - `read`), 0), \
                 MIN(CASE WHEN `read` = 0 THEN `idx` END) \
                 FROM `messages` WHERE `folder_id` = ?",
            )?
            .query_row((folder,), from_row::<(u32, u32, u32, Option<u32>)>)?;

        Ok(FolderStats {
            total,
            recent,
            unread,
            first_unseen_idx,
        })
    }

    /// Record the mid string and flags to adopt once the store reports
    /// `message`.
    pub fn add_mapping(
        &self,
        message: MessageId,
        mid: &str,
        flag_string: &str,
    ) -> Result<(), Error> {
        self.cxn
            .prepare_cached(
                "INSERT OR REPLACE INTO `mapping` \
                 (`message_id`, `mid_string`, `flag_string`) VALUES (?, ?, ?)",
            )?
            .execute((message, mid, flag_string))?;
        Ok(())
    }

    /// Remove and return the pending mapping of `message`, if any.
    pub fn take_mapping(
        &self,
        message: MessageId,
    ) -> Result<Option<(String, String)>, Error> {
        self.cxn
            .prepare_cached(
                "DELETE FROM `mapping` WHERE `message_id` = ? \
                 RETURNING `mid_string`, `flag_string`",
            )?
            .query_row((message,), from_row)
            .optional()
            .map_err(Into::into)
    }
}
