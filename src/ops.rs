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


//! The operations callers perform against cached mailboxes.
//!
//! Every operation names the mailbox by its key (the mailbox's directory)
//! and acquires its cache entry for the duration of the call, loading it
//! first if needed. Folders are named by their cached names: the fixed
//! names of special folders, or the hex-encoded display path of others.

use std::convert::TryFrom;
use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, info};

use crate::cache::{registry::Registry, scanner::Scanner};
use crate::digest::{
    cache::generate_mid_string, decode::charset_for_label, Digest, DigestView,
};
use crate::model::*;
use crate::search;
use crate::storage::{cachedb::Tables, types::*};
use crate::store::{MessageContent, Notification, StoreClient};
use crate::support::{config::CacheConfig, error::Error};
use crate::sync::{
    decode_path, encode_path,
    incremental::MAPPED_FLAGS,
    notify::{Dispatcher, FolderTouched},
    MAX_DISPLAY_NAME,
};

/// One line of a message listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListedMessage {
    pub mid_string: String,
    pub uid: u32,
    pub flags: MessageFlags,
}

/// One line of a uid listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageSize {
    pub mid_string: String,
    pub size: u64,
}

/// A message marked deleted, at its 0-based display position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeletedMessage {
    pub offset: u32,
    pub mid_string: String,
    pub uid: u32,
}

/// The status of one folder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FolderDetail {
    pub total: u32,
    pub recent: u32,
    pub unread: u32,
    pub uid_validity: i64,
    pub uidnext: u32,
    /// The 1-based display position of the first unread message.
    pub first_unseen: Option<u32>,
}

/// A window onto a listing: `offset` counts from the end if negative, and a
/// `length` of 0 extends to the end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub offset: i64,
    pub length: u32,
}

impl Window {
    /// Resolve to a 0-based half-open range of positions among `total`.
    fn resolve(self, total: u32) -> (u32, u32) {
        let total_i = i64::from(total);
        let start = if self.offset < 0 {
            (total_i + self.offset).max(0)
        } else {
            self.offset.min(total_i)
        };
        let end = if 0 == self.length {
            total_i
        } else {
            (start + i64::from(self.length)).min(total_i)
        };
        // Both are within 0..=total by construction
        (start as u32, end as u32)
    }
}

pub struct MailIndex {
    registry: Arc<Registry>,
    scanner: Option<Scanner>,
    dispatcher: Option<Dispatcher>,
    notifications: Sender<Notification>,
    touched: Receiver<FolderTouched>,
}

impl MailIndex {
    /// Build the registry and start the eviction scanner and notification
    /// dispatcher.
    pub fn new(
        config: CacheConfig,
        store: Arc<dyn StoreClient>,
    ) -> Result<Self, Error> {
        let queue_depth = config.notify.queue_depth.max(1);
        let registry = Arc::new(Registry::new(config, store));
        let (notify_tx, notify_rx) = channel::unbounded();
        let (touched_tx, touched_rx) = channel::bounded(queue_depth);

        let scanner = Scanner::spawn(Arc::clone(&registry))?;
        let dispatcher = match Dispatcher::spawn(
            Arc::clone(&registry),
            notify_rx,
            Some(touched_tx),
        ) {
            Ok(d) => d,
            Err(e) => {
                scanner.stop();
                return Err(e);
            }
        };

        info!("Mailbox index started");
        Ok(Self {
            registry,
            scanner: Some(scanner),
            dispatcher: Some(dispatcher),
            notifications: notify_tx,
            touched: touched_rx,
        })
    }

    /// The channel the store delivers notifications onto.
    pub fn notifier(&self) -> Sender<Notification> {
        self.notifications.clone()
    }

    /// Reports of new mail landing in cached folders.
    pub fn folder_touches(&self) -> &Receiver<FolderTouched> {
        &self.touched
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Stop background work and evict every entry.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.stop();
        }
        if let Some(scanner) = self.scanner.take() {
            scanner.stop();
            info!("Mailbox index stopped");
        }
    }

    /// The cached names of every folder.
    pub fn list_folders(&self, mailbox: &str) -> Result<Vec<String>, Error> {
        self.folder_names(mailbox, |_| true)
    }

    /// The cached names of every folder other than the special ones.
    pub fn list_user_folders(
        &self,
        mailbox: &str,
    ) -> Result<Vec<String>, Error> {
        self.folder_names(mailbox, |f| !f.folder_id.is_special())
    }

    /// The cached names of every folder not marked unsubscribed.
    pub fn list_subscribed(
        &self,
        mailbox: &str,
    ) -> Result<Vec<String>, Error> {
        self.folder_names(mailbox, |f| !f.unsub)
    }

    fn folder_names(
        &self,
        mailbox: &str,
        filter: impl Fn(&FolderRow) -> bool,
    ) -> Result<Vec<String>, Error> {
        let guard = self.registry.acquire(mailbox)?;
        let folders = guard.db().tables().all_folders()?;
        Ok(folders
            .into_iter()
            .filter(|f| filter(f))
            .map(|f| f.name)
            .collect())
    }

    pub fn subscribe_folder(
        &self,
        mailbox: &str,
        folder: &str,
    ) -> Result<(), Error> {
        self.set_unsub(mailbox, folder, false)
    }

    pub fn unsubscribe_folder(
        &self,
        mailbox: &str,
        folder: &str,
    ) -> Result<(), Error> {
        self.set_unsub(mailbox, folder, true)
    }

    fn set_unsub(
        &self,
        mailbox: &str,
        folder: &str,
        unsub: bool,
    ) -> Result<(), Error> {
        let mut guard = self.registry.acquire(mailbox)?;
        let (db, _) = guard.sync_parts();
        db.write(|t| {
            let row = folder_row(t, folder)?;
            t.set_unsub(row.folder_id, unsub)?;
            Ok(())
        })
    }

    /// Summarise `folder`, placing the first unread message under the
    /// display order given by `sort` and `order`.
    pub fn folder_detail(
        &self,
        mailbox: &str,
        folder: &str,
        sort: SortField,
        order: SortOrder,
    ) -> Result<FolderDetail, Error> {
        let mut guard = self.registry.acquire(mailbox)?;
        let (db, _) = guard.sync_parts();
        db.write(|t| {
            let row = folder_row(t, folder)?;
            t.sort_folder(row.folder_id, sort)?;
            let stats = t.folder_stats(row.folder_id)?;

            let first_unseen = match order {
                SortOrder::Ascending => stats.first_unseen_idx,
                SortOrder::Descending => t
                    .folder_messages(row.folder_id)?
                    .into_iter()
                    .filter(|m| !m.flags.contains(MessageFlags::SEEN))
                    .filter_map(|m| m.idx)
                    .max()
                    .map(|idx| stats.total + 1 - idx as u32),
            };

            Ok(FolderDetail {
                total: stats.total,
                recent: stats.recent,
                unread: stats.unread,
                uid_validity: row.folder_id.0,
                uidnext: row.uidnext,
                first_unseen,
            })
        })
    }

    /// List the messages of `folder` in the requested display order,
    /// optionally restricted to `window`.
    pub fn list_messages(
        &self,
        mailbox: &str,
        folder: &str,
        sort: SortField,
        order: SortOrder,
        window: Option<Window>,
    ) -> Result<Vec<ListedMessage>, Error> {
        let mut guard = self.registry.acquire(mailbox)?;
        let (db, _) = guard.sync_parts();
        db.write(|t| {
            let row = folder_row(t, folder)?;
            t.sort_folder(row.folder_id, sort)?;
            let total = t.folder_stats(row.folder_id)?.total;

            let (start, end) = window
                .map_or((0, total), |w| w.resolve(total));
            if start >= end {
                return Ok(Vec::new());
            }

            // Display positions map onto the 1-based index from whichever
            // end the order starts at
            let (first, last) = match order {
                SortOrder::Ascending => (start + 1, end),
                SortOrder::Descending => (total - end + 1, total - start),
            };

            Ok(t.messages_by_idx(row.folder_id, first, last, order)?
                .into_iter()
                .map(|m| ListedMessage {
                    mid_string: m.mid_string,
                    uid: m.uid,
                    flags: m.flags,
                })
                .collect())
        })
    }

    /// Return the digest of the message filed under `mid`, with the cache's
    /// view of its state.
    pub fn get_digest(
        &self,
        mailbox: &str,
        mid: &str,
    ) -> Result<DigestView, Error> {
        let mut guard = self.registry.acquire(mailbox)?;
        let (db, cx) = guard.sync_parts();
        let row = db
            .tables()
            .message_by_mid(mid)?
            .ok_or(Error::NoSuchMessage)?;
        let (_, digest) = cx.digests.obtain(
            cx.log_prefix,
            cx.store,
            cx.mailbox,
            row.message_id,
            Some(mid),
        )?;
        Ok(DigestView::new(digest, row.folder_id, row.uid, row.flags))
    }

    pub fn get_flags(
        &self,
        mailbox: &str,
        folder: &str,
        mid: &str,
    ) -> Result<MessageFlags, Error> {
        let guard = self.registry.acquire(mailbox)?;
        let t = guard.db().tables();
        Ok(message_in_folder(&t, folder, mid)?.flags)
    }

    /// Set `flags` on a message. `SEEN` and `UNSENT` are written through to
    /// the store.
    pub fn set_flags(
        &self,
        mailbox: &str,
        folder: &str,
        mid: &str,
        flags: MessageFlags,
    ) -> Result<(), Error> {
        self.change_flags(mailbox, folder, mid, flags, true)
    }

    /// Clear `flags` on a message. `SEEN` and `UNSENT` are written through
    /// to the store.
    pub fn remove_flags(
        &self,
        mailbox: &str,
        folder: &str,
        mid: &str,
        flags: MessageFlags,
    ) -> Result<(), Error> {
        self.change_flags(mailbox, folder, mid, flags, false)
    }

    fn change_flags(
        &self,
        mailbox: &str,
        folder: &str,
        mid: &str,
        flags: MessageFlags,
        value: bool,
    ) -> Result<(), Error> {
        let mut guard = self.registry.acquire(mailbox)?;
        let (db, cx) = guard.sync_parts();
        let row = message_in_folder(&db.tables(), folder, mid)?;

        if flags.contains(MessageFlags::SEEN) {
            cx.store.set_read_state(cx.mailbox, row.message_id, value)?;
        }
        if flags.contains(MessageFlags::UNSENT) {
            cx.store.set_unsent(cx.mailbox, row.message_id, value)?;
        }

        db.write(|t| t.set_message_flags(row.message_id, flags, value))?;
        debug!(
            "{} {} {} on message {}",
            cx.log_prefix,
            if value { "Set" } else { "Cleared" },
            flags.to_letters(),
            row.uid
        );
        Ok(())
    }

    /// Run an IMAP-style search over `folder`.
    ///
    /// `charset` names the charset assumed for message text that does not
    /// declare its own. Returns UIDs if `by_uid`, otherwise message sequence
    /// numbers.
    pub fn search(
        &self,
        mailbox: &str,
        folder: &str,
        charset: &str,
        query: &[u8],
        by_uid: bool,
    ) -> Result<Vec<u32>, Error> {
        let fallback = charset_for_label(charset).ok_or(Error::MalformedQuery)?;
        let tree = search::parse(query)?;

        let mut guard = self.registry.acquire(mailbox)?;
        let (db, cx) = guard.sync_parts();
        let t = db.tables();
        let row = folder_row(&t, folder)?;
        let hits = search::eval::evaluate(
            &tree,
            &t,
            &cx,
            row.folder_id,
            fallback,
            by_uid,
        )?;
        debug!(
            "{} Search of {} matched {} messages",
            cx.log_prefix,
            folder,
            hits.len()
        );
        Ok(hits)
    }

    /// Every message of `folder` in uid order, with its size.
    pub fn list_sizes(
        &self,
        mailbox: &str,
        folder: &str,
    ) -> Result<Vec<MessageSize>, Error> {
        let guard = self.registry.acquire(mailbox)?;
        let t = guard.db().tables();
        let row = folder_row(&t, folder)?;
        Ok(t.folder_messages(row.folder_id)?
            .into_iter()
            .map(|m| MessageSize {
                mid_string: m.mid_string,
                size: m.size.max(0) as u64,
            })
            .collect())
    }

    /// The 0-based display position of a message under the order given by
    /// `sort` and `order`.
    pub fn message_offset(
        &self,
        mailbox: &str,
        folder: &str,
        mid: &str,
        sort: SortField,
        order: SortOrder,
    ) -> Result<u32, Error> {
        let mut guard = self.registry.acquire(mailbox)?;
        let (db, _) = guard.sync_parts();
        db.write(|t| {
            let row = folder_row(t, folder)?;
            t.sort_folder(row.folder_id, sort)?;
            let message = message_in_folder(t, folder, mid)?;
            let idx = message.idx.ok_or(Error::NoSuchMessage)?;
            let total = t.folder_stats(row.folder_id)?.total;
            Ok(display_offset(idx, total, order))
        })
    }

    pub fn message_uid(
        &self,
        mailbox: &str,
        folder: &str,
        mid: &str,
    ) -> Result<u32, Error> {
        let guard = self.registry.acquire(mailbox)?;
        let t = guard.db().tables();
        Ok(message_in_folder(&t, folder, mid)?.uid)
    }

    /// The messages of `folder` marked deleted, in display order.
    pub fn list_deleted(
        &self,
        mailbox: &str,
        folder: &str,
        sort: SortField,
        order: SortOrder,
    ) -> Result<Vec<DeletedMessage>, Error> {
        let mut guard = self.registry.acquire(mailbox)?;
        let (db, _) = guard.sync_parts();
        db.write(|t| {
            let row = folder_row(t, folder)?;
            t.sort_folder(row.folder_id, sort)?;
            let messages = t.folder_messages(row.folder_id)?;
            let total = messages.len() as u32;

            let mut deleted = messages
                .into_iter()
                .filter(|m| m.flags.contains(MessageFlags::DELETED))
                .filter_map(|m| m.idx.map(|idx| (idx, m)))
                .collect::<Vec<_>>();
            deleted.sort_by_key(|&(idx, _)| idx);
            if SortOrder::Descending == order {
                deleted.reverse();
            }

            Ok(deleted
                .into_iter()
                .map(|(idx, m)| DeletedMessage {
                    offset: display_offset(idx, total, order),
                    mid_string: m.mid_string,
                    uid: m.uid,
                })
                .collect())
        })
    }

    /// File a new message into `folder` under the caller's mid string.
    ///
    /// `digest` is persisted under `mid` and the message is written to the
    /// store. The cache picks it up from the store's message-created event,
    /// adopting `mid` along with the `A`, `F` and `W` letters of `flags`.
    /// `S` and `U` in `flags` make the message read and unsent; anything
    /// filed into drafts is unsent regardless.
    pub fn insert_message(
        &self,
        mailbox: &str,
        folder: &str,
        mid: &str,
        flags: &str,
        received: i64,
        mut digest: Digest,
    ) -> Result<(), Error> {
        let letters = MessageFlags::from_letters(flags);
        let mut guard = self.registry.acquire(mailbox)?;
        let (db, cx) = guard.sync_parts();
        let row = folder_row(&db.tables(), folder)?;

        digest.file = mid.to_owned();
        cx.digests.save(mid, &digest)?;
        let message = cx.store.allocate_message_id(mailbox, row.folder_id)?;
        db.write(|t| t.add_mapping(message, mid, flags))?;
        debug!(
            "{} Filing {} into {} as message {}",
            cx.log_prefix, mid, folder, message
        );
        drop(guard);

        self.registry.store().write_message(
            mailbox,
            row.folder_id,
            message,
            &MessageContent {
                digest,
                read: letters.contains(MessageFlags::SEEN),
                unsent: letters.contains(MessageFlags::UNSENT)
                    || FolderId::DRAFT == row.folder_id,
                received,
            },
        )
    }

    /// Copy a message into `dst_folder`, returning the mid string of the
    /// copy.
    ///
    /// The copy keeps the answered, flagged and forwarded flags and the
    /// read and unsent state of the original.
    pub fn copy_message(
        &self,
        mailbox: &str,
        folder: &str,
        mid: &str,
        dst_folder: &str,
    ) -> Result<String, Error> {
        let mut guard = self.registry.acquire(mailbox)?;
        let (db, cx) = guard.sync_parts();
        let (source, dst) = {
            let t = db.tables();
            folder_row(&t, folder)?;
            let dst = folder_row(&t, dst_folder)?;
            (message_in_folder(&t, folder, mid)?, dst)
        };

        let (_, mut digest) = cx.digests.obtain(
            cx.log_prefix,
            cx.store,
            cx.mailbox,
            source.message_id,
            Some(mid),
        )?;
        let copy_mid = generate_mid_string();
        digest.file = copy_mid.clone();
        cx.digests.save(&copy_mid, &digest)?;

        let message = cx.store.allocate_message_id(mailbox, dst.folder_id)?;
        let flag_string = (source.flags & MAPPED_FLAGS).to_letters();
        db.write(|t| t.add_mapping(message, &copy_mid, &flag_string))?;
        debug!(
            "{} Copying {} from {} to {} as {}",
            cx.log_prefix, mid, folder, dst_folder, copy_mid
        );
        drop(guard);

        self.registry.store().write_message(
            mailbox,
            dst.folder_id,
            message,
            &MessageContent {
                digest,
                read: source.flags.contains(MessageFlags::SEEN),
                unsent: source.flags.contains(MessageFlags::UNSENT),
                received: source.received,
            },
        )?;
        Ok(copy_mid)
    }

    /// Delete from the store those of `mids` that are in `folder`.
    ///
    /// The cache follows once the store reports the deletions.
    pub fn delete_messages(
        &self,
        mailbox: &str,
        folder: &str,
        mids: &[&str],
    ) -> Result<(), Error> {
        let guard = self.registry.acquire(mailbox)?;
        let (folder_id, doomed) = {
            let t = guard.db().tables();
            let row = folder_row(&t, folder)?;
            let mut doomed = Vec::with_capacity(mids.len());
            for mid in mids {
                match t.message_by_mid(mid)? {
                    Some(m) if m.folder_id == row.folder_id => {
                        doomed.push(m.message_id)
                    }
                    _ => (),
                }
            }
            (row.folder_id, doomed)
        };
        debug!(
            "{} Deleting {} of {} messages from {}",
            guard.log_prefix(),
            doomed.len(),
            mids.len(),
            folder
        );
        drop(guard);

        if doomed.is_empty() {
            return Ok(());
        }
        self.registry
            .store()
            .delete_messages(mailbox, folder_id, &doomed)
    }

    /// Create the folder cached under `name`, along with any missing
    /// folders above it.
    pub fn create_folder(&self, mailbox: &str, name: &str) -> Result<(), Error> {
        let path = decode_path(name).ok_or(Error::InvalidFolderName)?;
        let store = self.registry.store();
        let guard = self.registry.acquire(mailbox)?;
        let (parent, leaf) = {
            let t = guard.db().tables();
            if t.folder_by_name(&encode_path(&path))?.is_some() {
                return Err(Error::FolderExists);
            }
            make_parents(&t, &**store, mailbox, &path)?
        };
        info!("{} Creating folder {:?}", guard.log_prefix(), path);
        drop(guard);

        store.create_folder(mailbox, parent, leaf)?;
        Ok(())
    }

    /// Delete a folder with its contents. Deleting a folder that does not
    /// exist succeeds.
    pub fn remove_folder(&self, mailbox: &str, name: &str) -> Result<(), Error> {
        if FolderId::from_special_name(name).is_some() {
            return Err(Error::InvalidFolderName);
        }

        let guard = self.registry.acquire(mailbox)?;
        let row = match guard.db().tables().folder_by_name(name)? {
            Some(row) => row,
            None => return Ok(()),
        };
        info!("{} Removing folder {}", guard.log_prefix(), row.folder_id);
        drop(guard);

        self.registry.store().delete_folder(mailbox, row.folder_id)
    }

    /// Give the folder cached under `old` the path `new` encodes, creating
    /// any missing folders above it.
    pub fn rename_folder(
        &self,
        mailbox: &str,
        old: &str,
        new: &str,
    ) -> Result<(), Error> {
        if FolderId::from_special_name(old).is_some() {
            return Err(Error::InvalidFolderName);
        }
        let path = decode_path(new).ok_or(Error::InvalidFolderName)?;
        let new = encode_path(&path);
        if old == new {
            return Err(Error::InvalidFolderName);
        }

        let store = self.registry.store();
        let guard = self.registry.acquire(mailbox)?;
        let (folder, parent, leaf) = {
            let t = guard.db().tables();
            let row = folder_row(&t, old)?;
            if t.folder_by_name(&new)?.is_some() {
                return Err(Error::FolderExists);
            }
            let (parent, leaf) = make_parents(&t, &**store, mailbox, &path)?;
            (row.folder_id, parent, leaf)
        };
        info!(
            "{} Renaming folder {} to {:?}",
            guard.log_prefix(),
            folder,
            path
        );
        drop(guard);

        if store.move_folder(mailbox, folder, parent, leaf)? {
            Ok(())
        } else {
            Err(Error::FolderExists)
        }
    }

    /// Whether `mailbox` has reached the size at which the store refuses
    /// delivery.
    pub fn is_full(&self, mailbox: &str) -> Result<bool, Error> {
        Ok(self.registry.store().usage(mailbox)?.is_full())
    }

    /// Load `mailbox` if it is not cached, and keep the store's handle on
    /// it alive.
    pub fn ping(&self, mailbox: &str) -> Result<(), Error> {
        drop(self.registry.acquire(mailbox)?);
        self.registry.store().ping(mailbox)
    }
}

impl Drop for MailIndex {
    fn drop(&mut self) {
        self.stop();
    }
}

fn folder_row(t: &Tables<'_>, name: &str) -> Result<FolderRow, Error> {
    t.folder_by_name(name)?.ok_or(Error::NoSuchFolder)
}

fn message_in_folder(
    t: &Tables<'_>,
    folder: &str,
    mid: &str,
) -> Result<MessageRow, Error> {
    let folder = folder_row(t, folder)?;
    match t.message_by_mid(mid)? {
        Some(row) if row.folder_id == folder.folder_id => Ok(row),
        _ => Err(Error::NoSuchMessage),
    }
}

/// The 0-based display position of the message at 1-based index `idx`
/// among `total`.
fn display_offset(idx: i64, total: u32, order: SortOrder) -> u32 {
    let idx = u32::try_from(idx).unwrap_or(0).max(1);
    match order {
        SortOrder::Ascending => idx - 1,
        SortOrder::Descending => total.saturating_sub(idx),
    }
}

/// Resolve every component of `path` but the last to a folder, creating
/// those that do not exist yet.
///
/// Returns the id of the last component's parent and the last component.
fn make_parents<'p>(
    t: &Tables<'_>,
    store: &dyn StoreClient,
    mailbox: &str,
    path: &'p str,
) -> Result<(FolderId, &'p str), Error> {
    for component in path.split('/') {
        path_component(component)?;
    }

    let mut parent = FolderId::IPM_SUBTREE;
    let mut start = 0;
    while let Some(len) = path[start..].find('/') {
        let end = start + len;
        let component = &path[start..end];
        parent = match FolderId::from_special_name(component) {
            Some(special) => special,
            None => match t.folder_by_name(&encode_path(&path[..end]))? {
                Some(row) => row.folder_id,
                None => store.create_folder(mailbox, parent, component)?,
            },
        };
        start = end + 1;
    }

    Ok((parent, &path[start..]))
}

fn path_component(component: &str) -> Result<&str, Error> {
    if component.is_empty() || component.len() > MAX_DISPLAY_NAME {
        Err(Error::InvalidFolderName)
    } else {
        Ok(component)
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;
    use crate::digest::Digest;
    use crate::storage::cachedb::provision;
    use crate::store::{memory::*, Event};
    use crate::sync::{encode_path, incremental};

    struct Fixture {
        _tmpdir: TempDir,
        store: Arc<MemoryStore>,
        index: MailIndex,
        key: String,
    }

    impl Fixture {
        /// A mailbox owned by `alice` with an inbox and a sent folder.
        fn new() -> Self {
            crate::init_test_log();

            let tmpdir = TempDir::new().unwrap();
            let config = CacheConfig::default();
            let root: PathBuf = tmpdir.path().join("alice");
            provision(&root.join(&config.storage.db_path), "alice").unwrap();
            let key = root.to_str().unwrap().to_owned();

            let store = Arc::new(MemoryStore::new());
            store.put_folder(
                &key,
                mail_folder(FolderId::INBOX, FolderId::IPM_SUBTREE, "Inbox"),
            );
            store.put_folder(
                &key,
                mail_folder(
                    FolderId::SENT_ITEMS,
                    FolderId::IPM_SUBTREE,
                    "Sent Items",
                ),
            );

            let index = MailIndex::new(
                config,
                Arc::clone(&store) as Arc<dyn StoreClient>,
            )
            .unwrap();

            Self {
                _tmpdir: tmpdir,
                store,
                index,
                key,
            }
        }

        fn add(&self, subject: &str, size: u64) -> MessageId {
            self.store.add_message(
                &self.key,
                FolderId::INBOX,
                None,
                Digest::from_headers(&[("Subject", subject)], size),
            )
        }

        /// Three inbox messages, uids 1 to 3, with subjects `b`, `c`, `a`.
        /// The third is read.
        fn with_messages() -> Self {
            let fixture = Self::new();
            fixture.add("b", 10);
            fixture.add("c", 20);
            let third = fixture.add("a", 30);
            fixture.store.update_message(&fixture.key, third, |m| {
                m.flags = StoreFlags::READ
            });
            fixture
        }

        fn list(
            &self,
            sort: SortField,
            order: SortOrder,
            window: Option<Window>,
        ) -> Vec<u32> {
            self.index
                .list_messages(&self.key, "inbox", sort, order, window)
                .unwrap()
                .into_iter()
                .map(|m| m.uid)
                .collect()
        }

        /// Apply the events this test's store calls have raised, as the
        /// store's notifications would.
        fn settle(&self) {
            let events = self.store.take_events(&self.key);
            let mut guard = self.index.registry().acquire(&self.key).unwrap();
            let (db, cx) = guard.sync_parts();
            for event in &events {
                incremental::apply(db, &cx, event).unwrap();
            }
        }

        fn folders(&self) -> Vec<String> {
            sorted(self.index.list_folders(&self.key).unwrap())
        }

        fn mid(&self, uid: u32) -> String {
            self.index
                .list_messages(
                    &self.key,
                    "inbox",
                    SortField::Uid,
                    SortOrder::Ascending,
                    None,
                )
                .unwrap()
                .into_iter()
                .find(|m| uid == m.uid)
                .unwrap()
                .mid_string
        }
    }

    fn sorted(mut v: Vec<String>) -> Vec<String> {
        v.sort();
        v
    }

    #[test]
    fn window_resolution() {
        let w = |offset, length| Window { offset, length };
        assert_eq!((0, 10), w(0, 0).resolve(10));
        assert_eq!((2, 5), w(2, 3).resolve(10));
        assert_eq!((8, 10), w(-2, 0).resolve(10));
        assert_eq!((8, 9), w(-2, 1).resolve(10));
        assert_eq!((0, 10), w(-20, 0).resolve(10));
        assert_eq!((10, 10), w(15, 1).resolve(10));
        assert_eq!((0, 0), w(0, 0).resolve(0));
    }

    #[test]
    fn folder_listings() {
        let fixture = Fixture::new();
        let projects =
            fixture
                .store
                .add_folder(&fixture.key, FolderId::IPM_SUBTREE, "Projects");
        fixture.store.add_folder(&fixture.key, projects, "Mailidx");

        let projects_name = encode_path("Projects");
        let nested_name = encode_path("Projects/Mailidx");

        assert_eq!(
            sorted(vec![
                "inbox".to_owned(),
                "sent".to_owned(),
                projects_name.clone(),
                nested_name.clone(),
            ]),
            sorted(fixture.index.list_folders(&fixture.key).unwrap())
        );
        assert_eq!(
            sorted(vec![projects_name.clone(), nested_name.clone()]),
            sorted(fixture.index.list_user_folders(&fixture.key).unwrap())
        );

        fixture
            .index
            .unsubscribe_folder(&fixture.key, &projects_name)
            .unwrap();
        assert_eq!(
            sorted(vec![
                "inbox".to_owned(),
                "sent".to_owned(),
                nested_name.clone(),
            ]),
            sorted(fixture.index.list_subscribed(&fixture.key).unwrap())
        );
        fixture
            .index
            .subscribe_folder(&fixture.key, &projects_name)
            .unwrap();
        assert_eq!(4, fixture.index.list_subscribed(&fixture.key).unwrap().len());

        assert_matches!(
            Err(Error::NoSuchFolder),
            fixture.index.unsubscribe_folder(&fixture.key, "nowhere"),
        );
    }

    #[test]
    fn message_listing_orders_and_windows() {
        let fixture = Fixture::with_messages();
        use self::SortOrder::*;

        assert_eq!(vec![1, 2, 3], fixture.list(SortField::None, Ascending, None));
        assert_eq!(vec![3, 1, 2], fixture.list(SortField::Subject, Ascending, None));
        assert_eq!(
            vec![2, 1, 3],
            fixture.list(SortField::Subject, Descending, None)
        );
        assert_eq!(vec![3, 2, 1], fixture.list(SortField::Size, Descending, None));
        assert_eq!(vec![1, 2, 3], fixture.list(SortField::Read, Ascending, None));

        let w = |offset, length| Some(Window { offset, length });
        assert_eq!(vec![1, 2], fixture.list(SortField::Subject, Ascending, w(-2, 0)));
        assert_eq!(vec![1], fixture.list(SortField::Subject, Ascending, w(1, 1)));
        assert_eq!(
            vec![2, 1],
            fixture.list(SortField::Subject, Descending, w(0, 2))
        );
        assert_eq!(
            vec![3],
            fixture.list(SortField::Subject, Descending, w(-1, 0))
        );
        assert_eq!(
            Vec::<u32>::new(),
            fixture.list(SortField::Subject, Ascending, w(5, 0))
        );

        let listing = fixture
            .index
            .list_messages(&fixture.key, "inbox", SortField::Uid, Ascending, None)
            .unwrap();
        assert_eq!("(SR)", listing[2].flags.to_letters());
        assert_eq!("(R)", listing[0].flags.to_letters());

        assert_matches!(
            Err(Error::NoSuchFolder),
            fixture
                .index
                .list_messages(&fixture.key, "nowhere", SortField::Uid, Ascending, None)
                .map(|_| ()),
        );
    }

    #[test]
    fn folder_detail_summarises() {
        let fixture = Fixture::with_messages();

        assert_eq!(
            FolderDetail {
                total: 3,
                recent: 3,
                unread: 2,
                uid_validity: FolderId::INBOX.0,
                uidnext: 4,
                first_unseen: Some(1),
            },
            fixture
                .index
                .folder_detail(
                    &fixture.key,
                    "inbox",
                    SortField::Uid,
                    SortOrder::Ascending
                )
                .unwrap()
        );

        // Descending by uid shows 3 (read), then 2
        assert_eq!(
            Some(2),
            fixture
                .index
                .folder_detail(
                    &fixture.key,
                    "inbox",
                    SortField::Uid,
                    SortOrder::Descending
                )
                .unwrap()
                .first_unseen
        );

        let empty = fixture
            .index
            .folder_detail(&fixture.key, "sent", SortField::None, SortOrder::Ascending)
            .unwrap();
        assert_eq!(0, empty.total);
        assert_eq!(None, empty.first_unseen);
        assert_eq!(1, empty.uidnext);
    }

    #[test]
    fn flags_update_cache_and_store() {
        let fixture = Fixture::with_messages();
        let mid = fixture.mid(1);
        let message = MessageId(
            fixture
                .store
                .enumerate_messages(&fixture.key, FolderId::INBOX)
                .unwrap()
                .into_iter()
                .map(|m| m.message_id.0)
                .min()
                .unwrap(),
        );

        fixture
            .index
            .set_flags(
                &fixture.key,
                "inbox",
                &mid,
                MessageFlags::from_letters("FS"),
            )
            .unwrap();
        let flags = fixture.index.get_flags(&fixture.key, "inbox", &mid).unwrap();
        assert_eq!("(FSR)", flags.to_letters());
        assert!(fixture
            .store
            .message_info(&fixture.key, message)
            .unwrap()
            .flags
            .contains(StoreFlags::READ));

        fixture
            .index
            .remove_flags(&fixture.key, "inbox", &mid, MessageFlags::SEEN)
            .unwrap();
        assert_eq!(
            "(FR)",
            fixture
                .index
                .get_flags(&fixture.key, "inbox", &mid)
                .unwrap()
                .to_letters()
        );
        assert!(!fixture
            .store
            .message_info(&fixture.key, message)
            .unwrap()
            .flags
            .contains(StoreFlags::READ));

        assert_matches!(
            Err(Error::NoSuchMessage),
            fixture.index.get_flags(&fixture.key, "sent", &mid),
        );
        assert_matches!(
            Err(Error::NoSuchMessage),
            fixture.index.get_flags(&fixture.key, "inbox", "nothing.midb"),
        );
        assert_matches!(
            Err(Error::NoSuchFolder),
            fixture.index.set_flags(
                &fixture.key,
                "nowhere",
                &mid,
                MessageFlags::FLAGGED
            ),
        );
    }

    #[test]
    fn digest_carries_cache_state() {
        let fixture = Fixture::with_messages();
        let mid = fixture.mid(3);

        let view = fixture.index.get_digest(&fixture.key, &mid).unwrap();
        assert_eq!(3, view.uid);
        assert_eq!(FolderId::INBOX, view.folder_id);
        assert!(view.read);
        assert!(view.recent);
        assert!(!view.flag);
        assert_eq!(base64::encode("a"), view.digest.subject);
        assert_eq!(mid, view.digest.file);

        let json: serde_json::Value =
            serde_json::from_str(&view.to_json().unwrap()).unwrap();
        assert_eq!(3, json["uid"]);

        assert_matches!(
            Err(Error::NoSuchMessage),
            fixture.index.get_digest(&fixture.key, "nothing.midb").map(|_| ()),
        );
    }

    #[test]
    fn search_runs_against_the_folder() {
        let fixture = Fixture::with_messages();
        let search = |folder: &str, charset: &str, query: &str, by_uid| {
            fixture.index.search(
                &fixture.key,
                folder,
                charset,
                query.as_bytes(),
                by_uid,
            )
        };

        assert_eq!(vec![3], search("inbox", "utf-8", "SUBJECT a", true).unwrap());
        assert_eq!(
            vec![1, 2],
            search("inbox", "us-ascii", "UNSEEN", false).unwrap()
        );
        assert_eq!(
            vec![2, 3],
            search("inbox", "utf-8", "OR SUBJECT c SEEN", true).unwrap()
        );
        assert_eq!(
            Vec::<u32>::new(),
            search("sent", "utf-8", "ALL", true).unwrap()
        );

        assert_matches!(
            Err(Error::MalformedQuery),
            search("inbox", "klingon", "ALL", true),
        );
        assert_matches!(
            Err(Error::MalformedQuery),
            search("inbox", "utf-8", "SUBJECT", true),
        );
        assert_matches!(
            Err(Error::NoSuchFolder),
            search("nowhere", "utf-8", "ALL", true),
        );
    }

    #[test]
    fn inserted_messages_adopt_their_mid() {
        let fixture = Fixture::new();
        fixture.store.put_folder(
            &fixture.key,
            mail_folder(FolderId::DRAFT, FolderId::IPM_SUBTREE, "Drafts"),
        );
        let requests = fixture.store.digest_requests();

        fixture
            .index
            .insert_message(
                &fixture.key,
                "inbox",
                "1700000000.7.midb",
                "(AFSW)",
                1_600_000_000,
                Digest::from_headers(&[("Subject", "hello")], 4096),
            )
            .unwrap();
        fixture
            .index
            .insert_message(
                &fixture.key,
                "draft",
                "1700000000.8.midb",
                "()",
                1_600_000_100,
                Digest::from_headers(&[("Subject", "unfinished")], 100),
            )
            .unwrap();

        // Nothing is cached until the store reports the new messages
        assert_matches!(
            Err(Error::NoSuchMessage),
            fixture
                .index
                .get_flags(&fixture.key, "inbox", "1700000000.7.midb"),
        );
        fixture.settle();

        assert_eq!(
            "(AFSRW)",
            fixture
                .index
                .get_flags(&fixture.key, "inbox", "1700000000.7.midb")
                .unwrap()
                .to_letters()
        );
        assert_eq!(
            "(UR)",
            fixture
                .index
                .get_flags(&fixture.key, "draft", "1700000000.8.midb")
                .unwrap()
                .to_letters()
        );

        let view = fixture
            .index
            .get_digest(&fixture.key, "1700000000.7.midb")
            .unwrap();
        assert_eq!(base64::encode("hello"), view.digest.subject);
        assert_eq!("1700000000.7.midb", view.digest.file);
        assert_eq!(1, view.uid);
        // The digest filed with the message served the cache
        assert_eq!(requests, fixture.store.digest_requests());

        assert_eq!(
            vec![MessageSize {
                mid_string: "1700000000.7.midb".to_owned(),
                size: 4096,
            }],
            fixture.index.list_sizes(&fixture.key, "inbox").unwrap()
        );

        assert_matches!(
            Err(Error::NoSuchFolder),
            fixture.index.insert_message(
                &fixture.key,
                "nowhere",
                "1700000000.9.midb",
                "",
                0,
                Digest::default(),
            ),
        );
        assert!(fixture.store.take_events(&fixture.key).is_empty());
    }

    #[test]
    fn uid_listing_follows_uid_order() {
        let fixture = Fixture::with_messages();
        let listing = fixture.index.list_sizes(&fixture.key, "inbox").unwrap();
        assert_eq!(
            vec![
                (fixture.mid(1), 10),
                (fixture.mid(2), 20),
                (fixture.mid(3), 30),
            ],
            listing
                .into_iter()
                .map(|m| (m.mid_string, m.size))
                .collect::<Vec<_>>()
        );
        assert!(fixture.index.list_sizes(&fixture.key, "sent").unwrap().is_empty());
        assert_matches!(
            Err(Error::NoSuchFolder),
            fixture.index.list_sizes(&fixture.key, "nowhere").map(|_| ()),
        );
    }

    #[test]
    fn copies_keep_flags_and_digest() {
        let fixture = Fixture::with_messages();
        let mid = fixture.mid(3);
        fixture
            .index
            .set_flags(
                &fixture.key,
                "inbox",
                &mid,
                MessageFlags::from_letters("FD"),
            )
            .unwrap();

        let copy = fixture
            .index
            .copy_message(&fixture.key, "inbox", &mid, "sent")
            .unwrap();
        assert_ne!(mid, copy);
        fixture.settle();

        // Deleted is not carried over; read state is
        assert_eq!(
            "(FSR)",
            fixture
                .index
                .get_flags(&fixture.key, "sent", &copy)
                .unwrap()
                .to_letters()
        );
        assert_eq!(
            "(FDSR)",
            fixture
                .index
                .get_flags(&fixture.key, "inbox", &mid)
                .unwrap()
                .to_letters()
        );

        let view = fixture.index.get_digest(&fixture.key, &copy).unwrap();
        assert_eq!(FolderId::SENT_ITEMS, view.folder_id);
        assert_eq!(1, view.uid);
        assert_eq!(base64::encode("a"), view.digest.subject);
        assert_eq!(copy, view.digest.file);

        assert_matches!(
            Err(Error::NoSuchMessage),
            fixture.index.copy_message(&fixture.key, "sent", &mid, "inbox"),
        );
        assert_matches!(
            Err(Error::NoSuchFolder),
            fixture.index.copy_message(&fixture.key, "inbox", &mid, "nowhere"),
        );
    }

    #[test]
    fn deletion_goes_through_the_store() {
        let fixture = Fixture::with_messages();
        let (one, two) = (fixture.mid(1), fixture.mid(2));
        let uids = || fixture.list(SortField::Uid, SortOrder::Ascending, None);

        fixture
            .index
            .delete_messages(&fixture.key, "sent", &[one.as_str()])
            .unwrap();
        fixture.settle();
        assert_eq!(vec![1, 2, 3], uids());

        fixture
            .index
            .delete_messages(
                &fixture.key,
                "inbox",
                &[one.as_str(), "nothing.midb", two.as_str()],
            )
            .unwrap();
        assert_eq!(vec![1, 2, 3], uids());
        fixture.settle();
        assert_eq!(vec![3], uids());

        assert_matches!(
            Err(Error::NoSuchFolder),
            fixture.index.delete_messages(&fixture.key, "nowhere", &[]),
        );
    }

    #[test]
    fn message_positions() {
        let fixture = Fixture::with_messages();
        use self::SortOrder::*;
        let offset = |uid, order| {
            fixture
                .index
                .message_offset(
                    &fixture.key,
                    "inbox",
                    &fixture.mid(uid),
                    SortField::Subject,
                    order,
                )
                .unwrap()
        };

        // By subject: a (3), b (1), c (2)
        assert_eq!(0, offset(3, Ascending));
        assert_eq!(1, offset(1, Ascending));
        assert_eq!(2, offset(2, Ascending));
        assert_eq!(0, offset(2, Descending));
        assert_eq!(1, offset(1, Descending));
        assert_eq!(2, offset(3, Descending));

        let mid = fixture.mid(2);
        assert_eq!(
            2,
            fixture.index.message_uid(&fixture.key, "inbox", &mid).unwrap()
        );
        assert_matches!(
            Err(Error::NoSuchMessage),
            fixture.index.message_uid(&fixture.key, "sent", &mid),
        );
        assert_matches!(
            Err(Error::NoSuchMessage),
            fixture.index.message_offset(
                &fixture.key,
                "sent",
                &mid,
                SortField::Uid,
                Ascending
            ),
        );
        assert_matches!(
            Err(Error::NoSuchFolder),
            fixture.index.message_uid(&fixture.key, "nowhere", &mid),
        );
    }

    #[test]
    fn deleted_listing_in_display_order() {
        let fixture = Fixture::with_messages();
        let (one, three) = (fixture.mid(1), fixture.mid(3));
        for mid in &[&one, &three] {
            fixture
                .index
                .set_flags(&fixture.key, "inbox", mid, MessageFlags::DELETED)
                .unwrap();
        }
        let deleted = |offset, mid: &str, uid| DeletedMessage {
            offset,
            mid_string: mid.to_owned(),
            uid,
        };

        assert_eq!(
            vec![deleted(0, &three, 3), deleted(1, &one, 1)],
            fixture
                .index
                .list_deleted(
                    &fixture.key,
                    "inbox",
                    SortField::Subject,
                    SortOrder::Ascending
                )
                .unwrap()
        );
        assert_eq!(
            vec![deleted(1, &one, 1), deleted(2, &three, 3)],
            fixture
                .index
                .list_deleted(
                    &fixture.key,
                    "inbox",
                    SortField::Subject,
                    SortOrder::Descending
                )
                .unwrap()
        );
        assert!(fixture
            .index
            .list_deleted(&fixture.key, "sent", SortField::Uid, SortOrder::Ascending)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn folder_management() {
        let fixture = Fixture::new();
        let (index, key) = (&fixture.index, &fixture.key);

        index
            .create_folder(key, &encode_path("Projects/Mailidx"))
            .unwrap();
        index
            .create_folder(key, &encode_path("inbox/Receipts"))
            .unwrap();
        fixture.settle();
        assert_eq!(
            sorted(vec![
                "inbox".to_owned(),
                "sent".to_owned(),
                encode_path("Projects"),
                encode_path("Projects/Mailidx"),
                encode_path("inbox/Receipts"),
            ]),
            fixture.folders()
        );

        assert_matches!(
            Err(Error::FolderExists),
            index.create_folder(key, &encode_path("Projects/Mailidx")),
        );
        assert_matches!(
            Err(Error::FolderExists),
            index.create_folder(key, &encode_path("Projects").to_uppercase()),
        );
        assert_matches!(
            Err(Error::InvalidFolderName),
            index.create_folder(key, "inbox"),
        );
        assert_matches!(
            Err(Error::InvalidFolderName),
            index.create_folder(key, &encode_path("a//b")),
        );

        // Moving under a new parent creates the parent
        index
            .rename_folder(
                key,
                &encode_path("Projects/Mailidx"),
                &encode_path("Archive/2026"),
            )
            .unwrap();
        // Renaming in place
        index
            .rename_folder(key, &encode_path("Projects"), &encode_path("Personal"))
            .unwrap();
        fixture.settle();
        assert_eq!(
            sorted(vec![
                "inbox".to_owned(),
                "sent".to_owned(),
                encode_path("Archive"),
                encode_path("Archive/2026"),
                encode_path("Personal"),
                encode_path("inbox/Receipts"),
            ]),
            fixture.folders()
        );

        let archive = encode_path("Archive");
        assert_matches!(
            Err(Error::InvalidFolderName),
            index.rename_folder(key, "inbox", &encode_path("Mail")),
        );
        assert_matches!(
            Err(Error::InvalidFolderName),
            index.rename_folder(key, &archive, &archive),
        );
        assert_matches!(
            Err(Error::FolderExists),
            index.rename_folder(key, &archive, &encode_path("Personal")),
        );
        assert_matches!(
            Err(Error::NoSuchFolder),
            index.rename_folder(key, &encode_path("Nowhere"), &encode_path("x")),
        );
        assert_matches!(
            Err(Error::Store(_)),
            index.rename_folder(key, &archive, &encode_path("Archive/2026/x")),
        );

        assert_matches!(
            Err(Error::InvalidFolderName),
            index.remove_folder(key, "junk"),
        );
        index.remove_folder(key, &encode_path("Nowhere")).unwrap();
        index.remove_folder(key, &archive).unwrap();
        fixture.settle();
        assert_eq!(
            sorted(vec![
                "inbox".to_owned(),
                "sent".to_owned(),
                encode_path("Personal"),
                encode_path("inbox/Receipts"),
            ]),
            fixture.folders()
        );
    }

    #[test]
    fn quota_and_keepalive() {
        let fixture = Fixture::with_messages();
        assert!(!fixture.index.is_full(&fixture.key).unwrap());

        fixture.store.set_receive_quota(&fixture.key, Some(1));
        assert!(!fixture.index.is_full(&fixture.key).unwrap());
        fixture.add("large", 2000);
        assert!(fixture.index.is_full(&fixture.key).unwrap());

        fixture.index.ping(&fixture.key).unwrap();
        assert_eq!(1, fixture.store.pings());
        let missing = fixture._tmpdir.path().join("nobody");
        assert_matches!(
            Err(Error::LoadFailed),
            fixture.index.ping(missing.to_str().unwrap()),
        );
        assert_eq!(1, fixture.store.pings());
    }

    #[test]
    fn notifications_reach_loaded_mailboxes() {
        let fixture = Fixture::new();
        assert!(fixture.index.list_folders(&fixture.key).is_ok());
        let subscription = fixture.store.subscription(&fixture.key).unwrap();

        let message = fixture.add("late arrival", 10);
        fixture
            .index
            .notifier()
            .send(Notification {
                mailbox: fixture.key.clone(),
                subscription,
                event: Event::NewMail {
                    folder: FolderId::INBOX,
                    message,
                },
            })
            .unwrap();

        assert_eq!(
            FolderTouched {
                username: "alice".to_owned(),
                folder: "inbox".to_owned(),
            },
            fixture
                .index
                .folder_touches()
                .recv_timeout(Duration::from_secs(10))
                .unwrap()
        );
        assert_eq!(
            vec![1],
            fixture.list(SortField::Uid, SortOrder::Ascending, None)
        );
    }

    #[test]
    fn shutdown_releases_subscriptions() {
        let fixture = Fixture::new();
        fixture.index.list_folders(&fixture.key).unwrap();
        assert_eq!(1, fixture.store.active_subscriptions(&fixture.key));

        let Fixture {
            _tmpdir, store, index, key,
        } = fixture;
        index.shutdown();
        assert_eq!(0, store.active_subscriptions(&key));
        drop(_tmpdir);
    }

    #[test]
    fn unloadable_mailboxes_fail() {
        let fixture = Fixture::new();
        let missing = fixture._tmpdir.path().join("nobody");
        assert_matches!(
            Err(Error::LoadFailed),
            fixture.index.list_folders(missing.to_str().unwrap()),
        );
    }
}
