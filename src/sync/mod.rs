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


//! Reconciliation of cache entries against the store.
//!
//! `full` rebuilds an entry from complete enumerations, `incremental`
//! applies single store events, and `notify` routes events from the store
//! to the entries they concern.

pub mod full;
pub mod incremental;
pub mod notify;

use std::fmt::Write as _;

use log::warn;

use crate::digest::cache::DigestStore;
use crate::model::*;
use crate::storage::{
    cachedb::Tables,
    types::{MessageRow, NewMessage},
};
use crate::store::{MessageInfo, StoreClient};
use crate::support::{error::Error, log_prefix::LogPrefix};

/// Longest display name of a single folder, in bytes.
pub(crate) const MAX_DISPLAY_NAME: usize = 255;
/// Longest `a/b/c` path of a folder, in bytes.
const MAX_FOLDER_PATH: usize = 511;

/// Everything a sync pass needs besides the database itself.
pub struct SyncContext<'a> {
    pub mailbox: &'a str,
    pub store: &'a dyn StoreClient,
    pub digests: &'a DigestStore,
    pub log_prefix: &'a LogPrefix,
}

/// Encode a folder path for the `name` column: lowercase hex of its bytes.
pub fn encode_path(path: &str) -> String {
    let mut encoded = String::with_capacity(path.len() * 2);
    for b in path.bytes() {
        let _ = write!(encoded, "{:02x}", b);
    }
    encoded
}

/// Reverse `encode_path`.
///
/// Returns `None` unless `name` is an even number of hex digits encoding a
/// UTF-8 path no longer than the longest cacheable path.
pub fn decode_path(name: &str) -> Option<String> {
    if 0 != name.len() % 2 || name.len() / 2 > MAX_FOLDER_PATH {
        return None;
    }

    let bytes = name
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            if !pair.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            std::str::from_utf8(pair)
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        })
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

/// The encoded form of the path separator.
fn separator() -> String {
    encode_path("/")
}

/// Compute the cached name of a folder whose parent's encoded path is
/// `parent_path` (empty for top-level folders).
///
/// Returns `None` if the display name or resulting path is too long.
fn child_name(parent_path: &str, display_name: &str) -> Option<String> {
    if display_name.len() > MAX_DISPLAY_NAME {
        return None;
    }

    if parent_path.is_empty() {
        return Some(encode_path(display_name));
    }

    if parent_path.len() / 2 + 1 + display_name.len() > MAX_FOLDER_PATH {
        return None;
    }

    Some(format!(
        "{}{}{}",
        parent_path,
        separator(),
        encode_path(display_name)
    ))
}

/// The encoded path children of `parent` are named under, or `None` if
/// `parent` is not part of the cached hierarchy.
fn parent_path(t: &Tables<'_>, parent: FolderId) -> Result<Option<String>, Error> {
    if FolderId::IPM_SUBTREE == parent {
        return Ok(Some(String::new()));
    }

    if let Some(name) = parent.special_name() {
        return Ok(Some(encode_path(name)));
    }

    Ok(t.folder(parent)?.map(|row| row.name))
}

/// Insert a message the store reported, pulling its digest through the
/// digest cache.
///
/// `extra_flags` are cache-side flags to set in addition to those derived
/// from the store. Returns the assigned uid, or `None` if the message was
/// skipped because no digest could be obtained.
fn insert_message(
    t: &Tables<'_>,
    cx: &SyncContext<'_>,
    info: &MessageInfo,
    extra_flags: MessageFlags,
) -> Result<Option<u32>, Error> {
    let (mid_string, digest) = match cx.digests.obtain(
        cx.log_prefix,
        cx.store,
        cx.mailbox,
        info.message_id,
        info.mid_string.as_deref(),
    ) {
        Ok(found) => found,
        Err(Error::DigestUnavailable) => {
            warn!(
                "{} Skipping message {} in folder {}: no digest",
                cx.log_prefix, info.message_id, info.folder_id
            );
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let mut flags = extra_flags | MessageFlags::RECENT;
    flags.set(MessageFlags::SEEN, info.flags.contains(StoreFlags::READ));
    flags.set(MessageFlags::UNSENT, info.flags.contains(StoreFlags::UNSENT));

    t.insert_message(&NewMessage {
        message_id: info.message_id,
        folder_id: info.folder_id,
        mid_string,
        mod_time: info.mod_time,
        flags,
        fields: digest.search_fields(),
        received: info.received_time(),
    })
    .map(Some)
}

/// The cache-only flags that survive a message being re-inserted.
const LOCAL_FLAGS: MessageFlags = MessageFlags::from_bits_truncate(
    MessageFlags::ANSWERED.bits()
        | MessageFlags::FLAGGED.bits()
        | MessageFlags::FORWARDED.bits()
        | MessageFlags::DELETED.bits(),
);

/// Bring an already cached message up to date with what the store reports.
///
/// If the message moved folders, or has no mid string and was modified
/// since it was cached, it is deleted and inserted afresh under a new uid.
/// Otherwise only the store-controlled flags are updated.
fn refresh_message(
    t: &Tables<'_>,
    cx: &SyncContext<'_>,
    info: &MessageInfo,
    cached: &MessageRow,
) -> Result<(), Error> {
    if cached.folder_id == info.folder_id
        && (info.mid_string.is_some() || info.mod_time <= cached.mod_time)
    {
        t.update_store_flags(
            info.message_id,
            info.flags.contains(StoreFlags::READ),
            info.flags.contains(StoreFlags::UNSENT),
        )?;
        return Ok(());
    }

    t.delete_message(cached.folder_id, cached.message_id)?;
    insert_message(t, cx, info, cached.flags & LOCAL_FLAGS)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test {
    use tempfile::TempDir;

    use super::*;
    use crate::storage::cachedb::{self, CacheDb};
    use crate::store::{memory::*, Event};
    use crate::support::config::StorageConfig;

    /// A provisioned database for mailbox `M`, owned by `alice`, in front
    /// of a store holding just an empty inbox.
    pub(crate) struct Fixture {
        tmpdir: TempDir,
        pub(crate) store: MemoryStore,
        pub(crate) db: CacheDb,
        pub(crate) digests: DigestStore,
        pub(crate) log_prefix: LogPrefix,
    }

    impl Fixture {
        pub(crate) fn new() -> Self {
            crate::init_test_log();

            let tmpdir = TempDir::new().unwrap();
            let path = tmpdir.path().join("midb.sqlite3");
            cachedb::provision(&path, "alice").unwrap();
            let log_prefix = LogPrefix::new("M");
            let db =
                CacheDb::open(&path, &StorageConfig::default(), &log_prefix)
                    .unwrap();
            let digests = DigestStore::new(tmpdir.path().join("ext"));

            let store = MemoryStore::new();
            store.put_folder(
                "M",
                mail_folder(FolderId::INBOX, FolderId::IPM_SUBTREE, "Inbox"),
            );

            Self {
                tmpdir,
                store,
                db,
                digests,
                log_prefix,
            }
        }

        pub(crate) fn with_cx<R>(
            &mut self,
            f: impl FnOnce(&mut CacheDb, &SyncContext<'_>) -> R,
        ) -> R {
            let cx = SyncContext {
                mailbox: "M",
                store: &self.store,
                digests: &self.digests,
                log_prefix: &self.log_prefix,
            };
            f(&mut self.db, &cx)
        }

        pub(crate) fn sync(&mut self) {
            self.with_cx(|db, cx| full::sync_mailbox(db, cx)).unwrap();
        }

        /// Build a second database for the same mailbox from scratch.
        pub(crate) fn fresh_db(&self) -> CacheDb {
            let path = self.tmpdir.path().join("fresh.sqlite3");
            cachedb::provision(&path, "alice").unwrap();
            let mut db =
                CacheDb::open(&path, &StorageConfig::default(), &self.log_prefix)
                    .unwrap();
            let cx = SyncContext {
                mailbox: "M",
                store: &self.store,
                digests: &self.digests,
                log_prefix: &self.log_prefix,
            };
            full::sync_mailbox(&mut db, &cx).unwrap();
            db
        }

        pub(crate) fn apply(&mut self, event: Event) -> Option<String> {
            self.with_cx(|db, cx| incremental::apply(db, cx, &event))
                .unwrap()
        }
    }

    #[test]
    fn path_encoding() {
        assert_eq!("", encode_path(""));
        assert_eq!("612f62", encode_path("a/b"));
        assert_eq!("c3a9", encode_path("é"));

        assert_eq!(Some("a/b".to_owned()), decode_path("612f62"));
        assert_eq!(Some("é".to_owned()), decode_path("C3A9"));
        assert_eq!(Some(String::new()), decode_path(""));
        assert_eq!(None, decode_path("612"));
        assert_eq!(None, decode_path("zz"));
        assert_eq!(None, decode_path("+1"));
        assert_eq!(None, decode_path("c3"));
        assert_eq!(None, decode_path(&"61".repeat(512)));
    }

    #[test]
    fn child_names() {
        assert_eq!(Some("6162".to_owned()), child_name("", "ab"));
        assert_eq!(Some("612f62".to_owned()), child_name("61", "b"));
        assert_eq!(None, child_name("", &"x".repeat(256)));
        assert!(child_name("", &"x".repeat(255)).is_some());
        assert_eq!(None, child_name(&"61".repeat(300), &"x".repeat(250)));
    }
}
