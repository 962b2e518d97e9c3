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


//! Full reconciliation of a cache entry against complete store
//! enumerations.

use std::collections::{HashMap, HashSet};

use log::{debug, info};

use super::*;
use crate::storage::cachedb::CacheDb;
use crate::store::FolderInfo;

/// A folder as it should appear in the `folders` table.
#[derive(Clone, Debug, PartialEq, Eq)]
struct SnapshotFolder {
    folder_id: FolderId,
    parent_id: FolderId,
    name: String,
    commit_max: i64,
}

/// Bring the whole entry in line with the store.
///
/// New folders are inserted and have their contents synced; moved or
/// renamed folders are relocated; folders whose commit marker differs have
/// their contents synced; folders the store no longer reports are dropped
/// along with their messages. Everything happens in one transaction, so
/// other holders of the database never see a partial result.
pub fn sync_mailbox(db: &mut CacheDb, cx: &SyncContext<'_>) -> Result<(), Error> {
    let remote = cx.store.enumerate_folders(cx.mailbox)?;
    let snapshot = snapshot_folders(&remote);
    debug!(
        "{} Store reports {} folders, {} mirrored",
        cx.log_prefix,
        remote.len(),
        snapshot.len()
    );

    let (added, removed) = db.write(|t| {
        let mut seen = HashSet::with_capacity(snapshot.len());
        let mut added = 0;

        for folder in &snapshot {
            seen.insert(folder.folder_id);

            match t.folder(folder.folder_id)? {
                None => {
                    t.insert_folder(
                        folder.folder_id,
                        folder.parent_id,
                        &folder.name,
                        folder.commit_max,
                    )?;
                    sync_folder_contents(t, cx, folder.folder_id)?;
                    added += 1;
                }

                Some(row) => {
                    if row.parent_id != folder.parent_id
                        || row.name != folder.name
                    {
                        t.relocate_folder(
                            folder.folder_id,
                            folder.parent_id,
                            &folder.name,
                        )?;
                    }

                    if row.commit_max != folder.commit_max {
                        sync_folder_contents(t, cx, folder.folder_id)?;
                        t.set_commit_max(folder.folder_id, folder.commit_max)?;
                    }
                }
            }
        }

        let mut removed = 0;
        for row in t.all_folders()? {
            if !seen.contains(&row.folder_id) {
                t.delete_folder(row.folder_id)?;
                removed += 1;
            }
        }

        Ok((added, removed))
    })?;

    info!(
        "{} Folders synced: {} added, {} removed",
        cx.log_prefix, added, removed
    );
    Ok(())
}

/// Bring the contents of one folder in line with the store.
pub fn sync_contents(
    db: &mut CacheDb,
    cx: &SyncContext<'_>,
    folder: FolderId,
) -> Result<(), Error> {
    db.write(|t| sync_folder_contents(t, cx, folder))
}

/// Reconcile the messages of `folder` within an open transaction.
///
/// Does nothing if the folder is not cached.
pub(super) fn sync_folder_contents(
    t: &Tables<'_>,
    cx: &SyncContext<'_>,
    folder: FolderId,
) -> Result<(), Error> {
    if t.folder(folder)?.is_none() {
        return Ok(());
    }

    let remote = cx.store.enumerate_messages(cx.mailbox, folder)?;
    let mut present = HashSet::with_capacity(remote.len());
    let mut inserted = 0;

    for info in &remote {
        present.insert(info.message_id);
        match t.message(info.message_id)? {
            None => {
                if insert_message(t, cx, info, MessageFlags::empty())?.is_some()
                {
                    inserted += 1;
                }
            }
            Some(cached) => refresh_message(t, cx, info, &cached)?,
        }
    }

    let mut deleted = 0;
    for row in t.folder_messages(folder)? {
        if !present.contains(&row.message_id)
            && t.delete_message(folder, row.message_id)?
        {
            deleted += 1;
        }
    }

    debug!(
        "{} Folder {}: {} messages, {} inserted, {} deleted",
        cx.log_prefix,
        folder,
        remote.len(),
        inserted,
        deleted
    );
    Ok(())
}

/// Work out which of the enumerated folders the cache mirrors, and under
/// which names.
///
/// Special folders always take their fixed names. Any other folder must be
/// a visible mail folder whose every ancestor up to the root is itself
/// mirrored; its name is the encoded `a/b/c` path of display names, where a
/// special ancestor contributes its fixed name.
fn snapshot_folders(remote: &[FolderInfo]) -> Vec<SnapshotFolder> {
    let by_id = remote
        .iter()
        .map(|f| (f.folder_id, f))
        .collect::<HashMap<_, _>>();

    remote
        .iter()
        .filter_map(|folder| {
            let path = folder_path(&by_id, folder)?;
            let name = match folder.folder_id.special_name() {
                Some(special) => special.to_owned(),
                None => encode_path(&path),
            };

            Some(SnapshotFolder {
                folder_id: folder.folder_id,
                parent_id: folder.parent_id,
                name,
                commit_max: folder.commit_max,
            })
        })
        .collect()
}

/// The display path of `folder`, or `None` if it is not mirrored.
fn folder_path(
    by_id: &HashMap<FolderId, &FolderInfo>,
    folder: &FolderInfo,
) -> Option<String> {
    let mut components = Vec::<&str>::new();
    let mut current = folder;
    let mut path_len = 0;

    loop {
        if current.folder_id.is_excluded_tree() {
            return None;
        }

        let component = match current.folder_id.special_name() {
            Some(special) => special,
            None => {
                if !current.is_mail_folder()
                    || current.display_name.len() > MAX_DISPLAY_NAME
                {
                    return None;
                }
                &current.display_name
            }
        };

        path_len += component.len() + 1;
        if path_len > MAX_FOLDER_PATH + 1 || components.len() > by_id.len() {
            return None;
        }
        components.push(component);

        // A special folder's fixed name stands for its whole ancestry
        if current.folder_id.is_special()
            || FolderId::IPM_SUBTREE == current.parent_id
        {
            break;
        }

        current = by_id.get(&current.parent_id)?;
    }

    components.reverse();
    Some(components.join("/"))
}

#[cfg(test)]
mod test {
    use super::super::test::Fixture;
    use super::*;
    use crate::digest::Digest;
    use crate::store::{memory::mail_folder, MessageInfo};

    fn subject(s: &str) -> Digest {
        Digest::from_headers(&[("Subject", s)], 10)
    }

    #[test]
    fn first_sync_of_single_message() {
        let mut fixture = Fixture::new();
        fixture.store.update_folder("M", FolderId::INBOX, |f| {
            f.commit_max = 4
        });
        let m1 = fixture.store.add_message(
            "M",
            FolderId::INBOX,
            None,
            subject("Monthly invoice"),
        );
        fixture.sync();

        let t = fixture.db.tables();
        let folders = t.all_folders().unwrap();
        assert_eq!(1, folders.len());
        assert_eq!("inbox", folders[0].name);
        assert_eq!(5, folders[0].commit_max);
        assert_eq!(2, folders[0].uidnext);

        let messages = t.folder_messages(FolderId::INBOX).unwrap();
        assert_eq!(1, messages.len());
        assert_eq!(m1, messages[0].message_id);
        assert_eq!(1, messages[0].uid);
        assert_eq!(100, messages[0].mod_time);
        assert_eq!("Monthly invoice", messages[0].subject);
        assert!(messages[0].flags.contains(MessageFlags::RECENT));
        assert!(!messages[0].flags.contains(MessageFlags::SEEN));
    }

    #[test]
    fn second_sync_changes_nothing() {
        let mut fixture = Fixture::new();
        let sub = fixture.store.add_folder("M", FolderId::INBOX, "Lists");
        for n in 0..5 {
            fixture.store.add_message(
                "M",
                if n % 2 == 0 { FolderId::INBOX } else { sub },
                None,
                subject(&format!("message {}", n)),
            );
        }
        fixture.sync();
        let folders_before = fixture.db.tables().all_folders().unwrap();
        let inbox_before =
            fixture.db.tables().folder_messages(FolderId::INBOX).unwrap();
        let requests = fixture.store.digest_requests();

        fixture.sync();
        fixture
            .with_cx(|db, cx| sync_contents(db, cx, FolderId::INBOX))
            .unwrap();

        assert_eq!(folders_before, fixture.db.tables().all_folders().unwrap());
        assert_eq!(
            inbox_before,
            fixture.db.tables().folder_messages(FolderId::INBOX).unwrap()
        );
        assert_eq!(requests, fixture.store.digest_requests());
    }

    #[test]
    fn folder_names_follow_hierarchy() {
        let mut fixture = Fixture::new();
        let work = fixture
            .store
            .add_folder("M", FolderId::IPM_SUBTREE, "Work");
        let reports = fixture.store.add_folder("M", work, "Reports");
        let lists = fixture.store.add_folder("M", FolderId::INBOX, "Lists");
        fixture.sync();

        let t = fixture.db.tables();
        assert_eq!(encode_path("Work"), t.folder(work).unwrap().unwrap().name);
        assert_eq!(
            encode_path("Work/Reports"),
            t.folder(reports).unwrap().unwrap().name
        );
        assert_eq!(
            encode_path("inbox/Lists"),
            t.folder(lists).unwrap().unwrap().name
        );
    }

    #[test]
    fn unmirrored_folders_are_skipped() {
        let mut fixture = Fixture::new();
        fixture.store.put_folder(
            "M",
            mail_folder(FolderId::OUTBOX, FolderId::IPM_SUBTREE, "Outbox"),
        );
        let queued = fixture.store.add_folder("M", FolderId::OUTBOX, "Queued");
        let hidden = fixture
            .store
            .add_folder("M", FolderId::IPM_SUBTREE, "Hidden");
        fixture.store.update_folder("M", hidden, |f| f.hidden = true);
        let under_hidden = fixture.store.add_folder("M", hidden, "Child");
        let calendar = fixture
            .store
            .add_folder("M", FolderId::IPM_SUBTREE, "Calendar");
        fixture.store.update_folder("M", calendar, |f| {
            f.container_class = Some("IPF.Appointment".to_owned())
        });
        let long = fixture
            .store
            .add_folder("M", FolderId::IPM_SUBTREE, &"x".repeat(256));
        fixture.sync();

        let t = fixture.db.tables();
        for folder in &[
            FolderId::OUTBOX,
            queued,
            hidden,
            under_hidden,
            calendar,
            long,
        ] {
            assert!(t.folder(*folder).unwrap().is_none(), "{}", folder);
        }
        assert!(t.folder(FolderId::INBOX).unwrap().is_some());
    }

    #[test]
    fn special_folders_ignore_class() {
        let mut fixture = Fixture::new();
        fixture.store.put_folder("M", FolderInfo {
            container_class: None,
            ..mail_folder(FolderId::SENT_ITEMS, FolderId::IPM_SUBTREE, "Sent")
        });
        fixture.sync();

        assert_eq!(
            "sent",
            fixture
                .db
                .tables()
                .folder(FolderId::SENT_ITEMS)
                .unwrap()
                .unwrap()
                .name
        );
    }

    #[test]
    fn reconciles_store_changes() {
        let mut fixture = Fixture::new();
        let work = fixture
            .store
            .add_folder("M", FolderId::IPM_SUBTREE, "Work");
        let doomed = fixture
            .store
            .add_folder("M", FolderId::IPM_SUBTREE, "Doomed");
        let kept =
            fixture.store.add_message("M", work, None, subject("kept"));
        let edited =
            fixture.store.add_message("M", work, None, subject("edited"));
        let gone = fixture.store.add_message("M", work, None, subject("gone"));
        fixture.store.add_message("M", doomed, None, subject("doomed"));
        fixture.sync();

        fixture
            .db
            .write(|t| {
                t.set_message_flags(edited, MessageFlags::FLAGGED, true)
                    .map(|_| ())
            })
            .unwrap();

        fixture.store.update_folder("M", work, |f| {
            f.display_name = "Office".to_owned()
        });
        fixture.store.remove_folder("M", doomed);
        fixture.store.update_message("M", kept, |m| {
            m.flags = StoreFlags::READ
        });
        fixture.store.update_message("M", edited, |m| m.mod_time = 200);
        fixture.store.remove_message("M", gone);
        let fresh =
            fixture.store.add_message("M", work, None, subject("fresh"));
        fixture.sync();

        let t = fixture.db.tables();
        assert_eq!(encode_path("Office"), t.folder(work).unwrap().unwrap().name);
        assert!(t.folder(doomed).unwrap().is_none());

        let messages = t.folder_messages(work).unwrap();
        let uids = messages
            .iter()
            .map(|m| (m.message_id, m.uid))
            .collect::<Vec<_>>();
        assert_eq!(vec![(kept, 1), (edited, 4), (fresh, 5)], uids);
        assert!(messages[0].flags.contains(MessageFlags::SEEN));
        assert_eq!(200, messages[1].mod_time);
        assert!(messages[1].flags.contains(MessageFlags::FLAGGED));
        assert_eq!(6, t.folder(work).unwrap().unwrap().uidnext);
    }

    #[test]
    fn modified_message_with_mid_string_only_refreshes_flags() {
        let mut fixture = Fixture::new();
        let named = fixture.store.add_message(
            "M",
            FolderId::INBOX,
            Some("1700000000.1.midb"),
            subject("named"),
        );
        let anonymous =
            fixture
                .store
                .add_message("M", FolderId::INBOX, None, subject("anon"));
        fixture.sync();

        for message in &[named, anonymous] {
            fixture.store.update_message("M", *message, |m| {
                m.mod_time = 900;
                m.flags = StoreFlags::READ;
            });
        }
        fixture.sync();

        let t = fixture.db.tables();
        // A message carrying its own mid string keeps its row and uid even
        // though its modification time advanced
        let row = t.message(named).unwrap().unwrap();
        assert_eq!(1, row.uid);
        assert_eq!(100, row.mod_time);
        assert!(row.flags.contains(MessageFlags::SEEN));

        let row = t.message(anonymous).unwrap().unwrap();
        assert_eq!(3, row.uid);
        assert_eq!(900, row.mod_time);
        assert!(row.flags.contains(MessageFlags::SEEN));
    }

    #[test]
    fn message_reported_elsewhere_is_moved() {
        let mut fixture = Fixture::new();
        let archive = fixture
            .store
            .add_folder("M", FolderId::IPM_SUBTREE, "Archive");
        let message = fixture.store.add_message(
            "M",
            FolderId::INBOX,
            Some("1.1.midb"),
            subject("moving"),
        );
        fixture.sync();

        fixture
            .store
            .update_message("M", message, |m| m.folder_id = archive);
        fixture.sync();

        let t = fixture.db.tables();
        let row = t.message(message).unwrap().unwrap();
        assert_eq!(archive, row.folder_id);
        assert_eq!(1, row.uid);
        assert_eq!("1.1.midb", row.mid_string);
    }

    #[test]
    fn undigestable_messages_are_skipped() {
        let mut fixture = Fixture::new();
        let good = fixture.store.add_message(
            "M",
            FolderId::INBOX,
            None,
            subject("good"),
        );
        fixture.store.put_message(
            "M",
            MessageInfo {
                message_id: MessageId(1),
                folder_id: FolderId::INBOX,
                mid_string: Some("../escape".to_owned()),
                flags: StoreFlags::empty(),
                mod_time: 1,
                received: None,
            },
            subject("bad"),
        );
        fixture.sync();

        let messages =
            fixture.db.tables().folder_messages(FolderId::INBOX).unwrap();
        assert_eq!(1, messages.len());
        assert_eq!(good, messages[0].message_id);
    }

    #[test]
    fn failed_enumeration_aborts() {
        let mut fixture = Fixture::new();
        fixture.store.fail_enumeration(true);
        assert_matches!(
            Err(Error::Store(..)),
            fixture.with_cx(|db, cx| sync_mailbox(db, cx)),
        );
        assert!(fixture.db.tables().all_folders().unwrap().is_empty());
    }
}
