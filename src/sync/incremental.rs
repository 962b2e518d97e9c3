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


//! Application of single store events to a loaded cache entry.
//!
//! Every handler tolerates events that arrive late, twice, or out of order:
//! whatever cannot be resolved against the current state of the store and
//! the cache is ignored, to be repaired by the next full sync.

use std::thread;
use std::time::Duration;

use log::debug;

use super::*;
use crate::storage::{cachedb::CacheDb, types::FolderRow};
use crate::store::{Event, FolderInfo};

/// How long to wait before looking at a new folder a second time when the
/// store has not assigned its class yet.
const CLASS_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Flags a pending `mapping` row may carry over to the message.
pub(crate) const MAPPED_FLAGS: MessageFlags = MessageFlags::from_bits_truncate(
    MessageFlags::FLAGGED.bits()
        | MessageFlags::ANSWERED.bits()
        | MessageFlags::FORWARDED.bits(),
);

/// Apply one event within its own transaction.
///
/// For new mail landing in a cached folder, returns the cached name of that
/// folder.
pub fn apply(
    db: &mut CacheDb,
    cx: &SyncContext<'_>,
    event: &Event,
) -> Result<Option<String>, Error> {
    debug!("{} Applying {:?}", cx.log_prefix, event);

    db.write(|t| {
        match *event {
            Event::NewMail { folder, message } => {
                add_message(t, cx, folder, message)?;
                return Ok(t.folder(folder)?.map(|row| row.name));
            }

            Event::MessageCreated { folder, message }
            | Event::MessageCopied { folder, message } => {
                add_message(t, cx, folder, message)?;
            }

            Event::MessageDeleted { folder, message } => {
                t.delete_message(folder, message)?;
            }

            Event::MessageModified { folder, message } => {
                modify_message(t, cx, folder, message)?;
            }

            Event::MessageMoved {
                old_folder,
                old_message,
                folder,
                message,
            } => {
                t.delete_message(old_folder, old_message)?;
                add_message(t, cx, folder, message)?;
            }

            Event::FolderCreated { folder, .. } => {
                add_folder(t, cx, folder)?;
            }

            Event::FolderCopied { folder, .. } => {
                if add_folder(t, cx, folder)? {
                    full::sync_folder_contents(t, cx, folder)?;
                }
            }

            Event::FolderDeleted { folder, .. } => {
                delete_subtree(t, folder)?;
            }

            Event::FolderModified { folder } => {
                modify_folder(t, cx, folder)?;
            }

            Event::FolderMoved { folder, .. } => {
                move_folder(t, cx, folder)?;
            }
        }

        Ok(None)
    })
}

fn add_message(
    t: &Tables<'_>,
    cx: &SyncContext<'_>,
    folder: FolderId,
    message: MessageId,
) -> Result<(), Error> {
    if t.folder(folder)?.is_none() {
        return Ok(());
    }

    let mut info = match cx.store.get_message(cx.mailbox, folder, message)? {
        Some(info) => info,
        None => return Ok(()),
    };

    if let Some(cached) = t.message(message)? {
        return refresh_message(t, cx, &info, &cached);
    }

    let mut extra_flags = MessageFlags::empty();
    if info.mid_string.is_none() {
        if let Some((mid, flag_string)) = t.take_mapping(message)? {
            info.mid_string = Some(mid);
            extra_flags = MessageFlags::from_letters(&flag_string) & MAPPED_FLAGS;
        }
    }

    insert_message(t, cx, &info, extra_flags)?;
    Ok(())
}

fn modify_message(
    t: &Tables<'_>,
    cx: &SyncContext<'_>,
    folder: FolderId,
    message: MessageId,
) -> Result<(), Error> {
    let cached = match t.message(message)? {
        Some(cached) => cached,
        None => return add_message(t, cx, folder, message),
    };

    match cx.store.get_message(cx.mailbox, folder, message)? {
        Some(info) => refresh_message(t, cx, &info, &cached),
        None => Ok(()),
    }
}

/// The name `info` is cached under, or `None` if the cache does not mirror
/// it.
fn folder_name(
    t: &Tables<'_>,
    info: &FolderInfo,
) -> Result<Option<String>, Error> {
    if let Some(special) = info.folder_id.special_name() {
        return Ok(Some(special.to_owned()));
    }

    if !info.is_mail_folder() {
        return Ok(None);
    }

    Ok(parent_path(t, info.parent_id)?
        .and_then(|parent| child_name(&parent, &info.display_name)))
}

/// Returns whether the folder was added.
fn add_folder(
    t: &Tables<'_>,
    cx: &SyncContext<'_>,
    folder: FolderId,
) -> Result<bool, Error> {
    if t.folder(folder)?.is_some() {
        return Ok(false);
    }

    let mut info = match cx.store.get_folder(cx.mailbox, folder)? {
        Some(info) => info,
        None => return Ok(false),
    };

    if info.container_class.is_none() && !folder.is_special() {
        thread::sleep(CLASS_RETRY_DELAY);
        info = match cx.store.get_folder(cx.mailbox, folder)? {
            Some(info) => info,
            None => return Ok(false),
        };
    }

    insert_folder(t, &info)
}

fn insert_folder(t: &Tables<'_>, info: &FolderInfo) -> Result<bool, Error> {
    match folder_name(t, info)? {
        Some(name) => {
            t.insert_folder(
                info.folder_id,
                info.parent_id,
                &name,
                info.commit_max,
            )?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn modify_folder(
    t: &Tables<'_>,
    cx: &SyncContext<'_>,
    folder: FolderId,
) -> Result<(), Error> {
    if folder.is_special() {
        return Ok(());
    }

    let row = match t.folder(folder)? {
        Some(row) => row,
        None => return Ok(()),
    };

    match cx.store.get_folder(cx.mailbox, folder)? {
        Some(info) => relocate(t, &row, &info),
        None => Ok(()),
    }
}

fn move_folder(
    t: &Tables<'_>,
    cx: &SyncContext<'_>,
    folder: FolderId,
) -> Result<(), Error> {
    let info = match cx.store.get_folder(cx.mailbox, folder)? {
        Some(info) => info,
        None => return Ok(()),
    };

    match t.folder(folder)? {
        None => insert_folder(t, &info).map(|_| ()),
        Some(row) => relocate(t, &row, &info),
    }
}

/// Give a cached folder the parent and name `info` implies, renaming its
/// descendants to match.
///
/// A folder that is no longer mirrored is dropped with its descendants.
fn relocate(
    t: &Tables<'_>,
    row: &FolderRow,
    info: &FolderInfo,
) -> Result<(), Error> {
    let name = match folder_name(t, info)? {
        Some(name) => name,
        None => return delete_subtree(t, row.folder_id),
    };

    if name == row.name && info.parent_id == row.parent_id {
        return Ok(());
    }

    t.relocate_folder(row.folder_id, info.parent_id, &name)?;
    if !row.folder_id.is_special() && name != row.name {
        t.replace_name_prefix(
            &format!("{}{}", row.name, separator()),
            &format!("{}{}", name, separator()),
        )?;
    }

    Ok(())
}

/// Delete `folder` and every cached folder beneath it.
fn delete_subtree(t: &Tables<'_>, folder: FolderId) -> Result<(), Error> {
    let all = t.all_folders()?;
    let mut doomed = vec![folder];
    let mut ix = 0;
    while ix < doomed.len() {
        let parent = doomed[ix];
        doomed.extend(
            all.iter()
                .filter(|row| row.parent_id == parent)
                .map(|row| row.folder_id)
                .filter(|&id| id != folder),
        );
        ix += 1;
        if doomed.len() > all.len() + 1 {
            break;
        }
    }

    for id in doomed {
        t.delete_folder(id)?;
    }
    Ok(())
}
