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


//! Bindings for the model types to `rusqlite`, plus the row types of the
//! cache database.

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

use crate::digest::SearchFields;
use crate::model::*;

macro_rules! transparent_to_sql {
    ($t:ident) => {
        impl ToSql for $t {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                self.0.to_sql()
            }
        }
    };
}

macro_rules! transparent_from_sql {
    ($t:ident) => {
        impl FromSql for $t {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                FromSql::column_result(value).map(Self)
            }
        }
    };
}

transparent_to_sql!(FolderId);
transparent_from_sql!(FolderId);
transparent_to_sql!(MessageId);
transparent_from_sql!(MessageId);

impl ToSql for SortField {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(*self as i64))
    }
}

impl FromSql for SortField {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(SortField::from_code)
    }
}

/// The columns of `messages` holding each flag.
pub const FLAG_COLUMNS: &[(MessageFlags, &str)] = &[
    (MessageFlags::ANSWERED, "replied"),
    (MessageFlags::UNSENT, "unsent"),
    (MessageFlags::FLAGGED, "flagged"),
    (MessageFlags::FORWARDED, "forwarded"),
    (MessageFlags::DELETED, "deleted"),
    (MessageFlags::SEEN, "read"),
    (MessageFlags::RECENT, "recent"),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderRow {
    pub folder_id: FolderId,
    pub parent_id: FolderId,
    pub name: String,
    pub commit_max: i64,
    pub uidnext: u32,
    pub sort_field: SortField,
    pub unsub: bool,
}

impl FromRow for FolderRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            folder_id: row.get("folder_id")?,
            parent_id: row.get("parent_fid")?,
            name: row.get("name")?,
            commit_max: row.get("commit_max")?,
            uidnext: row.get("uidnext")?,
            sort_field: row.get("sort_field")?,
            unsub: row.get("unsub")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageRow {
    pub message_id: MessageId,
    pub folder_id: FolderId,
    pub mid_string: String,
    pub mod_time: i64,
    pub uid: u32,
    pub flags: MessageFlags,
    pub subject: String,
    pub sender: String,
    pub rcpt: String,
    pub size: i64,
    pub received: i64,
    pub idx: Option<i64>,
}

impl FromRow for MessageRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let mut flags = MessageFlags::empty();
        for &(flag, column) in FLAG_COLUMNS {
            flags.set(flag, row.get(column)?);
        }

        Ok(Self {
            message_id: row.get("message_id")?,
            folder_id: row.get("folder_id")?,
            mid_string: row.get("mid_string")?,
            mod_time: row.get("mod_time")?,
            uid: row.get("uid")?,
            flags,
            subject: row.get("subject")?,
            sender: row.get("sender")?,
            rcpt: row.get("rcpt")?,
            size: row.get("size")?,
            received: row.get("received")?,
            idx: row.get("idx")?,
        })
    }
}

/// A message about to be inserted into `messages`.
#[derive(Clone, Debug)]
pub struct NewMessage {
    pub message_id: MessageId,
    pub folder_id: FolderId,
    pub mid_string: String,
    pub mod_time: i64,
    pub flags: MessageFlags,
    pub fields: SearchFields,
    pub received: i64,
}

/// Aggregate state of one folder's messages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FolderStats {
    pub total: u32,
    pub recent: u32,
    pub unread: u32,
    /// The lowest display index of an unread message.
    pub first_unseen_idx: Option<u32>,
}

pub fn from_row<T: FromRow>(row: &rusqlite::Row<'_>) -> rusqlite::Result<T> {
    T::from_row(row)
}

pub fn from_single<T: FromSql>(row: &rusqlite::Row<'_>) -> rusqlite::Result<T> {
    row.get(0)
}

pub trait FromRow: Sized {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self>;
}

macro_rules! from_row_tuple {
    ($($ix:tt: $t:ident),*) => {
        impl<$($t: FromSql,)*> FromRow
        for ($($t,)*) {
            fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
                Ok(($(row.get($ix)?,)*))
            }
        }
    }
}

from_row_tuple!(0: A, 1: B);
from_row_tuple!(0: A, 1: B, 2: C, 3: D);
