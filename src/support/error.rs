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

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Mailbox cache is full")]
    CapacityExceeded,
    #[error("Mailbox could not be loaded")]
    LoadFailed,
    #[error("No such folder")]
    NoSuchFolder,
    #[error("No such message")]
    NoSuchMessage,
    #[error("Folder already exists")]
    FolderExists,
    #[error("Invalid folder name")]
    InvalidFolderName,
    #[error("Malformed search query")]
    MalformedQuery,
    #[error("Message digest unavailable")]
    DigestUnavailable,
    #[error("Store request failed: {0}")]
    Store(String),
    #[error("Invalid configuration: {0}")]
    BadConfig(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether the caller may reasonably retry the same request later.
    ///
    /// This covers a full registry and an entry whose lock could not be
    /// obtained in time, as opposed to requests naming things that do not
    /// exist or queries that will never parse.
    pub fn is_transient(&self) -> bool {
        matches!(*self, Error::CapacityExceeded | Error::LoadFailed)
    }
}
