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


//! IMAP-style SEARCH over a cached folder.
//!
//! A query is tokenised, compiled into a `ConditionTree`, and then evaluated
//! against each message of the folder in UID order. Conditions on flags,
//! sizes, UIDs and delivery dates are answered from the cached rows; those
//! on header or body text load the message's digest, at most once per
//! message.

pub mod compile;
pub mod eval;
pub mod lexer;
pub mod sequence;

use encoding_rs::Encoding;

pub use self::compile::ConditionTree;
use crate::model::FolderId;
use crate::storage::cachedb::Tables;
use crate::support::error::Error;
use crate::sync::SyncContext;

/// Compile `query` into a condition tree.
pub fn parse(query: &[u8]) -> Result<ConditionTree, Error> {
    compile::compile(&lexer::tokenize(query)?)
}

/// Run `query` against `folder`, returning UIDs if `by_uid` and message
/// sequence numbers otherwise.
pub fn search(
    t: &Tables<'_>,
    cx: &SyncContext<'_>,
    folder: FolderId,
    fallback: &'static Encoding,
    query: &[u8],
    by_uid: bool,
) -> Result<Vec<u32>, Error> {
    let tree = parse(query)?;
    eval::evaluate(&tree, t, cx, folder, fallback, by_uid)
}
