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

//! Identifiers and small value types shared by the store boundary, the
//! cache database and the operation surface.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::support::error::Error;

/// A folder identifier, as assigned by the store.
#[derive(
    Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord,
    Hash,
)]
#[serde(transparent)]
pub struct FolderId(pub i64);

impl FolderId {
    /// The top of the user-visible folder hierarchy. Never itself mirrored.
    pub const IPM_SUBTREE: Self = Self(0x09);
    pub const SENT_ITEMS: Self = Self(0x0a);
    pub const DELETED_ITEMS: Self = Self(0x0b);
    pub const OUTBOX: Self = Self(0x0c);
    pub const INBOX: Self = Self(0x0d);
    pub const DRAFT: Self = Self(0x0e);
    pub const JUNK: Self = Self(0x17);
    pub const SYNC_ISSUES: Self = Self(0x19);

    /// The fixed cache name of this folder, if it is one of the special
    /// folders.
    pub fn special_name(self) -> Option<&'static str> {
        match self {
            Self::INBOX => Some("inbox"),
            Self::DRAFT => Some("draft"),
            Self::SENT_ITEMS => Some("sent"),
            Self::DELETED_ITEMS => Some("trash"),
            Self::JUNK => Some("junk"),
            _ => None,
        }
    }

    pub fn is_special(self) -> bool {
        self.special_name().is_some()
    }

    /// The special folder with the fixed cache name `name`.
    pub fn from_special_name(name: &str) -> Option<Self> {
        [
            Self::INBOX,
            Self::DRAFT,
            Self::SENT_ITEMS,
            Self::DELETED_ITEMS,
            Self::JUNK,
        ]
        .iter()
        .copied()
        .find(|f| f.special_name() == Some(name))
    }

    /// Whether folders beneath this top-level folder are excluded from the
    /// cache.
    pub fn is_excluded_tree(self) -> bool {
        Self::OUTBOX == self || Self::SYNC_ISSUES == self
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message identifier, as assigned by the store.
#[derive(
    Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord,
    Hash,
)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A token naming one store-side notification subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u32);

bitflags! {
    /// Message flags as the store reports them.
    #[derive(Default)]
    pub struct StoreFlags: u32 {
        const READ = 0x0001;
        const UNSENT = 0x0008;
    }
}

bitflags! {
    /// The flags the cache tracks per message.
    #[derive(Default)]
    pub struct MessageFlags: u8 {
        const ANSWERED = 1 << 0;
        const UNSENT = 1 << 1;
        const FLAGGED = 1 << 2;
        const FORWARDED = 1 << 3;
        const DELETED = 1 << 4;
        const SEEN = 1 << 5;
        const RECENT = 1 << 6;
    }
}

const FLAG_LETTERS: &[(char, MessageFlags)] = &[
    ('A', MessageFlags::ANSWERED),
    ('U', MessageFlags::UNSENT),
    ('F', MessageFlags::FLAGGED),
    ('D', MessageFlags::DELETED),
    ('S', MessageFlags::SEEN),
    ('R', MessageFlags::RECENT),
    ('W', MessageFlags::FORWARDED),
];

impl MessageFlags {
    /// Parse a flag string such as `"(AS)"` or `"FW"`.
    ///
    /// Characters that do not name a flag are ignored, which lets callers
    /// pass either the bare letters or the parenthesised form.
    pub fn from_letters(s: &str) -> Self {
        let mut flags = Self::empty();
        for ch in s.chars() {
            if let Some(&(_, flag)) =
                FLAG_LETTERS.iter().find(|&&(letter, _)| letter == ch)
            {
                flags |= flag;
            }
        }
        flags
    }

    /// Render as the parenthesised flag string used in listings.
    pub fn to_letters(self) -> String {
        let mut s = String::with_capacity(FLAG_LETTERS.len() + 2);
        s.push('(');
        for &(letter, flag) in FLAG_LETTERS {
            if self.contains(flag) {
                s.push(letter);
            }
        }
        s.push(')');
        s
    }
}

/// The column a folder's display index is ordered by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortField {
    /// The display index is stale and must be recomputed before use.
    None = 0,
    Uid = 1,
    Received = 2,
    Subject = 3,
    From = 4,
    Rcpt = 5,
    Size = 6,
    Read = 7,
    Flag = 8,
}

impl SortField {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => SortField::Uid,
            2 => SortField::Received,
            3 => SortField::Subject,
            4 => SortField::From,
            5 => SortField::Rcpt,
            6 => SortField::Size,
            7 => SortField::Read,
            8 => SortField::Flag,
            _ => SortField::None,
        }
    }

    /// The message column this field orders by.
    ///
    /// `None` orders by uid, so asking for "no particular order" still
    /// produces a stable listing.
    pub fn column(self) -> &'static str {
        match self {
            SortField::None | SortField::Uid => "uid",
            SortField::Received => "received",
            SortField::Subject => "subject",
            SortField::From => "sender",
            SortField::Rcpt => "rcpt",
            SortField::Size => "size",
            SortField::Read => "read",
            SortField::Flag => "flagged",
        }
    }

    /// The field actually recorded once the index has been computed.
    pub fn effective(self) -> Self {
        match self {
            SortField::None => SortField::Uid,
            other => other,
        }
    }
}

impl FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_uppercase().as_str() {
            "RCV" => Ok(SortField::Received),
            "SUB" => Ok(SortField::Subject),
            "FRM" => Ok(SortField::From),
            "RCP" => Ok(SortField::Rcpt),
            "SIZ" => Ok(SortField::Size),
            "RED" => Ok(SortField::Read),
            "FLG" => Ok(SortField::Flag),
            "UID" => Ok(SortField::Uid),
            "NON" => Ok(SortField::None),
            _ => Err(Error::MalformedQuery),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        if s.eq_ignore_ascii_case("ASC") {
            Ok(SortOrder::Ascending)
        } else if s.eq_ignore_ascii_case("DSC") {
            Ok(SortOrder::Descending)
        } else {
            Err(Error::MalformedQuery)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flag_letters() {
        let flags = MessageFlags::from_letters("(WSA)");
        assert_eq!(
            MessageFlags::ANSWERED | MessageFlags::SEEN | MessageFlags::FORWARDED,
            flags
        );
        assert_eq!("(ASW)", flags.to_letters());
        assert_eq!("()", MessageFlags::empty().to_letters());
        assert_eq!("(AUFDSRW)", MessageFlags::all().to_letters());
    }

    #[test]
    fn sort_field_codes() {
        assert_eq!(SortField::Subject, "sub".parse::<SortField>().unwrap());
        assert_eq!(SortField::None, "NON".parse::<SortField>().unwrap());
        assert_matches!(Err(Error::MalformedQuery), "XYZ".parse::<SortField>());
        for field in &[
            SortField::None,
            SortField::Uid,
            SortField::Received,
            SortField::Subject,
            SortField::From,
            SortField::Rcpt,
            SortField::Size,
            SortField::Read,
            SortField::Flag,
        ] {
            assert_eq!(*field, SortField::from_code(*field as i64));
        }
        assert_eq!(SortField::Uid, SortField::None.effective());
    }

    #[test]
    fn special_folders() {
        assert_eq!(Some("inbox"), FolderId::INBOX.special_name());
        assert_eq!(Some("trash"), FolderId::DELETED_ITEMS.special_name());
        assert_eq!(None, FolderId(0x100).special_name());
        assert_eq!(Some(FolderId::JUNK), FolderId::from_special_name("junk"));
        assert_eq!(None, FolderId::from_special_name("Inbox"));
        assert!(FolderId::OUTBOX.is_excluded_tree());
        assert!(!FolderId::INBOX.is_excluded_tree());
    }
}
