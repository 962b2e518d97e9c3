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

//! Message digests.
//!
//! A digest is the summary of one message the store produces on request:
//! the raw text of the headers the cache searches on, the message size, and
//! the still-encoded body parts. Digests are persisted as JSON, one file per
//! message, so the store only has to produce each one once.
//!
//! Header values and part contents are carried base64-encoded since they
//! are not necessarily valid UTF-8.

pub mod cache;
pub mod decode;

use encoding_rs::UTF_8;
use serde::{Deserialize, Serialize};

use crate::model::*;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Digest {
    /// The mid string (file name) of the message. Filled in when the digest
    /// is persisted.
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub cc: String,
    /// The `Date` header, as it appears in the message.
    #[serde(default)]
    pub date: String,
    /// Every header field in order, names as written and values
    /// base64-encoded.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub parts: Vec<DigestPart>,
}

/// One leaf body part of a message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DigestPart {
    pub content_type: String,
    #[serde(default)]
    pub charset: Option<String>,
    /// The `Content-Transfer-Encoding` of the part.
    #[serde(default)]
    pub encoding: String,
    /// The part body, still transfer-encoded, then base64-encoded.
    pub content: String,
}

/// The denormalised columns of a message row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchFields {
    pub subject: String,
    pub sender: String,
    pub rcpt: String,
    pub size: u64,
}

impl Digest {
    /// Build a digest from raw header text. Mainly useful for stores that
    /// produce digests on the fly, and for tests.
    pub fn from_headers(headers: &[(&str, &str)], size: u64) -> Self {
        let mut digest = Digest {
            size,
            ..Digest::default()
        };

        for &(name, value) in headers {
            let encoded = base64::encode(value.as_bytes());
            if name.eq_ignore_ascii_case("subject") {
                digest.subject = encoded.clone();
            } else if name.eq_ignore_ascii_case("from") {
                digest.from = encoded.clone();
            } else if name.eq_ignore_ascii_case("to") {
                digest.to = encoded.clone();
            } else if name.eq_ignore_ascii_case("cc") {
                digest.cc = encoded.clone();
            } else if name.eq_ignore_ascii_case("date") {
                digest.date = value.to_owned();
            }
            digest.headers.push((name.to_owned(), encoded));
        }

        digest
    }

    /// Append a body part, given its still-transfer-encoded content.
    pub fn with_part(
        mut self,
        content_type: &str,
        charset: Option<&str>,
        encoding: &str,
        content: &[u8],
    ) -> Self {
        self.parts.push(DigestPart {
            content_type: content_type.to_owned(),
            charset: charset.map(str::to_owned),
            encoding: encoding.to_owned(),
            content: base64::encode(content),
        });
        self
    }

    /// Return the raw bytes of one of the base64-encoded header fields.
    ///
    /// Corrupt values are treated as empty.
    pub fn raw_field(field: &str) -> Vec<u8> {
        base64::decode(field).unwrap_or_default()
    }

    /// Extract the columns the cache stores alongside each message.
    ///
    /// `sender` is the first address in `From`, and `rcpt` the first
    /// address of the first entry in `To`.
    pub fn search_fields(&self) -> SearchFields {
        let subject =
            decode::decode_header(&Self::raw_field(&self.subject), UTF_8);

        let from = decode::decode_header(&Self::raw_field(&self.from), UTF_8);
        let sender = decode::first_address(&from)
            .map(str::to_owned)
            .unwrap_or_default();

        let to = decode::decode_header(&Self::raw_field(&self.to), UTF_8);
        let first_to = to.split(|c| ',' == c || ';' == c).next().unwrap_or("");
        let rcpt = decode::first_address(first_to.trim_end())
            .map(str::to_owned)
            .unwrap_or_default();

        SearchFields {
            subject,
            sender,
            rcpt,
            size: self.size,
        }
    }
}

/// A digest as handed to callers, together with the cache's view of the
/// message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DigestView {
    #[serde(flatten)]
    pub digest: Digest,
    pub folder_id: FolderId,
    pub uid: u32,
    pub recent: bool,
    pub read: bool,
    pub unsent: bool,
    pub flag: bool,
    pub replied: bool,
    pub forwarded: bool,
    pub deleted: bool,
}

impl DigestView {
    pub fn new(
        digest: Digest,
        folder_id: FolderId,
        uid: u32,
        flags: MessageFlags,
    ) -> Self {
        DigestView {
            digest,
            folder_id,
            uid,
            recent: flags.contains(MessageFlags::RECENT),
            read: flags.contains(MessageFlags::SEEN),
            unsent: flags.contains(MessageFlags::UNSENT),
            flag: flags.contains(MessageFlags::FLAGGED),
            replied: flags.contains(MessageFlags::ANSWERED),
            forwarded: flags.contains(MessageFlags::FORWARDED),
            deleted: flags.contains(MessageFlags::DELETED),
        }
    }

    pub fn to_json(&self) -> Result<String, crate::support::error::Error> {
        serde_json::to_string(self).map_err(Into::into)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn search_fields_extraction() {
        let digest = Digest::from_headers(
            &[
                ("Subject", "=?UTF-8?Q?Monthly_invoice?="),
                ("From", "\"Billing\" <billing@example.com>"),
                ("To", "Alice <alice@example.com>; bob@example.org"),
            ],
            1234,
        );

        assert_eq!(
            SearchFields {
                subject: "Monthly invoice".to_owned(),
                sender: "billing@example.com".to_owned(),
                rcpt: "alice@example.com".to_owned(),
                size: 1234,
            },
            digest.search_fields()
        );
    }

    #[test]
    fn missing_fields_are_empty() {
        let fields = Digest::default().search_fields();
        assert_eq!(SearchFields::default(), fields);
    }

    #[test]
    fn view_serialises_flat() {
        let digest = Digest::from_headers(&[("Subject", "hi")], 2);
        let view = DigestView::new(
            digest,
            FolderId::INBOX,
            7,
            MessageFlags::SEEN | MessageFlags::FLAGGED,
        );
        let json: serde_json::Value =
            serde_json::from_str(&view.to_json().unwrap()).unwrap();
        assert_eq!(7, json["uid"]);
        assert_eq!(true, json["read"]);
        assert_eq!(true, json["flag"]);
        assert_eq!(false, json["deleted"]);
        assert_eq!(13, json["folder_id"]);
        assert_eq!("aGk=", json["subject"]);
    }
}
