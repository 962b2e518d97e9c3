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


//! Evaluation of condition trees against one folder's cached messages.

use std::convert::TryFrom;

use chrono::DateTime;
use encoding_rs::Encoding;
use log::warn;
use regex::Regex;

use super::compile::{Condition, Conjunction, ConditionTree, Node, NodeKind};
use crate::digest::{decode, Digest};
use crate::model::*;
use crate::storage::{cachedb::Tables, types::MessageRow};
use crate::support::error::Error;
use crate::sync::SyncContext;

const DAY: i64 = 86400;

/// Return the messages of `folder` matching `tree`, in UID order.
///
/// The result holds UIDs if `by_uid`, message sequence numbers otherwise.
/// Text in message content that declares no usable charset is decoded with
/// `fallback`.
pub fn evaluate(
    tree: &ConditionTree,
    t: &Tables<'_>,
    cx: &SyncContext<'_>,
    folder: FolderId,
    fallback: &'static Encoding,
    by_uid: bool,
) -> Result<Vec<u32>, Error> {
    let rows = t.folder_messages(folder)?;
    let evaluator = Evaluator {
        cx,
        fallback,
        total: u32::try_from(rows.len()).unwrap_or(u32::MAX),
        max_uid: rows.last().map_or(0, |r| r.uid),
    };

    let mut hits = Vec::new();
    for (ix, row) in rows.iter().enumerate() {
        let seq = u32::try_from(ix + 1).unwrap_or(u32::MAX);
        let mut candidate = Candidate {
            row,
            seq,
            digest: None,
        };

        if evaluator.matches(tree, &mut candidate) {
            hits.push(if by_uid { row.uid } else { seq });
        }
    }

    Ok(hits)
}

struct Evaluator<'a> {
    cx: &'a SyncContext<'a>,
    fallback: &'static Encoding,
    total: u32,
    max_uid: u32,
}

/// One message under evaluation, with its digest loaded on first use.
struct Candidate<'r> {
    row: &'r MessageRow,
    seq: u32,
    digest: Option<Option<Digest>>,
}

struct Frame<'t> {
    nodes: &'t [Node],
    ix: usize,
    acc: bool,
}

fn combine(conjunction: Conjunction, acc: bool, result: bool) -> bool {
    match conjunction {
        Conjunction::And => acc && result,
        Conjunction::Or => acc || result,
        Conjunction::Not => acc && !result,
    }
}

/// Whether the node cannot change `acc` and need not be evaluated.
fn short_circuits(conjunction: Conjunction, acc: bool) -> bool {
    match conjunction {
        Conjunction::Or => acc,
        Conjunction::And | Conjunction::Not => !acc,
    }
}

impl Evaluator<'_> {
    fn matches(&self, tree: &ConditionTree, candidate: &mut Candidate<'_>) -> bool {
        let mut stack: Vec<Frame<'_>> = Vec::new();
        let mut frame = Frame {
            nodes: &tree.nodes,
            ix: 0,
            acc: true,
        };

        loop {
            let nodes = frame.nodes;

            if frame.ix >= nodes.len() {
                let result = frame.acc;
                match stack.pop() {
                    None => return result,
                    Some(parent) => {
                        frame = parent;
                        let conjunction = frame.nodes[frame.ix].conjunction;
                        frame.acc = combine(conjunction, frame.acc, result);
                        frame.ix += 1;
                        continue;
                    }
                }
            }

            let node = &nodes[frame.ix];
            if short_circuits(node.conjunction, frame.acc) {
                frame.ix += 1;
                continue;
            }

            match node.kind {
                NodeKind::Group(ref children) => {
                    let child = Frame {
                        nodes: children,
                        ix: 0,
                        acc: true,
                    };
                    stack.push(std::mem::replace(&mut frame, child));
                }

                NodeKind::Leaf(ref condition) => {
                    let result = self.leaf(condition, candidate);
                    frame.acc = combine(node.conjunction, frame.acc, result);
                    frame.ix += 1;
                }
            }
        }
    }

    fn leaf(&self, condition: &Condition, candidate: &mut Candidate<'_>) -> bool {
        let row = candidate.row;
        let flags = row.flags;
        let received = row.received;

        match *condition {
            Condition::All => true,
            Condition::Answered => flags.contains(MessageFlags::ANSWERED),
            Condition::Deleted => flags.contains(MessageFlags::DELETED),
            Condition::Draft => flags.contains(MessageFlags::UNSENT),
            Condition::Flagged => flags.contains(MessageFlags::FLAGGED),
            Condition::New => {
                flags.contains(MessageFlags::RECENT)
                    && !flags.contains(MessageFlags::SEEN)
            }
            Condition::Old => !flags.contains(MessageFlags::RECENT),
            Condition::Recent => flags.contains(MessageFlags::RECENT),
            Condition::Seen => flags.contains(MessageFlags::SEEN),
            Condition::Unanswered => !flags.contains(MessageFlags::ANSWERED),
            Condition::Undeleted => !flags.contains(MessageFlags::DELETED),
            Condition::Undraft => !flags.contains(MessageFlags::UNSENT),
            Condition::Unflagged => !flags.contains(MessageFlags::FLAGGED),
            Condition::Unseen => !flags.contains(MessageFlags::SEEN),

            // No keywords are ever stored
            Condition::Keyword => false,
            Condition::Unkeyword => true,
            Condition::Bcc(_) => false,

            Condition::Larger(n) => u64::try_from(row.size).unwrap_or(0) > n,
            Condition::Smaller(n) => u64::try_from(row.size).unwrap_or(0) < n,

            Condition::Before(day) => received < day,
            Condition::On(day) => received >= day && received < day + DAY,
            Condition::Since(day) => received >= day,
            Condition::SentBefore(day) => {
                self.sent_date(candidate).map_or(false, |d| d < day)
            }
            Condition::SentOn(day) => self
                .sent_date(candidate)
                .map_or(false, |d| d >= day && d < day + DAY),
            Condition::SentSince(day) => {
                self.sent_date(candidate).map_or(false, |d| d >= day)
            }

            Condition::Uid(ref set) => set.contains(row.uid, self.max_uid),
            Condition::Id(ref set) => set.contains(candidate.seq, self.total),

            Condition::Cc(ref re) => self.field_matches(candidate, re, |d| &d.cc),
            Condition::From(ref re) => {
                self.field_matches(candidate, re, |d| &d.from)
            }
            Condition::Subject(ref re) => {
                self.field_matches(candidate, re, |d| &d.subject)
            }
            Condition::To(ref re) => self.field_matches(candidate, re, |d| &d.to),
            Condition::Body(ref re) => self
                .digest(candidate)
                .map_or(false, |d| self.body_matches(d, re)),
            Condition::Text(ref re) => {
                let fallback = self.fallback;
                self.digest(candidate).map_or(false, |d| {
                    [&d.cc, &d.from, &d.subject, &d.to].iter().any(|field| {
                        header_matches(field, re, fallback)
                    }) || self.body_matches(d, re)
                })
            }
            Condition::Header(ref name, ref re) => {
                let fallback = self.fallback;
                self.digest(candidate).map_or(false, |d| {
                    d.headers
                        .iter()
                        .filter(|&&(ref n, _)| n.eq_ignore_ascii_case(name))
                        .any(|&(_, ref value)| {
                            header_matches(value, re, fallback)
                        })
                })
            }
        }
    }

    fn digest<'c>(&self, candidate: &'c mut Candidate<'_>) -> Option<&'c Digest> {
        if candidate.digest.is_none() {
            let row = candidate.row;
            let loaded = match self.cx.digests.obtain(
                self.cx.log_prefix,
                self.cx.store,
                self.cx.mailbox,
                row.message_id,
                Some(&row.mid_string),
            ) {
                Ok((_, digest)) => Some(digest),
                Err(e) => {
                    warn!(
                        "{} Digest of message {} unavailable to search: {}",
                        self.cx.log_prefix, row.message_id, e
                    );
                    None
                }
            };
            candidate.digest = Some(loaded);
        }

        candidate.digest.as_ref().and_then(Option::as_ref)
    }

    fn field_matches(
        &self,
        candidate: &mut Candidate<'_>,
        re: &Regex,
        field: impl FnOnce(&Digest) -> &String,
    ) -> bool {
        let fallback = self.fallback;
        self.digest(candidate)
            .map_or(false, |d| header_matches(field(d), re, fallback))
    }

    fn body_matches(&self, digest: &Digest, re: &Regex) -> bool {
        digest
            .parts
            .iter()
            .filter(|part| {
                part.content_type
                    .get(..5)
                    .map_or(false, |p| p.eq_ignore_ascii_case("text/"))
            })
            .filter_map(|part| {
                decode::decode_body(
                    &part.encoding,
                    part.charset.as_deref(),
                    &Digest::raw_field(&part.content),
                    self.fallback,
                )
            })
            .any(|text| re.is_match(&text))
    }

    /// The time the message claims to have been sent, or the time it was
    /// received if it makes no usable claim.
    fn sent_date(&self, candidate: &mut Candidate<'_>) -> Option<i64> {
        let received = candidate.row.received;
        self.digest(candidate).map(|d| {
            DateTime::parse_from_rfc2822(d.date.trim())
                .map(|dt| dt.timestamp())
                .unwrap_or(received)
        })
    }
}

fn header_matches(field: &str, re: &Regex, fallback: &'static Encoding) -> bool {
    re.is_match(&decode::decode_header(&Digest::raw_field(field), fallback))
}
