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


use std::str::FromStr;

use crate::support::error::Error;

/// One element of a sequence set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeqRange {
    /// An inclusive range, low end first.
    Range(u32, u32),
    /// `n:*`, everything from `n` upwards.
    From(u32),
    /// `*:*`, only the largest value.
    Last,
}

/// A parsed IMAP-style sequence set, such as `1:4,7,10:*`.
///
/// Whether the numbers are UIDs or message sequence numbers is up to the
/// caller; `*` stands for whatever maximum the caller supplies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceSet(pub Vec<SeqRange>);

impl SequenceSet {
    pub fn contains(&self, num: u32, max: u32) -> bool {
        self.0.iter().any(|&range| match range {
            SeqRange::Range(lo, hi) => num >= lo && num <= hi,
            SeqRange::From(lo) => num >= lo,
            SeqRange::Last => num == max,
        })
    }
}

fn parse_num(s: &str) -> Result<Option<u32>, Error> {
    if "*" == s {
        return Ok(None);
    }

    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::MalformedQuery);
    }

    match s.parse::<u32>() {
        Ok(0) | Err(_) => Err(Error::MalformedQuery),
        Ok(n) => Ok(Some(n)),
    }
}

impl FromStr for SequenceSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        if s.is_empty() {
            return Err(Error::MalformedQuery);
        }

        // A single trailing comma is tolerated
        let s = s.strip_suffix(',').unwrap_or(s);
        let mut ranges = Vec::new();

        for element in s.split(',') {
            let mut parts = element.split(':');
            let first = parts.next().unwrap_or("");
            let second = parts.next();
            if parts.next().is_some() {
                return Err(Error::MalformedQuery);
            }

            let range = match (parse_num(first)?, second.map(parse_num)) {
                (Some(n), None) => SeqRange::Range(n, n),
                // A bare `*` does not name anything
                (None, None) => return Err(Error::MalformedQuery),
                (Some(a), Some(Ok(Some(b)))) => {
                    SeqRange::Range(a.min(b), a.max(b))
                }
                (Some(n), Some(Ok(None))) | (None, Some(Ok(Some(n)))) => {
                    SeqRange::From(n)
                }
                (None, Some(Ok(None))) => SeqRange::Last,
                (_, Some(Err(e))) => return Err(e),
            };
            ranges.push(range);
        }

        Ok(SequenceSet(ranges))
    }
}
