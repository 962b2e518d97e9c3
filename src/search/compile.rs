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


//! Compilation of tokenised queries into condition trees.

use std::mem;
use std::str;

use chrono::NaiveDate;
use encoding_rs::{Encoding, UTF_8};
use regex::{Regex, RegexBuilder};

use super::lexer::Token;
use super::sequence::SequenceSet;
use crate::digest::decode::charset_for_label;
use crate::support::{chronox::utc_day_start, error::Error};

/// How a node's result folds into the result accumulated over the
/// siblings before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
    /// `acc && !result`
    Not,
}

#[derive(Clone, Debug)]
pub enum Condition {
    All,
    Answered,
    Deleted,
    Draft,
    Flagged,
    New,
    Old,
    Recent,
    Seen,
    Unanswered,
    Undeleted,
    Undraft,
    Unflagged,
    Unseen,
    Keyword,
    Unkeyword,
    Bcc(Regex),
    Body(Regex),
    Cc(Regex),
    From(Regex),
    Subject(Regex),
    Text(Regex),
    To(Regex),
    Header(String, Regex),
    Larger(u64),
    Smaller(u64),
    // Dates are the UNIX time of the start of the UTC day
    Before(i64),
    On(i64),
    Since(i64),
    SentBefore(i64),
    SentOn(i64),
    SentSince(i64),
    Uid(SequenceSet),
    Id(SequenceSet),
}

#[derive(Debug)]
pub enum NodeKind {
    Leaf(Condition),
    Group(Vec<Node>),
}

#[derive(Debug)]
pub struct Node {
    pub conjunction: Conjunction,
    pub kind: NodeKind,
}

impl Node {
    fn leaf(condition: Condition) -> Self {
        Node {
            conjunction: Conjunction::And,
            kind: NodeKind::Leaf(condition),
        }
    }

    fn group(nodes: Vec<Node>) -> Self {
        Node {
            conjunction: Conjunction::And,
            kind: NodeKind::Group(nodes),
        }
    }

    /// Return `self` in a form whose conjunction may be overwritten without
    /// changing its meaning.
    fn isolated(self) -> Self {
        if Conjunction::And == self.conjunction {
            self
        } else {
            Node::group(vec![self])
        }
    }
}

// Trees can be nested arbitrarily deep, so descendants are flattened onto a
// worklist instead of being dropped recursively.
impl Drop for Node {
    fn drop(&mut self) {
        let mut work = match self.kind {
            NodeKind::Group(ref mut children) => mem::take(children),
            NodeKind::Leaf(_) => return,
        };

        while let Some(mut node) = work.pop() {
            if let NodeKind::Group(ref mut children) = node.kind {
                work.append(children);
            }
        }
    }
}

/// A compiled query: a non-empty list of sibling nodes, implicitly ANDed
/// unless marked otherwise.
#[derive(Debug)]
pub struct ConditionTree {
    pub nodes: Vec<Node>,
}

pub fn compile(tokens: &[Token]) -> Result<ConditionTree, Error> {
    let mut compiler = Compiler {
        tokens,
        pos: 0,
        charset: UTF_8,
    };

    if tokens.first().map_or(false, |t| t.is_keyword("CHARSET")) {
        compiler.pos = 1;
        let label = compiler.word()?;
        compiler.charset = str::from_utf8(label)
            .ok()
            .and_then(charset_for_label)
            .ok_or(Error::MalformedQuery)?;
    }

    let nodes = compiler.tree()?;
    Ok(ConditionTree { nodes })
}

struct Compiler<'a> {
    tokens: &'a [Token],
    pos: usize,
    charset: &'static Encoding,
}

impl<'a> Compiler<'a> {
    fn next(&mut self) -> Result<&'a Token, Error> {
        let token = self.tokens.get(self.pos).ok_or(Error::MalformedQuery)?;
        self.pos += 1;
        Ok(token)
    }

    fn word(&mut self) -> Result<&'a [u8], Error> {
        match *self.next()? {
            Token::Word(ref w) => Ok(&w[..]),
            _ => Err(Error::MalformedQuery),
        }
    }

    fn string(&mut self) -> Result<String, Error> {
        let raw = self.word()?;
        Ok(self.charset.decode_without_bom_handling(raw).0.into_owned())
    }

    fn pattern(&mut self) -> Result<Regex, Error> {
        let s = self.string()?;
        to_regex(&s)
    }

    fn number(&mut self) -> Result<u64, Error> {
        self.string()?.parse().map_err(|_| Error::MalformedQuery)
    }

    fn date(&mut self) -> Result<i64, Error> {
        let s = self.string()?;
        NaiveDate::parse_from_str(&s, "%d-%b-%Y")
            .map(utc_day_start)
            .map_err(|_| Error::MalformedQuery)
    }

    fn sequence_set(&mut self) -> Result<SequenceSet, Error> {
        self.string()?.parse()
    }

    /// Compile the whole token stream.
    ///
    /// Groups, `NOT` and `OR` are tracked on an explicit stack, so the
    /// nesting depth of the query is bounded only by its length.
    fn tree(&mut self) -> Result<Vec<Node>, Error> {
        let mut stack = vec![Pending::List {
            nodes: Vec::new(),
            parenthesised: false,
        }];

        loop {
            if let Some(&Pending::List { parenthesised, .. }) = stack.last() {
                match self.tokens.get(self.pos) {
                    None if parenthesised => return Err(Error::MalformedQuery),
                    None => return close_list(stack.pop()),
                    Some(&Token::Close) if parenthesised => {
                        self.pos += 1;
                        let nodes = close_list(stack.pop())?;
                        finish(&mut stack, Node::group(nodes))?;
                        continue;
                    }
                    Some(&Token::Close) => return Err(Error::MalformedQuery),
                    Some(_) => (),
                }
            }

            match self.term()? {
                Term::Open => stack.push(Pending::List {
                    nodes: Vec::new(),
                    parenthesised: true,
                }),
                Term::Not => stack.push(Pending::Not),
                Term::Or => stack.push(Pending::OrFirst),
                Term::Leaf(condition) => {
                    finish(&mut stack, Node::leaf(condition))?
                }
            }
        }
    }

    /// Consume the start of the next term.
    fn term(&mut self) -> Result<Term, Error> {
        let keyword = match *self.next()? {
            Token::Open => return Ok(Term::Open),
            Token::Close => return Err(Error::MalformedQuery),
            Token::Word(ref w) => w,
        };

        let upper = str::from_utf8(keyword)
            .map(str::to_ascii_uppercase)
            .unwrap_or_default();

        let condition = match &upper[..] {
            "NOT" => return Ok(Term::Not),
            "OR" => return Ok(Term::Or),

            "ALL" => Condition::All,
            "ANSWERED" => Condition::Answered,
            "DELETED" => Condition::Deleted,
            "DRAFT" => Condition::Draft,
            "FLAGGED" => Condition::Flagged,
            "NEW" => Condition::New,
            "OLD" => Condition::Old,
            "RECENT" => Condition::Recent,
            "SEEN" => Condition::Seen,
            "UNANSWERED" => Condition::Unanswered,
            "UNDELETED" => Condition::Undeleted,
            "UNDRAFT" => Condition::Undraft,
            "UNFLAGGED" => Condition::Unflagged,
            "UNSEEN" => Condition::Unseen,

            "KEYWORD" => {
                self.word()?;
                Condition::Keyword
            }
            "UNKEYWORD" => {
                self.word()?;
                Condition::Unkeyword
            }
            "BCC" => Condition::Bcc(self.pattern()?),
            "BODY" => Condition::Body(self.pattern()?),
            "CC" => Condition::Cc(self.pattern()?),
            "FROM" => Condition::From(self.pattern()?),
            "SUBJECT" => Condition::Subject(self.pattern()?),
            "TEXT" => Condition::Text(self.pattern()?),
            "TO" => Condition::To(self.pattern()?),
            "HEADER" => {
                let name = self.string()?;
                Condition::Header(name, self.pattern()?)
            }

            "LARGER" => Condition::Larger(self.number()?),
            "SMALLER" => Condition::Smaller(self.number()?),

            "BEFORE" => Condition::Before(self.date()?),
            "ON" => Condition::On(self.date()?),
            "SINCE" => Condition::Since(self.date()?),
            "SENTBEFORE" => Condition::SentBefore(self.date()?),
            "SENTON" => Condition::SentOn(self.date()?),
            "SENTSINCE" => Condition::SentSince(self.date()?),

            "UID" => Condition::Uid(self.sequence_set()?),
            _ => {
                self.pos -= 1;
                Condition::Id(self.sequence_set()?)
            }
        };

        Ok(Term::Leaf(condition))
    }
}

enum Term {
    Open,
    Not,
    Or,
    Leaf(Condition),
}

/// A construct still waiting for some of its operands.
enum Pending {
    List {
        nodes: Vec<Node>,
        parenthesised: bool,
    },
    Not,
    OrFirst,
    OrSecond(Node),
}

fn close_list(pending: Option<Pending>) -> Result<Vec<Node>, Error> {
    match pending {
        Some(Pending::List { nodes, .. }) if !nodes.is_empty() => Ok(nodes),
        _ => Err(Error::MalformedQuery),
    }
}

/// Hand a completed `node` to the innermost pending construct, completing
/// any operators it satisfies along the way.
fn finish(stack: &mut Vec<Pending>, mut node: Node) -> Result<(), Error> {
    loop {
        match stack.pop() {
            Some(Pending::List {
                mut nodes,
                parenthesised,
            }) => {
                nodes.push(node);
                stack.push(Pending::List {
                    nodes,
                    parenthesised,
                });
                return Ok(());
            }
            Some(Pending::Not) => {
                node = node.isolated();
                node.conjunction = Conjunction::Not;
            }
            Some(Pending::OrFirst) => {
                stack.push(Pending::OrSecond(node));
                return Ok(());
            }
            Some(Pending::OrSecond(a)) => {
                let mut b = node.isolated();
                b.conjunction = Conjunction::Or;
                node = Node::group(vec![a, b]);
            }
            None => return Err(Error::MalformedQuery),
        }
    }
}

/// Build the regex used for substring matching.
///
/// Each run of whitespace in `pat` matches any run of whitespace in the
/// haystack; everything else matches literally, ignoring case.
pub fn to_regex(pat: &str) -> Result<Regex, Error> {
    let mut regex_str = String::new();
    for (ix, chunk) in pat.split_whitespace().enumerate() {
        if 0 != ix {
            regex_str.push_str("[ \r\n\t]+");
        }
        regex_str.push_str(&regex::escape(chunk));
    }

    RegexBuilder::new(&regex_str)
        .case_insensitive(true)
        .build()
        .map_err(|_| Error::MalformedQuery)
}
