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


//! Splitting of raw query text into tokens.
//!
//! The syntax is that of IMAP search arguments: atoms separated by
//! whitespace, double-quoted strings with backslash escapes, and
//! parentheses. NUL counts as whitespace so that pre-split argument vectors
//! can be passed through unchanged.

use crate::support::error::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// An atom or quoted string, still in the query's charset.
    Word(Vec<u8>),
    Open,
    Close,
}

impl Token {
    /// Whether this is an atom equal to `keyword`, ignoring ASCII case.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        match *self {
            Token::Word(ref w) => w.eq_ignore_ascii_case(keyword.as_bytes()),
            _ => false,
        }
    }
}

fn is_space(b: u8) -> bool {
    b.is_ascii_whitespace() || 0 == b
}

pub fn tokenize(query: &[u8]) -> Result<Vec<Token>, Error> {
    let mut tokens = Vec::new();
    let mut ix = 0;

    while ix < query.len() {
        match query[ix] {
            b if is_space(b) => ix += 1,

            b'(' => {
                tokens.push(Token::Open);
                ix += 1;
            }

            b')' => {
                tokens.push(Token::Close);
                ix += 1;
            }

            b'"' => {
                ix += 1;
                let mut word = Vec::new();
                loop {
                    match query.get(ix) {
                        None => return Err(Error::MalformedQuery),
                        Some(b'"') => {
                            ix += 1;
                            break;
                        }
                        Some(b'\\') => {
                            word.push(
                                *query
                                    .get(ix + 1)
                                    .ok_or(Error::MalformedQuery)?,
                            );
                            ix += 2;
                        }
                        Some(&b) => {
                            word.push(b);
                            ix += 1;
                        }
                    }
                }
                tokens.push(Token::Word(word));
            }

            _ => {
                let start = ix;
                while ix < query.len()
                    && !is_space(query[ix])
                    && !matches!(query[ix], b'(' | b')' | b'"')
                {
                    ix += 1;
                }
                tokens.push(Token::Word(query[start..ix].to_vec()));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn word(s: &str) -> Token {
        Token::Word(s.as_bytes().to_vec())
    }

    #[test]
    fn splits_atoms_strings_and_parens() {
        assert_eq!(
            vec![
                word("OR"),
                Token::Open,
                word("SUBJECT"),
                word("monthly invoice"),
                Token::Close,
                word("1:*"),
                word("say \"hi\""),
                word(""),
            ],
            tokenize(
                b"OR (SUBJECT \"monthly invoice\")\t1:*\0\"say \\\"hi\\\"\" \"\""
            )
            .unwrap()
        );
    }

    #[test]
    fn unterminated_strings_are_rejected() {
        assert_matches!(Err(Error::MalformedQuery), tokenize(b"SUBJECT \"abc"));
        assert_matches!(Err(Error::MalformedQuery), tokenize(b"\"abc\\"));
    }

    #[test]
    fn keywords_ignore_case() {
        assert!(word("subject").is_keyword("SUBJECT"));
        assert!(!word("subjects").is_keyword("SUBJECT"));
        assert!(!Token::Open.is_keyword("("));
    }

    proptest! {
        #[test]
        fn tokenize_never_panics(s in prop::collection::vec(prop::num::u8::ANY, 0..40)) {
            let _ = tokenize(&s);
        }
    }
}
