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

//! Decoding of the raw header and body text carried in digests.

use std::borrow::Cow;
use std::str;

use encoding_rs::*;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ENCODED_WORD: Regex =
        Regex::new(r"^=\?([!->@-~]*)\?([!->@-~]*)\?([!->@-~]*)\?=$").unwrap();
    static ref ADDRESS: Regex =
        Regex::new(r"[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9.-]+")
            .unwrap();
}

/// Look up an encoding by its MIME label.
///
/// Labels that would resolve to the "replacement" encoding are treated as
/// unknown.
pub fn charset_for_label(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label_no_replacement(label.trim().as_bytes())
}

/// Interpret `raw` as text, assuming UTF-8 and falling back to `fallback`
/// if it is not valid UTF-8.
pub fn decode_text<'a>(
    raw: &'a [u8],
    fallback: &'static Encoding,
) -> Cow<'a, str> {
    match str::from_utf8(raw) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => fallback.decode_without_bom_handling(raw).0,
    }
}

/// Decode an unstructured header value.
///
/// RFC 2047 encoded words are decoded wherever they appear as whole
/// whitespace-delimited words, and the whitespace between two adjacent
/// encoded words is dropped. Folded line breaks collapse to a single space.
/// Raw 8-bit text that is not UTF-8 is interpreted with `fallback`.
pub fn decode_header(raw: &[u8], fallback: &'static Encoding) -> String {
    let text = decode_text(raw, fallback);
    let mut out = String::with_capacity(text.len());
    let mut rest: &str = &text;
    let mut after_encoded_word = false;

    while !rest.is_empty() {
        let ws_len = rest
            .find(|c: char| !c.is_whitespace())
            .unwrap_or_else(|| rest.len());
        let (ws, after) = rest.split_at(ws_len);
        let word_len = after.find(char::is_whitespace).unwrap_or(after.len());
        let (word, tail) = after.split_at(word_len);
        rest = tail;

        let ws = if ws.contains('\n') { " " } else { ws };

        if word.is_empty() {
            out.push_str(ws);
            break;
        }

        match ew_decode(word) {
            Some(decoded) => {
                if !after_encoded_word {
                    out.push_str(ws);
                }
                out.push_str(&decoded);
                after_encoded_word = true;
            }
            None => {
                out.push_str(ws);
                out.push_str(word);
                after_encoded_word = false;
            }
        }
    }

    out
}

/// Decode a body part from its transfer encoding and charset.
///
/// Returns `None` if the base64 content is corrupt. Unknown charsets fall
/// back to `fallback`.
pub fn decode_body(
    transfer_encoding: &str,
    charset: Option<&str>,
    raw: &[u8],
    fallback: &'static Encoding,
) -> Option<String> {
    let bytes: Cow<[u8]> = if transfer_encoding.eq_ignore_ascii_case("base64")
    {
        let compact = raw
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect::<Vec<u8>>();
        Cow::Owned(base64::decode(&compact).ok()?)
    } else if transfer_encoding.eq_ignore_ascii_case("quoted-printable") {
        qp_decode(raw)
    } else {
        Cow::Borrowed(raw)
    };

    let encoding = charset.and_then(charset_for_label).unwrap_or(fallback);
    Some(encoding.decode_with_bom_removal(&bytes).0.into_owned())
}

/// Return the first `local@domain` address in `text`, if any.
pub fn first_address(text: &str) -> Option<&str> {
    ADDRESS.find(text).map(|m| m.as_str())
}

/// Test if `word` (in its entirety) is an RFC 2047 "encoded word".
///
/// If it is, decode it and return its decoded value. Returns `None` if it is
/// not an encoded word or if it could not be decoded; the distinction
/// matters to `decode_header`, which must drop whitespace only between
/// encoded words.
fn ew_decode(word: &str) -> Option<Cow<str>> {
    let captures = ENCODED_WORD.captures(word)?;

    let charset = captures.get(1)?.as_str();
    let transfer_encoding = captures.get(2)?.as_str();
    let mut content = captures.get(3)?.as_str().as_bytes().to_vec();

    // _ stands for ASCII space regardless of charset
    for b in &mut content {
        if b'_' == *b {
            *b = b' ';
        }
    }

    let content = match transfer_encoding {
        "q" | "Q" => qp_decode(&content).into_owned(),
        "b" | "B" => base64::decode(&content).ok()?,
        _ => return None,
    };

    let encoding = charset_for_label(charset)?;
    Some(Cow::Owned(
        encoding.decode_with_bom_removal(&content).0.into_owned(),
    ))
}

/// Decode quoted-printable text, as described by RFC 2045.
///
/// Soft line breaks (with either line ending) are discarded. Invalid escape
/// sequences, including a dangling `=` at the end of input, pass through
/// untransformed.
pub fn qp_decode(s: &[u8]) -> Cow<[u8]> {
    if !s.contains(&b'=') {
        return Cow::Borrowed(s);
    }

    let mut out = Vec::with_capacity(s.len());
    let mut ix = 0;
    while ix < s.len() {
        if b'=' != s[ix] {
            out.push(s[ix]);
            ix += 1;
            continue;
        }

        let rest = &s[ix + 1..];
        if rest.starts_with(b"\r\n") {
            ix += 3;
        } else if rest.starts_with(b"\n") {
            ix += 2;
        } else if let Some(byte) = rest
            .get(..2)
            .filter(|hex| hex.iter().all(u8::is_ascii_hexdigit))
            .and_then(|hex| str::from_utf8(hex).ok())
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        {
            out.push(byte);
            ix += 3;
        } else {
            out.push(b'=');
            ix += 1;
        }
    }

    Cow::Owned(out)
}
