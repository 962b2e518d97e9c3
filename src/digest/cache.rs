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

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use log::warn;

use super::Digest;
use crate::model::MessageId;
use crate::store::StoreClient;
use crate::support::{
    chronox::unix_now, error::Error, file_ops, log_prefix::LogPrefix,
};

/// Digests larger than this are considered corrupt.
const MAX_DIGEST_LEN: u64 = 256 * 1024;

static MID_SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// The on-disk digest files of one mailbox.
#[derive(Debug)]
pub struct DigestStore {
    dir: PathBuf,
    reads: AtomicU64,
}

impl DigestStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            reads: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The number of digest files read so far.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Load the persisted digest for `mid`.
    ///
    /// Returns `None` if there is no digest, it is too large, or the name
    /// could escape the digest directory.
    pub fn load(&self, mid: &str) -> Result<Option<Digest>, Error> {
        if !is_safe_mid_string(mid) {
            return Ok(None);
        }

        self.reads.fetch_add(1, Ordering::Relaxed);
        match file_ops::slurp_opt(&self.dir.join(mid), MAX_DIGEST_LEN)? {
            None => Ok(None),
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
        }
    }

    pub fn save(&self, mid: &str, digest: &Digest) -> Result<(), Error> {
        if !is_safe_mid_string(mid) {
            return Err(Error::DigestUnavailable);
        }

        let data = serde_json::to_vec(digest)?;
        file_ops::spit(&self.dir.join(mid), &data)?;
        Ok(())
    }

    /// Obtain the digest of a message, producing and persisting it through
    /// the store when necessary.
    ///
    /// If `mid` is `None`, a fresh mid string is generated for the message.
    /// Returns the mid string the digest is filed under along with the
    /// digest itself.
    pub fn obtain(
        &self,
        log_prefix: &LogPrefix,
        store: &dyn StoreClient,
        mailbox: &str,
        message: MessageId,
        mid: Option<&str>,
    ) -> Result<(String, Digest), Error> {
        if let Some(mid) = mid {
            match self.load(mid) {
                Ok(Some(digest)) => return Ok((mid.to_owned(), digest)),
                Ok(None) => (),
                Err(e) => warn!(
                    "{} Discarding unreadable digest {}: {}",
                    log_prefix, mid, e
                ),
            }
        }

        let mut digest = store
            .get_message_digest(mailbox, message)
            .map_err(|e| {
                warn!(
                    "{} Store could not produce digest of message {}: {}",
                    log_prefix, message, e
                );
                Error::DigestUnavailable
            })?;

        let mid = match mid {
            Some(mid) => mid.to_owned(),
            None => generate_mid_string(),
        };
        digest.file = mid.clone();
        self.save(&mid, &digest)?;
        Ok((mid, digest))
    }
}

/// Generate a new mid string of the form `<unix-time>.<sequence>.midb`.
pub fn generate_mid_string() -> String {
    let seq = MID_SEQUENCE.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
    format!("{}.{}.midb", unix_now(), seq)
}

/// Determine whether `mid` may be used as a file name in the digest
/// directory.
///
/// This excludes empty names and anything that could traverse directories
/// or produce hidden files.
fn is_safe_mid_string(mid: &str) -> bool {
    !mid.is_empty()
        && !mid.starts_with('.')
        && !mid.contains(|c| '/' == c || '\\' == c)
        && !mid.contains(|c| c < ' ' || c == '\x7F')
}

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;
    use crate::store::memory::MemoryStore;

    #[test]
    fn mid_string_safety() {
        assert!(is_safe_mid_string("1700000000.3.midb"));
        assert!(is_safe_mid_string("abc"));
        assert!(!is_safe_mid_string(""));
        assert!(!is_safe_mid_string(".."));
        assert!(!is_safe_mid_string(".hidden"));
        assert!(!is_safe_mid_string("a/b"));
        assert!(!is_safe_mid_string("a\\b"));
        assert!(!is_safe_mid_string("a\nb"));
    }

    #[test]
    fn generated_mid_strings_are_distinct() {
        let a = generate_mid_string();
        let b = generate_mid_string();
        assert_ne!(a, b);
        assert!(a.ends_with(".midb"));
        assert!(is_safe_mid_string(&a));
    }

    #[test]
    fn obtain_persists_and_reuses() {
        let tmpdir = TempDir::new().unwrap();
        let digests = DigestStore::new(tmpdir.path().join("ext"));
        let store = MemoryStore::new();
        let prefix = LogPrefix::new("m");
        let message = store.add_message(
            "m",
            crate::model::FolderId::INBOX,
            None,
            Digest::from_headers(&[("Subject", "hello")], 10),
        );

        let (mid, digest) =
            digests.obtain(&prefix, &store, "m", message, None).unwrap();
        assert!(mid.ends_with(".midb"));
        assert_eq!(mid, digest.file);

        // Once persisted, the store is not consulted again
        store.remove_message("m", message);
        let (mid2, digest2) = digests
            .obtain(&prefix, &store, "m", message, Some(&mid))
            .unwrap();
        assert_eq!(mid, mid2);
        assert_eq!(digest, digest2);

        assert_matches!(
            Err(Error::DigestUnavailable),
            digests.obtain(&prefix, &store, "m", message, Some("other")),
        );
    }
}
