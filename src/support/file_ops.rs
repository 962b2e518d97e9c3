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

//! Miscellaneous functions for working with files.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Write `data` into the file at `path`, atomically.
///
/// The file is first staged in the same directory as `path`, so readers
/// either see the old content, no file, or the complete new content.
/// Anything already at `path` is replaced.
pub fn spit(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let mut tf = tempfile::NamedTempFile::new_in(dir)?;
    tf.as_file_mut().write_all(data)?;
    tf.as_file_mut().sync_all()?;
    tf.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read the whole file at `path`, returning `None` if it does not exist.
///
/// Files larger than `limit` bytes are treated as absent.
pub fn slurp_opt(path: &Path, limit: u64) -> io::Result<Option<Vec<u8>>> {
    match fs::metadata(path) {
        Ok(md) if !md.is_file() || md.len() >= limit => return Ok(None),
        Ok(_) => (),
        Err(e) if io::ErrorKind::NotFound == e.kind() => return Ok(None),
        Err(e) => return Err(e),
    }

    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if io::ErrorKind::NotFound == e.kind() => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn spit_then_slurp() {
        let tmpdir = TempDir::new().unwrap();
        let path = tmpdir.path().join("ext").join("1.2.midb");

        assert_eq!(None, slurp_opt(&path, 1024).unwrap());
        spit(&path, b"first").unwrap();
        spit(&path, b"second").unwrap();
        assert_eq!(Some(b"second".to_vec()), slurp_opt(&path, 1024).unwrap());
        assert_eq!(None, slurp_opt(&path, 4).unwrap());
    }
}
