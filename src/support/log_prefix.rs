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

use std::fmt;
use std::sync::{Arc, Mutex};

/// Tracks text that should be included in at the start of every log
/// statement concerning one mailbox.
///
/// Clones of a `LogPrefix` share the same underlying data, so the user name
/// learnt during the first load shows up in lines logged by holders of
/// earlier clones.
#[derive(Clone)]
pub struct LogPrefix {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    mailbox: String,
    user: Option<String>,
}

impl LogPrefix {
    pub fn new(mailbox: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                mailbox: sanitise(mailbox.to_owned()),
                user: None,
            })),
        }
    }

    pub fn set_user(&self, user: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.user = Some(sanitise(user.to_owned()));
        }
    }
}

impl fmt::Display for LogPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(_) => return write!(f, "midb[?]"),
        };

        write!(f, "midb[{}", inner.mailbox)?;
        if let Some(ref user) = inner.user {
            write!(f, " user={user}")?;
        }
        write!(f, "]")
    }
}

fn sanitise(mut s: String) -> String {
    s.retain(|c| !c.is_control());
    if let Some((truncate_len, _)) = s.char_indices().nth(128) {
        s.truncate(truncate_len);
    }

    s
}
