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


//! A per-mailbox index cache in front of an authoritative mail store.
//!
//! Each mailbox gets a SQLite database mirroring its mail folders and
//! messages, kept current by a full sync on load and by the store's push
//! notifications afterwards. Listings, flag queries and IMAP-style searches
//! are answered from that database. `ops::MailIndex` is the entry point.

#[cfg(test)]
macro_rules! assert_matches {
    ($expected:pat, $actual:expr $(,)?) => {
        match $actual {
            $expected => (),
            unexpected => panic!(
                "Expected {} matches {}, got {:?}",
                stringify!($expected),
                stringify!($actual),
                unexpected
            ),
        }
    };
}

pub mod cache;
pub mod digest;
pub mod model;
pub mod ops;
pub mod search;
pub mod storage;
pub mod store;
pub mod support;
pub mod sync;

pub use crate::ops::MailIndex;
pub use crate::support::config::CacheConfig;
pub use crate::support::error::Error;

#[cfg(test)]
pub(crate) fn init_test_log() {
    use std::sync::Once;

    use log::LevelFilter;
    use log4rs::append::console::{ConsoleAppender, Target};
    use log4rs::config::{Appender, Config, Root};

    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let stderr = ConsoleAppender::builder().target(Target::Stderr).build();
        let config = Config::builder()
            .appender(Appender::builder().build("stderr", Box::new(stderr)))
            .build(Root::builder().appender("stderr").build(LevelFilter::Debug));
        if let Ok(config) = config {
            let _ = log4rs::init_config(config);
        }
    });
}
