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


//! The per-entry lock.
//!
//! Rather than a `Mutex<CacheEntry>`, whose guard would borrow from the
//! registry's map, the entry is moved out of its cell for as long as a
//! caller holds it and moved back on release. Waiters block on a condition
//! variable with a deadline, which gives the bounded lock wait `std`'s
//! `Mutex` cannot.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::entry::CacheEntry;

enum State {
    /// Not held by anyone.
    Idle(Box<CacheEntry>),
    /// Moved out to a holder, or still loading.
    Busy,
    /// The entry failed to load or has been evicted. Never leaves this
    /// state.
    Dead,
}

/// Why `EntryCell::take` came back empty-handed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TakeError {
    TimedOut,
    Dead,
}

pub struct EntryCell {
    state: Mutex<State>,
    cond: Condvar,
}

impl EntryCell {
    /// Create a cell whose entry is being loaded by its creator.
    pub fn loading() -> Self {
        Self {
            state: Mutex::new(State::Busy),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Take the entry out of the cell, waiting at most `timeout` for a
    /// current holder to put it back.
    pub fn take(&self, timeout: Duration) -> Result<Box<CacheEntry>, TakeError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            match std::mem::replace(&mut *state, State::Busy) {
                State::Idle(entry) => return Ok(entry),
                State::Dead => {
                    *state = State::Dead;
                    return Err(TakeError::Dead);
                }
                State::Busy => (),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(TakeError::TimedOut);
            }

            state = match self.cond.wait_timeout(state, deadline - now) {
                Ok((state, _)) => state,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Return a taken entry to the cell and wake one waiter.
    ///
    /// If the cell died in the meantime, the entry is dropped.
    pub fn put(&self, entry: Box<CacheEntry>) {
        let mut state = self.lock();
        if let State::Busy = *state {
            *state = State::Idle(entry);
            self.cond.notify_one();
        }
    }

    /// Kill the cell, waking every waiter and returning the entry if nobody
    /// held it.
    pub fn kill(&self) -> Option<Box<CacheEntry>> {
        let mut state = self.lock();
        let old = std::mem::replace(&mut *state, State::Dead);
        self.cond.notify_all();
        match old {
            State::Idle(entry) => Some(entry),
            State::Busy | State::Dead => None,
        }
    }
}
