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


//! Background unloading of idle cache entries.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use log::{info, warn};

use super::registry::{Registry, Slot};
use crate::support::error::Error;

impl Registry {
    /// Evict every unreferenced entry that has no subscription, has been
    /// idle longer than the idle interval, or was loaded longer ago than the
    /// maximum age. With `unconditional`, evict everything.
    ///
    /// Returns the number of entries evicted.
    pub fn sweep(&self, unconditional: bool) -> usize {
        let now = Instant::now();
        let idle_limit =
            Duration::from_secs(self.config.eviction.cache_interval_secs);
        let age_limit =
            Duration::from_secs(self.config.eviction.reload_interval_secs);

        let evicted: Vec<(String, Slot)> = {
            let mut slots = self.lock_slots();
            let keys = slots
                .iter()
                .filter(|&(_, slot)| {
                    unconditional
                        || (0 == slot.reference
                            && !slot.loading
                            && (slot.subscription.is_none()
                                || now.duration_since(slot.last_release)
                                    > idle_limit
                                || now.duration_since(slot.load_time)
                                    > age_limit))
                })
                .map(|(key, _)| key.clone())
                .collect::<Vec<_>>();

            keys.into_iter()
                .filter_map(|key| slots.remove_entry(&key))
                .collect()
        };

        let count = evicted.len();
        for (key, slot) in evicted {
            if let Some(subscription) = slot.subscription {
                if let Err(e) = self.store.unsubscribe(&key, subscription) {
                    warn!("midb[{}] Failed to unsubscribe: {}", key, e);
                }
            }

            // If the entry is still held (only possible when unconditional),
            // the holder drops it on release.
            drop(slot.cell.kill());
            info!("midb[{}] Evicted cache entry", key);
        }

        count
    }
}

/// Handle on the eviction thread.
///
/// Dropping the handle also stops the thread, but without waiting for it.
pub struct Scanner {
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Scanner {
    pub fn spawn(registry: Arc<Registry>) -> Result<Self, Error> {
        let (shutdown_tx, shutdown_rx) = channel::bounded(1);
        let thread = thread::Builder::new()
            .name("midb-scan".to_owned())
            .spawn(move || run(&registry, &shutdown_rx))?;

        Ok(Self {
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Stop the thread after it evicts every remaining entry.
    pub fn stop(mut self) {
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Eviction scanner panicked");
            }
        }
    }
}

fn run(registry: &Registry, shutdown: &Receiver<()>) {
    let ticker = channel::tick(registry.config().eviction.poll_interval());
    let sweep_interval = registry.config().eviction.sweep_interval();
    let mut last_sweep = Instant::now();

    loop {
        crossbeam::select! {
            recv(ticker) -> _ => {
                if last_sweep.elapsed() >= sweep_interval {
                    registry.sweep(false);
                    last_sweep = Instant::now();
                }
            },
            recv(shutdown) -> _ => break,
        }
    }

    let n = registry.sweep(true);
    info!("Eviction scanner stopped, {} entries unloaded", n);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cache::registry::test::Fixture;

    #[test]
    fn unsubscribed_entries_are_evicted_when_released() {
        let fixture = Fixture::new();
        let key = fixture.mailbox("alice");
        fixture.store.refuse_subscriptions(true);

        let guard = fixture.registry.acquire(&key).unwrap();
        assert!(guard.subscription().is_none());
        assert_eq!(0, fixture.registry.sweep(false));
        drop(guard);

        assert_eq!(1, fixture.registry.sweep(false));
        assert!(fixture.registry.is_empty());
    }

    #[test]
    fn fresh_subscribed_entries_are_kept() {
        let fixture = Fixture::new();
        let key = fixture.mailbox("alice");

        drop(fixture.registry.acquire(&key).unwrap());
        assert_eq!(0, fixture.registry.sweep(false));
        assert_eq!(1, fixture.store.active_subscriptions(&key));
    }

    #[test]
    fn expired_entries_are_evicted_and_unsubscribed() {
        let fixture = Fixture::with_config(|config| {
            config.eviction.reload_interval_secs = 0;
        });
        let key = fixture.mailbox("alice");

        drop(fixture.registry.acquire(&key).unwrap());
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(1, fixture.registry.sweep(false));
        assert_eq!(0, fixture.store.active_subscriptions(&key));
        assert_eq!(1, fixture.store.unsubscribe_count());

        // Reacquiring loads afresh
        let guard = fixture.registry.acquire(&key).unwrap();
        assert!(guard.subscription().is_some());
    }

    #[test]
    fn shutdown_evicts_everything() {
        let fixture = Fixture::new();
        let alice = fixture.mailbox("alice");
        let bob = fixture.mailbox("bob");
        drop(fixture.registry.acquire(&alice).unwrap());
        let held = fixture.registry.acquire(&bob).unwrap();

        let scanner = Scanner::spawn(Arc::clone(&fixture.registry)).unwrap();
        scanner.stop();

        assert!(fixture.registry.is_empty());
        assert_eq!(0, fixture.store.active_subscriptions(&alice));
        assert_eq!(0, fixture.store.active_subscriptions(&bob));
        // Releasing an entry evicted out from under its holder is harmless
        drop(held);
        assert!(fixture.registry.is_empty());
    }
}
