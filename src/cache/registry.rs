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


use std::collections::hash_map::{Entry, HashMap};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use log::{error, info, warn};

use super::cell::{EntryCell, TakeError};
use super::entry::CacheEntry;
use crate::model::SubscriptionId;
use crate::storage::cachedb::CacheDb;
use crate::store::{EventKinds, StoreClient};
use crate::support::{config::CacheConfig, error::Error};
use crate::sync::{self, SyncContext};

/// The set of loaded cache entries, keyed by mailbox directory.
///
/// The map lock only ever guards lookups and reference count changes. Each
/// entry has its own lock (its `EntryCell`), which is what callers actually
/// wait on.
pub struct Registry {
    pub(super) config: CacheConfig,
    pub(super) store: Arc<dyn StoreClient>,
    pub(super) slots: Mutex<HashMap<String, Slot>>,
}

pub(super) struct Slot {
    pub(super) cell: Arc<EntryCell>,
    /// Callers holding or waiting for the entry.
    pub(super) reference: usize,
    /// Set until the initial full sync completes.
    pub(super) loading: bool,
    pub(super) last_release: Instant,
    pub(super) load_time: Instant,
    pub(super) subscription: Option<SubscriptionId>,
}

impl Registry {
    pub fn new(config: CacheConfig, store: Arc<dyn StoreClient>) -> Self {
        Self {
            config,
            store,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn StoreClient> {
        &self.store
    }

    pub(super) fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The number of entries currently registered, including ones still
    /// loading.
    pub fn len(&self) -> usize {
        self.lock_slots().len()
    }

    pub fn is_empty(&self) -> bool {
        0 == self.len()
    }

    /// Obtain exclusive access to the entry for `key`, loading it if it is
    /// not yet registered.
    ///
    /// Fails with `CapacityExceeded` if a new entry would be needed but the
    /// registry is full, and with `LoadFailed` if the entry cannot be loaded,
    /// too many callers are already queued on it, or it could not be locked
    /// within the configured timeout.
    pub fn acquire(&self, key: &str) -> Result<EntryGuard<'_>, Error> {
        let (cell, subscription, fresh) = {
            let mut slots = self.lock_slots();
            let full = slots.len() >= self.config.registry.table_size;
            match slots.entry(key.to_owned()) {
                Entry::Occupied(mut occupied) => {
                    let slot = occupied.get_mut();
                    if slot.reference > self.config.registry.max_waiters {
                        return Err(Error::LoadFailed);
                    }
                    slot.reference += 1;
                    (Arc::clone(&slot.cell), slot.subscription, false)
                }
                Entry::Vacant(vacant) => {
                    if full {
                        return Err(Error::CapacityExceeded);
                    }

                    let cell = Arc::new(EntryCell::loading());
                    let now = Instant::now();
                    vacant.insert(Slot {
                        cell: Arc::clone(&cell),
                        reference: 1,
                        loading: true,
                        last_release: now,
                        load_time: now,
                        subscription: None,
                    });
                    (cell, None, true)
                }
            }
        };

        if fresh {
            return self.load(key, cell);
        }

        self.wait_for(key, cell, subscription)
            .map_err(|_| Error::LoadFailed)
    }

    /// Like `acquire`, but never loads anything.
    ///
    /// Returns `None` if the entry is not registered, still loading, or
    /// cannot be locked in time.
    pub fn peek(&self, key: &str) -> Option<EntryGuard<'_>> {
        let (cell, subscription) = {
            let mut slots = self.lock_slots();
            let slot = slots.get_mut(key)?;
            if slot.loading || slot.reference > self.config.registry.max_waiters
            {
                return None;
            }
            slot.reference += 1;
            (Arc::clone(&slot.cell), slot.subscription)
        };

        self.wait_for(key, cell, subscription).ok()
    }

    fn wait_for(
        &self,
        key: &str,
        cell: Arc<EntryCell>,
        subscription: Option<SubscriptionId>,
    ) -> Result<EntryGuard<'_>, TakeError> {
        match cell.take(self.config.registry.lock_timeout()) {
            Ok(entry) => Ok(EntryGuard {
                registry: self,
                key: key.to_owned(),
                cell,
                subscription,
                entry: Some(entry),
            }),
            Err(e) => {
                if TakeError::TimedOut == e {
                    warn!("midb[{}] Timed out waiting for cache entry", key);
                }
                self.release(key, &cell);
                Err(e)
            }
        }
    }

    /// Open and fully synchronise the entry for `key`, whose slot has just
    /// been inserted with `cell` by the caller.
    fn load(
        &self,
        key: &str,
        cell: Arc<EntryCell>,
    ) -> Result<EntryGuard<'_>, Error> {
        let result = CacheEntry::open(key, &self.config.storage).and_then(
            |mut entry| {
                let (db, cx) = entry.sync_parts(&*self.store);
                sync::full::sync_mailbox(db, &cx)?;
                Ok(entry)
            },
        );

        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                error!("midb[{}] Failed to load cache entry: {}", key, e);
                {
                    let mut slots = self.lock_slots();
                    if slots
                        .get(key)
                        .map_or(false, |slot| Arc::ptr_eq(&slot.cell, &cell))
                    {
                        slots.remove(key);
                    }
                }
                cell.kill();
                return Err(Error::LoadFailed);
            }
        };

        let subscription = match self.store.subscribe(key, EventKinds::all())
        {
            Ok(Some(subscription)) => Some(subscription),
            Ok(None) => {
                warn!(
                    "{} Store declined notification subscription",
                    entry.log_prefix()
                );
                None
            }
            Err(e) => {
                warn!(
                    "{} Failed to subscribe to notifications: {}",
                    entry.log_prefix(),
                    e
                );
                None
            }
        };

        {
            let mut slots = self.lock_slots();
            if let Some(slot) = slots
                .get_mut(key)
                .filter(|slot| Arc::ptr_eq(&slot.cell, &cell))
            {
                slot.loading = false;
                slot.load_time = Instant::now();
                slot.subscription = subscription;
            }
        }

        info!("{} Loaded cache entry", entry.log_prefix());
        Ok(EntryGuard {
            registry: self,
            key: key.to_owned(),
            cell,
            subscription,
            entry: Some(Box::new(entry)),
        })
    }

    fn release(&self, key: &str, cell: &Arc<EntryCell>) {
        let mut slots = self.lock_slots();
        if let Some(slot) = slots
            .get_mut(key)
            .filter(|slot| Arc::ptr_eq(&slot.cell, cell))
        {
            slot.reference = slot.reference.saturating_sub(1);
            slot.last_release = Instant::now();
        }
    }

    #[cfg(test)]
    pub(crate) fn reference_count(&self, key: &str) -> Option<usize> {
        self.lock_slots().get(key).map(|slot| slot.reference)
    }
}

/// Exclusive access to one cache entry.
///
/// Dropping the guard unlocks the entry and releases the reference.
pub struct EntryGuard<'r> {
    registry: &'r Registry,
    key: String,
    cell: Arc<EntryCell>,
    subscription: Option<SubscriptionId>,
    entry: Option<Box<CacheEntry>>,
}

impl<'r> EntryGuard<'r> {
    /// The store subscription the entry was loaded with, if any.
    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    pub fn store(&self) -> &'r dyn StoreClient {
        &*self.registry.store
    }

    /// See `CacheEntry::sync_parts`.
    pub fn sync_parts(&mut self) -> (&mut CacheDb, SyncContext<'_>) {
        let store: &'r dyn StoreClient = &*self.registry.store;
        let entry: &mut CacheEntry = &mut *self;
        entry.sync_parts(store)
    }
}

impl Deref for EntryGuard<'_> {
    type Target = CacheEntry;

    fn deref(&self) -> &CacheEntry {
        match self.entry {
            Some(ref entry) => entry,
            None => unreachable!(),
        }
    }
}

impl DerefMut for EntryGuard<'_> {
    fn deref_mut(&mut self) -> &mut CacheEntry {
        match self.entry {
            Some(ref mut entry) => entry,
            None => unreachable!(),
        }
    }
}

impl Drop for EntryGuard<'_> {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            self.cell.put(entry);
        }
        self.registry.release(&self.key, &self.cell);
    }
}
