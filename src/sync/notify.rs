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


//! Delivery of store notifications to loaded cache entries.
//!
//! The store pushes `Notification`s onto one channel. A router thread
//! shards them by mailbox onto a small pool of workers, so events for one
//! mailbox are applied in the order the store sent them while different
//! mailboxes proceed in parallel.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, warn};

use super::incremental;
use crate::cache::registry::Registry;
use crate::store::Notification;
use crate::support::error::Error;

/// Reported whenever new mail lands in a cached folder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderTouched {
    pub username: String,
    /// The cached name of the folder.
    pub folder: String,
}

/// Handle on the notification threads.
pub struct Dispatcher {
    shutdown: Option<Sender<()>>,
    threads: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Start routing notifications from `inbound`.
    ///
    /// If `touched` is given, `FolderTouched` reports are offered to it;
    /// reports that do not fit are dropped rather than stalling the worker.
    pub fn spawn(
        registry: Arc<Registry>,
        inbound: Receiver<Notification>,
        touched: Option<Sender<FolderTouched>>,
    ) -> Result<Self, Error> {
        let notify = &registry.config().notify;
        let worker_count = notify.workers.max(1);
        let queue_depth = notify.queue_depth;

        let mut threads = Vec::with_capacity(worker_count + 1);
        let mut queues = Vec::with_capacity(worker_count);
        for ix in 0..worker_count {
            let (tx, rx) = channel::bounded::<Notification>(queue_depth);
            let registry = Arc::clone(&registry);
            let touched = touched.clone();
            threads.push(
                thread::Builder::new()
                    .name(format!("midb-notify-{}", ix))
                    .spawn(move || {
                        for notification in rx {
                            deliver(&registry, &notification, touched.as_ref());
                        }
                    })?,
            );
            queues.push(tx);
        }

        let (shutdown_tx, shutdown_rx) = channel::bounded(1);
        threads.push(
            thread::Builder::new()
                .name("midb-notify".to_owned())
                .spawn(move || route(&inbound, &shutdown_rx, &queues))?,
        );

        Ok(Self {
            shutdown: Some(shutdown_tx),
            threads,
        })
    }

    /// Stop routing and wait for the workers to finish what they were
    /// already given.
    pub fn stop(mut self) {
        self.shutdown.take();
        for thread in self.threads.drain(..) {
            if thread.join().is_err() {
                warn!("Notification thread panicked");
            }
        }
    }
}

fn route(
    inbound: &Receiver<Notification>,
    shutdown: &Receiver<()>,
    queues: &[Sender<Notification>],
) {
    loop {
        crossbeam::select! {
            recv(inbound) -> notification => {
                let notification = match notification {
                    Ok(n) => n,
                    Err(_) => break,
                };

                let queue = &queues[shard(&notification.mailbox, queues.len())];
                if queue.send(notification).is_err() {
                    break;
                }
            },
            recv(shutdown) -> _ => break,
        }
    }
}

fn shard(mailbox: &str, n: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    mailbox.hash(&mut hasher);
    (hasher.finish() % n as u64) as usize
}

/// Apply one notification to its entry, if that entry is loaded and idle
/// enough to get at.
///
/// Failures are logged and otherwise ignored; the next full sync repairs
/// whatever was missed.
pub fn deliver(
    registry: &Registry,
    notification: &Notification,
    touched: Option<&Sender<FolderTouched>>,
) {
    let mut guard = match registry.peek(&notification.mailbox) {
        Some(guard) => guard,
        None => {
            debug!(
                "midb[{}] Not loaded, dropping {:?}",
                notification.mailbox, notification.event
            );
            return;
        }
    };

    if guard.subscription() != Some(notification.subscription) {
        debug!(
            "{} Stale subscription {:?}, dropping {:?}",
            guard.log_prefix(),
            notification.subscription,
            notification.event
        );
        return;
    }

    let username = guard.username().to_owned();
    let log_prefix = guard.log_prefix().clone();
    let (db, cx) = guard.sync_parts();
    match incremental::apply(db, &cx, &notification.event) {
        Ok(None) => (),
        Ok(Some(folder)) => {
            if let Some(touched) = touched {
                if let Err(e) =
                    touched.try_send(FolderTouched { username, folder })
                {
                    let reason =
                        if e.is_full() { "queue full" } else { "no listener" };
                    debug!(
                        "{} Dropping new mail report for {}: {}",
                        log_prefix,
                        e.into_inner().folder,
                        reason
                    );
                }
            }
        }
        Err(e) => warn!(
            "{} Failed to apply {:?}: {}",
            log_prefix, notification.event, e
        ),
    }
}
