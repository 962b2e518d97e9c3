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

//! A `StoreClient` holding everything in memory.
//!
//! This is what the test suites run against. It is also usable for
//! embedding the cache in front of a store that is cheap to hold entirely in
//! memory.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::*;
use crate::digest::Digest;

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    mailboxes: HashMap<String, MailboxState>,
    next_id: i64,
    next_subscription: u32,
    refuse_subscriptions: bool,
    fail_enumeration: bool,
    enumeration_delay: Option<Duration>,
    unsubscribe_count: usize,
    digest_requests: usize,
    pings: usize,
}

#[derive(Default)]
struct MailboxState {
    folders: BTreeMap<FolderId, FolderInfo>,
    messages: BTreeMap<MessageId, (MessageInfo, Digest)>,
    subscriptions: Vec<SubscriptionId>,
    receive_quota: Option<u64>,
    /// Events caused by `StoreClient` calls, oldest first.
    events: Vec<Event>,
}

impl MailboxState {
    fn touch(&mut self, folder: FolderId) {
        if let Some(info) = self.folders.get_mut(&folder) {
            info.commit_max += 1;
        }
    }

    fn has_child_named(
        &self,
        parent: FolderId,
        display_name: &str,
        except: Option<FolderId>,
    ) -> bool {
        self.folders.values().any(|f| {
            f.parent_id == parent
                && f.display_name == display_name
                && Some(f.folder_id) != except
        })
    }

    /// Whether `folder` is `ancestor` or lies beneath it.
    fn is_within(&self, mut folder: FolderId, ancestor: FolderId) -> bool {
        loop {
            if folder == ancestor {
                return true;
            }
            match self.folders.get(&folder) {
                Some(info) if info.parent_id != folder => {
                    folder = info.parent_id
                }
                _ => return false,
            }
        }
    }
}

/// Build a visible mail folder description.
pub fn mail_folder(
    folder_id: FolderId,
    parent_id: FolderId,
    display_name: &str,
) -> FolderInfo {
    FolderInfo {
        folder_id,
        parent_id,
        display_name: display_name.to_owned(),
        container_class: Some(MAIL_FOLDER_CLASS.to_owned()),
        hidden: false,
        commit_max: 1,
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, Error> {
        self.inner
            .lock()
            .map_err(|_| Error::Store("memory store poisoned".to_owned()))
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut inner)
    }

    fn allocate_id(inner: &mut Inner) -> i64 {
        inner.next_id += 1;
        0x1000 + inner.next_id
    }

    /// Insert or replace a folder.
    pub fn put_folder(&self, mailbox: &str, info: FolderInfo) {
        self.with(|inner| {
            inner
                .mailboxes
                .entry(mailbox.to_owned())
                .or_default()
                .folders
                .insert(info.folder_id, info);
        })
    }

    /// Add a new mail folder with a freshly allocated id.
    pub fn add_folder(
        &self,
        mailbox: &str,
        parent: FolderId,
        display_name: &str,
    ) -> FolderId {
        let id = self.with(|inner| FolderId(Self::allocate_id(inner)));
        self.put_folder(mailbox, mail_folder(id, parent, display_name));
        id
    }

    /// Apply `f` to a folder, returning whether it exists.
    pub fn update_folder(
        &self,
        mailbox: &str,
        folder: FolderId,
        f: impl FnOnce(&mut FolderInfo),
    ) -> bool {
        self.with(|inner| {
            match inner
                .mailboxes
                .get_mut(mailbox)
                .and_then(|mb| mb.folders.get_mut(&folder))
            {
                Some(info) => {
                    f(info);
                    true
                }
                None => false,
            }
        })
    }

    /// Remove a folder along with the messages it contains.
    pub fn remove_folder(&self, mailbox: &str, folder: FolderId) {
        self.with(|inner| {
            if let Some(mb) = inner.mailboxes.get_mut(mailbox) {
                mb.folders.remove(&folder);
                mb.messages.retain(|_, (info, _)| info.folder_id != folder);
            }
        })
    }

    /// Add a message with no flags, modified at time 100.
    pub fn add_message(
        &self,
        mailbox: &str,
        folder: FolderId,
        mid_string: Option<&str>,
        digest: Digest,
    ) -> MessageId {
        let id = self.with(|inner| MessageId(Self::allocate_id(inner)));
        self.put_message(
            mailbox,
            MessageInfo {
                message_id: id,
                folder_id: folder,
                mid_string: mid_string.map(str::to_owned),
                flags: StoreFlags::empty(),
                mod_time: 100,
                received: None,
            },
            digest,
        );
        id
    }

    /// Insert or replace a message, advancing its folder's commit marker.
    pub fn put_message(&self, mailbox: &str, info: MessageInfo, digest: Digest) {
        self.with(|inner| {
            let mb = inner.mailboxes.entry(mailbox.to_owned()).or_default();
            mb.touch(info.folder_id);
            mb.messages.insert(info.message_id, (info, digest));
        })
    }

    /// Apply `f` to a message, advancing its folder's commit marker. Returns
    /// whether the message exists.
    pub fn update_message(
        &self,
        mailbox: &str,
        message: MessageId,
        f: impl FnOnce(&mut MessageInfo),
    ) -> bool {
        self.with(|inner| {
            let mb = match inner.mailboxes.get_mut(mailbox) {
                Some(mb) => mb,
                None => return false,
            };
            let folder = match mb.messages.get_mut(&message) {
                Some((info, _)) => {
                    f(info);
                    info.folder_id
                }
                None => return false,
            };
            mb.touch(folder);
            true
        })
    }

    pub fn remove_message(&self, mailbox: &str, message: MessageId) {
        self.with(|inner| {
            if let Some(mb) = inner.mailboxes.get_mut(mailbox) {
                if let Some((info, _)) = mb.messages.remove(&message) {
                    mb.touch(info.folder_id);
                }
            }
        })
    }

    /// Make subsequent `subscribe` calls decline.
    pub fn refuse_subscriptions(&self, refuse: bool) {
        self.with(|inner| inner.refuse_subscriptions = refuse)
    }

    /// Make subsequent folder enumerations fail.
    pub fn fail_enumeration(&self, fail: bool) {
        self.with(|inner| inner.fail_enumeration = fail)
    }

    /// Make each message enumeration take at least `delay`.
    pub fn set_enumeration_delay(&self, delay: Option<Duration>) {
        self.with(|inner| inner.enumeration_delay = delay)
    }

    /// The live subscription of `mailbox`, if there is exactly one.
    pub fn subscription(&self, mailbox: &str) -> Option<SubscriptionId> {
        self.with(|inner| {
            inner
                .mailboxes
                .get(mailbox)
                .filter(|mb| 1 == mb.subscriptions.len())
                .map(|mb| mb.subscriptions[0])
        })
    }

    pub fn active_subscriptions(&self, mailbox: &str) -> usize {
        self.with(|inner| {
            inner
                .mailboxes
                .get(mailbox)
                .map_or(0, |mb| mb.subscriptions.len())
        })
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.with(|inner| inner.unsubscribe_count)
    }

    pub fn digest_requests(&self) -> usize {
        self.with(|inner| inner.digest_requests)
    }

    pub fn pings(&self) -> usize {
        self.with(|inner| inner.pings)
    }

    /// Set the size in KiB beyond which `mailbox` counts as full.
    pub fn set_receive_quota(&self, mailbox: &str, quota: Option<u64>) {
        self.with(|inner| {
            inner
                .mailboxes
                .entry(mailbox.to_owned())
                .or_default()
                .receive_quota = quota
        })
    }

    /// Remove and return the events `StoreClient` calls on `mailbox` have
    /// caused so far.
    pub fn take_events(&self, mailbox: &str) -> Vec<Event> {
        self.with(|inner| {
            inner
                .mailboxes
                .get_mut(mailbox)
                .map(|mb| std::mem::take(&mut mb.events))
                .unwrap_or_default()
        })
    }

    pub fn message_info(
        &self,
        mailbox: &str,
        message: MessageId,
    ) -> Option<MessageInfo> {
        self.with(|inner| {
            inner
                .mailboxes
                .get(mailbox)
                .and_then(|mb| mb.messages.get(&message))
                .map(|(info, _)| info.clone())
        })
    }
}

impl StoreClient for MemoryStore {
    fn enumerate_folders(
        &self,
        mailbox: &str,
    ) -> Result<Vec<FolderInfo>, Error> {
        let inner = self.lock()?;
        if inner.fail_enumeration {
            return Err(Error::Store("enumeration refused".to_owned()));
        }

        let mb = match inner.mailboxes.get(mailbox) {
            Some(mb) => mb,
            None => return Ok(Vec::new()),
        };

        let mut children: BTreeMap<FolderId, Vec<FolderId>> = BTreeMap::new();
        for info in mb.folders.values() {
            children.entry(info.parent_id).or_default().push(info.folder_id);
        }

        // Depth-first, visiting siblings in id order
        let mut result = Vec::with_capacity(mb.folders.len());
        let mut stack = children
            .get(&FolderId::IPM_SUBTREE)
            .cloned()
            .unwrap_or_default();
        stack.reverse();
        while let Some(folder) = stack.pop() {
            if let Some(info) = mb.folders.get(&folder) {
                result.push(info.clone());
            }
            if let Some(kids) = children.get(&folder) {
                stack.extend(kids.iter().rev().copied());
            }
        }

        Ok(result)
    }

    fn enumerate_messages(
        &self,
        mailbox: &str,
        folder: FolderId,
    ) -> Result<Vec<MessageInfo>, Error> {
        let (delay, messages) = {
            let inner = self.lock()?;
            let messages = inner
                .mailboxes
                .get(mailbox)
                .map(|mb| {
                    mb.messages
                        .values()
                        .filter(|(info, _)| info.folder_id == folder)
                        .map(|(info, _)| info.clone())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            (inner.enumeration_delay, messages)
        };

        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        Ok(messages)
    }

    fn get_message_digest(
        &self,
        mailbox: &str,
        message: MessageId,
    ) -> Result<Digest, Error> {
        let mut inner = self.lock()?;
        inner.digest_requests += 1;
        inner
            .mailboxes
            .get(mailbox)
            .and_then(|mb| mb.messages.get(&message))
            .map(|(_, digest)| digest.clone())
            .ok_or_else(|| Error::Store(format!("no message {}", message)))
    }

    fn get_folder(
        &self,
        mailbox: &str,
        folder: FolderId,
    ) -> Result<Option<FolderInfo>, Error> {
        Ok(self
            .lock()?
            .mailboxes
            .get(mailbox)
            .and_then(|mb| mb.folders.get(&folder))
            .cloned())
    }

    fn get_message(
        &self,
        mailbox: &str,
        folder: FolderId,
        message: MessageId,
    ) -> Result<Option<MessageInfo>, Error> {
        Ok(self
            .lock()?
            .mailboxes
            .get(mailbox)
            .and_then(|mb| mb.messages.get(&message))
            .filter(|(info, _)| info.folder_id == folder)
            .map(|(info, _)| info.clone()))
    }

    fn subscribe(
        &self,
        mailbox: &str,
        _kinds: EventKinds,
    ) -> Result<Option<SubscriptionId>, Error> {
        let mut inner = self.lock()?;
        if inner.refuse_subscriptions {
            return Ok(None);
        }

        inner.next_subscription += 1;
        let id = SubscriptionId(inner.next_subscription);
        inner
            .mailboxes
            .entry(mailbox.to_owned())
            .or_default()
            .subscriptions
            .push(id);
        Ok(Some(id))
    }

    fn unsubscribe(
        &self,
        mailbox: &str,
        subscription: SubscriptionId,
    ) -> Result<(), Error> {
        let mut inner = self.lock()?;
        inner.unsubscribe_count += 1;
        if let Some(mb) = inner.mailboxes.get_mut(mailbox) {
            mb.subscriptions.retain(|&s| s != subscription);
        }
        Ok(())
    }

    fn set_read_state(
        &self,
        mailbox: &str,
        message: MessageId,
        read: bool,
    ) -> Result<(), Error> {
        if self.update_message(mailbox, message, |info| {
            info.flags.set(StoreFlags::READ, read)
        }) {
            Ok(())
        } else {
            Err(Error::Store(format!("no message {}", message)))
        }
    }

    fn set_unsent(
        &self,
        mailbox: &str,
        message: MessageId,
        unsent: bool,
    ) -> Result<(), Error> {
        if self.update_message(mailbox, message, |info| {
            info.flags.set(StoreFlags::UNSENT, unsent)
        }) {
            Ok(())
        } else {
            Err(Error::Store(format!("no message {}", message)))
        }
    }

    fn allocate_message_id(
        &self,
        _mailbox: &str,
        _folder: FolderId,
    ) -> Result<MessageId, Error> {
        let mut inner = self.lock()?;
        Ok(MessageId(Self::allocate_id(&mut inner)))
    }

    fn write_message(
        &self,
        mailbox: &str,
        folder: FolderId,
        message: MessageId,
        content: &MessageContent,
    ) -> Result<(), Error> {
        let mut inner = self.lock()?;
        let mb = inner
            .mailboxes
            .get_mut(mailbox)
            .filter(|mb| mb.folders.contains_key(&folder))
            .ok_or_else(|| Error::Store(format!("no folder {}", folder)))?;

        let mut flags = StoreFlags::empty();
        flags.set(StoreFlags::READ, content.read);
        flags.set(StoreFlags::UNSENT, content.unsent);
        mb.messages.insert(
            message,
            (
                MessageInfo {
                    message_id: message,
                    folder_id: folder,
                    mid_string: None,
                    flags,
                    mod_time: content.received,
                    received: Some(content.received),
                },
                content.digest.clone(),
            ),
        );
        mb.touch(folder);
        mb.events.push(Event::MessageCreated { folder, message });
        Ok(())
    }

    fn delete_messages(
        &self,
        mailbox: &str,
        folder: FolderId,
        messages: &[MessageId],
    ) -> Result<(), Error> {
        let mut inner = self.lock()?;
        let mb = match inner.mailboxes.get_mut(mailbox) {
            Some(mb) => mb,
            None => return Ok(()),
        };

        for &message in messages {
            let in_folder = mb
                .messages
                .get(&message)
                .map_or(false, |(info, _)| info.folder_id == folder);
            if in_folder {
                mb.messages.remove(&message);
                mb.touch(folder);
                mb.events.push(Event::MessageDeleted { folder, message });
            }
        }
        Ok(())
    }

    fn create_folder(
        &self,
        mailbox: &str,
        parent: FolderId,
        display_name: &str,
    ) -> Result<FolderId, Error> {
        let mut inner = self.lock()?;
        let folder = FolderId(Self::allocate_id(&mut inner));
        let mb = inner.mailboxes.entry(mailbox.to_owned()).or_default();
        if mb.has_child_named(parent, display_name, None) {
            return Err(Error::Store(format!(
                "folder {} already has a child named {:?}",
                parent, display_name
            )));
        }

        mb.folders
            .insert(folder, mail_folder(folder, parent, display_name));
        mb.events.push(Event::FolderCreated { parent, folder });
        Ok(folder)
    }

    fn delete_folder(
        &self,
        mailbox: &str,
        folder: FolderId,
    ) -> Result<(), Error> {
        let mut inner = self.lock()?;
        let mb = inner
            .mailboxes
            .get_mut(mailbox)
            .ok_or_else(|| Error::Store(format!("no folder {}", folder)))?;
        let parent = mb
            .folders
            .get(&folder)
            .map(|info| info.parent_id)
            .ok_or_else(|| Error::Store(format!("no folder {}", folder)))?;

        let doomed = mb
            .folders
            .keys()
            .copied()
            .filter(|&f| mb.is_within(f, folder))
            .collect::<Vec<_>>();
        for f in &doomed {
            mb.folders.remove(f);
        }
        mb.messages
            .retain(|_, (info, _)| !doomed.contains(&info.folder_id));
        mb.events.push(Event::FolderDeleted { parent, folder });
        Ok(())
    }

    fn move_folder(
        &self,
        mailbox: &str,
        folder: FolderId,
        parent: FolderId,
        display_name: &str,
    ) -> Result<bool, Error> {
        let mut inner = self.lock()?;
        let mb = inner
            .mailboxes
            .get_mut(mailbox)
            .ok_or_else(|| Error::Store(format!("no folder {}", folder)))?;
        let old_parent = mb
            .folders
            .get(&folder)
            .map(|info| info.parent_id)
            .ok_or_else(|| Error::Store(format!("no folder {}", folder)))?;

        if mb.is_within(parent, folder) {
            return Err(Error::Store(format!(
                "cannot move folder {} beneath itself",
                folder
            )));
        }
        if mb.has_child_named(parent, display_name, Some(folder)) {
            return Ok(false);
        }

        if let Some(info) = mb.folders.get_mut(&folder) {
            info.parent_id = parent;
            info.display_name = display_name.to_owned();
        }
        mb.events.push(if old_parent == parent {
            Event::FolderModified { folder }
        } else {
            Event::FolderMoved {
                old_parent,
                parent,
                folder,
            }
        });
        Ok(true)
    }

    fn usage(&self, mailbox: &str) -> Result<StoreUsage, Error> {
        Ok(self
            .lock()?
            .mailboxes
            .get(mailbox)
            .map(|mb| StoreUsage {
                size: mb.messages.values().map(|(_, d)| d.size).sum(),
                receive_quota: mb.receive_quota,
            })
            .unwrap_or_default())
    }

    fn ping(&self, _mailbox: &str) -> Result<(), Error> {
        self.lock()?.pings += 1;
        Ok(())
    }
}
