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

//! The boundary to the authoritative mail store.
//!
//! The cache never owns truth about folders or messages; everything it knows
//! comes through `StoreClient`, either by enumeration during a full sync or
//! by notifications delivered onto the channel returned by
//! `MailIndex::notifier()`.

pub mod memory;

use bitflags::bitflags;

use crate::digest::Digest;
use crate::model::*;
use crate::support::error::Error;

/// The container class of folders holding ordinary mail.
pub const MAIL_FOLDER_CLASS: &str = "IPF.Note";

/// One folder as the store describes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderInfo {
    pub folder_id: FolderId,
    pub parent_id: FolderId,
    pub display_name: String,
    /// `None` if the store has not (yet) assigned a class.
    pub container_class: Option<String>,
    pub hidden: bool,
    /// The store's last-modified marker for the folder's contents.
    pub commit_max: i64,
}

impl FolderInfo {
    /// Whether this folder holds mail the cache should mirror.
    pub fn is_mail_folder(&self) -> bool {
        !self.hidden
            && self
                .container_class
                .as_deref()
                .map_or(false, |c| c.eq_ignore_ascii_case(MAIL_FOLDER_CLASS))
    }
}

/// One message as the store describes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageInfo {
    pub message_id: MessageId,
    pub folder_id: FolderId,
    /// The name of the message's file in the mail directory, if the message
    /// arrived through delivery rather than being created in the store.
    pub mid_string: Option<String>,
    pub flags: StoreFlags,
    pub mod_time: i64,
    pub received: Option<i64>,
}

impl MessageInfo {
    /// The delivery time, falling back to the modification time.
    pub fn received_time(&self) -> i64 {
        self.received.unwrap_or(self.mod_time)
    }
}

/// A message to be written into the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageContent {
    pub digest: Digest,
    pub read: bool,
    pub unsent: bool,
    pub received: i64,
}

/// How much of its allowance a mailbox uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreUsage {
    /// Total size of the mailbox, in bytes.
    pub size: u64,
    /// The size beyond which the store refuses delivery, in KiB.
    pub receive_quota: Option<u64>,
}

impl StoreUsage {
    pub fn is_full(&self) -> bool {
        self.receive_quota
            .map_or(false, |kib| self.size >= kib.saturating_mul(1024))
    }
}

bitflags! {
    /// Classes of store event a subscription asks for.
    pub struct EventKinds: u32 {
        const CREATED = 1 << 0;
        const DELETED = 1 << 1;
        const MODIFIED = 1 << 2;
        const MOVED = 1 << 3;
        const COPIED = 1 << 4;
        const NEW_MAIL = 1 << 5;
    }
}

/// A single change reported by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    NewMail {
        folder: FolderId,
        message: MessageId,
    },
    MessageCreated {
        folder: FolderId,
        message: MessageId,
    },
    MessageDeleted {
        folder: FolderId,
        message: MessageId,
    },
    MessageModified {
        folder: FolderId,
        message: MessageId,
    },
    MessageMoved {
        old_folder: FolderId,
        old_message: MessageId,
        folder: FolderId,
        message: MessageId,
    },
    MessageCopied {
        folder: FolderId,
        message: MessageId,
    },
    FolderCreated {
        parent: FolderId,
        folder: FolderId,
    },
    FolderDeleted {
        parent: FolderId,
        folder: FolderId,
    },
    FolderModified {
        folder: FolderId,
    },
    FolderMoved {
        old_parent: FolderId,
        parent: FolderId,
        folder: FolderId,
    },
    FolderCopied {
        parent: FolderId,
        folder: FolderId,
    },
}

/// An event addressed to one mailbox through one subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub mailbox: String,
    pub subscription: SubscriptionId,
    pub event: Event,
}

/// The RPC surface of the authoritative store.
///
/// Every call names the mailbox (its home directory) it concerns.
/// Implementations must be usable from several threads at once.
pub trait StoreClient: Send + Sync {
    /// List the folder hierarchy beneath `FolderId::IPM_SUBTREE`,
    /// depth-first, as a flat list with parent links.
    fn enumerate_folders(&self, mailbox: &str)
        -> Result<Vec<FolderInfo>, Error>;

    /// List every message directly within `folder`.
    fn enumerate_messages(
        &self,
        mailbox: &str,
        folder: FolderId,
    ) -> Result<Vec<MessageInfo>, Error>;

    /// Produce the digest of one message.
    fn get_message_digest(
        &self,
        mailbox: &str,
        message: MessageId,
    ) -> Result<Digest, Error>;

    fn get_folder(
        &self,
        mailbox: &str,
        folder: FolderId,
    ) -> Result<Option<FolderInfo>, Error>;

    fn get_message(
        &self,
        mailbox: &str,
        folder: FolderId,
        message: MessageId,
    ) -> Result<Option<MessageInfo>, Error>;

    /// Subscribe to `kinds` events on the mailbox.
    ///
    /// Returns `None` if the store declined the subscription.
    fn subscribe(
        &self,
        mailbox: &str,
        kinds: EventKinds,
    ) -> Result<Option<SubscriptionId>, Error>;

    fn unsubscribe(
        &self,
        mailbox: &str,
        subscription: SubscriptionId,
    ) -> Result<(), Error>;

    fn set_read_state(
        &self,
        mailbox: &str,
        message: MessageId,
        read: bool,
    ) -> Result<(), Error>;

    fn set_unsent(
        &self,
        mailbox: &str,
        message: MessageId,
        unsent: bool,
    ) -> Result<(), Error>;

    /// Reserve the id of a message about to be written into `folder`.
    fn allocate_message_id(
        &self,
        mailbox: &str,
        folder: FolderId,
    ) -> Result<MessageId, Error>;

    /// Create `message` in `folder`, under an id obtained from
    /// `allocate_message_id`.
    ///
    /// The store announces the message with a message-created event and
    /// reports it without a mid string.
    fn write_message(
        &self,
        mailbox: &str,
        folder: FolderId,
        message: MessageId,
        content: &MessageContent,
    ) -> Result<(), Error>;

    /// Delete those of `messages` that are in `folder`.
    fn delete_messages(
        &self,
        mailbox: &str,
        folder: FolderId,
        messages: &[MessageId],
    ) -> Result<(), Error>;

    /// Create a mail folder beneath `parent`, returning its id.
    fn create_folder(
        &self,
        mailbox: &str,
        parent: FolderId,
        display_name: &str,
    ) -> Result<FolderId, Error>;

    /// Delete `folder` with all its messages and subfolders.
    fn delete_folder(&self, mailbox: &str, folder: FolderId)
        -> Result<(), Error>;

    /// Give `folder` a new parent and display name.
    ///
    /// Returns `false` if the new parent already has a child of that name.
    fn move_folder(
        &self,
        mailbox: &str,
        folder: FolderId,
        parent: FolderId,
        display_name: &str,
    ) -> Result<bool, Error>;

    fn usage(&self, mailbox: &str) -> Result<StoreUsage, Error>;

    /// Keep the store's handle on the mailbox alive.
    fn ping(&self, mailbox: &str) -> Result<(), Error>;
}
