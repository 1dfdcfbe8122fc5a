// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record types shared by the store, the engine and the transport layer.
//!
//! Timestamps are wall-clock milliseconds since the Unix epoch. `0` means
//! "not set" for every timestamp field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::states::{
    Direction, FileTransferReasonCode, FileTransferState, GroupChatState, GroupDeliveryReasonCode,
    GroupDeliveryStatus, MessageReasonCode, MessageStatus, ParticipantStatus, ReadStatus,
};

/// Milliseconds since the Unix epoch; `0` is the unset sentinel.
pub type Timestamp = i64;

/// Which collection an item lives in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize,
    Deserialize,
)]
pub enum ItemKind {
    Message,
    FileTransfer,
}

/// How a file transfer moves its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Medium {
    /// Peer-to-peer session transport.
    Msrp,
    /// Upload/download through a content server.
    Http,
}

/// A one-to-one or group chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    /// Peer identifier for one-to-one chats, group id otherwise.
    pub conversation_id: String,
    /// `None` for outgoing group messages.
    pub remote_participant: Option<String>,
    pub direction: Direction,
    pub mime_type: String,
    pub content: String,
    pub state: MessageStatus,
    pub reason_code: MessageReasonCode,
    pub read_status: ReadStatus,
    pub created_at: Timestamp,
    pub sent_at: Timestamp,
    pub delivered_at: Timestamp,
    pub displayed_at: Timestamp,
    pub delivery_deadline: Timestamp,
    pub delivery_expired: bool,
}

impl ChatMessage {
    /// Build a message with every tracking field at its initial value.
    pub fn new(
        id: impl Into<String>,
        conversation_id: impl Into<String>,
        remote_participant: Option<String>,
        direction: Direction,
        mime_type: impl Into<String>,
        content: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            remote_participant,
            direction,
            mime_type: mime_type.into(),
            content: content.into(),
            state: MessageStatus::Queued,
            reason_code: MessageReasonCode::Unspecified,
            read_status: ReadStatus::Unread,
            created_at,
            sent_at: created_at,
            delivered_at: 0,
            displayed_at: 0,
            delivery_deadline: 0,
            delivery_expired: false,
        }
    }

    pub fn is_one_to_one(&self) -> bool {
        self.remote_participant.as_deref() == Some(self.conversation_id.as_str())
    }
}

/// A one-to-one or group file transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTransfer {
    pub id: String,
    pub conversation_id: String,
    pub remote_participant: Option<String>,
    pub direction: Direction,
    pub file_uri: String,
    pub file_name: String,
    pub mime_type: String,
    pub size: i64,
    pub transferred_bytes: i64,
    pub thumbnail_uri: Option<String>,
    pub upload_transaction_id: Option<String>,
    pub download_uri: Option<String>,
    pub file_expires_at: Timestamp,
    pub thumbnail_expires_at: Timestamp,
    pub remote_instance_id: Option<String>,
    pub state: FileTransferState,
    pub reason_code: FileTransferReasonCode,
    pub read_status: ReadStatus,
    pub created_at: Timestamp,
    pub sent_at: Timestamp,
    pub delivered_at: Timestamp,
    pub displayed_at: Timestamp,
    pub delivery_deadline: Timestamp,
    pub delivery_expired: bool,
}

impl FileTransfer {
    /// Build a transfer with every tracking field at its initial value.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        conversation_id: impl Into<String>,
        remote_participant: Option<String>,
        direction: Direction,
        file_uri: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        size: i64,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            remote_participant,
            direction,
            file_uri: file_uri.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            size,
            transferred_bytes: 0,
            thumbnail_uri: None,
            upload_transaction_id: None,
            download_uri: None,
            file_expires_at: 0,
            thumbnail_expires_at: 0,
            remote_instance_id: None,
            state: FileTransferState::Queued,
            reason_code: FileTransferReasonCode::Unspecified,
            read_status: ReadStatus::Unread,
            created_at,
            sent_at: created_at,
            delivered_at: 0,
            displayed_at: 0,
            delivery_deadline: 0,
            delivery_expired: false,
        }
    }

    pub fn is_one_to_one(&self) -> bool {
        self.remote_participant.as_deref() == Some(self.conversation_id.as_str())
    }

    /// HTTP transfers are recognised by their server-side bookkeeping.
    pub fn medium(&self) -> Medium {
        if self.download_uri.is_some() || self.upload_transaction_id.is_some() {
            Medium::Http
        } else {
            Medium::Msrp
        }
    }

    pub fn is_fully_transferred(&self) -> bool {
        self.size > 0 && self.transferred_bytes >= self.size
    }
}

/// A group conversation and its roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConversation {
    pub id: String,
    pub subject: Option<String>,
    pub participants: BTreeMap<String, ParticipantStatus>,
    pub state: GroupChatState,
    pub rejoin_token: Option<String>,
    pub created_at: Timestamp,
}

impl GroupConversation {
    /// Participants that receive a delivery record for a newly created item.
    pub fn fan_out_participants(&self) -> impl Iterator<Item = &str> {
        self.participants
            .iter()
            .filter(|(_, status)| status.receives_fan_out())
            .map(|(participant, _)| participant.as_str())
    }
}

/// Per-recipient acknowledgement row of a group item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDeliveryRecord {
    pub item_id: String,
    pub conversation_id: String,
    pub participant: String,
    pub status: GroupDeliveryStatus,
    pub reason_code: GroupDeliveryReasonCode,
    pub delivered_at: Timestamp,
    pub displayed_at: Timestamp,
}

impl GroupDeliveryRecord {
    /// Fresh `NotDelivered` row.
    pub fn pending(
        item_id: impl Into<String>,
        conversation_id: impl Into<String>,
        participant: impl Into<String>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            conversation_id: conversation_id.into(),
            participant: participant.into(),
            status: GroupDeliveryStatus::NotDelivered,
            reason_code: GroupDeliveryReasonCode::Unspecified,
            delivered_at: 0,
            displayed_at: 0,
        }
    }
}

/// An item handed to the transport layer.
#[derive(Debug, Clone, PartialEq)]
pub enum DequeueItem {
    /// A queued chat message, re-timestamped for sending.
    Message(ChatMessage),
    /// A queued file transfer, re-timestamped for initiation.
    FileTransfer(FileTransfer),
    /// An uploaded HTTP transfer whose file info still has to be sent.
    FileInfo(FileTransfer),
}

impl DequeueItem {
    pub fn id(&self) -> &str {
        match self {
            Self::Message(m) => &m.id,
            Self::FileTransfer(ft) | Self::FileInfo(ft) => &ft.id,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Message(_) => ItemKind::Message,
            Self::FileTransfer(_) | Self::FileInfo(_) => ItemKind::FileTransfer,
        }
    }

    pub fn conversation_id(&self) -> &str {
        match self {
            Self::Message(m) => &m.conversation_id,
            Self::FileTransfer(ft) | Self::FileInfo(ft) => &ft.conversation_id,
        }
    }
}
