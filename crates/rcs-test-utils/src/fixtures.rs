// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ready-made records for tests.

use std::collections::BTreeMap;

use rcs_core::{
    ChatMessage, Direction, FileTransfer, GroupChatState, GroupConversation, ParticipantStatus,
    Timestamp,
};

/// Size of every fixture transfer.
pub const TRANSFER_SIZE: i64 = 1024;

pub fn outgoing_message(id: &str, peer: &str, created_at: Timestamp) -> ChatMessage {
    ChatMessage::new(
        id,
        peer,
        Some(peer.to_string()),
        Direction::Outgoing,
        "text/plain",
        format!("hello from {id}"),
        created_at,
    )
}

pub fn incoming_message(id: &str, peer: &str, created_at: Timestamp) -> ChatMessage {
    ChatMessage::new(
        id,
        peer,
        Some(peer.to_string()),
        Direction::Incoming,
        "text/plain",
        format!("hello from {peer}"),
        created_at,
    )
}

pub fn outgoing_group_message(
    id: &str,
    conversation_id: &str,
    created_at: Timestamp,
) -> ChatMessage {
    ChatMessage::new(
        id,
        conversation_id,
        None,
        Direction::Outgoing,
        "text/plain",
        format!("hello group from {id}"),
        created_at,
    )
}

/// A started group conversation with the given roster.
pub fn group_chat(id: &str, participants: &[(&str, ParticipantStatus)]) -> GroupConversation {
    GroupConversation {
        id: id.to_string(),
        subject: Some(format!("subject of {id}")),
        participants: participants
            .iter()
            .map(|(participant, status)| (participant.to_string(), *status))
            .collect::<BTreeMap<_, _>>(),
        state: GroupChatState::Started,
        rejoin_token: None,
        created_at: 1,
    }
}

/// An MSRP transfer of [`TRANSFER_SIZE`] bytes.
pub fn outgoing_transfer(id: &str, peer: &str, created_at: Timestamp) -> FileTransfer {
    FileTransfer::new(
        id,
        peer,
        Some(peer.to_string()),
        Direction::Outgoing,
        format!("file:///sdcard/{id}.jpg"),
        format!("{id}.jpg"),
        "image/jpeg",
        TRANSFER_SIZE,
        created_at,
    )
}

pub fn outgoing_group_transfer(
    id: &str,
    conversation_id: &str,
    created_at: Timestamp,
) -> FileTransfer {
    FileTransfer::new(
        id,
        conversation_id,
        None,
        Direction::Outgoing,
        format!("file:///sdcard/{id}.jpg"),
        format!("{id}.jpg"),
        "image/jpeg",
        TRANSFER_SIZE,
        created_at,
    )
}

/// An HTTP transfer fully uploaded to the content server whose file info
/// has not been sent yet.
pub fn uploaded_http_transfer(
    id: &str,
    peer: &str,
    created_at: Timestamp,
    file_expires_at: Timestamp,
) -> FileTransfer {
    FileTransfer {
        transferred_bytes: TRANSFER_SIZE,
        upload_transaction_id: Some(format!("tid-{id}")),
        download_uri: Some(format!("https://ft.example.org/{id}")),
        file_expires_at,
        ..outgoing_transfer(id, peer, created_at)
    }
}

/// An incoming HTTP transfer offer that has not been accepted yet.
pub fn incoming_http_transfer(
    id: &str,
    peer: &str,
    created_at: Timestamp,
    file_expires_at: Timestamp,
) -> FileTransfer {
    FileTransfer {
        direction: Direction::Incoming,
        download_uri: Some(format!("https://ft.example.org/{id}")),
        file_expires_at,
        ..outgoing_transfer(id, peer, created_at)
    }
}
