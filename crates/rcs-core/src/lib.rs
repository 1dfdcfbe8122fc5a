// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the RCS delivery engine.
//!
//! This crate provides the error taxonomy, the integer-encoded state enums,
//! the record types and the port traits used throughout the workspace. It
//! performs no I/O: the store, the transport layer and the alarm facility are
//! all reached through traits defined here.

pub mod error;
pub mod events;
pub mod predicate;
pub mod states;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{RcsError, TransportError};
pub use events::ChangeEvent;
pub use predicate::{FileTransferPatch, GroupDeliveryPatch, MessagePatch, Predicate};
pub use states::{
    Direction, FileTransferReasonCode, FileTransferState, GroupChatState, GroupDeliveryReasonCode,
    GroupDeliveryStatus, MessageReasonCode, MessageStatus, ParticipantStatus, ReadStatus,
    StoredEnum,
};
pub use traits::{
    Admission, AlarmKey, AlarmScheduler, Clock, DeliveryStore, DeliveryTransport, SystemClock,
};
pub use types::{
    ChatMessage, DequeueItem, FileTransfer, GroupConversation, GroupDeliveryRecord, ItemKind,
    Medium, Timestamp,
};
