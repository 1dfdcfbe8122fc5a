// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row predicates and patches accepted by the persistence port.
//!
//! A [`Predicate`] is evaluated by the store, which translates it into its own
//! query language. Not every collection has every column: a predicate naming a
//! column that the target collection lacks is rejected with
//! [`RcsError::InvalidPredicate`](crate::RcsError::InvalidPredicate).

use crate::states::{
    Direction, FileTransferReasonCode, FileTransferState, GroupDeliveryReasonCode,
    GroupDeliveryStatus, MessageReasonCode, MessageStatus, ReadStatus, StoredEnum,
};
use crate::types::Timestamp;

/// Boolean expression over the rows of one collection, with `S` the state enum
/// of that collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate<S> {
    /// Matches every row.
    True,
    All(Vec<Predicate<S>>),
    Any(Vec<Predicate<S>>),
    IdIn(Vec<String>),
    StateIn(Vec<S>),
    StateNotIn(Vec<S>),
    /// Raw reason codes; build with [`Predicate::reason_in`].
    ReasonIn(Vec<i64>),
    ConversationIs(String),
    DirectionIs(Direction),
    /// `remote_participant = conversation_id`.
    OneToOne,
    /// Anything that is not one-to-one.
    Group,
    Unread,
    DeliveredAtUnset,
    DisplayedAtUnset,
    /// A deadline is recorded and has not fired yet.
    DeadlineArmed,
    /// File transfers only.
    DownloadUriSet,
}

impl<S: StoredEnum> Predicate<S> {
    pub fn id(id: impl Into<String>) -> Self {
        Self::IdIn(vec![id.into()])
    }

    pub fn state(state: S) -> Self {
        Self::StateIn(vec![state])
    }

    pub fn reason_in<R: StoredEnum>(reasons: &[R]) -> Self {
        Self::ReasonIn(reasons.iter().map(|r| r.code()).collect())
    }

    /// Conjunction, flattening a `True` operand away.
    pub fn and(self, other: Predicate<S>) -> Self {
        match (self, other) {
            (Self::True, p) | (p, Self::True) => p,
            (Self::All(mut a), Self::All(b)) => {
                a.extend(b);
                Self::All(a)
            }
            (Self::All(mut a), p) => {
                a.push(p);
                Self::All(a)
            }
            (p, q) => Self::All(vec![p, q]),
        }
    }
}

/// Column updates for a chat message. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePatch {
    pub state: Option<MessageStatus>,
    pub reason_code: Option<MessageReasonCode>,
    pub read_status: Option<ReadStatus>,
    pub created_at: Option<Timestamp>,
    pub sent_at: Option<Timestamp>,
    pub delivered_at: Option<Timestamp>,
    pub displayed_at: Option<Timestamp>,
    pub delivery_deadline: Option<Timestamp>,
    pub delivery_expired: Option<bool>,
}

impl MessagePatch {
    pub fn state(state: MessageStatus, reason_code: MessageReasonCode) -> Self {
        Self {
            state: Some(state),
            reason_code: Some(reason_code),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Column updates for a file transfer. Nullable text columns take
/// `Some(None)` to be cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileTransferPatch {
    pub state: Option<FileTransferState>,
    pub reason_code: Option<FileTransferReasonCode>,
    pub read_status: Option<ReadStatus>,
    pub created_at: Option<Timestamp>,
    pub sent_at: Option<Timestamp>,
    pub delivered_at: Option<Timestamp>,
    pub displayed_at: Option<Timestamp>,
    pub delivery_deadline: Option<Timestamp>,
    pub delivery_expired: Option<bool>,
    pub transferred_bytes: Option<i64>,
    pub file_expires_at: Option<Timestamp>,
    pub thumbnail_expires_at: Option<Timestamp>,
    pub upload_transaction_id: Option<Option<String>>,
    pub download_uri: Option<Option<String>>,
    pub remote_instance_id: Option<Option<String>>,
}

impl FileTransferPatch {
    pub fn state(state: FileTransferState, reason_code: FileTransferReasonCode) -> Self {
        Self {
            state: Some(state),
            reason_code: Some(reason_code),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Column updates for a group delivery record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupDeliveryPatch {
    pub status: Option<GroupDeliveryStatus>,
    pub reason_code: Option<GroupDeliveryReasonCode>,
    pub delivered_at: Option<Timestamp>,
    pub displayed_at: Option<Timestamp>,
    /// Written to `delivered_at` only while the stored value is still unset.
    pub fill_delivered_at: Option<Timestamp>,
}

impl GroupDeliveryPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_flattens_true_and_nested_all() {
        let p: Predicate<MessageStatus> = Predicate::True.and(Predicate::Unread);
        assert_eq!(p, Predicate::Unread);

        let p = Predicate::state(MessageStatus::Queued)
            .and(Predicate::OneToOne)
            .and(Predicate::DirectionIs(Direction::Outgoing));
        assert_eq!(
            p,
            Predicate::All(vec![
                Predicate::StateIn(vec![MessageStatus::Queued]),
                Predicate::OneToOne,
                Predicate::DirectionIs(Direction::Outgoing),
            ])
        );
    }

    #[test]
    fn reason_in_encodes_codes() {
        let p: Predicate<FileTransferState> =
            Predicate::reason_in(&[FileTransferReasonCode::PausedBySystem]);
        assert_eq!(p, Predicate::ReasonIn(vec![14]));
    }

    #[test]
    fn empty_patches() {
        assert!(MessagePatch::default().is_empty());
        let failed = MessagePatch::state(MessageStatus::Failed, MessageReasonCode::FailedSend);
        assert!(!failed.is_empty());
        assert!(FileTransferPatch::default().is_empty());
        let clear_uri = FileTransferPatch {
            download_uri: Some(None),
            ..FileTransferPatch::default()
        };
        assert!(!clear_uri.is_empty());
        assert!(GroupDeliveryPatch::default().is_empty());
    }
}
