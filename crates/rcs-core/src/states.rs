// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Closed enumerations persisted as plain integers.
//!
//! Every enum here has an explicit integer table. Decoding an integer that is
//! not in the table fails with [`RcsError::InvalidEncoding`] instead of
//! falling back to some default variant.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::RcsError;

/// An enum stored as an `INTEGER` column.
pub trait StoredEnum: Copy + Into<i64> + TryFrom<i64, Error = RcsError> + Send + Sync + 'static {
    /// Every variant in table order.
    const ALL: &'static [Self];

    /// Integer written to storage.
    fn code(self) -> i64 {
        self.into()
    }
}

macro_rules! stored_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
        )]
        #[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> i64 {
                match value {
                    $( $name::$variant => $value ),+
                }
            }
        }

        impl TryFrom<i64> for $name {
            type Error = RcsError;

            fn try_from(value: i64) -> Result<Self, RcsError> {
                match value {
                    $( $value => Ok($name::$variant), )+
                    _ => Err(RcsError::InvalidEncoding {
                        enum_name: stringify!($name),
                        value,
                    }),
                }
            }
        }

        impl StoredEnum for $name {
            const ALL: &'static [Self] = &[ $( $name::$variant ),+ ];
        }
    };
}

stored_enum! {
    /// Direction of a message or transfer relative to this device.
    Direction {
        Incoming = 0,
        Outgoing = 1,
        /// System events carry no direction.
        Irrelevant = 2,
    }
}

stored_enum! {
    /// Local read marker.
    ReadStatus {
        Unread = 0,
        Read = 1,
    }
}

stored_enum! {
    /// Lifecycle state of a chat message.
    MessageStatus {
        Rejected = 0,
        Queued = 1,
        Sending = 2,
        Sent = 3,
        Failed = 4,
        Delivered = 5,
        DisplayReportRequested = 6,
        Received = 7,
        Displayed = 8,
    }
}

stored_enum! {
    /// Why a chat message is in its current state.
    MessageReasonCode {
        Unspecified = 0,
        FailedSend = 1,
        FailedDelivery = 2,
        FailedDisplay = 3,
        RejectedSpam = 4,
        RejectedBySystem = 5,
    }
}

stored_enum! {
    /// Lifecycle state of a file transfer.
    FileTransferState {
        Invited = 0,
        Accepting = 1,
        Rejected = 2,
        Queued = 3,
        Initiating = 4,
        Started = 5,
        Paused = 6,
        Aborted = 7,
        Transferred = 8,
        Failed = 9,
        Delivered = 10,
        Displayed = 11,
    }
}

stored_enum! {
    /// Why a file transfer is in its current state.
    FileTransferReasonCode {
        Unspecified = 0,
        AbortedByUser = 1,
        AbortedByRemote = 2,
        AbortedBySystem = 3,
        RejectedBySecondaryDevice = 4,
        RejectedByTimeout = 5,
        RejectedSpam = 6,
        RejectedLowSpace = 7,
        RejectedMaxSize = 8,
        RejectedMaxFileTransfers = 9,
        RejectedByUser = 10,
        RejectedByRemote = 11,
        RejectedMediaFailed = 12,
        RejectedBySystem = 13,
        PausedBySystem = 14,
        PausedByUser = 15,
        FailedInitiation = 16,
        FailedDataTransfer = 17,
        FailedSaving = 18,
        FailedDelivery = 19,
        FailedDisplay = 20,
        FailedNotAllowedToSend = 21,
    }
}

stored_enum! {
    /// Status of a participant inside a group conversation.
    ParticipantStatus {
        InviteQueued = 0,
        Inviting = 1,
        Invited = 2,
        Connected = 3,
        Disconnected = 4,
        Departed = 5,
        Failed = 6,
        Declined = 7,
        Timeout = 8,
    }
}

stored_enum! {
    /// Lifecycle state of a group conversation.
    GroupChatState {
        Invited = 0,
        Rejected = 1,
        Accepting = 2,
        Started = 3,
        Aborted = 4,
        Failed = 5,
    }
}

stored_enum! {
    /// Per-recipient acknowledgement status of a group item.
    GroupDeliveryStatus {
        NotDelivered = 0,
        Delivered = 1,
        Displayed = 2,
        Failed = 3,
        Unsupported = 4,
    }
}

stored_enum! {
    /// Why a group delivery record is in its current status.
    GroupDeliveryReasonCode {
        Unspecified = 0,
        FailedDelivery = 1,
        FailedDisplay = 2,
    }
}

impl MessageStatus {
    /// Delivered or displayed: no further delivery tracking needed.
    pub fn is_acknowledged(self) -> bool {
        matches!(self, Self::Delivered | Self::Displayed)
    }
}

impl FileTransferState {
    /// Delivered or displayed: no further delivery tracking needed.
    pub fn is_acknowledged(self) -> bool {
        matches!(self, Self::Delivered | Self::Displayed)
    }

    /// States that only make sense while a session is alive.
    pub fn is_interrupted(self) -> bool {
        matches!(
            self,
            Self::Invited | Self::Accepting | Self::Initiating | Self::Started
        )
    }
}

impl ParticipantStatus {
    /// Participants in these statuses get a delivery record for every new
    /// outgoing group item.
    pub fn receives_fan_out(self) -> bool {
        matches!(
            self,
            Self::InviteQueued
                | Self::Inviting
                | Self::Invited
                | Self::Connected
                | Self::Disconnected
        )
    }
}

impl GroupChatState {
    /// The conversation can never carry traffic again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Aborted | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn assert_table<E: StoredEnum + std::fmt::Debug + PartialEq>(expected: &[(E, i64)]) {
        assert_eq!(E::ALL.len(), expected.len(), "table size mismatch");
        for (variant, code) in expected {
            assert_eq!(variant.code(), *code, "{variant:?}");
            assert_eq!(E::try_from(*code).unwrap(), *variant);
        }
    }

    #[test]
    fn message_status_table() {
        use MessageStatus::*;
        assert_table(&[
            (Rejected, 0),
            (Queued, 1),
            (Sending, 2),
            (Sent, 3),
            (Failed, 4),
            (Delivered, 5),
            (DisplayReportRequested, 6),
            (Received, 7),
            (Displayed, 8),
        ]);
    }

    #[test]
    fn message_reason_table() {
        use MessageReasonCode::*;
        assert_table(&[
            (Unspecified, 0),
            (FailedSend, 1),
            (FailedDelivery, 2),
            (FailedDisplay, 3),
            (RejectedSpam, 4),
            (RejectedBySystem, 5),
        ]);
    }

    #[test]
    fn file_transfer_state_table() {
        use FileTransferState::*;
        assert_table(&[
            (Invited, 0),
            (Accepting, 1),
            (Rejected, 2),
            (Queued, 3),
            (Initiating, 4),
            (Started, 5),
            (Paused, 6),
            (Aborted, 7),
            (Transferred, 8),
            (Failed, 9),
            (Delivered, 10),
            (Displayed, 11),
        ]);
    }

    #[test]
    fn file_transfer_reason_spot_checks() {
        use FileTransferReasonCode::*;
        assert_eq!(FileTransferReasonCode::ALL.len(), 22);
        assert_eq!(AbortedBySystem.code(), 3);
        assert_eq!(RejectedByTimeout.code(), 5);
        assert_eq!(RejectedBySystem.code(), 13);
        assert_eq!(PausedBySystem.code(), 14);
        assert_eq!(FailedInitiation.code(), 16);
        assert_eq!(FailedDataTransfer.code(), 17);
        assert_eq!(FailedNotAllowedToSend.code(), 21);
    }

    #[test]
    fn group_tables() {
        use GroupDeliveryStatus::*;
        assert_table(&[
            (NotDelivered, 0),
            (Delivered, 1),
            (Displayed, 2),
            (Failed, 3),
            (Unsupported, 4),
        ]);
        assert_table(&[
            (GroupDeliveryReasonCode::Unspecified, 0),
            (GroupDeliveryReasonCode::FailedDelivery, 1),
            (GroupDeliveryReasonCode::FailedDisplay, 2),
        ]);
        assert_eq!(ParticipantStatus::Timeout.code(), 8);
        assert_eq!(GroupChatState::Failed.code(), 5);
    }

    #[test]
    fn out_of_range_value_fails_loudly() {
        let err = MessageStatus::try_from(9).unwrap_err();
        match err {
            RcsError::InvalidEncoding { enum_name, value } => {
                assert_eq!(enum_name, "MessageStatus");
                assert_eq!(value, 9);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(FileTransferState::try_from(-1).is_err());
        assert!(GroupDeliveryStatus::try_from(5).is_err());
    }

    #[test]
    fn fan_out_statuses() {
        let eligible: Vec<_> = ParticipantStatus::ALL
            .iter()
            .copied()
            .filter(|s| s.receives_fan_out())
            .collect();
        assert_eq!(
            eligible,
            vec![
                ParticipantStatus::InviteQueued,
                ParticipantStatus::Inviting,
                ParticipantStatus::Invited,
                ParticipantStatus::Connected,
                ParticipantStatus::Disconnected,
            ]
        );
    }

    #[test]
    fn display_and_from_str_round_trip() {
        let s = FileTransferReasonCode::PausedBySystem.to_string();
        assert_eq!(s, "PAUSED_BY_SYSTEM");
        assert_eq!(
            FileTransferReasonCode::from_str(&s).unwrap(),
            FileTransferReasonCode::PausedBySystem
        );
    }

    #[test]
    fn serde_uses_screaming_case() {
        let json = serde_json::to_string(&MessageStatus::DisplayReportRequested).unwrap();
        assert_eq!(json, "\"DISPLAY_REPORT_REQUESTED\"");
    }

    proptest! {
        #[test]
        fn decoding_accepts_exactly_the_table(value in -50i64..50) {
            let decoded = FileTransferReasonCode::try_from(value);
            prop_assert_eq!(decoded.is_ok(), (0..=21).contains(&value));
            if let Ok(v) = decoded {
                prop_assert_eq!(v.code(), value);
            }
        }

        #[test]
        fn message_status_decoding_is_inverse(value in -20i64..20) {
            match MessageStatus::try_from(value) {
                Ok(status) => prop_assert_eq!(i64::from(status), value),
                Err(_) => prop_assert!(!(0..=8).contains(&value)),
            }
        }
    }
}
