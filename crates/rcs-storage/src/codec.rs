// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row decoding for every collection.
//!
//! Integer-encoded enum columns are decoded strictly: an unknown value
//! surfaces as `FromSqlConversionFailure` wrapping
//! [`RcsError::InvalidEncoding`](rcs_core::RcsError::InvalidEncoding).

use rcs_core::{ChatMessage, FileTransfer, GroupDeliveryRecord, RcsError, StoredEnum};
use rusqlite::Row;
use rusqlite::types::Type;

pub(crate) const MESSAGE_COLUMNS: &str = "id, conversation_id, remote_participant, direction, \
     mime_type, content, state, reason_code, read_status, created_at, sent_at, delivered_at, \
     displayed_at, delivery_deadline, delivery_expired";

pub(crate) const FILE_TRANSFER_COLUMNS: &str = "id, conversation_id, remote_participant, \
     direction, file_uri, file_name, mime_type, size, transferred_bytes, thumbnail_uri, \
     upload_transaction_id, download_uri, file_expires_at, thumbnail_expires_at, \
     remote_instance_id, state, reason_code, read_status, created_at, sent_at, delivered_at, \
     displayed_at, delivery_deadline, delivery_expired";

pub(crate) const GROUP_DELIVERY_COLUMNS: &str =
    "item_id, conversation_id, participant, status, reason_code, delivered_at, displayed_at";

pub(crate) fn decode<E: StoredEnum>(row: &Row<'_>, idx: usize) -> rusqlite::Result<E> {
    let raw: i64 = row.get(idx)?;
    E::try_from(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        remote_participant: row.get(2)?,
        direction: decode(row, 3)?,
        mime_type: row.get(4)?,
        content: row.get(5)?,
        state: decode(row, 6)?,
        reason_code: decode(row, 7)?,
        read_status: decode(row, 8)?,
        created_at: row.get(9)?,
        sent_at: row.get(10)?,
        delivered_at: row.get(11)?,
        displayed_at: row.get(12)?,
        delivery_deadline: row.get(13)?,
        delivery_expired: row.get(14)?,
    })
}

pub(crate) fn file_transfer_from_row(row: &Row<'_>) -> rusqlite::Result<FileTransfer> {
    Ok(FileTransfer {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        remote_participant: row.get(2)?,
        direction: decode(row, 3)?,
        file_uri: row.get(4)?,
        file_name: row.get(5)?,
        mime_type: row.get(6)?,
        size: row.get(7)?,
        transferred_bytes: row.get(8)?,
        thumbnail_uri: row.get(9)?,
        upload_transaction_id: row.get(10)?,
        download_uri: row.get(11)?,
        file_expires_at: row.get(12)?,
        thumbnail_expires_at: row.get(13)?,
        remote_instance_id: row.get(14)?,
        state: decode(row, 15)?,
        reason_code: decode(row, 16)?,
        read_status: decode(row, 17)?,
        created_at: row.get(18)?,
        sent_at: row.get(19)?,
        delivered_at: row.get(20)?,
        displayed_at: row.get(21)?,
        delivery_deadline: row.get(22)?,
        delivery_expired: row.get(23)?,
    })
}

pub(crate) fn group_delivery_from_row(row: &Row<'_>) -> rusqlite::Result<GroupDeliveryRecord> {
    Ok(GroupDeliveryRecord {
        item_id: row.get(0)?,
        conversation_id: row.get(1)?,
        participant: row.get(2)?,
        status: decode(row, 3)?,
        reason_code: decode(row, 4)?,
        delivered_at: row.get(5)?,
        displayed_at: row.get(6)?,
    })
}

/// Whether a row failed only because a stored value could not be decoded.
pub(crate) fn is_corrupt_row(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::FromSqlConversionFailure(..) | rusqlite::Error::InvalidColumnType(..)
    )
}

/// Lift an enum decoding failure out of a single-row lookup so callers see
/// [`RcsError::InvalidEncoding`] rather than a generic storage error.
pub(crate) fn strict<T>(result: rusqlite::Result<T>) -> rusqlite::Result<Result<T, RcsError>> {
    match result {
        Err(rusqlite::Error::FromSqlConversionFailure(idx, ty, source)) => {
            match source.downcast::<RcsError>() {
                Ok(e) => Ok(Err(*e)),
                Err(source) => Err(rusqlite::Error::FromSqlConversionFailure(idx, ty, source)),
            }
        }
        other => other.map(Ok),
    }
}
