// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat message CRUD operations.

use rcs_core::{ChatMessage, GroupDeliveryRecord, MessagePatch, MessageStatus, Predicate, RcsError};
use rusqlite::{params, OptionalExtension};

use crate::codec::{message_from_row, strict, MESSAGE_COLUMNS};
use crate::database::{map_tr_err, Database};
use crate::queries::{delete_item, insert_fan_out, select_where, update_where, DeletedItem};
use crate::sql::{message_assignments, where_clause, MESSAGES};

/// Insert a message and its group delivery rows in one transaction.
pub async fn insert_message(
    db: &Database,
    message: &ChatMessage,
    fan_out: &[GroupDeliveryRecord],
) -> Result<(), RcsError> {
    let m = message.clone();
    let fan_out = fan_out.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO chat_messages (id, conversation_id, remote_participant, direction, \
                 mime_type, content, state, reason_code, read_status, created_at, sent_at, \
                 delivered_at, displayed_at, delivery_deadline, delivery_expired) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    m.id,
                    m.conversation_id,
                    m.remote_participant,
                    i64::from(m.direction),
                    m.mime_type,
                    m.content,
                    i64::from(m.state),
                    i64::from(m.reason_code),
                    i64::from(m.read_status),
                    m.created_at,
                    m.sent_at,
                    m.delivered_at,
                    m.displayed_at,
                    m.delivery_deadline,
                    m.delivery_expired,
                ],
            )?;
            insert_fan_out(&tx, &fan_out)?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a message by id. Returns `None` if it does not exist.
pub async fn get_message(db: &Database, id: &str) -> Result<Option<ChatMessage>, RcsError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            strict(
                conn.query_row(
                    &format!("SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE id = ?1"),
                    params![id],
                    message_from_row,
                )
                .optional(),
            )
        })
        .await
        .map_err(map_tr_err)?
}

/// Apply a patch to every message matching `predicate`. Returns changed ids.
pub async fn update_messages(
    db: &Database,
    patch: &MessagePatch,
    predicate: &Predicate<MessageStatus>,
) -> Result<Vec<String>, RcsError> {
    let clause = where_clause(&MESSAGES, predicate)?;
    update_where(db, &MESSAGES, message_assignments(patch), clause).await
}

/// Messages matching `predicate`, oldest first.
pub async fn query_messages(
    db: &Database,
    predicate: &Predicate<MessageStatus>,
) -> Result<Vec<ChatMessage>, RcsError> {
    let clause = where_clause(&MESSAGES, predicate)?;
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE {} ORDER BY created_at ASC, id ASC",
        clause.sql
    );
    select_where(db, sql, clause.params, message_from_row).await
}

/// Delete a message and its group delivery rows.
pub async fn delete_message(db: &Database, id: &str) -> Result<DeletedItem, RcsError> {
    delete_item(db, &MESSAGES, id).await
}
