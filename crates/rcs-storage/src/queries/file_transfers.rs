// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File transfer CRUD operations.

use rcs_core::{
    FileTransfer, FileTransferPatch, FileTransferState, GroupDeliveryRecord, Predicate, RcsError,
};
use rusqlite::{params, OptionalExtension};

use crate::codec::{file_transfer_from_row, strict, FILE_TRANSFER_COLUMNS};
use crate::database::{map_tr_err, Database};
use crate::queries::{delete_item, insert_fan_out, select_where, update_where, DeletedItem};
use crate::sql::{file_transfer_assignments, where_clause, FILE_TRANSFERS};

/// Insert a file transfer and its group delivery rows in one transaction.
pub async fn insert_file_transfer(
    db: &Database,
    transfer: &FileTransfer,
    fan_out: &[GroupDeliveryRecord],
) -> Result<(), RcsError> {
    let ft = transfer.clone();
    let fan_out = fan_out.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO file_transfers (id, conversation_id, remote_participant, direction, \
                 file_uri, file_name, mime_type, size, transferred_bytes, thumbnail_uri, \
                 upload_transaction_id, download_uri, file_expires_at, thumbnail_expires_at, \
                 remote_instance_id, state, reason_code, read_status, created_at, sent_at, \
                 delivered_at, displayed_at, delivery_deadline, delivery_expired) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                 ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
                params![
                    ft.id,
                    ft.conversation_id,
                    ft.remote_participant,
                    i64::from(ft.direction),
                    ft.file_uri,
                    ft.file_name,
                    ft.mime_type,
                    ft.size,
                    ft.transferred_bytes,
                    ft.thumbnail_uri,
                    ft.upload_transaction_id,
                    ft.download_uri,
                    ft.file_expires_at,
                    ft.thumbnail_expires_at,
                    ft.remote_instance_id,
                    i64::from(ft.state),
                    i64::from(ft.reason_code),
                    i64::from(ft.read_status),
                    ft.created_at,
                    ft.sent_at,
                    ft.delivered_at,
                    ft.displayed_at,
                    ft.delivery_deadline,
                    ft.delivery_expired,
                ],
            )?;
            insert_fan_out(&tx, &fan_out)?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a file transfer by id. Returns `None` if it does not exist.
pub async fn get_file_transfer(db: &Database, id: &str) -> Result<Option<FileTransfer>, RcsError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            strict(
                conn.query_row(
                    &format!("SELECT {FILE_TRANSFER_COLUMNS} FROM file_transfers WHERE id = ?1"),
                    params![id],
                    file_transfer_from_row,
                )
                .optional(),
            )
        })
        .await
        .map_err(map_tr_err)?
}

/// Apply a patch to every transfer matching `predicate`. Returns changed ids.
pub async fn update_file_transfers(
    db: &Database,
    patch: &FileTransferPatch,
    predicate: &Predicate<FileTransferState>,
) -> Result<Vec<String>, RcsError> {
    let clause = where_clause(&FILE_TRANSFERS, predicate)?;
    update_where(db, &FILE_TRANSFERS, file_transfer_assignments(patch), clause).await
}

/// Transfers matching `predicate`, oldest first.
pub async fn query_file_transfers(
    db: &Database,
    predicate: &Predicate<FileTransferState>,
) -> Result<Vec<FileTransfer>, RcsError> {
    let clause = where_clause(&FILE_TRANSFERS, predicate)?;
    let sql = format!(
        "SELECT {FILE_TRANSFER_COLUMNS} FROM file_transfers WHERE {} \
         ORDER BY created_at ASC, id ASC",
        clause.sql
    );
    select_where(db, sql, clause.params, file_transfer_from_row).await
}

/// Delete a transfer and its group delivery rows.
pub async fn delete_file_transfer(db: &Database, id: &str) -> Result<DeletedItem, RcsError> {
    delete_item(db, &FILE_TRANSFERS, id).await
}
