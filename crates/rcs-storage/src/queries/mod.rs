// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for CRUD operations on each collection.
//!
//! Shared helpers here implement the collection-independent parts: guarded
//! bulk updates that report which rows changed, and ordered scans that skip
//! rows whose stored values cannot be decoded.

pub mod file_transfers;
pub mod group_chats;
pub mod group_deliveries;
pub mod messages;

use rcs_core::{GroupDeliveryRecord, RcsError};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};
use tracing::error;

use crate::codec::is_corrupt_row;
use crate::database::{map_tr_err, Database};
use crate::sql::{set_clause, Assignments, Clause, Collection};

/// Rows removed by deleting one item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletedItem {
    pub rows: usize,
    /// Participants whose group delivery rows were removed with the item.
    pub delivery_participants: Vec<String>,
}

/// Apply `assignments` to every row matching `clause`; returns the ids of the
/// rows changed. Select and update run in one transaction.
pub(crate) async fn update_where(
    db: &Database,
    collection: &'static Collection,
    assignments: Assignments,
    clause: Clause,
) -> Result<Vec<String>, RcsError> {
    if assignments.is_empty() {
        return Ok(Vec::new());
    }
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let ids: Vec<String> = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {} FROM {} WHERE {}",
                    collection.id_column, collection.table, clause.sql
                ))?;
                let rows =
                    stmt.query_map(params_from_iter(clause.params.iter()), |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };
            if !ids.is_empty() {
                let sql = format!(
                    "UPDATE {} SET {} WHERE {}",
                    collection.table,
                    set_clause(&assignments),
                    clause.sql
                );
                let values = assignments
                    .iter()
                    .map(|(_, v)| v)
                    .chain(clause.params.iter());
                tx.execute(&sql, params_from_iter(values))?;
            }
            tx.commit()?;
            Ok(ids)
        })
        .await
        .map_err(map_tr_err)
}

/// Ordered scan. Rows that fail to decode are logged and skipped so that a
/// single corrupt row never hides the rest of the collection.
pub(crate) async fn select_where<T, F>(
    db: &Database,
    sql: String,
    params: Vec<Value>,
    map_row: F,
) -> Result<Vec<T>, RcsError>
where
    T: Send + 'static,
    F: Fn(&Row<'_>) -> rusqlite::Result<T> + Send + 'static,
{
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(params.iter()), |row| map_row(row))?;
            let mut out = Vec::new();
            for row in rows {
                match row {
                    Ok(item) => out.push(item),
                    Err(e) if is_corrupt_row(&e) => {
                        error!(error = %e, "skipping undecodable row");
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete one message or file transfer together with its delivery rows.
pub(crate) async fn delete_item(
    db: &Database,
    collection: &'static Collection,
    id: &str,
) -> Result<DeletedItem, RcsError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let participants: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT participant FROM group_deliveries WHERE item_id = ?1 \
                     ORDER BY participant",
                )?;
                let rows = stmt.query_map(params![id], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };
            let rows = tx.execute(
                &format!("DELETE FROM {} WHERE id = ?1", collection.table),
                params![id],
            )?;
            tx.execute("DELETE FROM group_deliveries WHERE item_id = ?1", params![id])?;
            tx.commit()?;
            Ok(DeletedItem {
                rows,
                delivery_participants: participants,
            })
        })
        .await
        .map_err(map_tr_err)
}

pub(crate) fn insert_fan_out(
    tx: &rusqlite::Transaction<'_>,
    records: &[GroupDeliveryRecord],
) -> Result<(), rusqlite::Error> {
    let mut stmt = tx.prepare(
        "INSERT INTO group_deliveries (item_id, conversation_id, participant, status, \
         reason_code, delivered_at, displayed_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for record in records {
        stmt.execute(params![
            record.item_id,
            record.conversation_id,
            record.participant,
            i64::from(record.status),
            i64::from(record.reason_code),
            record.delivered_at,
            record.displayed_at,
        ])?;
    }
    Ok(())
}
