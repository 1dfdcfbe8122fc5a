// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Group delivery record operations, keyed by `(item_id, participant)`.

use rcs_core::{GroupDeliveryPatch, GroupDeliveryRecord, GroupDeliveryStatus, Predicate, RcsError};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};

use crate::codec::{group_delivery_from_row, strict, GROUP_DELIVERY_COLUMNS};
use crate::database::{map_tr_err, Database};
use crate::queries::{select_where, update_where};
use crate::sql::{group_delivery_assignments, set_clause, where_clause, Clause, GROUP_DELIVERIES};

const INSERT_RECORD: &str = "INSERT INTO group_deliveries (item_id, conversation_id, \
     participant, status, reason_code, delivered_at, displayed_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

/// Insert or replace by composite key.
pub async fn upsert_group_delivery(
    db: &Database,
    record: &GroupDeliveryRecord,
) -> Result<(), RcsError> {
    let r = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "{INSERT_RECORD} ON CONFLICT(item_id, participant) DO UPDATE SET \
                     conversation_id = excluded.conversation_id, status = excluded.status, \
                     reason_code = excluded.reason_code, delivered_at = excluded.delivered_at, \
                     displayed_at = excluded.displayed_at"
                ),
                params_from_iter(record_params(&r)),
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Insert `record` if its key is free, otherwise apply `patch` when the
/// stored row matches `predicate`. Returns whether a row was written.
pub async fn create_or_update_group_delivery(
    db: &Database,
    record: &GroupDeliveryRecord,
    patch: &GroupDeliveryPatch,
    predicate: &Predicate<GroupDeliveryStatus>,
) -> Result<bool, RcsError> {
    let clause = participant_clause(&record.item_id, &record.participant, predicate)?;
    let assignments = group_delivery_assignments(patch);
    let r = record.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                &format!("{INSERT_RECORD} ON CONFLICT(item_id, participant) DO NOTHING"),
                params_from_iter(record_params(&r)),
            )?;
            let updated = if inserted == 0 && !assignments.is_empty() {
                let sql = format!(
                    "UPDATE group_deliveries SET {} WHERE {}",
                    set_clause(&assignments),
                    clause.sql
                );
                let values = assignments
                    .iter()
                    .map(|(_, v)| v)
                    .chain(clause.params.iter());
                tx.execute(&sql, params_from_iter(values))?
            } else {
                0
            };
            tx.commit()?;
            Ok(inserted + updated > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_group_delivery(
    db: &Database,
    item_id: &str,
    participant: &str,
) -> Result<Option<GroupDeliveryRecord>, RcsError> {
    let item_id = item_id.to_string();
    let participant = participant.to_string();
    db.connection()
        .call(move |conn| {
            strict(
                conn.query_row(
                    &format!(
                        "SELECT {GROUP_DELIVERY_COLUMNS} FROM group_deliveries \
                         WHERE item_id = ?1 AND participant = ?2"
                    ),
                    params![item_id, participant],
                    group_delivery_from_row,
                )
                .optional(),
            )
        })
        .await
        .map_err(map_tr_err)?
}

/// All decodable records of one item, ordered by participant.
pub async fn list_group_deliveries(
    db: &Database,
    item_id: &str,
) -> Result<Vec<GroupDeliveryRecord>, RcsError> {
    select_where(
        db,
        format!(
            "SELECT {GROUP_DELIVERY_COLUMNS} FROM group_deliveries \
             WHERE item_id = ? ORDER BY participant ASC"
        ),
        vec![Value::Text(item_id.to_string())],
        group_delivery_from_row,
    )
    .await
}

/// Guarded update of one record. Returns rows affected.
pub async fn update_group_delivery(
    db: &Database,
    item_id: &str,
    participant: &str,
    patch: &GroupDeliveryPatch,
    predicate: &Predicate<GroupDeliveryStatus>,
) -> Result<usize, RcsError> {
    let clause = participant_clause(item_id, participant, predicate)?;
    let changed = update_where(db, &GROUP_DELIVERIES, group_delivery_assignments(patch), clause)
        .await?;
    Ok(changed.len())
}

fn participant_clause(
    item_id: &str,
    participant: &str,
    predicate: &Predicate<GroupDeliveryStatus>,
) -> Result<Clause, RcsError> {
    let scoped = Predicate::id(item_id).and(predicate.clone());
    let mut clause = where_clause(&GROUP_DELIVERIES, &scoped)?;
    clause.sql = format!("({}) AND participant = ?", clause.sql);
    clause.params.push(Value::Text(participant.to_string()));
    Ok(clause)
}

fn record_params(r: &GroupDeliveryRecord) -> [Value; 7] {
    [
        Value::Text(r.item_id.clone()),
        Value::Text(r.conversation_id.clone()),
        Value::Text(r.participant.clone()),
        Value::Integer(i64::from(r.status)),
        Value::Integer(i64::from(r.reason_code)),
        Value::Integer(r.delivered_at),
        Value::Integer(r.displayed_at),
    ]
}
