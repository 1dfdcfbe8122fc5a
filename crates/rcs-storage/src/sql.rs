// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Translation of port predicates and patches into SQLite fragments.
//!
//! Fragments use positional `?` placeholders; parameters are pushed in the
//! same order the placeholders appear in the generated text.

use rcs_core::{
    FileTransferPatch, GroupDeliveryPatch, MessagePatch, Predicate, RcsError, ReadStatus,
    StoredEnum,
};
use rusqlite::types::Value;

/// Static description of one table.
pub(crate) struct Collection {
    pub table: &'static str,
    pub id_column: &'static str,
    pub state_column: &'static str,
    pub columns: &'static [&'static str],
}

impl Collection {
    fn require(&self, column: &str) -> Result<(), RcsError> {
        if self.columns.contains(&column) {
            Ok(())
        } else {
            Err(RcsError::InvalidPredicate(format!(
                "{} has no column `{column}`",
                self.table
            )))
        }
    }
}

const ITEM_COLUMNS: &[&str] = &[
    "conversation_id",
    "remote_participant",
    "direction",
    "reason_code",
    "read_status",
    "delivered_at",
    "displayed_at",
    "delivery_deadline",
    "delivery_expired",
];

pub(crate) static MESSAGES: Collection = Collection {
    table: "chat_messages",
    id_column: "id",
    state_column: "state",
    columns: ITEM_COLUMNS,
};

pub(crate) static FILE_TRANSFERS: Collection = Collection {
    table: "file_transfers",
    id_column: "id",
    state_column: "state",
    columns: &[
        "conversation_id",
        "remote_participant",
        "direction",
        "reason_code",
        "read_status",
        "delivered_at",
        "displayed_at",
        "delivery_deadline",
        "delivery_expired",
        "download_uri",
    ],
};

pub(crate) static GROUP_DELIVERIES: Collection = Collection {
    table: "group_deliveries",
    id_column: "item_id",
    state_column: "status",
    columns: &["conversation_id", "reason_code", "delivered_at", "displayed_at"],
};

/// A WHERE clause body with its parameters.
#[derive(Debug)]
pub(crate) struct Clause {
    pub sql: String,
    pub params: Vec<Value>,
}

pub(crate) fn where_clause<S: StoredEnum>(
    collection: &Collection,
    predicate: &Predicate<S>,
) -> Result<Clause, RcsError> {
    let mut params = Vec::new();
    let sql = compile(collection, predicate, &mut params)?;
    Ok(Clause { sql, params })
}

/// Larger id sets bind as a single JSON array so a statement never runs into
/// SQLite's host parameter limit.
const MAX_INLINE_IDS: usize = 500;

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn compile<S: StoredEnum>(
    c: &Collection,
    predicate: &Predicate<S>,
    params: &mut Vec<Value>,
) -> Result<String, RcsError> {
    let sql = match predicate {
        Predicate::True => "1".to_string(),
        Predicate::All(parts) | Predicate::Any(parts) if parts.is_empty() => {
            if matches!(predicate, Predicate::All(_)) {
                "1".to_string()
            } else {
                "0".to_string()
            }
        }
        Predicate::All(parts) => join(c, parts, " AND ", params)?,
        Predicate::Any(parts) => join(c, parts, " OR ", params)?,
        Predicate::IdIn(ids) => {
            if ids.is_empty() {
                return Ok("0".to_string());
            }
            if ids.len() > MAX_INLINE_IDS {
                let array = serde_json::to_string(ids)
                    .map_err(|e| RcsError::Internal(format!("encoding id set: {e}")))?;
                params.push(Value::Text(array));
                format!("{} IN (SELECT value FROM json_each(?))", c.id_column)
            } else {
                params.extend(ids.iter().cloned().map(Value::Text));
                format!("{} IN ({})", c.id_column, placeholders(ids.len()))
            }
        }
        Predicate::StateIn(states) => {
            if states.is_empty() {
                return Ok("0".to_string());
            }
            params.extend(states.iter().map(|s| Value::Integer(s.code())));
            format!("{} IN ({})", c.state_column, placeholders(states.len()))
        }
        Predicate::StateNotIn(states) => {
            if states.is_empty() {
                return Ok("1".to_string());
            }
            params.extend(states.iter().map(|s| Value::Integer(s.code())));
            format!("{} NOT IN ({})", c.state_column, placeholders(states.len()))
        }
        Predicate::ReasonIn(codes) => {
            c.require("reason_code")?;
            if codes.is_empty() {
                return Ok("0".to_string());
            }
            params.extend(codes.iter().copied().map(Value::Integer));
            format!("reason_code IN ({})", placeholders(codes.len()))
        }
        Predicate::ConversationIs(id) => {
            c.require("conversation_id")?;
            params.push(Value::Text(id.clone()));
            "conversation_id = ?".to_string()
        }
        Predicate::DirectionIs(direction) => {
            c.require("direction")?;
            params.push(Value::Integer(direction.code()));
            "direction = ?".to_string()
        }
        Predicate::OneToOne => {
            c.require("remote_participant")?;
            "remote_participant = conversation_id".to_string()
        }
        Predicate::Group => {
            c.require("remote_participant")?;
            "(remote_participant IS NULL OR remote_participant <> conversation_id)".to_string()
        }
        Predicate::Unread => {
            c.require("read_status")?;
            params.push(Value::Integer(ReadStatus::Unread.code()));
            "read_status = ?".to_string()
        }
        Predicate::DeliveredAtUnset => {
            c.require("delivered_at")?;
            "delivered_at = 0".to_string()
        }
        Predicate::DisplayedAtUnset => {
            c.require("displayed_at")?;
            "displayed_at = 0".to_string()
        }
        Predicate::DeadlineArmed => {
            c.require("delivery_deadline")?;
            "(delivery_deadline <> 0 AND delivery_expired = 0)".to_string()
        }
        Predicate::DownloadUriSet => {
            c.require("download_uri")?;
            "download_uri IS NOT NULL".to_string()
        }
    };
    Ok(sql)
}

fn join<S: StoredEnum>(
    c: &Collection,
    parts: &[Predicate<S>],
    separator: &str,
    params: &mut Vec<Value>,
) -> Result<String, RcsError> {
    let compiled = parts
        .iter()
        .map(|p| compile(c, p, params).map(|sql| format!("({sql})")))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(compiled.join(separator))
}

/// `col = ?` assignments for an UPDATE.
pub(crate) type Assignments = Vec<(&'static str, Value)>;

/// Assignment whose right-hand side keeps an already-set delivery time.
const FILL_DELIVERED_AT: &str =
    "delivered_at = CASE WHEN delivered_at = 0 THEN ? ELSE delivered_at END";

pub(crate) fn set_clause(assignments: &Assignments) -> String {
    assignments
        .iter()
        .map(|(column, _)| {
            if column.contains('?') {
                (*column).to_string()
            } else {
                format!("{column} = ?")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn push<T>(out: &mut Assignments, column: &'static str, value: Option<T>, f: impl Fn(T) -> Value) {
    if let Some(v) = value {
        out.push((column, f(v)));
    }
}

fn flag(v: bool) -> Value {
    Value::Integer(i64::from(v))
}

fn nullable(v: Option<String>) -> Value {
    v.map(Value::Text).unwrap_or(Value::Null)
}

pub(crate) fn message_assignments(patch: &MessagePatch) -> Assignments {
    let mut out = Vec::new();
    push(&mut out, "state", patch.state, |s| Value::Integer(s.code()));
    push(&mut out, "reason_code", patch.reason_code, |r| Value::Integer(r.code()));
    push(&mut out, "read_status", patch.read_status, |r| Value::Integer(r.code()));
    push(&mut out, "created_at", patch.created_at, Value::Integer);
    push(&mut out, "sent_at", patch.sent_at, Value::Integer);
    push(&mut out, "delivered_at", patch.delivered_at, Value::Integer);
    push(&mut out, "displayed_at", patch.displayed_at, Value::Integer);
    push(&mut out, "delivery_deadline", patch.delivery_deadline, Value::Integer);
    push(&mut out, "delivery_expired", patch.delivery_expired, flag);
    out
}

pub(crate) fn file_transfer_assignments(patch: &FileTransferPatch) -> Assignments {
    let mut out = Vec::new();
    push(&mut out, "state", patch.state, |s| Value::Integer(s.code()));
    push(&mut out, "reason_code", patch.reason_code, |r| Value::Integer(r.code()));
    push(&mut out, "read_status", patch.read_status, |r| Value::Integer(r.code()));
    push(&mut out, "created_at", patch.created_at, Value::Integer);
    push(&mut out, "sent_at", patch.sent_at, Value::Integer);
    push(&mut out, "delivered_at", patch.delivered_at, Value::Integer);
    push(&mut out, "displayed_at", patch.displayed_at, Value::Integer);
    push(&mut out, "delivery_deadline", patch.delivery_deadline, Value::Integer);
    push(&mut out, "delivery_expired", patch.delivery_expired, flag);
    push(&mut out, "transferred_bytes", patch.transferred_bytes, Value::Integer);
    push(&mut out, "file_expires_at", patch.file_expires_at, Value::Integer);
    push(&mut out, "thumbnail_expires_at", patch.thumbnail_expires_at, Value::Integer);
    push(
        &mut out,
        "upload_transaction_id",
        patch.upload_transaction_id.clone(),
        nullable,
    );
    push(&mut out, "download_uri", patch.download_uri.clone(), nullable);
    push(
        &mut out,
        "remote_instance_id",
        patch.remote_instance_id.clone(),
        nullable,
    );
    out
}

pub(crate) fn group_delivery_assignments(patch: &GroupDeliveryPatch) -> Assignments {
    let mut out = Vec::new();
    push(&mut out, "status", patch.status, |s| Value::Integer(s.code()));
    push(&mut out, "reason_code", patch.reason_code, |r| Value::Integer(r.code()));
    push(&mut out, "delivered_at", patch.delivered_at, Value::Integer);
    push(&mut out, "displayed_at", patch.displayed_at, Value::Integer);
    push(&mut out, FILL_DELIVERED_AT, patch.fill_delivered_at, Value::Integer);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcs_core::{Direction, FileTransferState, GroupDeliveryStatus, MessageStatus};

    #[test]
    fn nested_predicate_keeps_parameter_order() {
        let p = Predicate::Any(vec![
            Predicate::state(FileTransferState::Queued),
            Predicate::All(vec![
                Predicate::state(FileTransferState::Started),
                Predicate::DirectionIs(Direction::Outgoing),
                Predicate::DownloadUriSet,
            ]),
        ]);
        let clause = where_clause(&FILE_TRANSFERS, &p).unwrap();
        assert_eq!(
            clause.sql,
            "(state IN (?)) OR ((state IN (?)) AND (direction = ?) AND (download_uri IS NOT NULL))"
        );
        assert_eq!(
            clause.params,
            vec![Value::Integer(3), Value::Integer(5), Value::Integer(1)]
        );
    }

    #[test]
    fn empty_sets_are_constant() {
        let none: Predicate<MessageStatus> = Predicate::IdIn(vec![]);
        assert_eq!(where_clause(&MESSAGES, &none).unwrap().sql, "0");
        let all: Predicate<MessageStatus> = Predicate::StateNotIn(vec![]);
        assert_eq!(where_clause(&MESSAGES, &all).unwrap().sql, "1");
        let any: Predicate<MessageStatus> = Predicate::Any(vec![]);
        assert_eq!(where_clause(&MESSAGES, &any).unwrap().sql, "0");
    }

    #[test]
    fn missing_column_is_rejected() {
        let p: Predicate<MessageStatus> = Predicate::DownloadUriSet;
        assert!(matches!(
            where_clause(&MESSAGES, &p),
            Err(RcsError::InvalidPredicate(_))
        ));
        let p: Predicate<GroupDeliveryStatus> = Predicate::DeadlineArmed;
        assert!(where_clause(&GROUP_DELIVERIES, &p).is_err());
    }

    #[test]
    fn large_id_set_binds_one_parameter() {
        let ids: Vec<String> = (0..=MAX_INLINE_IDS).map(|i| format!("m{i}")).collect();
        let p: Predicate<MessageStatus> = Predicate::IdIn(ids);
        let clause = where_clause(&MESSAGES, &p).unwrap();
        assert_eq!(clause.sql, "id IN (SELECT value FROM json_each(?))");
        assert_eq!(clause.params.len(), 1);

        let small: Predicate<MessageStatus> = Predicate::IdIn(vec!["a".into(), "b".into()]);
        let clause = where_clause(&MESSAGES, &small).unwrap();
        assert_eq!(clause.sql, "id IN (?, ?)");
    }

    #[test]
    fn fill_assignment_keeps_existing_delivery_time() {
        let patch = GroupDeliveryPatch {
            status: Some(GroupDeliveryStatus::Displayed),
            fill_delivered_at: Some(9),
            ..GroupDeliveryPatch::default()
        };
        assert_eq!(
            set_clause(&group_delivery_assignments(&patch)),
            "status = ?, delivered_at = CASE WHEN delivered_at = 0 THEN ? ELSE delivered_at END"
        );
    }

    #[test]
    fn group_delivery_state_uses_status_column() {
        let p = Predicate::StateNotIn(vec![GroupDeliveryStatus::Displayed]);
        assert_eq!(
            where_clause(&GROUP_DELIVERIES, &p).unwrap().sql,
            "status NOT IN (?)"
        );
    }

    #[test]
    fn patch_assignments_skip_untouched_columns() {
        let patch = MessagePatch {
            state: Some(MessageStatus::Delivered),
            delivered_at: Some(42),
            delivery_expired: Some(false),
            ..MessagePatch::default()
        };
        let assignments = message_assignments(&patch);
        assert_eq!(
            set_clause(&assignments),
            "state = ?, delivered_at = ?, delivery_expired = ?"
        );

        let clear = FileTransferPatch {
            download_uri: Some(None),
            ..FileTransferPatch::default()
        };
        let assignments = file_transfer_assignments(&clear);
        assert_eq!(assignments, vec![("download_uri", Value::Null)]);
    }
}
