// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Group conversation and roster operations.

use std::collections::BTreeMap;

use rcs_core::{GroupChatState, GroupConversation, ParticipantStatus, RcsError};
use rusqlite::{params, OptionalExtension};

use crate::codec::decode;
use crate::database::{map_tr_err, Database};

/// Insert or replace a conversation and its whole roster.
pub async fn upsert_group_chat(db: &Database, chat: &GroupConversation) -> Result<(), RcsError> {
    let chat = chat.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO group_chats (id, subject, state, rejoin_token, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(id) DO UPDATE SET subject = excluded.subject, \
                 state = excluded.state, rejoin_token = excluded.rejoin_token",
                params![
                    chat.id,
                    chat.subject,
                    i64::from(chat.state),
                    chat.rejoin_token,
                    chat.created_at,
                ],
            )?;
            tx.execute(
                "DELETE FROM group_chat_participants WHERE chat_id = ?1",
                params![chat.id],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO group_chat_participants (chat_id, participant, status) \
                     VALUES (?1, ?2, ?3)",
                )?;
                for (participant, status) in &chat.participants {
                    stmt.execute(params![chat.id, participant, i64::from(*status)])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a conversation with its roster. Returns `None` if it does not exist.
pub async fn get_group_chat(
    db: &Database,
    id: &str,
) -> Result<Option<GroupConversation>, RcsError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| load_chat(conn, &id))
        .await
        .map_err(map_tr_err)
}

/// Every conversation, oldest first.
pub async fn list_group_chats(db: &Database) -> Result<Vec<GroupConversation>, RcsError> {
    db.connection()
        .call(|conn| {
            let ids: Vec<String> = {
                let mut stmt =
                    conn.prepare("SELECT id FROM group_chats ORDER BY created_at ASC, id ASC")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };
            let mut chats = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(chat) = load_chat(conn, &id)? {
                    chats.push(chat);
                }
            }
            Ok(chats)
        })
        .await
        .map_err(map_tr_err)
}

/// Update the conversation state. Returns rows affected.
pub async fn set_group_chat_state(
    db: &Database,
    id: &str,
    state: GroupChatState,
) -> Result<usize, RcsError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE group_chats SET state = ?1 WHERE id = ?2",
                params![i64::from(state), id],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Insert or update one participant. Returns 0 when the conversation is unknown.
pub async fn set_participant_status(
    db: &Database,
    chat_id: &str,
    participant: &str,
    status: ParticipantStatus,
) -> Result<usize, RcsError> {
    let chat_id = chat_id.to_string();
    let participant = participant.to_string();
    db.connection()
        .call(move |conn| {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM group_chats WHERE id = ?1",
                    params![chat_id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Ok(0);
            }
            conn.execute(
                "INSERT INTO group_chat_participants (chat_id, participant, status) \
                 VALUES (?1, ?2, ?3) \
                 ON CONFLICT(chat_id, participant) DO UPDATE SET status = excluded.status",
                params![chat_id, participant, i64::from(status)],
            )
        })
        .await
        .map_err(map_tr_err)
}

fn load_chat(
    conn: &rusqlite::Connection,
    id: &str,
) -> Result<Option<GroupConversation>, rusqlite::Error> {
    let header = conn
        .query_row(
            "SELECT id, subject, state, rejoin_token, created_at FROM group_chats WHERE id = ?1",
            params![id],
            |row| {
                Ok(GroupConversation {
                    id: row.get(0)?,
                    subject: row.get(1)?,
                    participants: BTreeMap::new(),
                    state: decode(row, 2)?,
                    rejoin_token: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )
        .optional()?;

    let Some(mut chat) = header else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT participant, status FROM group_chat_participants WHERE chat_id = ?1",
    )?;
    let rows = stmt.query_map(params![id], |row| {
        Ok((row.get::<_, String>(0)?, decode::<ParticipantStatus>(row, 1)?))
    })?;
    for row in rows {
        let (participant, status) = row?;
        chat.participants.insert(participant, status);
    }
    Ok(Some(chat))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(id: &str, created_at: i64) -> GroupConversation {
        GroupConversation {
            id: id.into(),
            subject: Some("weekend".into()),
            participants: BTreeMap::from([
                ("+1".to_string(), ParticipantStatus::Connected),
                ("+2".to_string(), ParticipantStatus::Departed),
            ]),
            state: GroupChatState::Started,
            rejoin_token: Some("sip:rejoin@example".into()),
            created_at,
        }
    }

    #[tokio::test]
    async fn upsert_get_and_replace_roster() {
        let db = Database::open_in_memory().await.unwrap();
        let mut g = chat("g1", 5);
        upsert_group_chat(&db, &g).await.unwrap();
        assert_eq!(get_group_chat(&db, "g1").await.unwrap().unwrap(), g);

        g.participants.remove("+2");
        g.participants.insert("+3".into(), ParticipantStatus::InviteQueued);
        g.state = GroupChatState::Aborted;
        upsert_group_chat(&db, &g).await.unwrap();
        assert_eq!(get_group_chat(&db, "g1").await.unwrap().unwrap(), g);

        assert!(get_group_chat(&db, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn participant_and_state_updates() {
        let db = Database::open_in_memory().await.unwrap();
        upsert_group_chat(&db, &chat("g1", 1)).await.unwrap();

        assert_eq!(
            set_participant_status(&db, "g1", "+2", ParticipantStatus::Connected)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            set_participant_status(&db, "g1", "+9", ParticipantStatus::Inviting)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            set_participant_status(&db, "missing", "+9", ParticipantStatus::Inviting)
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            set_group_chat_state(&db, "g1", GroupChatState::Failed)
                .await
                .unwrap(),
            1
        );

        let g = get_group_chat(&db, "g1").await.unwrap().unwrap();
        assert_eq!(g.participants["+2"], ParticipantStatus::Connected);
        assert_eq!(g.participants["+9"], ParticipantStatus::Inviting);
        assert_eq!(g.state, GroupChatState::Failed);
    }

    #[tokio::test]
    async fn list_is_ordered_by_creation() {
        let db = Database::open_in_memory().await.unwrap();
        upsert_group_chat(&db, &chat("b", 2)).await.unwrap();
        upsert_group_chat(&db, &chat("a", 3)).await.unwrap();
        upsert_group_chat(&db, &chat("c", 1)).await.unwrap();
        let ids: Vec<_> = list_group_chats(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }
}
