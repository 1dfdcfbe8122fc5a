// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat message state machine.
//!
//! Every write is a guarded update through the store, so repeating an
//! operation whose guard no longer holds affects zero rows instead of
//! failing. `DELIVERED` and `DISPLAYED` are only reachable through the
//! timestamped entry points.

use std::sync::Arc;

use rcs_core::{
    ChatMessage, DeliveryStore, Direction, MessagePatch, MessageReasonCode, MessageStatus,
    Predicate, RcsError, ReadStatus, Timestamp,
};
use tracing::debug;

use crate::group_tracker::fan_out_records;

#[derive(Clone)]
pub struct MessageStateMachine {
    store: Arc<dyn DeliveryStore>,
}

impl MessageStateMachine {
    pub fn new(store: Arc<dyn DeliveryStore>) -> Self {
        Self { store }
    }

    /// Persist a new message in `state`. Outgoing group messages get one
    /// delivery record per eligible participant, written in the same
    /// transaction as the message.
    pub async fn create(
        &self,
        mut message: ChatMessage,
        state: MessageStatus,
        reason_code: MessageReasonCode,
    ) -> Result<ChatMessage, RcsError> {
        reject_acknowledged(&message.id, state)?;
        message.state = state;
        message.reason_code = reason_code;

        let fan_out = if message.direction == Direction::Outgoing && !message.is_one_to_one() {
            let chat = self
                .store
                .get_group_chat(&message.conversation_id)
                .await?
                .ok_or_else(|| RcsError::group_chat_not_found(&message.conversation_id))?;
            fan_out_records(&chat, &message.id)
        } else {
            Vec::new()
        };

        self.store.insert_message(&message, &fan_out).await?;
        debug!(
            item_id = %message.id,
            state = %state,
            recipients = fan_out.len(),
            "chat message created"
        );
        Ok(message)
    }

    /// Load a message, failing with `NotFound` when it does not exist.
    pub async fn get(&self, id: &str) -> Result<ChatMessage, RcsError> {
        self.store
            .get_message(id)
            .await?
            .ok_or_else(|| RcsError::message_not_found(id))
    }

    pub async fn find(&self, id: &str) -> Result<Option<ChatMessage>, RcsError> {
        self.store.get_message(id).await
    }

    /// Generic state change. `DELIVERED` and `DISPLAYED` are rejected with
    /// [`RcsError::IllegalTransition`].
    pub async fn transition(
        &self,
        id: &str,
        state: MessageStatus,
        reason_code: MessageReasonCode,
    ) -> Result<usize, RcsError> {
        self.transition_guarded(id, state, reason_code, Predicate::True)
            .await
    }

    /// State change applied only while the message is in one of `from`.
    pub async fn transition_from(
        &self,
        id: &str,
        from: &[MessageStatus],
        state: MessageStatus,
        reason_code: MessageReasonCode,
    ) -> Result<usize, RcsError> {
        self.transition_guarded(id, state, reason_code, Predicate::StateIn(from.to_vec()))
            .await
    }

    async fn transition_guarded(
        &self,
        id: &str,
        state: MessageStatus,
        reason_code: MessageReasonCode,
        guard: Predicate<MessageStatus>,
    ) -> Result<usize, RcsError> {
        reject_acknowledged(id, state)?;
        let rows = self
            .store
            .update_message(id, &MessagePatch::state(state, reason_code), &guard)
            .await?;
        debug!(item_id = %id, state = %state, reason = %reason_code, rows, "message transition");
        Ok(rows)
    }

    /// Set `DELIVERED` and the delivery timestamp in one write. Returns 0 if
    /// the message was already delivered or displayed.
    pub async fn mark_delivered(
        &self,
        id: &str,
        delivered_at: Timestamp,
    ) -> Result<usize, RcsError> {
        let patch = MessagePatch {
            state: Some(MessageStatus::Delivered),
            reason_code: Some(MessageReasonCode::Unspecified),
            delivered_at: Some(delivered_at),
            delivery_expired: Some(false),
            ..MessagePatch::default()
        };
        let guard = Predicate::DeliveredAtUnset
            .and(Predicate::StateNotIn(vec![MessageStatus::Displayed]));
        self.store.update_message(id, &patch, &guard).await
    }

    /// Set `DISPLAYED` and the display timestamp in one write. Returns 0 if
    /// the message was already displayed.
    pub async fn mark_displayed(
        &self,
        id: &str,
        displayed_at: Timestamp,
    ) -> Result<usize, RcsError> {
        let patch = MessagePatch {
            state: Some(MessageStatus::Displayed),
            reason_code: Some(MessageReasonCode::Unspecified),
            displayed_at: Some(displayed_at),
            delivery_expired: Some(false),
            ..MessagePatch::default()
        };
        self.store
            .update_message(id, &patch, &Predicate::DisplayedAtUnset)
            .await
    }

    pub async fn mark_read(&self, id: &str) -> Result<usize, RcsError> {
        let patch = MessagePatch {
            read_status: Some(ReadStatus::Read),
            ..MessagePatch::default()
        };
        self.store.update_message(id, &patch, &Predicate::Unread).await
    }

    /// Move a queued message to `SENDING`, re-timestamping it.
    pub async fn dequeue(
        &self,
        id: &str,
        created_at: Timestamp,
        sent_at: Timestamp,
    ) -> Result<usize, RcsError> {
        let patch = MessagePatch {
            created_at: Some(created_at),
            sent_at: Some(sent_at),
            ..MessagePatch::state(MessageStatus::Sending, MessageReasonCode::Unspecified)
        };
        self.store
            .update_message(id, &patch, &Predicate::state(MessageStatus::Queued))
            .await
    }

    pub async fn set_delivery_deadline(
        &self,
        id: &str,
        deadline: Timestamp,
    ) -> Result<usize, RcsError> {
        let patch = MessagePatch {
            delivery_deadline: Some(deadline),
            delivery_expired: Some(false),
            ..MessagePatch::default()
        };
        self.store.update_message(id, &patch, &Predicate::True).await
    }

    /// Flag an armed, unacknowledged message as expired. State is untouched.
    pub async fn mark_expired(&self, id: &str) -> Result<usize, RcsError> {
        let patch = MessagePatch {
            delivery_expired: Some(true),
            ..MessagePatch::default()
        };
        let guard = Predicate::DeadlineArmed.and(Predicate::StateNotIn(vec![
            MessageStatus::Delivered,
            MessageStatus::Displayed,
        ]));
        self.store.update_message(id, &patch, &guard).await
    }

    /// Reset deadline bookkeeping for every id in `ids`.
    pub async fn clear_delivery_expiration(&self, ids: &[String]) -> Result<usize, RcsError> {
        let patch = MessagePatch {
            delivery_deadline: Some(0),
            delivery_expired: Some(false),
            ..MessagePatch::default()
        };
        self.store
            .update_messages(&patch, &Predicate::IdIn(ids.to_vec()))
            .await
    }

    /// Fail every queued outgoing message of a group conversation.
    pub async fn fail_queued_in_group(&self, conversation_id: &str) -> Result<usize, RcsError> {
        let predicate = Predicate::All(vec![
            Predicate::Group,
            Predicate::ConversationIs(conversation_id.to_string()),
            Predicate::DirectionIs(Direction::Outgoing),
            Predicate::state(MessageStatus::Queued),
        ]);
        self.store
            .update_messages(
                &MessagePatch::state(MessageStatus::Failed, MessageReasonCode::FailedSend),
                &predicate,
            )
            .await
    }

    pub async fn query(
        &self,
        predicate: &Predicate<MessageStatus>,
    ) -> Result<Vec<ChatMessage>, RcsError> {
        self.store.query_messages(predicate).await
    }

    /// Delete a message and its group delivery records.
    pub async fn delete(&self, id: &str) -> Result<usize, RcsError> {
        self.store.delete_message(id).await
    }
}

fn reject_acknowledged(id: &str, state: MessageStatus) -> Result<(), RcsError> {
    if state.is_acknowledged() {
        return Err(RcsError::IllegalTransition {
            item_id: id.to_string(),
            state: state.to_string(),
        });
    }
    Ok(())
}
