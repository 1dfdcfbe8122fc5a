// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence port over messages, file transfers, group chats and group
//! delivery records.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::RcsError;
use crate::events::ChangeEvent;
use crate::predicate::{FileTransferPatch, GroupDeliveryPatch, MessagePatch, Predicate};
use crate::states::{
    FileTransferState, GroupChatState, GroupDeliveryStatus, MessageStatus, ParticipantStatus,
};
use crate::types::{ChatMessage, FileTransfer, GroupConversation, GroupDeliveryRecord};

/// Record store used as the single source of truth by every engine component.
///
/// Every mutation that changes at least one row publishes exactly one
/// [`ChangeEvent`] per affected resource once the write is committed.
/// Queries return rows ordered by creation timestamp, oldest first.
#[async_trait]
pub trait DeliveryStore: Send + Sync + 'static {
    // --- Chat messages ---

    /// Insert a message together with its group delivery rows. Either all rows
    /// are written or none.
    async fn insert_message(
        &self,
        message: &ChatMessage,
        fan_out: &[GroupDeliveryRecord],
    ) -> Result<(), RcsError>;

    async fn get_message(&self, id: &str) -> Result<Option<ChatMessage>, RcsError>;

    /// Apply `patch` to every row matching `predicate`. Returns rows affected.
    async fn update_messages(
        &self,
        patch: &MessagePatch,
        predicate: &Predicate<MessageStatus>,
    ) -> Result<usize, RcsError>;

    async fn query_messages(
        &self,
        predicate: &Predicate<MessageStatus>,
    ) -> Result<Vec<ChatMessage>, RcsError>;

    /// Delete a message and its group delivery rows.
    async fn delete_message(&self, id: &str) -> Result<usize, RcsError>;

    /// Apply `patch` to one message if it also matches `predicate`.
    async fn update_message(
        &self,
        id: &str,
        patch: &MessagePatch,
        predicate: &Predicate<MessageStatus>,
    ) -> Result<usize, RcsError> {
        let scoped = Predicate::id(id).and(predicate.clone());
        self.update_messages(patch, &scoped).await
    }

    // --- File transfers ---

    async fn insert_file_transfer(
        &self,
        transfer: &FileTransfer,
        fan_out: &[GroupDeliveryRecord],
    ) -> Result<(), RcsError>;

    async fn get_file_transfer(&self, id: &str) -> Result<Option<FileTransfer>, RcsError>;

    async fn update_file_transfers(
        &self,
        patch: &FileTransferPatch,
        predicate: &Predicate<FileTransferState>,
    ) -> Result<usize, RcsError>;

    async fn query_file_transfers(
        &self,
        predicate: &Predicate<FileTransferState>,
    ) -> Result<Vec<FileTransfer>, RcsError>;

    async fn delete_file_transfer(&self, id: &str) -> Result<usize, RcsError>;

    async fn update_file_transfer(
        &self,
        id: &str,
        patch: &FileTransferPatch,
        predicate: &Predicate<FileTransferState>,
    ) -> Result<usize, RcsError> {
        let scoped = Predicate::id(id).and(predicate.clone());
        self.update_file_transfers(patch, &scoped).await
    }

    // --- Group conversations ---

    /// Insert or replace a conversation and its roster.
    async fn upsert_group_chat(&self, chat: &GroupConversation) -> Result<(), RcsError>;

    async fn get_group_chat(&self, id: &str) -> Result<Option<GroupConversation>, RcsError>;

    async fn list_group_chats(&self) -> Result<Vec<GroupConversation>, RcsError>;

    async fn set_group_chat_state(
        &self,
        id: &str,
        state: GroupChatState,
    ) -> Result<usize, RcsError>;

    /// Insert or update one participant of an existing conversation.
    async fn set_participant_status(
        &self,
        chat_id: &str,
        participant: &str,
        status: ParticipantStatus,
    ) -> Result<usize, RcsError>;

    // --- Group delivery records ---

    /// Insert or replace by `(item_id, participant)`.
    async fn upsert_group_delivery(&self, record: &GroupDeliveryRecord) -> Result<(), RcsError>;

    async fn get_group_delivery(
        &self,
        item_id: &str,
        participant: &str,
    ) -> Result<Option<GroupDeliveryRecord>, RcsError>;

    async fn list_group_deliveries(
        &self,
        item_id: &str,
    ) -> Result<Vec<GroupDeliveryRecord>, RcsError>;

    async fn update_group_delivery(
        &self,
        item_id: &str,
        participant: &str,
        patch: &GroupDeliveryPatch,
        predicate: &Predicate<GroupDeliveryStatus>,
    ) -> Result<usize, RcsError>;

    /// Insert `record` when its `(item_id, participant)` has no row yet,
    /// otherwise apply `patch` if the stored row matches `predicate`. Both
    /// steps run in one transaction. Returns whether a row was written.
    async fn create_or_update_group_delivery(
        &self,
        record: &GroupDeliveryRecord,
        patch: &GroupDeliveryPatch,
        predicate: &Predicate<GroupDeliveryStatus>,
    ) -> Result<bool, RcsError>;

    // --- Notifications and lifecycle ---

    /// Receiver for change events published after this call.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;

    /// Flush pending writes and release the connection.
    async fn close(&self) -> Result<(), RcsError>;
}
