// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`DeliveryStore`] port.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use rcs_config::model::StorageConfig;
use rcs_core::{
    ChangeEvent, ChatMessage, DeliveryStore, FileTransfer, FileTransferPatch, FileTransferState,
    GroupChatState, GroupConversation, GroupDeliveryPatch, GroupDeliveryRecord,
    GroupDeliveryStatus, MessagePatch, MessageStatus, ParticipantStatus, Predicate, RcsError,
};

use crate::database::Database;
use crate::notifier::ChangeNotifier;
use crate::queries::{self, DeletedItem};

/// SQLite-backed delivery store.
///
/// Delegates every operation to the typed query modules and publishes one
/// [`ChangeEvent`] per affected resource after the write commits.
#[derive(Clone)]
pub struct SqliteDeliveryStore {
    db: Database,
    notifier: ChangeNotifier,
}

impl SqliteDeliveryStore {
    /// Open the database described by `config`.
    pub async fn open(config: &StorageConfig) -> Result<Self, RcsError> {
        let db = Database::open_with_options(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "delivery store ready");
        Ok(Self::from_database(db))
    }

    pub async fn open_in_memory() -> Result<Self, RcsError> {
        Ok(Self::from_database(Database::open_in_memory().await?))
    }

    pub fn from_database(db: Database) -> Self {
        Self {
            db,
            notifier: ChangeNotifier::default(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn fan_out_events(records: &[GroupDeliveryRecord]) -> impl Iterator<Item = ChangeEvent> + '_ {
        records.iter().map(|r| ChangeEvent::GroupDelivery {
            item_id: r.item_id.clone(),
            participant: r.participant.clone(),
        })
    }

    fn publish_deleted(&self, item: ChangeEvent, id: &str, deleted: DeletedItem) -> usize {
        if deleted.rows > 0 || !deleted.delivery_participants.is_empty() {
            self.notifier.publish(item);
            self.notifier
                .publish_all(deleted.delivery_participants.into_iter().map(|participant| {
                    ChangeEvent::GroupDelivery {
                        item_id: id.to_string(),
                        participant,
                    }
                }));
        }
        deleted.rows
    }
}

#[async_trait]
impl DeliveryStore for SqliteDeliveryStore {
    // --- Chat messages ---

    async fn insert_message(
        &self,
        message: &ChatMessage,
        fan_out: &[GroupDeliveryRecord],
    ) -> Result<(), RcsError> {
        queries::messages::insert_message(&self.db, message, fan_out).await?;
        self.notifier.publish(ChangeEvent::Message(message.id.clone()));
        self.notifier.publish_all(Self::fan_out_events(fan_out));
        Ok(())
    }

    async fn get_message(&self, id: &str) -> Result<Option<ChatMessage>, RcsError> {
        queries::messages::get_message(&self.db, id).await
    }

    async fn update_messages(
        &self,
        patch: &MessagePatch,
        predicate: &Predicate<MessageStatus>,
    ) -> Result<usize, RcsError> {
        let changed = queries::messages::update_messages(&self.db, patch, predicate).await?;
        let n = changed.len();
        self.notifier
            .publish_all(changed.into_iter().map(ChangeEvent::Message));
        Ok(n)
    }

    async fn query_messages(
        &self,
        predicate: &Predicate<MessageStatus>,
    ) -> Result<Vec<ChatMessage>, RcsError> {
        queries::messages::query_messages(&self.db, predicate).await
    }

    async fn delete_message(&self, id: &str) -> Result<usize, RcsError> {
        let deleted = queries::messages::delete_message(&self.db, id).await?;
        Ok(self.publish_deleted(ChangeEvent::Message(id.to_string()), id, deleted))
    }

    // --- File transfers ---

    async fn insert_file_transfer(
        &self,
        transfer: &FileTransfer,
        fan_out: &[GroupDeliveryRecord],
    ) -> Result<(), RcsError> {
        queries::file_transfers::insert_file_transfer(&self.db, transfer, fan_out).await?;
        self.notifier
            .publish(ChangeEvent::FileTransfer(transfer.id.clone()));
        self.notifier.publish_all(Self::fan_out_events(fan_out));
        Ok(())
    }

    async fn get_file_transfer(&self, id: &str) -> Result<Option<FileTransfer>, RcsError> {
        queries::file_transfers::get_file_transfer(&self.db, id).await
    }

    async fn update_file_transfers(
        &self,
        patch: &FileTransferPatch,
        predicate: &Predicate<FileTransferState>,
    ) -> Result<usize, RcsError> {
        let changed =
            queries::file_transfers::update_file_transfers(&self.db, patch, predicate).await?;
        let n = changed.len();
        self.notifier
            .publish_all(changed.into_iter().map(ChangeEvent::FileTransfer));
        Ok(n)
    }

    async fn query_file_transfers(
        &self,
        predicate: &Predicate<FileTransferState>,
    ) -> Result<Vec<FileTransfer>, RcsError> {
        queries::file_transfers::query_file_transfers(&self.db, predicate).await
    }

    async fn delete_file_transfer(&self, id: &str) -> Result<usize, RcsError> {
        let deleted = queries::file_transfers::delete_file_transfer(&self.db, id).await?;
        Ok(self.publish_deleted(ChangeEvent::FileTransfer(id.to_string()), id, deleted))
    }

    // --- Group conversations ---

    async fn upsert_group_chat(&self, chat: &GroupConversation) -> Result<(), RcsError> {
        queries::group_chats::upsert_group_chat(&self.db, chat).await?;
        self.notifier.publish(ChangeEvent::GroupChat(chat.id.clone()));
        Ok(())
    }

    async fn get_group_chat(&self, id: &str) -> Result<Option<GroupConversation>, RcsError> {
        queries::group_chats::get_group_chat(&self.db, id).await
    }

    async fn list_group_chats(&self) -> Result<Vec<GroupConversation>, RcsError> {
        queries::group_chats::list_group_chats(&self.db).await
    }

    async fn set_group_chat_state(
        &self,
        id: &str,
        state: GroupChatState,
    ) -> Result<usize, RcsError> {
        let n = queries::group_chats::set_group_chat_state(&self.db, id, state).await?;
        if n > 0 {
            self.notifier.publish(ChangeEvent::GroupChat(id.to_string()));
        }
        Ok(n)
    }

    async fn set_participant_status(
        &self,
        chat_id: &str,
        participant: &str,
        status: ParticipantStatus,
    ) -> Result<usize, RcsError> {
        let n =
            queries::group_chats::set_participant_status(&self.db, chat_id, participant, status)
                .await?;
        if n > 0 {
            self.notifier
                .publish(ChangeEvent::GroupChat(chat_id.to_string()));
        }
        Ok(n)
    }

    // --- Group delivery records ---

    async fn upsert_group_delivery(&self, record: &GroupDeliveryRecord) -> Result<(), RcsError> {
        queries::group_deliveries::upsert_group_delivery(&self.db, record).await?;
        self.notifier
            .publish_all(Self::fan_out_events(std::slice::from_ref(record)));
        Ok(())
    }

    async fn get_group_delivery(
        &self,
        item_id: &str,
        participant: &str,
    ) -> Result<Option<GroupDeliveryRecord>, RcsError> {
        queries::group_deliveries::get_group_delivery(&self.db, item_id, participant).await
    }

    async fn list_group_deliveries(
        &self,
        item_id: &str,
    ) -> Result<Vec<GroupDeliveryRecord>, RcsError> {
        queries::group_deliveries::list_group_deliveries(&self.db, item_id).await
    }

    async fn update_group_delivery(
        &self,
        item_id: &str,
        participant: &str,
        patch: &GroupDeliveryPatch,
        predicate: &Predicate<GroupDeliveryStatus>,
    ) -> Result<usize, RcsError> {
        let n = queries::group_deliveries::update_group_delivery(
            &self.db,
            item_id,
            participant,
            patch,
            predicate,
        )
        .await?;
        if n > 0 {
            self.notifier.publish(ChangeEvent::GroupDelivery {
                item_id: item_id.to_string(),
                participant: participant.to_string(),
            });
        }
        Ok(n)
    }

    async fn create_or_update_group_delivery(
        &self,
        record: &GroupDeliveryRecord,
        patch: &GroupDeliveryPatch,
        predicate: &Predicate<GroupDeliveryStatus>,
    ) -> Result<bool, RcsError> {
        let written = queries::group_deliveries::create_or_update_group_delivery(
            &self.db, record, patch, predicate,
        )
        .await?;
        if written {
            self.notifier
                .publish_all(Self::fan_out_events(std::slice::from_ref(record)));
        }
        Ok(written)
    }

    // --- Notifications and lifecycle ---

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.notifier.subscribe()
    }

    async fn close(&self) -> Result<(), RcsError> {
        self.db.checkpoint().await?;
        debug!("delivery store closed");
        Ok(())
    }
}
