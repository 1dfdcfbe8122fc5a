// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File transfer state machine, including progress and HTTP bookkeeping.

use std::sync::Arc;

use rcs_core::{
    DeliveryStore, Direction, FileTransfer, FileTransferPatch, FileTransferReasonCode,
    FileTransferState, Predicate, RcsError, ReadStatus, Timestamp,
};
use tracing::debug;

use crate::group_tracker::fan_out_records;

#[derive(Clone)]
pub struct FileTransferStateMachine {
    store: Arc<dyn DeliveryStore>,
}

impl FileTransferStateMachine {
    pub fn new(store: Arc<dyn DeliveryStore>) -> Self {
        Self { store }
    }

    /// Persist a new transfer in `state`, fanning out delivery records for
    /// outgoing group transfers in the same transaction.
    pub async fn create(
        &self,
        mut transfer: FileTransfer,
        state: FileTransferState,
        reason_code: FileTransferReasonCode,
    ) -> Result<FileTransfer, RcsError> {
        reject_acknowledged(&transfer.id, state)?;
        transfer.state = state;
        transfer.reason_code = reason_code;

        let fan_out = if transfer.direction == Direction::Outgoing && !transfer.is_one_to_one() {
            let chat = self
                .store
                .get_group_chat(&transfer.conversation_id)
                .await?
                .ok_or_else(|| RcsError::group_chat_not_found(&transfer.conversation_id))?;
            fan_out_records(&chat, &transfer.id)
        } else {
            Vec::new()
        };

        self.store.insert_file_transfer(&transfer, &fan_out).await?;
        debug!(
            item_id = %transfer.id,
            state = %state,
            recipients = fan_out.len(),
            "file transfer created"
        );
        Ok(transfer)
    }

    pub async fn get(&self, id: &str) -> Result<FileTransfer, RcsError> {
        self.store
            .get_file_transfer(id)
            .await?
            .ok_or_else(|| RcsError::file_transfer_not_found(id))
    }

    pub async fn find(&self, id: &str) -> Result<Option<FileTransfer>, RcsError> {
        self.store.get_file_transfer(id).await
    }

    /// Generic state change; `DELIVERED` and `DISPLAYED` are rejected.
    pub async fn transition(
        &self,
        id: &str,
        state: FileTransferState,
        reason_code: FileTransferReasonCode,
    ) -> Result<usize, RcsError> {
        self.transition_guarded(id, state, reason_code, Predicate::True)
            .await
    }

    pub async fn transition_from(
        &self,
        id: &str,
        from: &[FileTransferState],
        state: FileTransferState,
        reason_code: FileTransferReasonCode,
    ) -> Result<usize, RcsError> {
        self.transition_guarded(id, state, reason_code, Predicate::StateIn(from.to_vec()))
            .await
    }

    async fn transition_guarded(
        &self,
        id: &str,
        state: FileTransferState,
        reason_code: FileTransferReasonCode,
        guard: Predicate<FileTransferState>,
    ) -> Result<usize, RcsError> {
        reject_acknowledged(id, state)?;
        let rows = self
            .store
            .update_file_transfer(id, &FileTransferPatch::state(state, reason_code), &guard)
            .await?;
        debug!(
            item_id = %id,
            state = %state,
            reason = %reason_code,
            rows,
            "file transfer transition"
        );
        Ok(rows)
    }

    pub async fn mark_delivered(
        &self,
        id: &str,
        delivered_at: Timestamp,
    ) -> Result<usize, RcsError> {
        let patch = FileTransferPatch {
            state: Some(FileTransferState::Delivered),
            reason_code: Some(FileTransferReasonCode::Unspecified),
            delivered_at: Some(delivered_at),
            delivery_expired: Some(false),
            ..FileTransferPatch::default()
        };
        let guard = Predicate::DeliveredAtUnset
            .and(Predicate::StateNotIn(vec![FileTransferState::Displayed]));
        self.store.update_file_transfer(id, &patch, &guard).await
    }

    pub async fn mark_displayed(
        &self,
        id: &str,
        displayed_at: Timestamp,
    ) -> Result<usize, RcsError> {
        let patch = FileTransferPatch {
            state: Some(FileTransferState::Displayed),
            reason_code: Some(FileTransferReasonCode::Unspecified),
            displayed_at: Some(displayed_at),
            delivery_expired: Some(false),
            ..FileTransferPatch::default()
        };
        self.store
            .update_file_transfer(id, &patch, &Predicate::DisplayedAtUnset)
            .await
    }

    pub async fn mark_read(&self, id: &str) -> Result<usize, RcsError> {
        let patch = FileTransferPatch {
            read_status: Some(ReadStatus::Read),
            ..FileTransferPatch::default()
        };
        self.store
            .update_file_transfer(id, &patch, &Predicate::Unread)
            .await
    }

    /// Move a queued transfer to `INITIATING`, re-timestamping it.
    pub async fn dequeue(
        &self,
        id: &str,
        created_at: Timestamp,
        sent_at: Timestamp,
    ) -> Result<usize, RcsError> {
        let patch = FileTransferPatch {
            created_at: Some(created_at),
            sent_at: Some(sent_at),
            ..FileTransferPatch::state(
                FileTransferState::Initiating,
                FileTransferReasonCode::Unspecified,
            )
        };
        self.store
            .update_file_transfer(id, &patch, &Predicate::state(FileTransferState::Queued))
            .await
    }

    /// Byte counter update with no state implication.
    pub async fn set_progress(&self, id: &str, transferred_bytes: i64) -> Result<usize, RcsError> {
        let patch = FileTransferPatch {
            transferred_bytes: Some(transferred_bytes),
            ..FileTransferPatch::default()
        };
        self.store
            .update_file_transfer(id, &patch, &Predicate::True)
            .await
    }

    /// Record a completed transfer.
    pub async fn set_transferred(
        &self,
        id: &str,
        size: i64,
        file_expires_at: Timestamp,
        thumbnail_expires_at: Timestamp,
        delivery_deadline: Timestamp,
    ) -> Result<usize, RcsError> {
        let patch = FileTransferPatch {
            transferred_bytes: Some(size),
            file_expires_at: Some(file_expires_at),
            thumbnail_expires_at: Some(thumbnail_expires_at),
            delivery_deadline: Some(delivery_deadline),
            delivery_expired: Some(false),
            ..FileTransferPatch::state(
                FileTransferState::Transferred,
                FileTransferReasonCode::Unspecified,
            )
        };
        let guard = Predicate::StateNotIn(vec![
            FileTransferState::Delivered,
            FileTransferState::Displayed,
        ]);
        self.store.update_file_transfer(id, &patch, &guard).await
    }

    /// The file info of an uploaded HTTP transfer was handed to the
    /// transport: the transfer is now `TRANSFERRED`.
    pub async fn file_info_dequeued(
        &self,
        id: &str,
        delivery_deadline: Timestamp,
    ) -> Result<usize, RcsError> {
        let patch = FileTransferPatch {
            delivery_deadline: Some(delivery_deadline),
            delivery_expired: Some(false),
            ..FileTransferPatch::state(
                FileTransferState::Transferred,
                FileTransferReasonCode::Unspecified,
            )
        };
        self.store
            .update_file_transfer(id, &patch, &Predicate::state(FileTransferState::Started))
            .await
    }

    pub async fn set_upload_transaction_id(
        &self,
        id: &str,
        transaction_id: Option<String>,
    ) -> Result<usize, RcsError> {
        let patch = FileTransferPatch {
            upload_transaction_id: Some(transaction_id),
            ..FileTransferPatch::default()
        };
        self.store
            .update_file_transfer(id, &patch, &Predicate::True)
            .await
    }

    pub async fn set_download_info(
        &self,
        id: &str,
        download_uri: impl Into<String>,
        file_expires_at: Timestamp,
    ) -> Result<usize, RcsError> {
        let patch = FileTransferPatch {
            download_uri: Some(Some(download_uri.into())),
            file_expires_at: Some(file_expires_at),
            ..FileTransferPatch::default()
        };
        self.store
            .update_file_transfer(id, &patch, &Predicate::True)
            .await
    }

    pub async fn set_remote_instance_id(
        &self,
        id: &str,
        instance_id: Option<String>,
    ) -> Result<usize, RcsError> {
        let patch = FileTransferPatch {
            remote_instance_id: Some(instance_id),
            ..FileTransferPatch::default()
        };
        self.store
            .update_file_transfer(id, &patch, &Predicate::True)
            .await
    }

    pub async fn set_delivery_deadline(
        &self,
        id: &str,
        deadline: Timestamp,
    ) -> Result<usize, RcsError> {
        let patch = FileTransferPatch {
            delivery_deadline: Some(deadline),
            delivery_expired: Some(false),
            ..FileTransferPatch::default()
        };
        self.store
            .update_file_transfer(id, &patch, &Predicate::True)
            .await
    }

    pub async fn mark_expired(&self, id: &str) -> Result<usize, RcsError> {
        let patch = FileTransferPatch {
            delivery_expired: Some(true),
            ..FileTransferPatch::default()
        };
        let guard = Predicate::DeadlineArmed.and(Predicate::StateNotIn(vec![
            FileTransferState::Delivered,
            FileTransferState::Displayed,
        ]));
        self.store.update_file_transfer(id, &patch, &guard).await
    }

    pub async fn clear_delivery_expiration(&self, ids: &[String]) -> Result<usize, RcsError> {
        let patch = FileTransferPatch {
            delivery_deadline: Some(0),
            delivery_expired: Some(false),
            ..FileTransferPatch::default()
        };
        self.store
            .update_file_transfers(&patch, &Predicate::IdIn(ids.to_vec()))
            .await
    }

    /// Fail every queued outgoing transfer of a group conversation.
    pub async fn fail_queued_in_group(&self, conversation_id: &str) -> Result<usize, RcsError> {
        let predicate = Predicate::All(vec![
            Predicate::Group,
            Predicate::ConversationIs(conversation_id.to_string()),
            Predicate::DirectionIs(Direction::Outgoing),
            Predicate::state(FileTransferState::Queued),
        ]);
        self.store
            .update_file_transfers(
                &FileTransferPatch::state(
                    FileTransferState::Failed,
                    FileTransferReasonCode::FailedNotAllowedToSend,
                ),
                &predicate,
            )
            .await
    }

    /// HTTP transfers paused by the system, oldest first. These are the
    /// candidates for an automatic resume once connectivity is back.
    pub async fn list_paused_by_system(&self) -> Result<Vec<FileTransfer>, RcsError> {
        let predicate = Predicate::state(FileTransferState::Paused)
            .and(Predicate::reason_in(&[FileTransferReasonCode::PausedBySystem]));
        self.store.query_file_transfers(&predicate).await
    }

    pub async fn query(
        &self,
        predicate: &Predicate<FileTransferState>,
    ) -> Result<Vec<FileTransfer>, RcsError> {
        self.store.query_file_transfers(predicate).await
    }

    pub async fn delete(&self, id: &str) -> Result<usize, RcsError> {
        self.store.delete_file_transfer(id).await
    }
}

fn reject_acknowledged(id: &str, state: FileTransferState) -> Result<(), RcsError> {
    if state.is_acknowledged() {
        return Err(RcsError::IllegalTransition {
            item_id: id.to_string(),
            state: state.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcs_core::ParticipantStatus;
    use rcs_storage::SqliteDeliveryStore;
    use rcs_test_utils::fixtures;

    async fn machine() -> (FileTransferStateMachine, Arc<dyn DeliveryStore>) {
        let store: Arc<dyn DeliveryStore> =
            Arc::new(SqliteDeliveryStore::open_in_memory().await.unwrap());
        (FileTransferStateMachine::new(store.clone()), store)
    }

    async fn queued(sm: &FileTransferStateMachine, id: &str) {
        sm.create(
            fixtures::outgoing_transfer(id, "+100", 10),
            FileTransferState::Queued,
            FileTransferReasonCode::Unspecified,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn msrp_lifecycle() {
        let (sm, _) = machine().await;
        queued(&sm, "ft1").await;

        assert_eq!(sm.dequeue("ft1", 40, 40).await.unwrap(), 1);
        assert_eq!(sm.get("ft1").await.unwrap().state, FileTransferState::Initiating);

        sm.transition("ft1", FileTransferState::Started, FileTransferReasonCode::Unspecified)
            .await
            .unwrap();
        sm.set_progress("ft1", 512).await.unwrap();
        let ft = sm.get("ft1").await.unwrap();
        assert_eq!((ft.state, ft.transferred_bytes), (FileTransferState::Started, 512));

        sm.set_transferred("ft1", 1024, 0, 0, 900).await.unwrap();
        let ft = sm.get("ft1").await.unwrap();
        assert_eq!(ft.state, FileTransferState::Transferred);
        assert_eq!(ft.transferred_bytes, 1024);
        assert_eq!(ft.delivery_deadline, 900);

        assert_eq!(sm.mark_delivered("ft1", 950).await.unwrap(), 1);
        assert_eq!(sm.mark_displayed("ft1", 990).await.unwrap(), 1);
        let ft = sm.get("ft1").await.unwrap();
        assert_eq!(ft.state, FileTransferState::Displayed);
        assert_eq!((ft.delivered_at, ft.displayed_at), (950, 990));
    }

    #[tokio::test]
    async fn generic_transition_rejects_acknowledged_states() {
        let (sm, _) = machine().await;
        queued(&sm, "ft1").await;
        let err = sm
            .transition("ft1", FileTransferState::Delivered, FileTransferReasonCode::Unspecified)
            .await
            .unwrap_err();
        assert!(matches!(err, RcsError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn guarded_transition_checks_current_state() {
        let (sm, _) = machine().await;
        queued(&sm, "ft1").await;
        let rows = sm
            .transition_from(
                "ft1",
                &[FileTransferState::Started],
                FileTransferState::Failed,
                FileTransferReasonCode::FailedDataTransfer,
            )
            .await
            .unwrap();
        assert_eq!(rows, 0);
        assert_eq!(sm.get("ft1").await.unwrap().state, FileTransferState::Queued);
    }

    #[tokio::test]
    async fn http_bookkeeping_and_file_info() {
        let (sm, _) = machine().await;
        queued(&sm, "ft1").await;
        sm.set_upload_transaction_id("ft1", Some("tid-1".into()))
            .await
            .unwrap();
        sm.transition("ft1", FileTransferState::Started, FileTransferReasonCode::Unspecified)
            .await
            .unwrap();
        sm.set_download_info("ft1", "https://ft.example/ab", 5_000)
            .await
            .unwrap();
        sm.set_remote_instance_id("ft1", Some("urn:gsma:imei:1".into()))
            .await
            .unwrap();

        assert_eq!(sm.file_info_dequeued("ft1", 1_234).await.unwrap(), 1);
        assert_eq!(sm.file_info_dequeued("ft1", 1_234).await.unwrap(), 0);

        let ft = sm.get("ft1").await.unwrap();
        assert_eq!(ft.state, FileTransferState::Transferred);
        assert_eq!(ft.download_uri.as_deref(), Some("https://ft.example/ab"));
        assert_eq!(ft.file_expires_at, 5_000);
        assert_eq!(ft.remote_instance_id.as_deref(), Some("urn:gsma:imei:1"));
        assert_eq!(ft.delivery_deadline, 1_234);

        sm.set_upload_transaction_id("ft1", None).await.unwrap();
        assert!(sm.get("ft1").await.unwrap().upload_transaction_id.is_none());
    }

    #[tokio::test]
    async fn paused_by_system_listing() {
        let (sm, _) = machine().await;
        for (id, created) in [("b", 20), ("a", 10), ("c", 30)] {
            sm.create(
                fixtures::outgoing_transfer(id, "+100", created),
                FileTransferState::Started,
                FileTransferReasonCode::Unspecified,
            )
            .await
            .unwrap();
        }
        for id in ["a", "b"] {
            sm.transition(id, FileTransferState::Paused, FileTransferReasonCode::PausedBySystem)
                .await
                .unwrap();
        }
        sm.transition("c", FileTransferState::Paused, FileTransferReasonCode::PausedByUser)
            .await
            .unwrap();

        let ids: Vec<_> = sm
            .list_paused_by_system()
            .await
            .unwrap()
            .into_iter()
            .map(|ft| ft.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn group_transfer_fan_out_and_terminal_failure() {
        let (sm, store) = machine().await;
        store
            .upsert_group_chat(&fixtures::group_chat(
                "g1",
                &[
                    ("+1", ParticipantStatus::Inviting),
                    ("+2", ParticipantStatus::Declined),
                ],
            ))
            .await
            .unwrap();
        sm.create(
            fixtures::outgoing_group_transfer("ft1", "g1", 10),
            FileTransferState::Queued,
            FileTransferReasonCode::Unspecified,
        )
        .await
        .unwrap();
        assert_eq!(store.list_group_deliveries("ft1").await.unwrap().len(), 1);

        assert_eq!(sm.fail_queued_in_group("g1").await.unwrap(), 1);
        let ft = sm.get("ft1").await.unwrap();
        assert_eq!(
            (ft.state, ft.reason_code),
            (
                FileTransferState::Failed,
                FileTransferReasonCode::FailedNotAllowedToSend
            )
        );
    }
}
