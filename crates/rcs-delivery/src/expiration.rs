// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery expiration monitor.
//!
//! Outgoing one-to-one items carry a delivery deadline. The monitor records
//! it, arms a wake-up with the external alarm facility and, when the wake-up
//! comes due, flags the item as expired if it is still unacknowledged.
//! Expiry never changes the item's state.

use std::sync::Arc;

use rcs_config::model::DeliveryConfig;
use rcs_core::{
    AlarmKey, AlarmScheduler, Clock, Direction, FileTransferState, ItemKind, MessageStatus,
    Predicate, RcsError, Timestamp,
};
use tracing::{debug, info};

use crate::file_transfers::FileTransferStateMachine;
use crate::messages::MessageStateMachine;

/// Outcome of re-arming deadlines after a restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RearmReport {
    pub armed: usize,
    pub expired: usize,
}

#[derive(Clone)]
pub struct ExpirationMonitor {
    messages: MessageStateMachine,
    transfers: FileTransferStateMachine,
    alarms: Arc<dyn AlarmScheduler>,
    clock: Arc<dyn Clock>,
    config: DeliveryConfig,
}

impl ExpirationMonitor {
    pub fn new(
        messages: MessageStateMachine,
        transfers: FileTransferStateMachine,
        alarms: Arc<dyn AlarmScheduler>,
        clock: Arc<dyn Clock>,
        config: DeliveryConfig,
    ) -> Self {
        Self {
            messages,
            transfers,
            alarms,
            clock,
            config,
        }
    }

    /// Deadline for an item sent at `sent_at`, or 0 when deadlines are off.
    pub fn deadline_for(&self, sent_at: Timestamp) -> Timestamp {
        self.config.deadline_for(sent_at)
    }

    /// Record `deadline_at` on the item and arm its wake-up. A deadline that
    /// has already passed fires at once. Returns whether the item expired
    /// during this call.
    pub async fn schedule_deadline(
        &self,
        kind: ItemKind,
        item_id: &str,
        participant: &str,
        deadline_at: Timestamp,
    ) -> Result<bool, RcsError> {
        if deadline_at <= 0 {
            return Ok(false);
        }
        let rows = match kind {
            ItemKind::Message => {
                self.messages
                    .set_delivery_deadline(item_id, deadline_at)
                    .await?
            }
            ItemKind::FileTransfer => {
                self.transfers
                    .set_delivery_deadline(item_id, deadline_at)
                    .await?
            }
        };
        if rows == 0 {
            return Err(not_found(kind, item_id));
        }

        let key = AlarmKey::new(kind, item_id, participant);
        if deadline_at <= self.clock.now_millis() {
            return self.on_alarm(&key).await;
        }
        self.alarms.arm(key, deadline_at);
        debug!(%kind, item_id, deadline_at, "delivery deadline armed");
        Ok(false)
    }

    /// Wake-up callback. Flags the item expired unless it was acknowledged
    /// meanwhile. Returns whether it expired.
    pub async fn on_alarm(&self, key: &AlarmKey) -> Result<bool, RcsError> {
        let rows = match key.kind {
            ItemKind::Message => self.messages.mark_expired(&key.item_id).await?,
            ItemKind::FileTransfer => self.transfers.mark_expired(&key.item_id).await?,
        };
        self.alarms.cancel(key);
        if rows > 0 {
            info!(kind = %key.kind, item_id = %key.item_id, "delivery expired");
        }
        Ok(rows > 0)
    }

    /// Cancel wake-ups and reset deadline bookkeeping for `ids`.
    pub async fn clear_expiration(
        &self,
        kind: ItemKind,
        ids: &[String],
    ) -> Result<usize, RcsError> {
        if ids.is_empty() {
            return Ok(0);
        }
        match kind {
            ItemKind::Message => {
                for m in self.messages.query(&Predicate::IdIn(ids.to_vec())).await? {
                    self.alarms.cancel(&AlarmKey::new(
                        kind,
                        &m.id,
                        participant_of(&m.remote_participant, &m.conversation_id),
                    ));
                }
                self.messages.clear_delivery_expiration(ids).await
            }
            ItemKind::FileTransfer => {
                for ft in self.transfers.query(&Predicate::IdIn(ids.to_vec())).await? {
                    self.alarms.cancel(&AlarmKey::new(
                        kind,
                        &ft.id,
                        participant_of(&ft.remote_participant, &ft.conversation_id),
                    ));
                }
                self.transfers.clear_delivery_expiration(ids).await
            }
        }
    }

    /// Cancel the wake-up of one item without touching the store.
    pub fn cancel_alarm(&self, kind: ItemKind, item_id: &str, participant: &str) {
        self.alarms.cancel(&AlarmKey::new(kind, item_id, participant));
    }

    /// Re-arm every pending one-to-one deadline after a restart. Deadlines
    /// that passed while the process was down fire immediately.
    pub async fn rearm_at_start(&self) -> Result<RearmReport, RcsError> {
        let now = self.clock.now_millis();
        let mut report = RearmReport::default();

        let messages = self
            .messages
            .query(&Predicate::All(vec![
                Predicate::OneToOne,
                Predicate::DirectionIs(Direction::Outgoing),
                Predicate::DeadlineArmed,
                Predicate::StateNotIn(vec![MessageStatus::Delivered, MessageStatus::Displayed]),
            ]))
            .await?;
        let transfers = self
            .transfers
            .query(&Predicate::All(vec![
                Predicate::OneToOne,
                Predicate::DirectionIs(Direction::Outgoing),
                Predicate::DeadlineArmed,
                Predicate::StateNotIn(vec![
                    FileTransferState::Delivered,
                    FileTransferState::Displayed,
                ]),
            ]))
            .await?;

        let pending = messages
            .iter()
            .map(|m| {
                (
                    ItemKind::Message,
                    &m.id,
                    participant_of(&m.remote_participant, &m.conversation_id),
                    m.delivery_deadline,
                )
            })
            .chain(transfers.iter().map(|ft| {
                (
                    ItemKind::FileTransfer,
                    &ft.id,
                    participant_of(&ft.remote_participant, &ft.conversation_id),
                    ft.delivery_deadline,
                )
            }));

        for (kind, id, participant, deadline) in pending {
            let key = AlarmKey::new(kind, id, participant);
            if deadline > now {
                self.alarms.arm(key, deadline);
                report.armed += 1;
            } else if self.on_alarm(&key).await? {
                report.expired += 1;
            }
        }

        info!(
            armed = report.armed,
            expired = report.expired,
            "delivery deadlines re-armed"
        );
        Ok(report)
    }
}

/// Alarm participant of an item: the remote party, or the conversation for
/// items without one.
pub(crate) fn participant_of<'a>(remote: &'a Option<String>, conversation_id: &'a str) -> &'a str {
    remote.as_deref().unwrap_or(conversation_id)
}

fn not_found(kind: ItemKind, id: &str) -> RcsError {
    match kind {
        ItemKind::Message => RcsError::message_not_found(id),
        ItemKind::FileTransfer => RcsError::file_transfer_not_found(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcs_core::{DeliveryStore, FileTransferReasonCode, MessageReasonCode};
    use rcs_storage::SqliteDeliveryStore;
    use rcs_test_utils::{fixtures, FixedClock, ManualAlarmScheduler};

    struct Fixture {
        monitor: ExpirationMonitor,
        messages: MessageStateMachine,
        transfers: FileTransferStateMachine,
        alarms: Arc<ManualAlarmScheduler>,
        clock: Arc<FixedClock>,
    }

    async fn fixture() -> Fixture {
        let store: Arc<dyn DeliveryStore> =
            Arc::new(SqliteDeliveryStore::open_in_memory().await.unwrap());
        let messages = MessageStateMachine::new(store.clone());
        let transfers = FileTransferStateMachine::new(store);
        let alarms = Arc::new(ManualAlarmScheduler::new());
        let clock = Arc::new(FixedClock::new(1_000));
        let monitor = ExpirationMonitor::new(
            messages.clone(),
            transfers.clone(),
            alarms.clone(),
            clock.clone(),
            DeliveryConfig::default(),
        );
        Fixture {
            monitor,
            messages,
            transfers,
            alarms,
            clock,
        }
    }

    async fn sent_message(f: &Fixture, id: &str) {
        f.messages
            .create(
                fixtures::outgoing_message(id, "+100", 10),
                MessageStatus::Sent,
                MessageReasonCode::Unspecified,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn future_deadline_is_armed_then_expires_on_fire() {
        let f = fixture().await;
        sent_message(&f, "m1").await;

        let expired = f
            .monitor
            .schedule_deadline(ItemKind::Message, "m1", "+100", 5_000)
            .await
            .unwrap();
        assert!(!expired);
        let key = AlarmKey::new(ItemKind::Message, "m1", "+100");
        assert_eq!(f.alarms.armed_at(&key), Some(5_000));

        assert!(f.monitor.on_alarm(&key).await.unwrap());
        let m = f.messages.get("m1").await.unwrap();
        assert!(m.delivery_expired);
        assert_eq!(m.state, MessageStatus::Sent);
        assert_eq!(f.alarms.armed_at(&key), None);
    }

    #[tokio::test]
    async fn past_deadline_fires_immediately() {
        let f = fixture().await;
        sent_message(&f, "m1").await;
        let expired = f
            .monitor
            .schedule_deadline(ItemKind::Message, "m1", "+100", 500)
            .await
            .unwrap();
        assert!(expired);
        assert!(f.alarms.armed().is_empty());
    }

    #[tokio::test]
    async fn acknowledged_item_does_not_expire() {
        let f = fixture().await;
        sent_message(&f, "m1").await;
        f.monitor
            .schedule_deadline(ItemKind::Message, "m1", "+100", 5_000)
            .await
            .unwrap();
        f.messages.mark_delivered("m1", 2_000).await.unwrap();

        let key = AlarmKey::new(ItemKind::Message, "m1", "+100");
        assert!(!f.monitor.on_alarm(&key).await.unwrap());
        assert!(!f.messages.get("m1").await.unwrap().delivery_expired);
    }

    #[tokio::test]
    async fn clear_cancels_and_resets() {
        let f = fixture().await;
        sent_message(&f, "m1").await;
        f.monitor
            .schedule_deadline(ItemKind::Message, "m1", "+100", 5_000)
            .await
            .unwrap();

        let n = f
            .monitor
            .clear_expiration(ItemKind::Message, &["m1".to_string()])
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert!(f.alarms.armed().is_empty());
        let m = f.messages.get("m1").await.unwrap();
        assert_eq!((m.delivery_deadline, m.delivery_expired), (0, false));

        // Nothing armed any more: a stray wake-up is harmless.
        let key = AlarmKey::new(ItemKind::Message, "m1", "+100");
        assert!(!f.monitor.on_alarm(&key).await.unwrap());
    }

    #[tokio::test]
    async fn clear_accepts_more_ids_than_sqlite_can_bind() {
        let f = fixture().await;
        for id in ["m1", "m2", "m3"] {
            sent_message(&f, id).await;
            f.monitor
                .schedule_deadline(ItemKind::Message, id, "+100", 5_000)
                .await
                .unwrap();
        }
        let mut ids: Vec<String> = (0..40_000).map(|i| format!("gone-{i}")).collect();
        ids.extend(["m1".to_string(), "m2".to_string()]);

        let n = f
            .monitor
            .clear_expiration(ItemKind::Message, &ids)
            .await
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            f.alarms.armed().into_keys().collect::<Vec<_>>(),
            vec![AlarmKey::new(ItemKind::Message, "m3", "+100")]
        );
        assert_eq!(f.messages.get("m1").await.unwrap().delivery_deadline, 0);
        assert_eq!(f.messages.get("m3").await.unwrap().delivery_deadline, 5_000);

        let none = f
            .monitor
            .clear_expiration(ItemKind::FileTransfer, &ids)
            .await
            .unwrap();
        assert_eq!(none, 0);
    }

    #[tokio::test]
    async fn unknown_item_is_reported() {
        let f = fixture().await;
        let err = f
            .monitor
            .schedule_deadline(ItemKind::FileTransfer, "nope", "+1", 5_000)
            .await
            .unwrap_err();
        assert!(matches!(err, RcsError::NotFound { .. }));
    }

    #[tokio::test]
    async fn rearm_after_restart() {
        let f = fixture().await;
        for id in ["future", "past", "acked"] {
            sent_message(&f, id).await;
        }
        f.messages.set_delivery_deadline("future", 9_000).await.unwrap();
        f.messages.set_delivery_deadline("past", 900).await.unwrap();
        f.messages.set_delivery_deadline("acked", 9_000).await.unwrap();
        f.messages.mark_delivered("acked", 950).await.unwrap();

        f.transfers
            .create(
                fixtures::outgoing_transfer("ft1", "+100", 10),
                FileTransferState::Transferred,
                FileTransferReasonCode::Unspecified,
            )
            .await
            .unwrap();
        f.transfers.set_delivery_deadline("ft1", 7_000).await.unwrap();

        let report = f.monitor.rearm_at_start().await.unwrap();
        assert_eq!(report, RearmReport { armed: 2, expired: 1 });
        assert!(f.messages.get("past").await.unwrap().delivery_expired);
        assert_eq!(
            f.alarms
                .armed_at(&AlarmKey::new(ItemKind::FileTransfer, "ft1", "+100")),
            Some(7_000)
        );

        f.clock.set(10_000);
        let report = f.monitor.rearm_at_start().await.unwrap();
        assert_eq!(report, RearmReport { armed: 0, expired: 2 });
    }
}
