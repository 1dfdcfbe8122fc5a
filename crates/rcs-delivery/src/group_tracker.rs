// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-recipient delivery tracking for group items.
//!
//! Records follow the lattice `NOT_DELIVERED -> DELIVERED -> DISPLAYED`, with
//! `FAILED` reachable only from the first two. `DISPLAYED` is terminal.

use std::sync::Arc;

use rcs_core::{
    DeliveryStore, GroupConversation, GroupDeliveryPatch, GroupDeliveryReasonCode,
    GroupDeliveryRecord, GroupDeliveryStatus, Predicate, RcsError, Timestamp,
};
use tracing::debug;

/// One fresh record per participant eligible for fan-out.
pub fn fan_out_records(chat: &GroupConversation, item_id: &str) -> Vec<GroupDeliveryRecord> {
    chat.fan_out_participants()
        .map(|participant| GroupDeliveryRecord::pending(item_id, &chat.id, participant))
        .collect()
}

/// No record is still waiting for delivery. Failures with a delivery or
/// display reason block the aggregate; other failures do not. An item with
/// no records is vacuously delivered.
pub fn delivered_to_all(records: &[GroupDeliveryRecord]) -> bool {
    !records.iter().any(|r| match r.status {
        GroupDeliveryStatus::NotDelivered => true,
        GroupDeliveryStatus::Failed => matches!(
            r.reason_code,
            GroupDeliveryReasonCode::FailedDelivery | GroupDeliveryReasonCode::FailedDisplay
        ),
        _ => false,
    })
}

/// Every record is displayed.
pub fn displayed_to_all(records: &[GroupDeliveryRecord]) -> bool {
    records
        .iter()
        .all(|r| r.status == GroupDeliveryStatus::Displayed)
}

#[derive(Clone)]
pub struct GroupDeliveryTracker {
    store: Arc<dyn DeliveryStore>,
}

impl GroupDeliveryTracker {
    pub fn new(store: Arc<dyn DeliveryStore>) -> Self {
        Self { store }
    }

    pub async fn upsert(&self, record: &GroupDeliveryRecord) -> Result<(), RcsError> {
        self.store.upsert_group_delivery(record).await
    }

    pub async fn records(&self, item_id: &str) -> Result<Vec<GroupDeliveryRecord>, RcsError> {
        self.store.list_group_deliveries(item_id).await
    }

    /// Returns whether anything changed. A missing record is created.
    pub async fn set_delivered(
        &self,
        item_id: &str,
        conversation_id: &str,
        participant: &str,
        delivered_at: Timestamp,
    ) -> Result<bool, RcsError> {
        let record = GroupDeliveryRecord {
            status: GroupDeliveryStatus::Delivered,
            delivered_at,
            ..GroupDeliveryRecord::pending(item_id, conversation_id, participant)
        };
        let patch = GroupDeliveryPatch {
            status: Some(GroupDeliveryStatus::Delivered),
            reason_code: Some(GroupDeliveryReasonCode::Unspecified),
            delivered_at: Some(delivered_at),
            ..GroupDeliveryPatch::default()
        };
        let guard = Predicate::StateNotIn(vec![
            GroupDeliveryStatus::Delivered,
            GroupDeliveryStatus::Displayed,
        ]);
        self.apply(&record, &patch, &guard).await
    }

    /// Returns whether anything changed. A missing record is created with
    /// `displayed_at` standing in for the unknown delivery time.
    pub async fn set_displayed(
        &self,
        item_id: &str,
        conversation_id: &str,
        participant: &str,
        displayed_at: Timestamp,
    ) -> Result<bool, RcsError> {
        let record = GroupDeliveryRecord {
            status: GroupDeliveryStatus::Displayed,
            delivered_at: displayed_at,
            displayed_at,
            ..GroupDeliveryRecord::pending(item_id, conversation_id, participant)
        };
        let patch = GroupDeliveryPatch {
            status: Some(GroupDeliveryStatus::Displayed),
            reason_code: Some(GroupDeliveryReasonCode::Unspecified),
            displayed_at: Some(displayed_at),
            fill_delivered_at: Some(displayed_at),
            ..GroupDeliveryPatch::default()
        };
        let guard = Predicate::StateNotIn(vec![GroupDeliveryStatus::Displayed]);
        self.apply(&record, &patch, &guard).await
    }

    /// Record a per-recipient failure. Never overrides a displayed record.
    pub async fn set_failed(
        &self,
        item_id: &str,
        conversation_id: &str,
        participant: &str,
        reason_code: GroupDeliveryReasonCode,
    ) -> Result<bool, RcsError> {
        let record = GroupDeliveryRecord {
            status: GroupDeliveryStatus::Failed,
            reason_code,
            ..GroupDeliveryRecord::pending(item_id, conversation_id, participant)
        };
        let patch = GroupDeliveryPatch {
            status: Some(GroupDeliveryStatus::Failed),
            reason_code: Some(reason_code),
            ..GroupDeliveryPatch::default()
        };
        let guard = Predicate::StateIn(vec![
            GroupDeliveryStatus::NotDelivered,
            GroupDeliveryStatus::Delivered,
        ]);
        self.apply(&record, &patch, &guard).await
    }

    async fn apply(
        &self,
        record: &GroupDeliveryRecord,
        patch: &GroupDeliveryPatch,
        guard: &Predicate<GroupDeliveryStatus>,
    ) -> Result<bool, RcsError> {
        let changed = self
            .store
            .create_or_update_group_delivery(record, patch, guard)
            .await?;
        if changed {
            debug!(
                item_id = %record.item_id,
                participant = %record.participant,
                status = %record.status,
                "group delivery record updated"
            );
        }
        Ok(changed)
    }

    pub async fn is_delivered_to_all(&self, item_id: &str) -> Result<bool, RcsError> {
        Ok(delivered_to_all(&self.records(item_id).await?))
    }

    pub async fn is_displayed_to_all(&self, item_id: &str) -> Result<bool, RcsError> {
        Ok(displayed_to_all(&self.records(item_id).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rcs_core::ParticipantStatus;
    use rcs_storage::SqliteDeliveryStore;
    use rcs_test_utils::fixtures;

    async fn tracker() -> GroupDeliveryTracker {
        let store: Arc<dyn DeliveryStore> =
            Arc::new(SqliteDeliveryStore::open_in_memory().await.unwrap());
        GroupDeliveryTracker::new(store)
    }

    async fn seeded(participants: &[&str]) -> GroupDeliveryTracker {
        let t = tracker().await;
        for p in participants {
            t.upsert(&GroupDeliveryRecord::pending("m2", "g1", *p))
                .await
                .unwrap();
        }
        t
    }

    #[tokio::test]
    async fn aggregate_scenario() {
        let t = seeded(&["A", "B"]).await;

        assert!(t.set_delivered("m2", "g1", "A", 1).await.unwrap());
        assert!(t.set_displayed("m2", "g1", "A", 2).await.unwrap());
        assert!(!t.is_delivered_to_all("m2").await.unwrap());

        assert!(t.set_delivered("m2", "g1", "B", 3).await.unwrap());
        assert!(t.is_delivered_to_all("m2").await.unwrap());
        assert!(!t.is_displayed_to_all("m2").await.unwrap());

        assert!(t.set_displayed("m2", "g1", "B", 4).await.unwrap());
        assert!(t.is_displayed_to_all("m2").await.unwrap());
    }

    #[tokio::test]
    async fn displayed_is_terminal() {
        let t = seeded(&["A"]).await;
        t.set_displayed("m2", "g1", "A", 5).await.unwrap();

        assert!(!t.set_delivered("m2", "g1", "A", 9).await.unwrap());
        assert!(!t
            .set_failed("m2", "g1", "A", GroupDeliveryReasonCode::FailedDelivery)
            .await
            .unwrap());
        assert!(!t.set_displayed("m2", "g1", "A", 9).await.unwrap());

        let r = &t.records("m2").await.unwrap()[0];
        assert_eq!(r.status, GroupDeliveryStatus::Displayed);
        assert_eq!((r.delivered_at, r.displayed_at), (5, 5));
    }

    #[tokio::test]
    async fn second_delivery_report_is_not_a_change() {
        let t = seeded(&["A"]).await;
        assert!(t.set_delivered("m2", "g1", "A", 5).await.unwrap());
        assert!(!t.set_delivered("m2", "g1", "A", 5).await.unwrap());
        assert_eq!(t.records("m2").await.unwrap()[0].delivered_at, 5);
    }

    #[tokio::test]
    async fn display_keeps_known_delivery_time() {
        let t = seeded(&["A"]).await;
        t.set_delivered("m2", "g1", "A", 5).await.unwrap();
        t.set_displayed("m2", "g1", "A", 8).await.unwrap();
        let r = &t.records("m2").await.unwrap()[0];
        assert_eq!((r.delivered_at, r.displayed_at), (5, 8));
    }

    #[tokio::test]
    async fn missing_rows_are_created_lazily() {
        let t = tracker().await;
        assert!(t.set_delivered("m3", "g1", "X", 10).await.unwrap());
        assert!(t.set_displayed("m3", "g1", "Y", 20).await.unwrap());

        let rows = t.records("m3").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, GroupDeliveryStatus::Delivered);
        assert_eq!(rows[0].displayed_at, 0);
        assert_eq!(rows[1].status, GroupDeliveryStatus::Displayed);
        assert_eq!(rows[1].delivered_at, 20);
    }

    #[tokio::test]
    async fn racing_reports_for_new_recipient_end_displayed() {
        let t = tracker().await;
        let (displayed, delivered) = tokio::join!(
            t.set_displayed("m1", "g1", "+Z", 20),
            t.set_delivered("m1", "g1", "+Z", 10),
        );
        assert!(displayed.unwrap());
        delivered.unwrap();

        let r = &t.records("m1").await.unwrap()[0];
        assert_eq!(r.status, GroupDeliveryStatus::Displayed);
        assert_eq!(r.displayed_at, 20);
        assert_ne!(r.delivered_at, 0);
    }

    #[tokio::test]
    async fn racing_reports_in_either_order_never_regress() {
        for _ in 0..20 {
            let t = tracker().await;
            let (delivered, displayed) = tokio::join!(
                t.set_delivered("m1", "g1", "+Z", 10),
                t.set_displayed("m1", "g1", "+Z", 20),
            );
            delivered.unwrap();
            displayed.unwrap();
            let r = &t.records("m1").await.unwrap()[0];
            assert_eq!(r.status, GroupDeliveryStatus::Displayed);
            assert_eq!(r.displayed_at, 20);
        }
    }

    #[tokio::test]
    async fn no_rows_is_vacuously_true() {
        let t = tracker().await;
        assert!(t.is_delivered_to_all("none").await.unwrap());
        assert!(t.is_displayed_to_all("none").await.unwrap());
    }

    #[test]
    fn fan_out_matches_eligible_roster() {
        let chat = fixtures::group_chat(
            "g1",
            &[
                ("a", ParticipantStatus::InviteQueued),
                ("b", ParticipantStatus::Inviting),
                ("c", ParticipantStatus::Invited),
                ("d", ParticipantStatus::Connected),
                ("e", ParticipantStatus::Disconnected),
                ("f", ParticipantStatus::Departed),
                ("g", ParticipantStatus::Failed),
                ("h", ParticipantStatus::Declined),
                ("i", ParticipantStatus::Timeout),
            ],
        );
        let records = fan_out_records(&chat, "m1");
        let names: Vec<_> = records.iter().map(|r| r.participant.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
        assert!(records.iter().all(|r| r.item_id == "m1" && r.conversation_id == "g1"));
    }

    fn record_strategy() -> impl Strategy<Value = GroupDeliveryRecord> {
        (0i64..5, 0i64..3).prop_map(|(status, reason)| GroupDeliveryRecord {
            status: GroupDeliveryStatus::try_from(status).unwrap(),
            reason_code: GroupDeliveryReasonCode::try_from(reason).unwrap(),
            ..GroupDeliveryRecord::pending("m", "g", "p")
        })
    }

    proptest! {
        #[test]
        fn delivered_to_all_iff_every_row_is_acknowledged_or_benign(
            records in proptest::collection::vec(record_strategy(), 0..12)
        ) {
            let expected = records.iter().all(|r| match r.status {
                GroupDeliveryStatus::Delivered
                | GroupDeliveryStatus::Displayed
                | GroupDeliveryStatus::Unsupported => true,
                GroupDeliveryStatus::Failed => {
                    r.reason_code == GroupDeliveryReasonCode::Unspecified
                }
                GroupDeliveryStatus::NotDelivered => false,
            });
            prop_assert_eq!(delivered_to_all(&records), expected);
        }

        #[test]
        fn displayed_to_all_implies_delivered_to_all(
            records in proptest::collection::vec(record_strategy(), 0..12)
        ) {
            if displayed_to_all(&records) {
                prop_assert!(delivered_to_all(&records));
            }
        }
    }
}
