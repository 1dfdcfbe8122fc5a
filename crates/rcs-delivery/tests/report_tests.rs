// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery and display notifications, deadlines and deletion through the
//! engine facade.

use std::time::Duration;

use rcs_core::{
    AlarmKey, ChangeEvent, DeliveryStore, FileTransferReasonCode, FileTransferState,
    GroupDeliveryStatus, ItemKind, MessageReasonCode, MessageStatus, ParticipantStatus, RcsError,
};
use rcs_delivery::ReportOutcome;
use rcs_test_utils::{fixtures, TestHarness};

const PEER: &str = "+33600000001";
const A: &str = "+33600000010";
const B: &str = "+33600000011";

#[tokio::test]
async fn one_to_one_lifecycle() {
    let h = TestHarness::new().await.unwrap();
    let messages = h.engine.messages();
    messages
        .create(
            fixtures::outgoing_message("m1", PEER, 10),
            MessageStatus::Queued,
            MessageReasonCode::Unspecified,
        )
        .await
        .unwrap();

    assert_eq!(messages.dequeue("m1", 100, 100).await.unwrap(), 1);
    let m1 = messages.get("m1").await.unwrap();
    assert_eq!(m1.state, MessageStatus::Sending);
    assert_eq!((m1.created_at, m1.sent_at), (100, 100));

    assert_eq!(messages.mark_delivered("m1", 200).await.unwrap(), 1);
    let m1 = messages.get("m1").await.unwrap();
    assert_eq!((m1.state, m1.delivered_at), (MessageStatus::Delivered, 200));

    assert_eq!(messages.mark_displayed("m1", 300).await.unwrap(), 1);
    let m1 = messages.get("m1").await.unwrap();
    assert_eq!((m1.state, m1.displayed_at), (MessageStatus::Displayed, 300));

    // Repeats are no-ops.
    assert_eq!(messages.mark_delivered("m1", 200).await.unwrap(), 0);
    assert_eq!(messages.mark_displayed("m1", 300).await.unwrap(), 0);
}

#[tokio::test]
async fn delivery_report_clears_the_deadline() {
    let h = TestHarness::new().await.unwrap();
    h.engine
        .messages()
        .create(
            fixtures::outgoing_message("m1", PEER, 10),
            MessageStatus::Queued,
            MessageReasonCode::Unspecified,
        )
        .await
        .unwrap();
    h.engine.scheduler().dequeue_one_to_one(PEER).await.unwrap();
    let key = AlarmKey::new(ItemKind::Message, "m1", PEER);
    assert!(h.alarms.armed_at(&key).is_some());

    let outcome = h
        .engine
        .on_delivery_report_received("m1", PEER, 1_000_500)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ReportOutcome {
            recipient_changed: true,
            item_advanced: true,
        }
    );
    let m1 = h.engine.messages().get("m1").await.unwrap();
    assert_eq!(m1.state, MessageStatus::Delivered);
    assert_eq!(m1.delivery_deadline, 0);
    assert_eq!(h.alarms.armed_at(&key), None);

    let again = h
        .engine
        .on_delivery_report_received("m1", PEER, 1_000_600)
        .await
        .unwrap();
    assert_eq!(again, ReportOutcome::default());
    assert_eq!(h.engine.messages().get("m1").await.unwrap().delivered_at, 1_000_500);
}

#[tokio::test]
async fn overdue_item_expires_then_late_report_still_counts() {
    let h = TestHarness::new().await.unwrap();
    h.engine
        .file_transfers()
        .create(
            fixtures::outgoing_transfer("ft1", PEER, 10),
            FileTransferState::Transferred,
            FileTransferReasonCode::Unspecified,
        )
        .await
        .unwrap();
    let expired_now = h
        .engine
        .schedule_delivery_timeout(ItemKind::FileTransfer, PEER, "ft1", 1_000_100)
        .await
        .unwrap();
    assert!(!expired_now);

    h.clock.advance(50);
    assert!(h.fire_due_alarms().await.unwrap().is_empty());
    h.clock.advance(100);
    let fired = h.fire_due_alarms().await.unwrap();
    assert_eq!(fired, vec![AlarmKey::new(ItemKind::FileTransfer, "ft1", PEER)]);

    let ft = h.engine.file_transfers().get("ft1").await.unwrap();
    assert!(ft.delivery_expired);
    assert_eq!(ft.state, FileTransferState::Transferred);

    h.engine
        .on_display_report_received("ft1", PEER, 1_000_200)
        .await
        .unwrap();
    let ft = h.engine.file_transfers().get("ft1").await.unwrap();
    assert_eq!(ft.state, FileTransferState::Displayed);
    assert!(!ft.delivery_expired);
}

#[tokio::test]
async fn scheduling_a_missing_item_is_not_found() {
    let h = TestHarness::new().await.unwrap();
    let err = h
        .engine
        .schedule_delivery_timeout(ItemKind::Message, PEER, "ghost", 2_000_000)
        .await
        .unwrap_err();
    assert!(matches!(err, RcsError::NotFound { .. }), "got {err:?}");
    assert!(h.alarms.armed().is_empty());
}

#[tokio::test]
async fn group_reports_advance_the_item_only_when_everyone_has() {
    let h = TestHarness::new().await.unwrap();
    h.store
        .upsert_group_chat(&fixtures::group_chat(
            "g1",
            &[(A, ParticipantStatus::Connected), (B, ParticipantStatus::Connected)],
        ))
        .await
        .unwrap();
    h.engine
        .messages()
        .create(
            fixtures::outgoing_group_message("m2", "g1", 10),
            MessageStatus::Sent,
            MessageReasonCode::Unspecified,
        )
        .await
        .unwrap();
    let tracker = h.engine.group_tracker();

    let outcome = h.engine.on_delivery_report_received("m2", A, 100).await.unwrap();
    assert!(outcome.recipient_changed && !outcome.item_advanced);
    let outcome = h.engine.on_display_report_received("m2", A, 200).await.unwrap();
    assert!(outcome.recipient_changed && !outcome.item_advanced);
    assert!(!tracker.is_delivered_to_all("m2").await.unwrap());
    assert_eq!(
        h.engine.messages().get("m2").await.unwrap().state,
        MessageStatus::Sent
    );

    let outcome = h.engine.on_delivery_report_received("m2", B, 300).await.unwrap();
    assert!(outcome.item_advanced);
    assert!(tracker.is_delivered_to_all("m2").await.unwrap());
    assert!(!tracker.is_displayed_to_all("m2").await.unwrap());
    let m2 = h.engine.messages().get("m2").await.unwrap();
    assert_eq!((m2.state, m2.delivered_at), (MessageStatus::Delivered, 300));

    let outcome = h.engine.on_display_report_received("m2", B, 400).await.unwrap();
    assert!(outcome.item_advanced);
    assert!(tracker.is_displayed_to_all("m2").await.unwrap());
    let m2 = h.engine.messages().get("m2").await.unwrap();
    assert_eq!((m2.state, m2.displayed_at), (MessageStatus::Displayed, 400));

    let records = tracker.records("m2").await.unwrap();
    assert!(records
        .iter()
        .all(|r| r.status == GroupDeliveryStatus::Displayed));
}

#[tokio::test]
async fn group_display_before_delivery_fills_both_timestamps() {
    let h = TestHarness::new().await.unwrap();
    h.store
        .upsert_group_chat(&fixtures::group_chat("g1", &[(A, ParticipantStatus::Connected)]))
        .await
        .unwrap();
    h.engine
        .messages()
        .create(
            fixtures::outgoing_group_message("m1", "g1", 10),
            MessageStatus::Sent,
            MessageReasonCode::Unspecified,
        )
        .await
        .unwrap();

    let outcome = h.engine.on_display_report_received("m1", A, 500).await.unwrap();
    assert!(outcome.item_advanced);
    let record = &h.engine.group_tracker().records("m1").await.unwrap()[0];
    assert_eq!((record.delivered_at, record.displayed_at), (500, 500));
    assert_eq!(
        h.engine.messages().get("m1").await.unwrap().state,
        MessageStatus::Displayed
    );
}

#[tokio::test]
async fn report_for_unknown_item_is_not_found() {
    let h = TestHarness::new().await.unwrap();
    let err = h
        .engine
        .on_delivery_report_received("ghost", PEER, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, RcsError::NotFound { .. }), "got {err:?}");
    assert!(h
        .engine
        .on_display_report_received("ghost", PEER, 1)
        .await
        .is_err());
}

#[tokio::test]
async fn delete_cancels_the_pending_wake_up() {
    let h = TestHarness::new().await.unwrap();
    h.engine
        .messages()
        .create(
            fixtures::outgoing_message("m1", PEER, 10),
            MessageStatus::Queued,
            MessageReasonCode::Unspecified,
        )
        .await
        .unwrap();
    h.engine.scheduler().dequeue_one_to_one(PEER).await.unwrap();
    assert_eq!(h.alarms.armed().len(), 1);

    assert_eq!(h.engine.delete_message("m1").await.unwrap(), 1);
    assert!(h.alarms.armed().is_empty());
    assert!(h.engine.messages().find("m1").await.unwrap().is_none());
    assert_eq!(h.engine.delete_message("m1").await.unwrap(), 0);
    assert_eq!(h.engine.delete_file_transfer("nope").await.unwrap(), 0);
}

#[tokio::test]
async fn subscribers_see_engine_writes() {
    let h = TestHarness::new().await.unwrap();
    let mut events = h.engine.subscribe();
    h.engine
        .messages()
        .create(
            fixtures::outgoing_message("m1", PEER, 10),
            MessageStatus::Queued,
            MessageReasonCode::Unspecified,
        )
        .await
        .unwrap();
    h.engine.scheduler().dequeue_one_to_one(PEER).await.unwrap();

    assert_eq!(events.recv().await.unwrap(), ChangeEvent::Message("m1".into()));
    assert_eq!(events.recv().await.unwrap(), ChangeEvent::Message("m1".into()));
}

#[tokio::test]
async fn racing_group_reports_for_an_unknown_recipient_end_displayed() {
    let h = TestHarness::new().await.unwrap();
    h.store
        .upsert_group_chat(&fixtures::group_chat("g1", &[(A, ParticipantStatus::Connected)]))
        .await
        .unwrap();
    h.engine
        .messages()
        .create(
            fixtures::outgoing_group_message("m1", "g1", 10),
            MessageStatus::Sent,
            MessageReasonCode::Unspecified,
        )
        .await
        .unwrap();

    let (displayed, delivered) = tokio::join!(
        h.engine.on_display_report_received("m1", "+Z", 20),
        h.engine.on_delivery_report_received("m1", "+Z", 10),
    );
    assert!(displayed.unwrap().recipient_changed);
    delivered.unwrap();

    let record = h
        .store
        .get_group_delivery("m1", "+Z")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, GroupDeliveryStatus::Displayed);
    assert_eq!(record.displayed_at, 20);
    assert_ne!(record.delivered_at, 0);
}

#[tokio::test]
async fn report_waits_for_the_dequeue_pass_of_its_conversation() {
    const OTHER: &str = "+33600000002";
    let h = TestHarness::new().await.unwrap();
    let messages = h.engine.messages();
    for (id, peer, state) in [
        ("sent", PEER, MessageStatus::Sent),
        ("waiting", PEER, MessageStatus::Queued),
        ("elsewhere", OTHER, MessageStatus::Sent),
    ] {
        messages
            .create(
                fixtures::outgoing_message(id, peer, 10),
                state,
                MessageReasonCode::Unspecified,
            )
            .await
            .unwrap();
    }
    let gate = h.transport.hold_hand_overs();

    let pass = h.engine.scheduler().dequeue_one_to_one(PEER);
    let reports = async {
        while h.transport.calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        // The pass is parked inside the transport while holding PEER's scope.
        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            h.engine.on_delivery_report_received("sent", PEER, 100),
        )
        .await;
        assert!(blocked.is_err());
        let unrelated = tokio::time::timeout(
            Duration::from_millis(200),
            h.engine.on_delivery_report_received("elsewhere", OTHER, 100),
        )
        .await;
        assert!(unrelated.expect("other conversation is not blocked").unwrap().item_advanced);

        gate.add_permits(1);
        h.engine.on_delivery_report_received("sent", PEER, 100).await
    };
    let (pass, report) = tokio::join!(pass, reports);

    assert_eq!(pass.unwrap().dequeued, 1);
    assert!(report.unwrap().item_advanced);
    assert_eq!(
        h.engine.messages().get("sent").await.unwrap().state,
        MessageStatus::Delivered
    );
}

#[tokio::test]
async fn dequeue_waits_for_incoming_handling_of_its_conversation() {
    let h = TestHarness::new().await.unwrap();
    h.engine
        .messages()
        .create(
            fixtures::outgoing_message("waiting", PEER, 10),
            MessageStatus::Queued,
            MessageReasonCode::Unspecified,
        )
        .await
        .unwrap();

    let incoming = h.engine.locks().lock_scope(PEER).await;
    let pass = tokio::time::timeout(
        Duration::from_millis(50),
        h.engine.scheduler().dequeue_one_to_one(PEER),
    )
    .await;
    assert!(pass.is_err());
    assert!(h.transport.calls().is_empty());

    drop(incoming);
    let report = h.engine.scheduler().dequeue_one_to_one(PEER).await.unwrap();
    assert_eq!(report.dequeued, 1);
    assert_eq!(h.transport.handed_over_ids(), vec!["waiting"]);
}
