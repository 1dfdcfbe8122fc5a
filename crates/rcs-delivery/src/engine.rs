// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Composition root wiring every engine component to the shared ports.

use std::sync::Arc;

use rcs_config::model::DeliveryConfig;
use rcs_core::{
    AlarmKey, AlarmScheduler, ChangeEvent, Clock, DeliveryStore, DeliveryTransport, ItemKind,
    RcsError, Timestamp,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::dequeue::{DequeueReport, DequeueScheduler};
use crate::expiration::{participant_of, ExpirationMonitor, RearmReport};
use crate::file_transfers::FileTransferStateMachine;
use crate::group_tracker::GroupDeliveryTracker;
use crate::locks::OperationLocks;
use crate::messages::MessageStateMachine;
use crate::recovery::{RecoveryReport, TerminationRecovery};
use crate::reports::{ReportHandler, ReportOutcome};

/// What [`DeliveryEngine::start`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartReport {
    pub recovery: RecoveryReport,
    pub rearm: RearmReport,
    pub dequeue: DequeueReport,
}

/// The delivery engine. Construct once at startup and share by reference.
pub struct DeliveryEngine {
    store: Arc<dyn DeliveryStore>,
    messages: MessageStateMachine,
    transfers: FileTransferStateMachine,
    tracker: GroupDeliveryTracker,
    expiration: ExpirationMonitor,
    scheduler: DequeueScheduler,
    recovery: TerminationRecovery,
    reports: ReportHandler,
    locks: Arc<OperationLocks>,
    cancel: CancellationToken,
}

impl DeliveryEngine {
    pub fn new(
        store: Arc<dyn DeliveryStore>,
        transport: Arc<dyn DeliveryTransport>,
        alarms: Arc<dyn AlarmScheduler>,
        clock: Arc<dyn Clock>,
        config: DeliveryConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let locks = Arc::new(OperationLocks::new());

        let messages = MessageStateMachine::new(store.clone());
        let transfers = FileTransferStateMachine::new(store.clone());
        let tracker = GroupDeliveryTracker::new(store.clone());
        let expiration = ExpirationMonitor::new(
            messages.clone(),
            transfers.clone(),
            alarms,
            clock.clone(),
            config.clone(),
        );
        let scheduler = DequeueScheduler::new(
            store.clone(),
            transport,
            messages.clone(),
            transfers.clone(),
            expiration.clone(),
            locks.clone(),
            clock.clone(),
            config,
            cancel.clone(),
        );
        let recovery = TerminationRecovery::new(
            messages.clone(),
            transfers.clone(),
            locks.clone(),
            clock,
            cancel.clone(),
        );
        let reports = ReportHandler::new(
            messages.clone(),
            transfers.clone(),
            tracker.clone(),
            expiration.clone(),
            locks.clone(),
        );

        Self {
            store,
            messages,
            transfers,
            tracker,
            expiration,
            scheduler,
            recovery,
            reports,
            locks,
            cancel,
        }
    }

    /// Process start: recovery, then deadline re-arm, then a full dequeue.
    /// A shutdown during recovery skips the remaining steps.
    pub async fn start(&self) -> Result<StartReport, RcsError> {
        info!("delivery engine starting");
        let recovery = self.recovery.run().await?;
        if recovery.cancelled {
            info!("delivery engine start interrupted by shutdown");
            return Ok(StartReport {
                recovery,
                ..StartReport::default()
            });
        }
        let rearm = self.expiration.rearm_at_start().await?;
        let dequeue = self.scheduler.dequeue_all().await?;
        info!("delivery engine started");
        Ok(StartReport {
            recovery,
            rearm,
            dequeue,
        })
    }

    /// Connectivity or IMS registration came back.
    pub async fn on_connectivity_regained(&self) -> Result<DequeueReport, RcsError> {
        self.scheduler.dequeue_all().await
    }

    /// Ask running passes to stop before their next item.
    pub fn shutdown(&self) {
        info!("delivery engine shutting down");
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token cancelled by [`shutdown`](Self::shutdown).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn on_delivery_report_received(
        &self,
        item_id: &str,
        participant: &str,
        delivered_at: Timestamp,
    ) -> Result<ReportOutcome, RcsError> {
        self.reports
            .on_delivery_report_received(item_id, participant, delivered_at)
            .await
    }

    pub async fn on_display_report_received(
        &self,
        item_id: &str,
        participant: &str,
        displayed_at: Timestamp,
    ) -> Result<ReportOutcome, RcsError> {
        self.reports
            .on_display_report_received(item_id, participant, displayed_at)
            .await
    }

    /// Arm the delivery timeout of one item. Returns whether it expired
    /// immediately.
    pub async fn schedule_delivery_timeout(
        &self,
        kind: ItemKind,
        participant: &str,
        item_id: &str,
        deadline_at: Timestamp,
    ) -> Result<bool, RcsError> {
        self.expiration
            .schedule_deadline(kind, item_id, participant, deadline_at)
            .await
    }

    /// Callback for the alarm facility.
    pub async fn on_alarm(&self, key: &AlarmKey) -> Result<bool, RcsError> {
        self.expiration.on_alarm(key).await
    }

    /// Delete a message with its delivery records and pending wake-up.
    pub async fn delete_message(&self, id: &str) -> Result<usize, RcsError> {
        if let Some(m) = self.messages.find(id).await? {
            self.expiration.cancel_alarm(
                ItemKind::Message,
                id,
                participant_of(&m.remote_participant, &m.conversation_id),
            );
        }
        self.messages.delete(id).await
    }

    /// Delete a file transfer with its delivery records and pending wake-up.
    pub async fn delete_file_transfer(&self, id: &str) -> Result<usize, RcsError> {
        if let Some(ft) = self.transfers.find(id).await? {
            self.expiration.cancel_alarm(
                ItemKind::FileTransfer,
                id,
                participant_of(&ft.remote_participant, &ft.conversation_id),
            );
        }
        self.transfers.delete(id).await
    }

    /// Change events for every row the engine writes.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.store.subscribe()
    }

    pub fn messages(&self) -> &MessageStateMachine {
        &self.messages
    }

    pub fn file_transfers(&self) -> &FileTransferStateMachine {
        &self.transfers
    }

    pub fn group_tracker(&self) -> &GroupDeliveryTracker {
        &self.tracker
    }

    pub fn expiration(&self) -> &ExpirationMonitor {
        &self.expiration
    }

    pub fn scheduler(&self) -> &DequeueScheduler {
        &self.scheduler
    }

    pub fn recovery(&self) -> &TerminationRecovery {
        &self.recovery
    }

    /// Locks the transport layer takes around incoming-session handling.
    pub fn locks(&self) -> &Arc<OperationLocks> {
        &self.locks
    }
}
