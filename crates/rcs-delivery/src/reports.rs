// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handling of incoming delivery and display notifications.

use std::sync::Arc;

use rcs_core::{ItemKind, RcsError, Timestamp};
use tracing::debug;

use crate::expiration::ExpirationMonitor;
use crate::file_transfers::FileTransferStateMachine;
use crate::group_tracker::GroupDeliveryTracker;
use crate::locks::OperationLocks;
use crate::messages::MessageStateMachine;

/// Effect of one notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportOutcome {
    /// The recipient's own status changed.
    pub recipient_changed: bool,
    /// The item itself moved to `DELIVERED` or `DISPLAYED`.
    pub item_advanced: bool,
}

struct Target {
    kind: ItemKind,
    id: String,
    conversation_id: String,
    one_to_one: bool,
}

/// Applies notifications inside the exclusive section of the item's
/// conversation.
#[derive(Clone)]
pub struct ReportHandler {
    messages: MessageStateMachine,
    transfers: FileTransferStateMachine,
    tracker: GroupDeliveryTracker,
    expiration: ExpirationMonitor,
    locks: Arc<OperationLocks>,
}

impl ReportHandler {
    pub fn new(
        messages: MessageStateMachine,
        transfers: FileTransferStateMachine,
        tracker: GroupDeliveryTracker,
        expiration: ExpirationMonitor,
        locks: Arc<OperationLocks>,
    ) -> Self {
        Self {
            messages,
            transfers,
            tracker,
            expiration,
            locks,
        }
    }

    pub async fn on_delivery_report_received(
        &self,
        item_id: &str,
        participant: &str,
        delivered_at: Timestamp,
    ) -> Result<ReportOutcome, RcsError> {
        let target = self.locate(item_id).await?;
        let _guard = self.locks.lock_scope(&target.conversation_id).await;

        if target.one_to_one {
            let advanced = self.mark_delivered(&target, delivered_at).await?;
            self.expiration
                .clear_expiration(target.kind, std::slice::from_ref(&target.id))
                .await?;
            return Ok(ReportOutcome {
                recipient_changed: advanced,
                item_advanced: advanced,
            });
        }

        let recipient_changed = self
            .tracker
            .set_delivered(&target.id, &target.conversation_id, participant, delivered_at)
            .await?;
        let item_advanced = self.tracker.is_delivered_to_all(&target.id).await?
            && self.mark_delivered(&target, delivered_at).await?;
        debug!(item_id, participant, recipient_changed, item_advanced, "group delivery report");
        Ok(ReportOutcome {
            recipient_changed,
            item_advanced,
        })
    }

    pub async fn on_display_report_received(
        &self,
        item_id: &str,
        participant: &str,
        displayed_at: Timestamp,
    ) -> Result<ReportOutcome, RcsError> {
        let target = self.locate(item_id).await?;
        let _guard = self.locks.lock_scope(&target.conversation_id).await;

        if target.one_to_one {
            let advanced = self.mark_displayed(&target, displayed_at).await?;
            self.expiration
                .clear_expiration(target.kind, std::slice::from_ref(&target.id))
                .await?;
            return Ok(ReportOutcome {
                recipient_changed: advanced,
                item_advanced: advanced,
            });
        }

        let recipient_changed = self
            .tracker
            .set_displayed(&target.id, &target.conversation_id, participant, displayed_at)
            .await?;
        let item_advanced = if self.tracker.is_displayed_to_all(&target.id).await? {
            self.mark_displayed(&target, displayed_at).await?
        } else if self.tracker.is_delivered_to_all(&target.id).await? {
            self.mark_delivered(&target, displayed_at).await?
        } else {
            false
        };
        debug!(item_id, participant, recipient_changed, item_advanced, "group display report");
        Ok(ReportOutcome {
            recipient_changed,
            item_advanced,
        })
    }

    async fn locate(&self, item_id: &str) -> Result<Target, RcsError> {
        if let Some(m) = self.messages.find(item_id).await? {
            return Ok(Target {
                kind: ItemKind::Message,
                one_to_one: m.is_one_to_one(),
                id: m.id,
                conversation_id: m.conversation_id,
            });
        }
        if let Some(ft) = self.transfers.find(item_id).await? {
            return Ok(Target {
                kind: ItemKind::FileTransfer,
                one_to_one: ft.is_one_to_one(),
                id: ft.id,
                conversation_id: ft.conversation_id,
            });
        }
        Err(RcsError::NotFound {
            kind: "chat item",
            id: item_id.to_string(),
        })
    }

    async fn mark_delivered(&self, target: &Target, at: Timestamp) -> Result<bool, RcsError> {
        let rows = match target.kind {
            ItemKind::Message => self.messages.mark_delivered(&target.id, at).await?,
            ItemKind::FileTransfer => self.transfers.mark_delivered(&target.id, at).await?,
        };
        Ok(rows > 0)
    }

    async fn mark_displayed(&self, target: &Target, at: Timestamp) -> Result<bool, RcsError> {
        let rows = match target.kind {
            ItemKind::Message => self.messages.mark_displayed(&target.id, at).await?,
            ItemKind::FileTransfer => self.transfers.mark_displayed(&target.id, at).await?,
        };
        Ok(rows > 0)
    }
}
