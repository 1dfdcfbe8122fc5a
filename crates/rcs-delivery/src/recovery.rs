// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reclassification of items frozen mid-transition by an ungraceful
//! termination.
//!
//! | Found        | MSRP                        | HTTP                                            |
//! |--------------|-----------------------------|-------------------------------------------------|
//! | `INITIATING` | `FAILED` initiation         | `FAILED` initiation                             |
//! | `ACCEPTING`  | `ABORTED` by system         | `ABORTED` by system                             |
//! | `STARTED`    | `FAILED` data transfer      | `PAUSED` by system while the file is available  |
//! | `INVITED`    | `REJECTED` by system        | `REJECTED` by timeout once the file has expired |
//!
//! Messages found `SENDING` become `FAILED` / `FAILED_SEND`. Queued items are
//! left to the dequeue scheduler.

use std::sync::Arc;

use rcs_core::{
    Clock, FileTransfer, FileTransferReasonCode, FileTransferState, Medium, MessageReasonCode,
    MessageStatus, Predicate, RcsError, StoredEnum, Timestamp,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::file_transfers::FileTransferStateMachine;
use crate::locks::OperationLocks;
use crate::messages::MessageStateMachine;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub messages_failed: usize,
    pub transfers_reclassified: usize,
    /// Interrupted transfers the table leaves as they are.
    pub untouched: usize,
    pub errors: usize,
    pub cancelled: bool,
}

/// Target of an interrupted transfer, or `None` to leave it as it is.
pub fn classify(
    transfer: &FileTransfer,
    now: Timestamp,
) -> Option<(FileTransferState, FileTransferReasonCode)> {
    use FileTransferReasonCode as R;
    use FileTransferState as S;

    let file_available = transfer.file_expires_at == 0 || transfer.file_expires_at > now;
    match (transfer.state, transfer.medium()) {
        (S::Initiating, _) => Some((S::Failed, R::FailedInitiation)),
        (S::Accepting, _) => Some((S::Aborted, R::AbortedBySystem)),
        (S::Started, Medium::Msrp) => Some((S::Failed, R::FailedDataTransfer)),
        (S::Started, Medium::Http) if transfer.is_fully_transferred() => None,
        (S::Started, Medium::Http) if file_available => Some((S::Paused, R::PausedBySystem)),
        (S::Started, Medium::Http) => Some((S::Failed, R::FailedDataTransfer)),
        (S::Invited, Medium::Msrp) => Some((S::Rejected, R::RejectedBySystem)),
        (S::Invited, Medium::Http) if transfer.file_expires_at > now => None,
        (S::Invited, Medium::Http) => Some((S::Rejected, R::RejectedByTimeout)),
        _ => None,
    }
}

#[derive(Clone)]
pub struct TerminationRecovery {
    messages: MessageStateMachine,
    transfers: FileTransferStateMachine,
    locks: Arc<OperationLocks>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl TerminationRecovery {
    pub fn new(
        messages: MessageStateMachine,
        transfers: FileTransferStateMachine,
        locks: Arc<OperationLocks>,
        clock: Arc<dyn Clock>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            messages,
            transfers,
            locks,
            clock,
            cancel,
        }
    }

    /// Run the recovery pass under the global lock.
    pub async fn run(&self) -> Result<RecoveryReport, RcsError> {
        let _guard = self.locks.lock_global().await;
        let mut report = RecoveryReport::default();

        let sending = self
            .messages
            .query(&Predicate::state(MessageStatus::Sending))
            .await?;
        for m in sending {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(report);
            }
            match self
                .messages
                .transition_from(
                    &m.id,
                    &[MessageStatus::Sending],
                    MessageStatus::Failed,
                    MessageReasonCode::FailedSend,
                )
                .await
            {
                Ok(rows) => report.messages_failed += rows,
                Err(e) => {
                    error!(item_id = %m.id, error = %e, "message recovery failed, continuing");
                    report.errors += 1;
                }
            }
        }

        let now = self.clock.now_millis();
        let interrupted = self
            .transfers
            .query(&Predicate::StateIn(
                FileTransferState::ALL
                    .iter()
                    .copied()
                    .filter(|s| s.is_interrupted())
                    .collect(),
            ))
            .await?;
        for ft in interrupted {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(report);
            }
            let Some((state, reason)) = classify(&ft, now) else {
                report.untouched += 1;
                continue;
            };
            match self
                .transfers
                .transition_from(&ft.id, &[ft.state], state, reason)
                .await
            {
                Ok(rows) => {
                    if rows > 0 {
                        info!(
                            item_id = %ft.id,
                            from = %ft.state,
                            to = %state,
                            %reason,
                            "interrupted file transfer reclassified"
                        );
                    }
                    report.transfers_reclassified += rows;
                }
                Err(e) => {
                    error!(
                        item_id = %ft.id,
                        error = %e,
                        "file transfer recovery failed, continuing"
                    );
                    report.errors += 1;
                }
            }
        }

        info!(
            messages_failed = report.messages_failed,
            transfers_reclassified = report.transfers_reclassified,
            untouched = report.untouched,
            errors = report.errors,
            "termination recovery complete"
        );
        Ok(report)
    }
}
