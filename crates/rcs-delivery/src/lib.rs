// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery tracking and retry engine for RCS chat messages and file
//! transfers.
//!
//! The engine owns item lifecycles from creation to final acknowledgement:
//! state machines for messages and file transfers, per-recipient tracking of
//! group items, resubmission of queued items, delivery deadlines and the
//! reclassification of items interrupted by an ungraceful termination. All
//! state lives behind the [`DeliveryStore`](rcs_core::DeliveryStore) port.

pub mod dequeue;
pub mod engine;
pub mod expiration;
pub mod file_transfers;
pub mod group_tracker;
pub mod locks;
pub mod messages;
pub mod recovery;
pub mod reports;

pub use dequeue::{DequeueReport, DequeueScheduler};
pub use engine::{DeliveryEngine, StartReport};
pub use expiration::{ExpirationMonitor, RearmReport};
pub use file_transfers::FileTransferStateMachine;
pub use group_tracker::{delivered_to_all, displayed_to_all, fan_out_records, GroupDeliveryTracker};
pub use locks::OperationLocks;
pub use messages::MessageStateMachine;
pub use recovery::{classify, RecoveryReport, TerminationRecovery};
pub use reports::{ReportHandler, ReportOutcome};
