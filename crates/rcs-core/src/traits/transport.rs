// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session/transport layer as seen by the dequeue scheduler.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::types::DequeueItem;

/// Gate evaluated before an item is handed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Hand the item over now.
    Allowed,
    /// Not now (conversation paused, concurrency cap reached). Leave it queued.
    Deferred,
    /// Never: the item is marked failed.
    Forbidden,
}

/// Entry points the transport layer exposes for queued items.
#[async_trait]
pub trait DeliveryTransport: Send + Sync + 'static {
    /// Whether the IMS registration is currently up.
    fn is_registered(&self) -> bool;

    async fn admission(&self, item: &DequeueItem) -> Admission;

    /// Whether a group session exists or can be started for the conversation.
    async fn group_session_available(&self, conversation_id: &str) -> bool;

    async fn dequeue_one_to_one(&self, item: &DequeueItem) -> Result<(), TransportError>;

    async fn dequeue_group(
        &self,
        conversation_id: &str,
        item: &DequeueItem,
    ) -> Result<(), TransportError>;
}
