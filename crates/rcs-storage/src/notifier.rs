// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fan-out of committed changes to in-process observers.

use rcs_core::ChangeEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// Default channel depth. Slow receivers observe `Lagged` instead of
/// blocking writers.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Publish one event. Having no subscriber is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        trace!(?event, "change published");
        let _ = self.tx.send(event);
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = ChangeEvent>) {
        for event in events {
            self.publish(event);
        }
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
