// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot wake-up facility used for delivery deadlines.

use serde::{Deserialize, Serialize};

use crate::types::{ItemKind, Timestamp};

/// Identifies one armed wake-up. Re-arming the same key replaces the
/// previous deadline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AlarmKey {
    pub kind: ItemKind,
    pub item_id: String,
    pub participant: String,
}

impl AlarmKey {
    pub fn new(kind: ItemKind, item_id: impl Into<String>, participant: impl Into<String>) -> Self {
        Self {
            kind,
            item_id: item_id.into(),
            participant: participant.into(),
        }
    }
}

/// External timer. When an armed key comes due the owner of the facility
/// calls back into the expiration monitor with that key.
pub trait AlarmScheduler: Send + Sync + 'static {
    fn arm(&self, key: AlarmKey, at: Timestamp);

    /// Cancelling an unknown key is a no-op.
    fn cancel(&self, key: &AlarmKey);
}
