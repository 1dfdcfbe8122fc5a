// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Alarm facility that records arms and cancels instead of sleeping.

use std::collections::BTreeMap;
use std::sync::Mutex;

use rcs_core::{AlarmKey, AlarmScheduler, Timestamp};

use crate::lock;

/// Armed wake-ups are kept in a map and only come due when the test pulls
/// them with [`take_due`](Self::take_due).
#[derive(Debug, Default)]
pub struct ManualAlarmScheduler {
    armed: Mutex<BTreeMap<AlarmKey, Timestamp>>,
    cancelled: Mutex<Vec<AlarmKey>>,
}

impl ManualAlarmScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn armed_at(&self, key: &AlarmKey) -> Option<Timestamp> {
        lock(&self.armed).get(key).copied()
    }

    /// Snapshot of every armed key.
    pub fn armed(&self) -> BTreeMap<AlarmKey, Timestamp> {
        lock(&self.armed).clone()
    }

    /// Every cancel call seen so far, including no-op cancels.
    pub fn cancelled(&self) -> Vec<AlarmKey> {
        lock(&self.cancelled).clone()
    }

    /// Remove and return the keys due at `now`, earliest first.
    pub fn take_due(&self, now: Timestamp) -> Vec<AlarmKey> {
        let mut armed = lock(&self.armed);
        let mut due: Vec<(Timestamp, AlarmKey)> = armed
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(key, at)| (*at, key.clone()))
            .collect();
        due.sort();
        for (_, key) in &due {
            armed.remove(key);
        }
        due.into_iter().map(|(_, key)| key).collect()
    }
}

impl AlarmScheduler for ManualAlarmScheduler {
    fn arm(&self, key: AlarmKey, at: Timestamp) {
        lock(&self.armed).insert(key, at);
    }

    fn cancel(&self, key: &AlarmKey) {
        lock(&self.armed).remove(key);
        lock(&self.cancelled).push(key.clone());
    }
}
