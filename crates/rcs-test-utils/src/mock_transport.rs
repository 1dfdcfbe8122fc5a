// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport layer for deterministic testing.
//!
//! `MockTransport` implements `DeliveryTransport` with per-item scripted
//! outcomes and captures every hand-over for assertion in tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rcs_core::{Admission, DeliveryTransport, DequeueItem, TransportError};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::lock;

/// One hand-over seen by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportCall {
    /// `Some` for group hand-overs.
    pub group: Option<String>,
    pub item: DequeueItem,
}

/// A transport layer whose answers are scripted by the test.
///
/// By default the device is registered, every item is admitted, every group
/// session is available and every hand-over succeeds.
pub struct MockTransport {
    registered: AtomicBool,
    admissions: Mutex<HashMap<String, Admission>>,
    outcomes: Mutex<HashMap<String, TransportError>>,
    unavailable_groups: Mutex<HashSet<String>>,
    calls: Mutex<Vec<TransportCall>>,
    cancel_after: Mutex<Option<(usize, CancellationToken)>>,
    unregister_after: Mutex<Option<usize>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    handed_over: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            registered: AtomicBool::new(true),
            admissions: Mutex::new(HashMap::new()),
            outcomes: Mutex::new(HashMap::new()),
            unavailable_groups: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            cancel_after: Mutex::new(None),
            unregister_after: Mutex::new(None),
            gate: Mutex::new(None),
            handed_over: AtomicUsize::new(0),
        }
    }

    pub fn set_registered(&self, registered: bool) {
        self.registered.store(registered, Ordering::SeqCst);
    }

    pub fn set_admission(&self, item_id: &str, admission: Admission) {
        lock(&self.admissions).insert(item_id.to_string(), admission);
    }

    /// Make every hand-over of `item_id` fail with `error`.
    pub fn fail_with(&self, item_id: &str, error: TransportError) {
        lock(&self.outcomes).insert(item_id.to_string(), error);
    }

    /// Let hand-overs of `item_id` succeed again.
    pub fn succeed(&self, item_id: &str) {
        lock(&self.outcomes).remove(item_id);
    }

    pub fn set_group_session_available(&self, conversation_id: &str, available: bool) {
        let mut groups = lock(&self.unavailable_groups);
        if available {
            groups.remove(conversation_id);
        } else {
            groups.insert(conversation_id.to_string());
        }
    }

    /// Cancel `token` once `count` hand-overs have been attempted.
    pub fn cancel_after(&self, count: usize, token: CancellationToken) {
        *lock(&self.cancel_after) = Some((count, token));
    }

    /// Drop the registration once `count` hand-overs have been attempted.
    pub fn unregister_after(&self, count: usize) {
        *lock(&self.unregister_after) = Some(count);
    }

    /// Park every later hand-over, after it is recorded, until the returned
    /// semaphore receives a permit for it.
    pub fn hold_hand_overs(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *lock(&self.gate) = Some(gate.clone());
        gate
    }

    /// Every hand-over attempted so far, failed ones included.
    pub fn calls(&self) -> Vec<TransportCall> {
        lock(&self.calls).clone()
    }

    /// Ids of every item handed over, in order.
    pub fn handed_over_ids(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .map(|call| call.item.id().to_string())
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    async fn hand_over(
        &self,
        group: Option<&str>,
        item: &DequeueItem,
    ) -> Result<(), TransportError> {
        lock(&self.calls).push(TransportCall {
            group: group.map(str::to_string),
            item: item.clone(),
        });
        let gate = lock(&self.gate).clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        let attempted = self.handed_over.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((count, token)) = lock(&self.cancel_after).as_ref() {
            if attempted >= *count {
                token.cancel();
            }
        }
        if lock(&self.unregister_after).is_some_and(|count| attempted >= count) {
            self.set_registered(false);
        }
        match lock(&self.outcomes).get(item.id()) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryTransport for MockTransport {
    fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    async fn admission(&self, item: &DequeueItem) -> Admission {
        lock(&self.admissions)
            .get(item.id())
            .copied()
            .unwrap_or(Admission::Allowed)
    }

    async fn group_session_available(&self, conversation_id: &str) -> bool {
        !lock(&self.unavailable_groups).contains(conversation_id)
    }

    async fn dequeue_one_to_one(&self, item: &DequeueItem) -> Result<(), TransportError> {
        self.hand_over(None, item).await
    }

    async fn dequeue_group(
        &self,
        conversation_id: &str,
        item: &DequeueItem,
    ) -> Result<(), TransportError> {
        self.hand_over(Some(conversation_id), item).await
    }
}
