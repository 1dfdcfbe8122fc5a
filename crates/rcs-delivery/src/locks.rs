// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exclusive sections shared with the transport layer.
//!
//! A dequeue pass for one scope (a one-to-one peer or a group conversation)
//! holds that scope's mutex for the whole pass. The transport layer takes
//! the same mutex around incoming-session handling for the scope, and so does
//! delivery and display report handling. Recovery takes the global section
//! exclusively, which waits for every scoped pass to finish and blocks new
//! ones. A scope's mutex is dropped from the registry once its last holder
//! or waiter is gone.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::trace;

type ScopeRegistry = DashMap<String, Arc<Mutex<()>>>;

/// Held for the duration of a scoped operation.
pub struct ScopeGuard {
    scope: String,
    registry: Arc<ScopeRegistry>,
    held: Option<OwnedMutexGuard<()>>,
    _global: OwnedRwLockReadGuard<()>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        drop(self.held.take());
        // Only the registry's own handle left: nobody holds or awaits it.
        self.registry
            .remove_if(&self.scope, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// Held for the duration of a process-wide operation.
pub struct GlobalGuard {
    _global: OwnedRwLockWriteGuard<()>,
}

#[derive(Default)]
pub struct OperationLocks {
    global: Arc<RwLock<()>>,
    scopes: Arc<ScopeRegistry>,
}

impl OperationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn scope_mutex(&self, scope: &str) -> Arc<Mutex<()>> {
        self.scopes
            .entry(scope.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Enter the exclusive section of `scope`.
    pub async fn lock_scope(&self, scope: &str) -> ScopeGuard {
        let global = self.global.clone().read_owned().await;
        let held = self.scope_mutex(scope).lock_owned().await;
        trace!(scope, "scope lock acquired");
        ScopeGuard {
            scope: scope.to_string(),
            registry: self.scopes.clone(),
            held: Some(held),
            _global: global,
        }
    }

    /// Enter the process-wide exclusive section.
    pub async fn lock_global(&self) -> GlobalGuard {
        let global = self.global.clone().write_owned().await;
        trace!("global lock acquired");
        GlobalGuard { _global: global }
    }

    /// Number of scopes currently held or awaited.
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }
}
