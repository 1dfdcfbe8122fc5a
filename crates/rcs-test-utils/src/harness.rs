// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end engine testing.
//!
//! `TestHarness` assembles a complete [`DeliveryEngine`] over a temp SQLite
//! database with a mock transport, a manual alarm facility and a fixed
//! clock.

use std::sync::Arc;

use rcs_config::model::{DeliveryConfig, StorageConfig};
use rcs_core::{AlarmKey, DeliveryStore, RcsError, Timestamp};
use rcs_delivery::DeliveryEngine;
use rcs_storage::SqliteDeliveryStore;

use crate::clock::FixedClock;
use crate::mock_alarm::ManualAlarmScheduler;
use crate::mock_transport::MockTransport;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: DeliveryConfig,
    now: Timestamp,
    registered: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: DeliveryConfig::default(),
            now: 1_000_000,
            registered: true,
        }
    }

    pub fn with_config(mut self, config: DeliveryConfig) -> Self {
        self.config = config;
        self
    }

    /// Start the clock at `now`.
    pub fn with_now(mut self, now: Timestamp) -> Self {
        self.now = now;
        self
    }

    /// Start with the IMS registration down.
    pub fn unregistered(mut self) -> Self {
        self.registered = false;
        self
    }

    /// Build the test harness, creating the temp database.
    pub async fn build(self) -> Result<TestHarness, RcsError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| RcsError::Storage { source: e.into() })?;
        let storage = StorageConfig {
            database_path: temp_dir.path().join("rcs.db").to_string_lossy().to_string(),
            wal_mode: true,
        };
        let store = Arc::new(SqliteDeliveryStore::open(&storage).await?);

        let transport = Arc::new(MockTransport::new());
        transport.set_registered(self.registered);
        let alarms = Arc::new(ManualAlarmScheduler::new());
        let clock = Arc::new(FixedClock::new(self.now));

        let engine = DeliveryEngine::new(
            store.clone(),
            transport.clone(),
            alarms.clone(),
            clock.clone(),
            self.config.clone(),
        );

        Ok(TestHarness {
            engine,
            store,
            transport,
            alarms,
            clock,
            config: self.config,
            storage,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete engine over a temp database.
pub struct TestHarness {
    pub engine: DeliveryEngine,
    pub store: Arc<SqliteDeliveryStore>,
    pub transport: Arc<MockTransport>,
    pub alarms: Arc<ManualAlarmScheduler>,
    pub clock: Arc<FixedClock>,
    pub config: DeliveryConfig,
    storage: StorageConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default configuration.
    pub async fn new() -> Result<Self, RcsError> {
        Self::builder().build().await
    }

    /// The store as the engine sees it.
    pub fn dyn_store(&self) -> Arc<dyn DeliveryStore> {
        self.store.clone()
    }

    /// Simulate a process restart: the database survives, the engine, the
    /// transport state and every armed alarm do not. Nothing is run; call
    /// [`DeliveryEngine::start`] on the result.
    pub async fn restart(self) -> Result<Self, RcsError> {
        self.store.close().await?;
        drop(self.engine);
        let store = Arc::new(SqliteDeliveryStore::open(&self.storage).await?);
        let transport = Arc::new(MockTransport::new());
        let alarms = Arc::new(ManualAlarmScheduler::new());
        let engine = DeliveryEngine::new(
            store.clone(),
            transport.clone(),
            alarms.clone(),
            self.clock.clone(),
            self.config.clone(),
        );
        Ok(Self {
            engine,
            store,
            transport,
            alarms,
            clock: self.clock,
            config: self.config,
            storage: self.storage,
            _temp_dir: self._temp_dir,
        })
    }

    /// Fire every alarm due at the current clock time. Returns the keys
    /// whose item was flagged expired.
    pub async fn fire_due_alarms(&self) -> Result<Vec<AlarmKey>, RcsError> {
        let now = rcs_core::Clock::now_millis(self.clock.as_ref());
        let mut expired = Vec::new();
        for key in self.alarms.take_due(now) {
            if self.engine.on_alarm(&key).await? {
                expired.push(key);
            }
        }
        Ok(expired)
    }
}
