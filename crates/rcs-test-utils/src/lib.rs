// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for the RCS delivery engine.
//!
//! Provides deterministic stand-ins for every port the engine talks to and a
//! harness that wires them to a temp SQLite store.
//!
//! # Components
//!
//! - [`MockTransport`] - Scripted transport layer that records every hand-over
//! - [`ManualAlarmScheduler`] - Alarm facility that only fires when told to
//! - [`FixedClock`] - Clock that moves only when the test moves it
//! - [`TestHarness`] - Full engine over a temp database
//! - [`fixtures`] - Ready-made messages, transfers and group conversations

pub mod clock;
pub mod fixtures;
pub mod harness;
pub mod mock_alarm;
pub mod mock_transport;

pub use clock::FixedClock;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_alarm::ManualAlarmScheduler;
pub use mock_transport::{MockTransport, TransportCall};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// A panicking test must not poison the mocks for the assertions after it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
