// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Port traits at the seams between the engine and its collaborators.
//!
//! Async ports use `#[async_trait]` so they can be held as trait objects.

pub mod alarm;
pub mod clock;
pub mod store;
pub mod transport;

pub use alarm::{AlarmKey, AlarmScheduler};
pub use clock::{Clock, SystemClock};
pub use store::DeliveryStore;
pub use transport::{Admission, DeliveryTransport};
