// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change notifications raised by the persistence port.

use serde::{Deserialize, Serialize};

/// One logical resource changed. Published after the write is committed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeEvent {
    Message(String),
    FileTransfer(String),
    GroupChat(String),
    GroupDelivery { item_id: String, participant: String },
}
