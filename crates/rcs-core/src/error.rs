// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the RCS delivery engine.

use thiserror::Error;

/// The primary error type used across all port traits and engine operations.
#[derive(Debug, Error)]
pub enum RcsError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An expected row is missing.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A caller asked for a transition the state machine never performs
    /// through the requested entry point.
    #[error("illegal transition of {item_id} to {state}")]
    IllegalTransition { item_id: String, state: String },

    /// A persisted integer does not map to any variant of the named enum.
    #[error("invalid stored value {value} for {enum_name}")]
    InvalidEncoding { enum_name: &'static str, value: i64 },

    /// A predicate references a column the target collection does not have.
    #[error("invalid predicate: {0}")]
    InvalidPredicate(String),

    /// Transport layer failure while handing an item over.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RcsError {
    /// Shorthand for a missing chat message.
    pub fn message_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "chat message",
            id: id.into(),
        }
    }

    /// Shorthand for a missing file transfer.
    pub fn file_transfer_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "file transfer",
            id: id.into(),
        }
    }

    /// Shorthand for a missing group conversation.
    pub fn group_chat_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "group chat",
            id: id.into(),
        }
    }
}

/// Outcome classes reported by the transport layer's dequeue entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Session or network temporarily unavailable; the item stays as it is.
    #[error("transient transport failure: {0}")]
    Transient(String),

    /// Sending is categorically disallowed for this item.
    #[error("terminal transport failure: {message}")]
    Terminal { message: String },

    /// Anything the transport did not classify (malformed payload, bug).
    #[error("unexpected transport failure: {0}")]
    Unexpected(String),
}
