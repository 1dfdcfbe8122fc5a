// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the RCS delivery engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, typed CRUD operations for chat
//! messages, file transfers, group conversations and group delivery records,
//! and change notifications published after every committed write.

mod codec;
mod sql;

pub mod database;
pub mod migrations;
pub mod notifier;
pub mod queries;
pub mod store;

pub use database::Database;
pub use notifier::ChangeNotifier;
pub use store::SqliteDeliveryStore;
