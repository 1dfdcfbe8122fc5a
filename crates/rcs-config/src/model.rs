// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the RCS delivery engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RcsConfig {
    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Delivery tracking and retry settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("rcs").join("rcs.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("rcs.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Delivery tracking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Time allowed for a one-to-one delivery report to arrive, in
    /// milliseconds. `0` disables delivery deadlines.
    #[serde(default = "default_msg_delivery_timeout_ms")]
    pub msg_delivery_timeout_ms: u64,

    /// The network stores and forwards messages for offline recipients, so
    /// undelivered items never expire locally.
    #[serde(default)]
    pub im_always_on: bool,

    /// Whether group conversations are dequeued at all.
    #[serde(default = "default_group_chat_enabled")]
    pub group_chat_enabled: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            msg_delivery_timeout_ms: default_msg_delivery_timeout_ms(),
            im_always_on: false,
            group_chat_enabled: default_group_chat_enabled(),
        }
    }
}

impl DeliveryConfig {
    /// Deadline for an outgoing one-to-one item sent at `sent_at`, or `0`
    /// when no deadline applies.
    pub fn deadline_for(&self, sent_at: i64) -> i64 {
        if self.im_always_on || self.msg_delivery_timeout_ms == 0 {
            return 0;
        }
        let timeout = i64::try_from(self.msg_delivery_timeout_ms).unwrap_or(i64::MAX);
        sent_at.saturating_add(timeout)
    }
}

fn default_msg_delivery_timeout_ms() -> u64 {
    300_000
}

fn default_group_chat_enabled() -> bool {
    true
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_deadline_is_five_minutes() {
        let config = DeliveryConfig::default();
        assert_eq!(config.deadline_for(1_000), 301_000);
    }

    #[test]
    fn always_on_disables_deadline() {
        let config = DeliveryConfig {
            im_always_on: true,
            ..DeliveryConfig::default()
        };
        assert_eq!(config.deadline_for(1_000), 0);
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let config = DeliveryConfig {
            msg_delivery_timeout_ms: 0,
            ..DeliveryConfig::default()
        };
        assert_eq!(config.deadline_for(1_000), 0);
    }

    #[test]
    fn default_database_path_ends_with_rcs_db() {
        assert!(StorageConfig::default().database_path.ends_with("rcs.db"));
    }
}
