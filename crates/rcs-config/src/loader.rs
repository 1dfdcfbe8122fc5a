// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./rcs.toml` > `~/.config/rcs/rcs.toml` > `/etc/rcs/rcs.toml`
//! with environment variable overrides via `RCS_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::RcsConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/rcs/rcs.toml";

/// Configuration file looked up in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "rcs.toml";

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/rcs/rcs.toml` (system-wide)
/// 3. `~/.config/rcs/rcs.toml` (user XDG config)
/// 4. `./rcs.toml` (local directory)
/// 5. `RCS_*` environment variables
pub fn load_config() -> Result<RcsConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<RcsConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RcsConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RcsConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RcsConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(RcsConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// `~/.config/rcs/rcs.toml`, when the platform has a config directory.
pub fn user_config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|d| d.join("rcs").join("rcs.toml"))
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `RCS_DELIVERY_IM_ALWAYS_ON` must become
/// `delivery.im_always_on`, not `delivery.im.always.on`.
fn env_provider() -> Env {
    Env::prefixed("RCS_").map(|key| {
        let key_str = key.as_str();
        let mapped = if let Some(rest) = key_str.strip_prefix("storage_") {
            format!("storage.{rest}")
        } else if let Some(rest) = key_str.strip_prefix("delivery_") {
            format!("delivery.{rest}")
        } else if let Some(rest) = key_str.strip_prefix("logging_") {
            format!("logging.{rest}")
        } else {
            key_str.to_string()
        };
        mapped.into()
    })
}
