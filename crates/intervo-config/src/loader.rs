// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./intervo.toml` > `~/.config/intervo/intervo.toml`
//! > `/etc/intervo/intervo.toml` with environment variable overrides via the
//! `INTERVO_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::IntervoConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/intervo/intervo.toml` (system-wide)
/// 3. `~/.config/intervo/intervo.toml` (user XDG config)
/// 4. `./intervo.toml` (local directory)
/// 5. `INTERVO_*` environment variables
pub fn load_config() -> Result<IntervoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(IntervoConfig::default()))
        .merge(Toml::file("/etc/intervo/intervo.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("intervo/intervo.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("intervo.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<IntervoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(IntervoConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<IntervoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(IntervoConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `INTERVO_ANALYZERS_FACE_URL` must map to
/// `analyzers.face_url`, not `analyzers.face.url`.
fn env_provider() -> Env {
    Env::prefixed("INTERVO_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: INTERVO_ANALYZERS_FACE_URL -> "analyzers_face_url"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("analyzers_", "analyzers.", 1)
            .replacen("scoring_", "scoring.", 1)
            .replacen("gateway_", "gateway.", 1)
            .replacen("storage_", "storage.", 1);
        mapped.into()
    })
}
