// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as valid URLs, port ranges, and threshold bounds.

use crate::diagnostic::ConfigError;
use crate::model::IntervoConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &IntervoConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    }

    if config.server.port == 0 {
        errors.push(ConfigError::Validation {
            message: "server.port must not be 0".to_string(),
        });
    }

    for (key, url) in [
        ("analyzers.face_url", &config.analyzers.face_url),
        ("analyzers.audio_url", &config.analyzers.audio_url),
        ("analyzers.text_url", &config.analyzers.text_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ConfigError::Validation {
                message: format!("{key} `{url}` must be an http(s) URL"),
            });
        }
    }

    if config.analyzers.timeout_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "analyzers.timeout_ms must be positive".to_string(),
        });
    }

    if config.scoring.pass_threshold > 100 {
        errors.push(ConfigError::Validation {
            message: format!(
                "scoring.pass_threshold must be at most 100, got {}",
                config.scoring.pass_threshold
            ),
        });
    }

    if config.scoring.evaluation_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "scoring.evaluation_timeout_secs must be positive".to_string(),
        });
    }

    if config.gateway.per_subscriber_queue == 0 {
        errors.push(ConfigError::Validation {
            message: "gateway.per_subscriber_queue must be positive".to_string(),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
