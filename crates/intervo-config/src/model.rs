// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Intervo server.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Intervo configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IntervoConfig {
    /// HTTP server bind and CORS settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// External analyzer service endpoints and dispatch policy.
    #[serde(default)]
    pub analyzers: AnalyzerConfig,

    /// Scoring thresholds and timing windows.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Realtime gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origin for the browser frontend. `None` allows any origin.
    #[serde(default)]
    pub frontend_origin: Option<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            frontend_origin: None,
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

/// External analyzer service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Facial analysis service base URL.
    #[serde(default = "default_face_url")]
    pub face_url: String,

    /// Audio analysis service base URL.
    #[serde(default = "default_audio_url")]
    pub audio_url: String,

    /// Text analysis / LLM service base URL.
    #[serde(default = "default_text_url")]
    pub text_url: String,

    /// API key forwarded to the text analyzer's LLM backend.
    /// `None` falls back to the `INTERVO_LLM_API_KEY` environment variable.
    #[serde(default)]
    pub llm_api_key: Option<String>,

    /// Per-call timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Use the embedded question bank when generation fails.
    #[serde(default = "default_fallback_enabled")]
    pub fallback_enabled: bool,

    /// Maximum accepted media reference size in bytes.
    #[serde(default = "default_max_media_bytes")]
    pub max_media_bytes: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            face_url: default_face_url(),
            audio_url: default_audio_url(),
            text_url: default_text_url(),
            llm_api_key: None,
            timeout_ms: default_timeout_ms(),
            fallback_enabled: default_fallback_enabled(),
            max_media_bytes: default_max_media_bytes(),
        }
    }
}

fn default_face_url() -> String {
    "http://127.0.0.1:5001".to_string()
}

fn default_audio_url() -> String {
    "http://127.0.0.1:5002".to_string()
}

fn default_text_url() -> String {
    "http://127.0.0.1:5003".to_string()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_fallback_enabled() -> bool {
    true
}

fn default_max_media_bytes() -> u64 {
    50 * 1024 * 1024
}

/// Scoring thresholds and timing windows.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    /// Minimum overall score to pass, 0 to 100.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: u8,

    /// Seconds past a question's time limit an answer is still accepted.
    #[serde(default = "default_answer_grace_seconds")]
    pub answer_grace_seconds: u32,

    /// Seconds after the last answer before unsettled analyses are failed.
    #[serde(default = "default_evaluation_timeout_secs")]
    pub evaluation_timeout_secs: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            pass_threshold: default_pass_threshold(),
            answer_grace_seconds: default_answer_grace_seconds(),
            evaluation_timeout_secs: default_evaluation_timeout_secs(),
        }
    }
}

fn default_pass_threshold() -> u8 {
    70
}

fn default_answer_grace_seconds() -> u32 {
    5
}

fn default_evaluation_timeout_secs() -> u64 {
    120
}

/// Realtime gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Bounded event queue length per WebSocket subscriber.
    #[serde(default = "default_per_subscriber_queue")]
    pub per_subscriber_queue: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            per_subscriber_queue: default_per_subscriber_queue(),
        }
    }
}

fn default_per_subscriber_queue() -> usize {
    64
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
    dirs::data_dir()
        .map(|p| p.join("intervo").join("intervo.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("intervo.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = IntervoConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.analyzers.timeout_ms, 20_000);
        assert_eq!(config.scoring.pass_threshold, 70);
        assert_eq!(config.scoring.answer_grace_seconds, 5);
        assert_eq!(config.gateway.per_subscriber_queue, 64);
        assert!(config.analyzers.fallback_enabled);
    }

    #[test]
    fn unknown_section_key_is_rejected() {
        let toml_str = r#"
[scoring]
pass_treshold = 80
"#;
        let result = toml::from_str::<IntervoConfig>(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn partial_section_keeps_defaults() {
        let toml_str = r#"
[analyzers]
text_url = "http://text.internal:9000"
"#;
        let config: IntervoConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.analyzers.text_url, "http://text.internal:9000");
        assert_eq!(config.analyzers.face_url, "http://127.0.0.1:5001");
        assert_eq!(config.analyzers.timeout_ms, 20_000);
    }
}
