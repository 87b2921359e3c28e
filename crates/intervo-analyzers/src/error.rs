// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Analyzer error classes and the normalized result type.

use std::time::Duration;

use thiserror::Error;

/// Error classes for a single analyzer call.
///
/// The class decides the retry behavior: `Transient` retries with backoff,
/// `RateLimited` honors the server's `Retry-After`, `Permanent` fails
/// immediately. None of these escape the client pool — exhaustion becomes a
/// failed modality report.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Timeout, connection error, or 5xx — worth retrying.
    #[error("transient analyzer failure: {0}")]
    Transient(String),

    /// 4xx (except 429) or an unusable response body — retrying won't help.
    #[error("permanent analyzer failure: {0}")]
    Permanent(String),

    /// 429 with an optional `Retry-After` hint.
    #[error("rate limited by analyzer")]
    RateLimited { retry_after: Option<Duration> },
}

impl AnalyzerError {
    /// Short reason string recorded in failed modality reports.
    pub fn reason(&self) -> String {
        match self {
            AnalyzerError::Transient(msg) => format!("transient: {msg}"),
            AnalyzerError::Permanent(msg) => format!("permanent: {msg}"),
            AnalyzerError::RateLimited { .. } => "rate limited".to_string(),
        }
    }
}

/// Normalized outcome of one successful analyzer call.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerResult {
    /// Common 0..=100 score.
    pub score: u8,
    /// The analyzer's native payload, preserved for the modality report.
    pub detail: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_strings_identify_the_class() {
        assert!(AnalyzerError::Transient("timeout".into())
            .reason()
            .starts_with("transient"));
        assert!(AnalyzerError::Permanent("bad request".into())
            .reason()
            .starts_with("permanent"));
        assert_eq!(
            AnalyzerError::RateLimited { retry_after: None }.reason(),
            "rate limited"
        );
    }
}
