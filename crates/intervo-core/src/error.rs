// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared across the Intervo server.

use thiserror::Error;

/// The primary error type surfaced by orchestrator operations and the edge.
///
/// Variants mirror the caller-visible taxonomy: validation failures, wrong
/// session state, missing records, version conflicts, downstream outages,
/// and unexpected internal errors. Analyzer-level failures are recovered
/// inside the client pool and never appear here directly.
#[derive(Debug, Error)]
pub enum IntervoError {
    /// Input shape or domain constraint validation failed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not valid in the session's current state.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// No such session, question, or answer.
    #[error("not found: {0}")]
    NotFound(String),

    /// Version conflict after the internal retry budget was exhausted.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Downstream dependency unhealthy and no fallback sufficed.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Configuration errors (invalid TOML, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntervoError {
    /// Storage error from any boxable source.
    pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        IntervoError::Storage {
            source: Box::new(source),
        }
    }
}
