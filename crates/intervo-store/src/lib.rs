// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence layer for interview sessions.
//!
//! The [`SessionStore`] trait is the single seam between the orchestrator and
//! durable storage. The production implementation is [`SqliteSessionStore`];
//! [`MemorySessionStore`] backs unit tests with identical semantics,
//! including the optimistic version check.

pub mod database;
pub mod memory;
pub mod migrations;
pub mod queries;
pub mod sqlite;

use async_trait::async_trait;
use intervo_core::types::{Session, SessionId};
use intervo_core::IntervoError;

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

/// Durable keyed store `id -> Session` with single-writer semantics per id.
///
/// `put_if_version` is the only mutation path: callers pass the session with
/// its version already bumped and the version they read. A mismatch means
/// another writer committed first and yields [`IntervoError::Conflict`].
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a session snapshot by id.
    async fn get(&self, id: &SessionId) -> Result<Option<Session>, IntervoError>;

    /// Persist `session` iff the stored version equals `expected_version`.
    ///
    /// `expected_version == 0` means "insert new"; an existing row with the
    /// same id is a conflict.
    async fn put_if_version(
        &self,
        session: &Session,
        expected_version: u64,
    ) -> Result<(), IntervoError>;

    /// List sessions owned by `owner`, newest first.
    async fn list(&self, owner: &str) -> Result<Vec<Session>, IntervoError>;

    /// Mark sessions left Running or Evaluating by a previous process as
    /// Aborted. Returns the number of sessions updated.
    async fn abort_stale(&self) -> Result<usize, IntervoError>;
}
