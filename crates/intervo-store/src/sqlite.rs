// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`SessionStore`] trait.

use async_trait::async_trait;
use tracing::debug;

use intervo_config::model::StorageConfig;
use intervo_core::types::{Session, SessionId};
use intervo_core::IntervoError;

use crate::database::Database;
use crate::queries;
use crate::SessionStore;

/// SQLite-backed session store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query module. The version check in `put_if_version` provides
/// single-writer semantics per session id.
pub struct SqliteSessionStore {
    db: Database,
}

impl SqliteSessionStore {
    /// Open the store at the configured path, running migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, IntervoError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "SQLite session store opened");
        Ok(Self { db })
    }

    /// Checkpoint and close the underlying database.
    pub async fn close(&self) -> Result<(), IntervoError> {
        self.db.close().await
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<Session>, IntervoError> {
        queries::sessions::get_session(&self.db, id).await
    }

    async fn put_if_version(
        &self,
        session: &Session,
        expected_version: u64,
    ) -> Result<(), IntervoError> {
        queries::sessions::put_session_if_version(&self.db, session, expected_version).await
    }

    async fn list(&self, owner: &str) -> Result<Vec<Session>, IntervoError> {
        queries::sessions::list_sessions_for_owner(&self.db, owner).await
    }

    async fn abort_stale(&self) -> Result<usize, IntervoError> {
        queries::sessions::abort_stale_sessions(&self.db).await
    }
}
