// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`SessionStore`] for unit and integration tests.
//!
//! Mirrors the SQLite store's semantics exactly, including the optimistic
//! version check, so orchestrator tests exercise the same contract.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use intervo_core::types::{Session, SessionId, SessionState};
use intervo_core::IntervoError;

use crate::SessionStore;

/// HashMap-backed store guarded by a single async mutex.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<Session>, IntervoError> {
        Ok(self.sessions.lock().await.get(id.as_str()).cloned())
    }

    async fn put_if_version(
        &self,
        session: &Session,
        expected_version: u64,
    ) -> Result<(), IntervoError> {
        let mut sessions = self.sessions.lock().await;
        let current = sessions.get(session.id.as_str()).map(|s| s.version);
        match (current, expected_version) {
            (None, 0) => {
                sessions.insert(session.id.0.clone(), session.clone());
                Ok(())
            }
            (Some(stored), expected) if expected != 0 && stored == expected => {
                sessions.insert(session.id.0.clone(), session.clone());
                Ok(())
            }
            _ => Err(IntervoError::Conflict(format!(
                "session {} was not at version {expected_version}",
                session.id
            ))),
        }
    }

    async fn list(&self, owner: &str) -> Result<Vec<Session>, IntervoError> {
        let sessions = self.sessions.lock().await;
        let mut owned: Vec<Session> = sessions
            .values()
            .filter(|s| s.owner == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.timing.created_at.cmp(&a.timing.created_at));
        Ok(owned)
    }

    async fn abort_stale(&self) -> Result<usize, IntervoError> {
        let mut sessions = self.sessions.lock().await;
        let mut updated = 0;
        for session in sessions.values_mut() {
            if matches!(
                session.state,
                SessionState::Running | SessionState::Evaluating
            ) {
                session.state = SessionState::Aborted;
                session.version += 1;
                updated += 1;
            }
        }
        Ok(updated)
    }
}
