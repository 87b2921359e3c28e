// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session row operations with the optimistic version check.

use intervo_core::types::{Session, SessionId};
use intervo_core::IntervoError;
use rusqlite::params;

use crate::database::{map_tr_err, Database};

/// Fetch and deserialize a session body by id.
pub async fn get_session(
    db: &Database,
    id: &SessionId,
) -> Result<Option<Session>, IntervoError> {
    let id = id.0.clone();
    let body: Option<String> = db
        .connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT body FROM sessions WHERE id = ?1",
                params![id],
                |row| row.get(0),
            );
            match result {
                Ok(body) => Ok(Some(body)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)?;

    body.map(|b| serde_json::from_str(&b).map_err(IntervoError::storage))
        .transpose()
}

/// Persist `session` iff the stored row still carries `expected_version`.
///
/// `expected_version == 0` inserts a new row and conflicts if the id exists.
/// Updates guard on `version = expected_version` so concurrent writers
/// serialize through the store.
pub async fn put_session_if_version(
    db: &Database,
    session: &Session,
    expected_version: u64,
) -> Result<(), IntervoError> {
    let id = session.id.0.clone();
    let owner = session.owner.clone();
    let state = session.state.to_string();
    let version = session.version as i64;
    let body = serde_json::to_string(session).map_err(IntervoError::storage)?;
    let created_at = session.timing.created_at.to_rfc3339();
    let expected = expected_version as i64;

    let changed: usize = db
        .connection()
        .call(move |conn| {
            let n = if expected == 0 {
                conn.execute(
                    "INSERT INTO sessions (id, owner, state, version, body, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                     ON CONFLICT (id) DO NOTHING",
                    params![id, owner, state, version, body, created_at],
                )?
            } else {
                conn.execute(
                    "UPDATE sessions
                     SET state = ?1, version = ?2, body = ?3,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?4 AND version = ?5",
                    params![state, version, body, id, expected],
                )?
            };
            Ok(n)
        })
        .await
        .map_err(map_tr_err)?;

    if changed == 1 {
        Ok(())
    } else {
        Err(IntervoError::Conflict(format!(
            "session {} was not at version {expected_version}",
            session.id
        )))
    }
}

/// List sessions for an owner, newest first.
pub async fn list_sessions_for_owner(
    db: &Database,
    owner: &str,
) -> Result<Vec<Session>, IntervoError> {
    let owner = owner.to_string();
    let bodies: Vec<String> = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT body FROM sessions WHERE owner = ?1 ORDER BY created_at DESC",
            )?;
            let rows = stmt.query_map(params![owner], |row| row.get(0))?;
            let mut bodies = Vec::new();
            for row in rows {
                bodies.push(row?);
            }
            Ok(bodies)
        })
        .await
        .map_err(map_tr_err)?;

    bodies
        .iter()
        .map(|b| serde_json::from_str(b).map_err(IntervoError::storage))
        .collect()
}

/// Mark sessions stranded mid-run by a previous process as aborted.
///
/// Rewrites both the indexed `state` column and the `state` field inside the
/// JSON body, bumping the version so later optimistic writes observe it.
pub async fn abort_stale_sessions(db: &Database) -> Result<usize, IntervoError> {
    db.connection()
        .call(|conn| {
            let n = conn.execute(
                "UPDATE sessions
                 SET state = 'aborted',
                     version = version + 1,
                     body = json_set(body, '$.state', 'aborted', '$.version', version + 1),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE state IN ('running', 'evaluating')",
                [],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)
}
