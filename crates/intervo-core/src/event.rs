// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime event vocabulary published per session over the event bus.
//!
//! Events are serialized as `{"type": ..., "payload": {...}}` and wrapped in
//! an [`EventEnvelope`] adding `session_id` and `server_time` before they
//! reach a WebSocket subscriber.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    Evaluation, Modality, ModalityStatus, Session, SessionState,
};

/// A single per-session event, in orchestrator commit order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Current session view, sent once to subscribers attaching mid-session.
    Snapshot { session: Session },
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    QuestionStarted {
        question_id: u32,
        index: usize,
        deadline: DateTime<Utc>,
    },
    AnswerAccepted { question_id: u32 },
    AnalysisProgress {
        question_id: u32,
        modality: Modality,
        status: ModalityStatus,
        score: u8,
    },
    AnalysisCompleted {
        question_id: u32,
        composite: u8,
    },
    SessionCompleted { evaluation: Evaluation },
}

impl SessionEvent {
    /// Critical events must reach every subscriber; the bus may drop the rest
    /// under backpressure.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            SessionEvent::Snapshot { .. }
                | SessionEvent::StateChanged { .. }
                | SessionEvent::SessionCompleted { .. }
        )
    }
}

/// Wire envelope delivered to realtime subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(flatten)]
    pub event: SessionEvent,
    pub session_id: String,
    pub server_time: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(session_id: &str, event: SessionEvent) -> Self {
        Self {
            event,
            session_id: session_id.to_string(),
            server_time: Utc::now(),
        }
    }
}
