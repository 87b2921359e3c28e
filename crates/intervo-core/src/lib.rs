// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core domain types for the Intervo interview assessment server.
//!
//! This crate defines the session data model, the error taxonomy shared by
//! every other crate, and the realtime event types published over the bus.

pub mod error;
pub mod event;
pub mod types;

pub use error::IntervoError;
pub use event::{EventEnvelope, SessionEvent};
pub use types::{
    Answer, AnswerAnalysis, Confidence, Decision, Difficulty, Evaluation, InterviewType,
    Modality, ModalityReport, ModalityStatus, Question, Recommendation, Session,
    SessionConfig, SessionId, SessionState, SessionTiming,
};
