// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The interview session orchestrator.
//!
//! Owns each session's lifecycle from creation through per-question timing,
//! answer capture, asynchronous analyzer fan-out, aggregate scoring, and
//! final evaluation persistence. All mutations of one session serialize
//! through a per-session lock plus the store's optimistic version check;
//! background analyzer completions re-enter that same path.

pub mod orchestrator;
pub mod scoring;

pub use orchestrator::{
    AnswerSubmission, InterviewOrchestrator, OrchestratorConfig, SubmitOutcome,
};
