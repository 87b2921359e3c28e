// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Question set generation for interview sessions.
//!
//! The generator prompts the text analyzer's LLM backend for a structured
//! question set and validates the response. Any transport, status, or parse
//! failure falls back to the embedded deterministic bank (when enabled), so
//! session creation degrades instead of failing.

pub mod bank;
pub mod generator;

pub use generator::{GeneratedQuestions, QuestionGenerator};
