// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session data model: sessions, questions, answers, analyses, evaluations.
//!
//! These types are the persisted schema (serialized as JSON into the session
//! store) and the payload vocabulary of the realtime events, so every struct
//! here derives both `Serialize` and `Deserialize`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for an interview session (uuid v4 text).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generates a fresh random session id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Interview format requested at session creation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum InterviewType {
    Technical,
    Behavioral,
    Coding,
    SystemDesign,
}

/// Requested difficulty band.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Immutable interview parameters fixed at session creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(rename = "type")]
    pub interview_type: InterviewType,
    pub difficulty: Difficulty,
    /// Total interview duration, 5 to 120 minutes.
    pub duration_minutes: u32,
}

/// A single generated interview question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// 1-based id, unique within the session.
    pub id: u32,
    pub text: String,
    pub category: String,
    pub difficulty: Difficulty,
    #[serde(rename = "type")]
    pub interview_type: InterviewType,
    /// Per-question time limit, 60 to 1800 seconds.
    pub time_limit_seconds: u32,
    pub allow_video: bool,
    pub allow_audio: bool,
    pub allow_text: bool,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub expected_points: Vec<String>,
}

/// One candidate answer, in question order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: u32,
    /// Free-form text; empty string for deadline-synthesized answers.
    #[serde(default)]
    pub text: Option<String>,
    /// Opaque blob reference for recorded video or audio.
    #[serde(default)]
    pub media_ref: Option<String>,
    pub time_spent_seconds: u32,
    pub submitted_at: DateTime<Utc>,
    /// Set once the analyzer fan-out for this answer has settled.
    #[serde(default)]
    pub analysis: Option<AnswerAnalysis>,
}

impl Answer {
    /// True for answers synthesized by the deadline timer (no content at all).
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().unwrap_or("").is_empty() && self.media_ref.is_none()
    }
}

/// The three analyzer axes contributing to a per-answer composite.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Facial,
    Audio,
    Text,
}

/// Outcome classification of a single modality analysis.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ModalityStatus {
    Ok,
    Degraded,
    Failed,
}

/// Normalized result of one modality for one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalityReport {
    /// Normalized 0..=100 score.
    pub score: u8,
    pub status: ModalityStatus,
    /// Analyzer-native payload, preserved verbatim. Unknown fields land here
    /// and never influence the score.
    pub detail: serde_json::Value,
}

impl ModalityReport {
    /// A failed report with the given reason recorded in the detail object.
    pub fn failed(reason: &str) -> Self {
        Self {
            score: 0,
            status: ModalityStatus::Failed,
            detail: serde_json::json!({ "reason": reason }),
        }
    }
}

/// Per-answer scoring across all three modalities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerAnalysis {
    pub facial: ModalityReport,
    pub audio: ModalityReport,
    pub text: ModalityReport,
    /// Weighted 0..=100 combination of the contributing modalities.
    pub composite: u8,
}

/// Hiring decision buckets derived from the overall score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    StrongHire,
    Hire,
    Maybe,
    Reject,
}

/// Confidence in the recommendation, from text-analysis coverage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Final hiring recommendation attached to the evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub decision: Decision,
    pub confidence: Confidence,
    pub reasoning: String,
    pub next_steps: Vec<String>,
}

/// Aggregate per-session outcome, present only on completed sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub overall_score: u8,
    pub passed: bool,
    /// One entry per question, in question order.
    pub per_question: Vec<AnswerAnalysis>,
    /// Deduplicated, first-seen order, at most five entries.
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub recommendation: Recommendation,
}

/// Lifecycle states of a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Draft,
    Ready,
    Running,
    Evaluating,
    Completed,
    Aborted,
}

impl SessionState {
    /// Terminal sessions are never mutated again.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Aborted)
    }
}

/// Timestamps recorded over the session lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTiming {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Deadline for the current question while the session is running.
    #[serde(default)]
    pub question_deadline: Option<DateTime<Utc>>,
}

/// One candidate's single execution of an interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub owner: String,
    #[serde(default)]
    pub title: Option<String>,
    pub config: SessionConfig,
    /// Fixed at creation; immutable once the session reaches Ready.
    pub questions: Vec<Question>,
    pub state: SessionState,
    /// Index of the current question while Running, else the final answered index.
    pub cursor: usize,
    pub answers: Vec<Answer>,
    pub timing: SessionTiming,
    /// Present iff `state == Completed`.
    #[serde(default)]
    pub result: Option<Evaluation>,
    /// True when the question generator fell back to the embedded bank.
    #[serde(default)]
    pub degraded_generation: bool,
    /// Monotonically increasing on every persisted mutation.
    pub version: u64,
}

impl Session {
    /// The question at the cursor, if any.
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.cursor)
    }

    /// True when every question has a recorded answer.
    pub fn all_answered(&self) -> bool {
        self.answers.len() == self.questions.len()
    }
}
