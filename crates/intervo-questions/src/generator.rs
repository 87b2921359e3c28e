// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM-backed question generation with validation and fallback.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use intervo_analyzers::TextGenerator;
use intervo_core::types::{Difficulty, InterviewType, Question, SessionConfig};
use intervo_core::IntervoError;

use crate::bank;

const GENERATION_TEMPERATURE: f64 = 0.7;
const MAX_OUTPUT_TOKENS: u32 = 2048;
/// Hard cap on questions accepted from the model.
const MAX_QUESTIONS: usize = 30;
/// Cap on the computed target count.
const TARGET_CAP: u32 = 15;
const MIN_TIME_LIMIT: u32 = 120;
const MAX_TIME_LIMIT: u32 = 1800;
const DEFAULT_TIME_LIMIT: u32 = 300;

/// A generated question set, flagged when the bank had to stand in.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedQuestions {
    pub questions: Vec<Question>,
    pub degraded: bool,
}

/// Produces a valid ordered question sequence for a session config.
pub struct QuestionGenerator {
    llm: Arc<dyn TextGenerator>,
    fallback_enabled: bool,
}

/// How many questions to request for a config: one per five minutes (fifteen
/// for coding and system design, which need longer answers), at least three,
/// at most [`TARGET_CAP`].
pub fn target_count(config: &SessionConfig) -> usize {
    let unit = match config.interview_type {
        InterviewType::Coding | InterviewType::SystemDesign => 15,
        _ => 5,
    };
    (config.duration_minutes / unit).max(3).min(TARGET_CAP) as usize
}

impl QuestionGenerator {
    pub fn new(llm: Arc<dyn TextGenerator>, fallback_enabled: bool) -> Self {
        Self {
            llm,
            fallback_enabled,
        }
    }

    /// Generate a question set, falling back to the bank on any failure.
    pub async fn generate(
        &self,
        config: &SessionConfig,
    ) -> Result<GeneratedQuestions, IntervoError> {
        let count = target_count(config);
        let prompt = build_prompt(config, count);

        let failure = match self
            .llm
            .generate(&prompt, GENERATION_TEMPERATURE, MAX_OUTPUT_TOKENS)
            .await
        {
            Ok(raw) => match parse_questions(&raw, config) {
                Ok(questions) if !questions.is_empty() => {
                    let questions = enforce_budget(questions, config);
                    debug!(
                        count = questions.len(),
                        interview_type = %config.interview_type,
                        "question set generated"
                    );
                    return Ok(GeneratedQuestions {
                        questions,
                        degraded: false,
                    });
                }
                Ok(_) => "model returned an empty question list".to_string(),
                Err(reason) => reason,
            },
            Err(err) => err.reason(),
        };

        self.fallback(config, count, &failure)
    }

    fn fallback(
        &self,
        config: &SessionConfig,
        count: usize,
        reason: &str,
    ) -> Result<GeneratedQuestions, IntervoError> {
        if !self.fallback_enabled {
            return Err(IntervoError::Unavailable(format!(
                "question generation failed and fallback is disabled: {reason}"
            )));
        }

        warn!(reason, "question generation failed, using fallback bank");
        let questions = enforce_budget(
            bank::select(config.interview_type, config.difficulty, count),
            config,
        );
        Ok(GeneratedQuestions {
            questions,
            degraded: true,
        })
    }
}

/// Structured prompt with a fixed response schema the model must follow.
fn build_prompt(config: &SessionConfig, count: usize) -> String {
    let per_question_seconds =
        (config.duration_minutes * 60 / count.max(1) as u32).clamp(MIN_TIME_LIMIT, MAX_TIME_LIMIT);
    format!(
        r#"You are generating interview questions.

Produce exactly {count} {difficulty} {interview_type} interview questions.
Each answer slot is about {per_question_seconds} seconds.

Respond with ONLY a JSON object matching this schema, no prose:
{{
  "questions": [
    {{
      "text": "the question",
      "category": "short topic slug",
      "difficulty": "easy|medium|hard",
      "time_limit_seconds": {per_question_seconds},
      "hints": ["optional hint"],
      "expected_points": ["point a strong answer covers"]
    }}
  ]
}}"#,
        count = count,
        difficulty = config.difficulty,
        interview_type = config.interview_type,
        per_question_seconds = per_question_seconds,
    )
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    questions: Vec<RawQuestion>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    text: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    difficulty: Option<Difficulty>,
    #[serde(default)]
    time_limit_seconds: Option<u32>,
    #[serde(default)]
    allow_video: Option<bool>,
    #[serde(default)]
    allow_audio: Option<bool>,
    #[serde(default)]
    allow_text: Option<bool>,
    #[serde(default)]
    hints: Vec<String>,
    #[serde(default)]
    expected_points: Vec<String>,
}

/// Strip markdown code fences and isolate the outermost JSON object.
fn extract_json(raw: &str) -> Option<&str> {
    let cleaned = raw.trim();
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    (start < end).then(|| &cleaned[start..=end])
}

/// Parse and validate the model output into domain questions.
///
/// Returns a reason string on failure so the caller can log it before
/// falling back.
fn parse_questions(raw: &str, config: &SessionConfig) -> Result<Vec<Question>, String> {
    let json = extract_json(raw).ok_or_else(|| "no JSON object in response".to_string())?;
    let parsed: RawResponse =
        serde_json::from_str(json).map_err(|e| format!("malformed question JSON: {e}"))?;

    let mut questions = Vec::new();
    for (i, raw_q) in parsed.questions.into_iter().take(MAX_QUESTIONS).enumerate() {
        let text = raw_q.text.trim().to_string();
        if text.is_empty() {
            return Err(format!("question {} has empty text", i + 1));
        }

        let allow_video = raw_q.allow_video.unwrap_or(true);
        let allow_audio = raw_q.allow_audio.unwrap_or(true);
        let mut allow_text = raw_q.allow_text.unwrap_or(true);
        if !(allow_video || allow_audio || allow_text) {
            // A question nobody could answer; re-open the text channel.
            allow_text = true;
        }

        questions.push(Question {
            id: i as u32 + 1,
            text,
            category: raw_q.category.unwrap_or_else(|| "general".to_string()),
            difficulty: raw_q.difficulty.unwrap_or(config.difficulty),
            interview_type: config.interview_type,
            time_limit_seconds: raw_q
                .time_limit_seconds
                .unwrap_or(DEFAULT_TIME_LIMIT)
                .clamp(MIN_TIME_LIMIT, MAX_TIME_LIMIT),
            allow_video,
            allow_audio,
            allow_text,
            hints: raw_q.hints,
            expected_points: raw_q.expected_points,
        });
    }

    Ok(questions)
}

/// Truncate the tail so total time stays within `duration * 1.2`, keeping at
/// least the first question.
fn enforce_budget(questions: Vec<Question>, config: &SessionConfig) -> Vec<Question> {
    let budget = u64::from(config.duration_minutes) * 60 * 12 / 10;
    let mut total = 0u64;
    let mut kept = Vec::new();
    for question in questions {
        total += u64::from(question.time_limit_seconds);
        if !kept.is_empty() && total > budget {
            break;
        }
        kept.push(question);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use intervo_analyzers::AnalyzerError;

    struct ScriptedLlm {
        response: Result<String, ()>,
    }

    #[async_trait]
    impl TextGenerator for ScriptedLlm {
        async fn generate(
            &self,
            _prompt: &str,
            _temperature: f64,
            _max_output_tokens: u32,
        ) -> Result<String, AnalyzerError> {
            self.response
                .clone()
                .map_err(|_| AnalyzerError::Transient("llm unreachable".into()))
        }
    }

    fn generator(response: Result<String, ()>, fallback: bool) -> QuestionGenerator {
        QuestionGenerator::new(Arc::new(ScriptedLlm { response }), fallback)
    }

    fn config(interview_type: InterviewType, duration_minutes: u32) -> SessionConfig {
        SessionConfig {
            interview_type,
            difficulty: Difficulty::Medium,
            duration_minutes,
        }
    }

    fn valid_response(count: usize) -> String {
        let questions: Vec<serde_json::Value> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "text": format!("Question number {}?", i + 1),
                    "category": "general",
                    "difficulty": "medium",
                    "time_limit_seconds": 300
                })
            })
            .collect();
        serde_json::json!({ "questions": questions }).to_string()
    }

    #[test]
    fn target_counts_match_duration_and_type() {
        assert_eq!(target_count(&config(InterviewType::Technical, 5)), 3);
        assert_eq!(target_count(&config(InterviewType::Technical, 15)), 3);
        assert_eq!(target_count(&config(InterviewType::Technical, 60)), 12);
        assert_eq!(target_count(&config(InterviewType::Technical, 120)), 15);
        assert_eq!(target_count(&config(InterviewType::Coding, 120)), 8);
        assert_eq!(target_count(&config(InterviewType::SystemDesign, 15)), 3);
    }

    #[tokio::test]
    async fn valid_model_output_is_used_verbatim() {
        let generated = generator(Ok(valid_response(3)), true)
            .generate(&config(InterviewType::Technical, 15))
            .await
            .unwrap();
        assert!(!generated.degraded);
        assert_eq!(generated.questions.len(), 3);
        assert_eq!(
            generated.questions.iter().map(|q| q.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        let total: u32 = generated
            .questions
            .iter()
            .map(|q| q.time_limit_seconds)
            .sum();
        assert!(total <= 15 * 60 * 12 / 10);
    }

    #[tokio::test]
    async fn fenced_output_parses() {
        let fenced = format!("```json\n{}\n```", valid_response(3));
        let generated = generator(Ok(fenced), true)
            .generate(&config(InterviewType::Technical, 15))
            .await
            .unwrap();
        assert!(!generated.degraded);
        assert_eq!(generated.questions.len(), 3);
    }

    #[tokio::test]
    async fn time_limits_are_clamped() {
        let response = serde_json::json!({
            "questions": [
                {"text": "Too fast?", "time_limit_seconds": 30},
                {"text": "Too slow?", "time_limit_seconds": 9999}
            ]
        })
        .to_string();
        let generated = generator(Ok(response), true)
            .generate(&config(InterviewType::Technical, 120))
            .await
            .unwrap();
        assert_eq!(generated.questions[0].time_limit_seconds, 120);
        assert_eq!(generated.questions[1].time_limit_seconds, 1800);
    }

    #[tokio::test]
    async fn all_channels_disabled_reopens_text() {
        let response = serde_json::json!({
            "questions": [{
                "text": "Unanswerable?",
                "allow_video": false,
                "allow_audio": false,
                "allow_text": false
            }]
        })
        .to_string();
        let generated = generator(Ok(response), true)
            .generate(&config(InterviewType::Technical, 15))
            .await
            .unwrap();
        assert!(generated.questions[0].allow_text);
    }

    #[tokio::test]
    async fn malformed_json_falls_back_to_bank() {
        let generated = generator(Ok("{ not json".to_string()), true)
            .generate(&config(InterviewType::Technical, 15))
            .await
            .unwrap();
        assert!(generated.degraded);
        assert!(!generated.questions.is_empty());
    }

    #[tokio::test]
    async fn transport_failure_falls_back_to_bank() {
        let generated = generator(Err(()), true)
            .generate(&config(InterviewType::Behavioral, 15))
            .await
            .unwrap();
        assert!(generated.degraded);
        assert!(!generated.questions.is_empty());
        assert_eq!(
            generated.questions[0].interview_type,
            InterviewType::Behavioral
        );
    }

    #[tokio::test]
    async fn disabled_fallback_surfaces_unavailable() {
        let result = generator(Err(()), false)
            .generate(&config(InterviewType::Technical, 15))
            .await;
        assert!(matches!(result, Err(IntervoError::Unavailable(_))));
    }

    #[tokio::test]
    async fn budget_truncates_but_keeps_first_question() {
        // Three 300s questions against a 5-minute budget of 360s.
        let generated = generator(Ok(valid_response(3)), true)
            .generate(&config(InterviewType::Technical, 5))
            .await
            .unwrap();
        assert_eq!(generated.questions.len(), 1);
    }

    #[test]
    fn extract_json_handles_fences_and_prose() {
        assert_eq!(
            extract_json("Sure! ```json\n{\"questions\": []}\n``` hope that helps"),
            Some("{\"questions\": []}")
        );
        assert!(extract_json("no braces here").is_none());
    }
}
