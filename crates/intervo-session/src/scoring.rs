// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure scoring functions: per-answer composites and the session evaluation.
//!
//! Everything here is deterministic over persisted `AnswerAnalysis` data, so
//! recomputing an evaluation always yields the same result. The server is
//! the only place composites are computed; clients never submit scores.

use intervo_analyzers::ModalityOutcomes;
use intervo_core::types::{
    AnswerAnalysis, Confidence, Decision, Evaluation, ModalityStatus, Recommendation, Session,
};

/// Modality weights: the spoken/written content dominates, presentation
/// signals split the remainder.
const TEXT_WEIGHT: f64 = 0.5;
const FACIAL_WEIGHT: f64 = 0.25;
const AUDIO_WEIGHT: f64 = 0.25;

/// Cap on aggregated strength/improvement lists.
const FEEDBACK_CAP: usize = 5;

/// Combine the three modality reports into a per-answer analysis.
///
/// A failed modality's weight is redistributed proportionally over the
/// remaining contributing modalities; if everything failed the composite
/// is zero.
pub fn analyze(outcomes: ModalityOutcomes) -> AnswerAnalysis {
    let ModalityOutcomes {
        facial,
        audio,
        text,
    } = outcomes;

    let mut weighted = 0.0f64;
    let mut weight_sum = 0.0f64;
    for (report, weight) in [
        (&text, TEXT_WEIGHT),
        (&facial, FACIAL_WEIGHT),
        (&audio, AUDIO_WEIGHT),
    ] {
        if report.status != ModalityStatus::Failed {
            weighted += weight * f64::from(report.score);
            weight_sum += weight;
        }
    }

    let composite = if weight_sum > 0.0 {
        (weighted / weight_sum).round() as u8
    } else {
        0
    };

    AnswerAnalysis {
        facial,
        audio,
        text,
        composite,
    }
}

/// Compute the final evaluation over a fully analyzed session.
///
/// Every answer is expected to carry an analysis by the time this runs; the
/// orchestrator fills timed-out analyses with failed reports first. Answers
/// synthesized by the deadline timer naturally contribute a composite of
/// zero.
pub fn evaluate(session: &Session, pass_threshold: u8) -> Evaluation {
    let per_question: Vec<AnswerAnalysis> = session
        .answers
        .iter()
        .filter_map(|a| a.analysis.clone())
        .collect();

    let overall_score = if per_question.is_empty() {
        0
    } else {
        let sum: f64 = per_question.iter().map(|a| f64::from(a.composite)).sum();
        (sum / per_question.len() as f64).round() as u8
    };

    let passed = overall_score >= pass_threshold;
    let decision = decision_for(overall_score);
    let confidence = confidence_for(&per_question);

    Evaluation {
        overall_score,
        passed,
        strengths: collect_feedback(&per_question, "strengths"),
        improvements: collect_improvements(&per_question),
        recommendation: Recommendation {
            decision,
            confidence,
            reasoning: format!(
                "Scored {overall_score}/100 across {} answered questions; {}.",
                per_question.len(),
                decision_summary(decision)
            ),
            next_steps: next_steps_for(decision),
        },
        per_question,
    }
}

fn decision_for(overall_score: u8) -> Decision {
    match overall_score {
        85.. => Decision::StrongHire,
        70..=84 => Decision::Hire,
        55..=69 => Decision::Maybe,
        _ => Decision::Reject,
    }
}

/// Confidence tracks how much trustworthy text analysis backs the decision.
fn confidence_for(per_question: &[AnswerAnalysis]) -> Confidence {
    let solid_text = per_question
        .iter()
        .filter(|a| a.text.status == ModalityStatus::Ok)
        .count();
    match solid_text {
        3.. => Confidence::High,
        2 => Confidence::Medium,
        _ => Confidence::Low,
    }
}

fn decision_summary(decision: Decision) -> &'static str {
    match decision {
        Decision::StrongHire => "an exceptional performance",
        Decision::Hire => "a solid performance above the bar",
        Decision::Maybe => "a mixed performance worth a closer look",
        Decision::Reject => "a performance below the bar",
    }
}

fn next_steps_for(decision: Decision) -> Vec<String> {
    let steps: &[&str] = match decision {
        Decision::StrongHire => &["Move to offer discussion", "Schedule team fit conversation"],
        Decision::Hire => &["Proceed to the next interview round"],
        Decision::Maybe => &[
            "Schedule a follow-up focused on weak areas",
            "Collect an additional interviewer opinion",
        ],
        Decision::Reject => &["Send a decline with feedback"],
    };
    steps.iter().map(|s| (*s).to_string()).collect()
}

/// Union of string lists found under `key` in each answer's text detail,
/// first-seen order, deduplicated, capped.
fn collect_feedback(per_question: &[AnswerAnalysis], key: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for analysis in per_question {
        if let Some(items) = analysis.text.detail[key].as_array() {
            for item in items {
                if let Some(s) = item.as_str()
                    && !s.is_empty()
                    && !seen.iter().any(|existing: &String| existing == s)
                {
                    seen.push(s.to_string());
                    if seen.len() == FEEDBACK_CAP {
                        return seen;
                    }
                }
            }
        }
    }
    seen
}

/// Improvements come from either of the field names the text analyzer has
/// used across versions.
fn collect_improvements(per_question: &[AnswerAnalysis]) -> Vec<String> {
    let mut merged = collect_feedback(per_question, "improvement_suggestions");
    if merged.len() < FEEDBACK_CAP {
        for extra in collect_feedback(per_question, "suggestions") {
            if !merged.contains(&extra) {
                merged.push(extra);
                if merged.len() == FEEDBACK_CAP {
                    break;
                }
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use intervo_core::types::{
        Answer, Difficulty, InterviewType, ModalityReport, SessionConfig, SessionId,
        SessionState, SessionTiming,
    };
    use serde_json::json;

    fn report(score: u8, status: ModalityStatus) -> ModalityReport {
        ModalityReport {
            score,
            status,
            detail: json!({}),
        }
    }

    fn outcomes(
        facial: (u8, ModalityStatus),
        audio: (u8, ModalityStatus),
        text: (u8, ModalityStatus),
    ) -> ModalityOutcomes {
        ModalityOutcomes {
            facial: report(facial.0, facial.1),
            audio: report(audio.0, audio.1),
            text: report(text.0, text.1),
        }
    }

    #[test]
    fn full_weights_when_all_modalities_contribute() {
        let analysis = analyze(outcomes(
            (80, ModalityStatus::Ok),
            (50, ModalityStatus::Ok),
            (80, ModalityStatus::Ok),
        ));
        // 0.5*80 + 0.25*80 + 0.25*50 = 72.5 -> 73
        assert_eq!(analysis.composite, 73);
    }

    #[test]
    fn failed_modalities_redistribute_weight() {
        let analysis = analyze(outcomes(
            (0, ModalityStatus::Failed),
            (0, ModalityStatus::Failed),
            (80, ModalityStatus::Ok),
        ));
        assert_eq!(analysis.composite, 80, "text carries the full weight");
    }

    #[test]
    fn degraded_modalities_still_contribute() {
        let analysis = analyze(outcomes(
            (80, ModalityStatus::Ok),
            (50, ModalityStatus::Degraded),
            (80, ModalityStatus::Ok),
        ));
        assert_eq!(analysis.composite, 73);
    }

    #[test]
    fn all_failed_scores_zero() {
        let analysis = analyze(outcomes(
            (0, ModalityStatus::Failed),
            (0, ModalityStatus::Failed),
            (0, ModalityStatus::Failed),
        ));
        assert_eq!(analysis.composite, 0);
    }

    fn session_with_composites(specs: &[(u8, ModalityStatus)]) -> Session {
        let answers = specs
            .iter()
            .enumerate()
            .map(|(i, (composite, text_status))| Answer {
                question_id: i as u32 + 1,
                text: Some("answer".into()),
                media_ref: None,
                time_spent_seconds: 60,
                submitted_at: Utc::now(),
                analysis: Some(AnswerAnalysis {
                    facial: report(0, ModalityStatus::Failed),
                    audio: report(0, ModalityStatus::Failed),
                    text: report(*composite, *text_status),
                    composite: *composite,
                }),
            })
            .collect();

        Session {
            id: SessionId::generate(),
            owner: "user-1".into(),
            title: None,
            config: SessionConfig {
                interview_type: InterviewType::Technical,
                difficulty: Difficulty::Medium,
                duration_minutes: 15,
            },
            questions: vec![],
            state: SessionState::Evaluating,
            cursor: specs.len().saturating_sub(1),
            answers,
            timing: SessionTiming {
                created_at: Utc::now(),
                started_at: Some(Utc::now()),
                completed_at: None,
                question_deadline: None,
            },
            result: None,
            degraded_generation: false,
            version: 5,
        }
    }

    #[test]
    fn overall_is_rounded_mean_and_gates_pass() {
        let session = session_with_composites(&[
            (80, ModalityStatus::Ok),
            (80, ModalityStatus::Ok),
            (80, ModalityStatus::Ok),
        ]);
        let evaluation = evaluate(&session, 70);
        assert_eq!(evaluation.overall_score, 80);
        assert!(evaluation.passed);
        assert_eq!(evaluation.recommendation.decision, Decision::Hire);
        assert_eq!(evaluation.recommendation.confidence, Confidence::High);
        assert_eq!(evaluation.per_question.len(), 3);
    }

    #[test]
    fn unanswered_zero_drags_the_mean() {
        let session = session_with_composites(&[
            (90, ModalityStatus::Ok),
            (0, ModalityStatus::Failed),
        ]);
        let evaluation = evaluate(&session, 70);
        assert_eq!(evaluation.overall_score, 45);
        assert!(!evaluation.passed);
        assert_eq!(evaluation.recommendation.decision, Decision::Reject);
        assert_eq!(evaluation.recommendation.confidence, Confidence::Low);
    }

    #[test]
    fn decision_bands() {
        for (score, expected) in [
            (85, Decision::StrongHire),
            (84, Decision::Hire),
            (70, Decision::Hire),
            (69, Decision::Maybe),
            (55, Decision::Maybe),
            (54, Decision::Reject),
        ] {
            assert_eq!(decision_for(score), expected, "score {score}");
        }
    }

    #[test]
    fn confidence_counts_ok_text_answers() {
        let two_ok = session_with_composites(&[
            (70, ModalityStatus::Ok),
            (70, ModalityStatus::Ok),
            (70, ModalityStatus::Degraded),
        ]);
        assert_eq!(
            evaluate(&two_ok, 70).recommendation.confidence,
            Confidence::Medium
        );
    }

    #[test]
    fn feedback_dedupes_in_first_seen_order_with_cap() {
        let mut session = session_with_composites(&[
            (80, ModalityStatus::Ok),
            (80, ModalityStatus::Ok),
        ]);
        session.answers[0].analysis.as_mut().unwrap().text.detail = json!({
            "strengths": ["clear structure", "good examples", "clear structure"],
            "improvement_suggestions": ["slow down"]
        });
        session.answers[1].analysis.as_mut().unwrap().text.detail = json!({
            "strengths": ["good examples", "deep knowledge", "s4", "s5", "s6"],
            "suggestions": ["more detail"]
        });

        let evaluation = evaluate(&session, 70);
        assert_eq!(
            evaluation.strengths,
            vec!["clear structure", "good examples", "deep knowledge", "s4", "s5"]
        );
        assert_eq!(evaluation.improvements, vec!["slow down", "more detail"]);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let session = session_with_composites(&[
            (73, ModalityStatus::Ok),
            (61, ModalityStatus::Degraded),
        ]);
        let first = evaluate(&session, 70);
        let second = evaluate(&session, 70);
        assert_eq!(first, second);
    }
}
