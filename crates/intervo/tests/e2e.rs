// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end scenarios: real analyzer clients against wiremock services,
//! real question generation, and the SQLite store.

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use intervo_analyzers::AnalyzerPool;
use intervo_bus::EventBus;
use intervo_config::model::{AnalyzerConfig, StorageConfig};
use intervo_core::types::{
    Difficulty, InterviewType, ModalityStatus, SessionConfig, SessionId, SessionState,
};
use intervo_core::IntervoError;
use intervo_questions::QuestionGenerator;
use intervo_session::{AnswerSubmission, InterviewOrchestrator, OrchestratorConfig};
use intervo_store::{SessionStore, SqliteSessionStore};

struct Stack {
    orchestrator: Arc<InterviewOrchestrator>,
    _face: MockServer,
    _audio: MockServer,
    _text: MockServer,
    _dir: tempfile::TempDir,
}

fn questions_payload() -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "data": {
            "text": serde_json::json!({
                "questions": [
                    {"text": "Walk me through your last project.", "time_limit_seconds": 120},
                    {"text": "How do you test your code?", "time_limit_seconds": 120},
                    {"text": "Describe a production incident you handled.", "time_limit_seconds": 120}
                ]
            })
            .to_string()
        }
    })
}

async fn stack_with(
    face_response: ResponseTemplate,
    audio_responses: Vec<(ResponseTemplate, Option<u64>)>,
    text_response: ResponseTemplate,
    generate_response: ResponseTemplate,
) -> Stack {
    let face = MockServer::start().await;
    let audio = MockServer::start().await;
    let text = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(face_response)
        .mount(&face)
        .await;

    for (template, up_to) in audio_responses {
        let mock = Mock::given(method("POST")).and(path("/analyze")).respond_with(template);
        match up_to {
            Some(n) => mock.up_to_n_times(n).mount(&audio).await,
            None => mock.mount(&audio).await,
        }
    }

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(text_response)
        .mount(&text)
        .await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(generate_response)
        .mount(&text)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let storage = StorageConfig {
        database_path: dir.path().join("e2e.db").to_string_lossy().into_owned(),
        wal_mode: true,
    };
    let store = Arc::new(SqliteSessionStore::open(&storage).await.unwrap());

    let analyzers = AnalyzerConfig {
        face_url: face.uri(),
        audio_url: audio.uri(),
        text_url: text.uri(),
        llm_api_key: None,
        timeout_ms: 2000,
        fallback_enabled: true,
        max_media_bytes: 1024,
    };
    let pool = AnalyzerPool::from_config(&analyzers).unwrap();
    let generator = QuestionGenerator::new(pool.text_generator(), true);

    let orchestrator = InterviewOrchestrator::new(
        store,
        Arc::new(pool),
        generator,
        Arc::new(EventBus::new(64)),
        OrchestratorConfig::default(),
    );

    Stack {
        orchestrator,
        _face: face,
        _audio: audio,
        _text: text,
        _dir: dir,
    }
}

fn ok_fraction(key: &str, fraction: f64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "success": true,
        "data": { key: fraction }
    }))
}

fn session_config() -> SessionConfig {
    SessionConfig {
        interview_type: InterviewType::Technical,
        difficulty: Difficulty::Medium,
        duration_minutes: 15,
    }
}

async fn wait_completed(stack: &Stack, id: &SessionId) -> intervo_core::types::Session {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let session = stack.orchestrator.get(id).await.unwrap();
        if session.state == SessionState::Completed {
            return session;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "session stuck in {}",
            session.state
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// Scenario: audio flaky (503 twice, then 50%), face 80%, text 80%.
/// Per-answer composite = round(0.5*80 + 0.25*80 + 0.25*50) = 73.
#[tokio::test]
async fn flaky_audio_degrades_but_session_passes() {
    let stack = stack_with(
        ok_fraction("overall_confidence", 0.8),
        vec![
            (ResponseTemplate::new(503), Some(2)),
            (ok_fraction("overall_quality", 0.5), None),
        ],
        ok_fraction("overall_quality", 0.8),
        ResponseTemplate::new(200).set_body_json(questions_payload()),
    )
    .await;

    let session = stack
        .orchestrator
        .create("candidate-1", None, session_config())
        .await
        .unwrap();
    assert!(!session.degraded_generation);
    assert_eq!(session.questions.len(), 3);
    let id = session.id.clone();

    stack.orchestrator.start(&id).await.unwrap();
    for question in &session.questions {
        stack
            .orchestrator
            .submit_answer(
                &id,
                AnswerSubmission {
                    question_id: question.id,
                    text: Some("a thorough answer".into()),
                    media_ref: Some("blob://recording".into()),
                    time_spent_seconds: 60,
                },
            )
            .await
            .unwrap();
    }

    let completed = wait_completed(&stack, &id).await;
    let evaluation = completed.result.unwrap();
    assert_eq!(evaluation.overall_score, 73);
    assert!(evaluation.passed);
    for analysis in &evaluation.per_question {
        assert_eq!(analysis.composite, 73);
        assert_eq!(analysis.facial.status, ModalityStatus::Ok);
        assert_eq!(analysis.text.status, ModalityStatus::Ok);
    }
    // The flaky service succeeded only after retries at least once.
    assert!(
        evaluation
            .per_question
            .iter()
            .any(|a| a.audio.status == ModalityStatus::Degraded),
        "audio retries should mark at least one answer degraded"
    );
}

/// Strengths and improvements aggregate from the text analyzer's detail.
#[tokio::test]
async fn evaluation_aggregates_feedback_strings() {
    let text_detail = ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "success": true,
        "data": {
            "overall_quality": 0.9,
            "strengths": ["structured thinking", "clear examples"],
            "improvement_suggestions": ["quantify impact"]
        }
    }));

    let stack = stack_with(
        ok_fraction("overall_confidence", 0.9),
        vec![(ok_fraction("overall_quality", 0.9), None)],
        text_detail,
        ResponseTemplate::new(200).set_body_json(questions_payload()),
    )
    .await;

    let session = stack
        .orchestrator
        .create("candidate-2", None, session_config())
        .await
        .unwrap();
    let id = session.id.clone();
    stack.orchestrator.start(&id).await.unwrap();
    for question in &session.questions {
        stack
            .orchestrator
            .submit_answer(
                &id,
                AnswerSubmission {
                    question_id: question.id,
                    text: Some("answer".into()),
                    media_ref: Some("blob://rec".into()),
                    time_spent_seconds: 30,
                },
            )
            .await
            .unwrap();
    }

    let completed = wait_completed(&stack, &id).await;
    let evaluation = completed.result.unwrap();
    assert_eq!(evaluation.overall_score, 90);
    assert_eq!(
        evaluation.strengths,
        vec!["structured thinking", "clear examples"]
    );
    assert_eq!(evaluation.improvements, vec!["quantify impact"]);
    assert_eq!(
        evaluation.recommendation.decision,
        intervo_core::types::Decision::StrongHire
    );
    assert_eq!(
        evaluation.recommendation.confidence,
        intervo_core::types::Confidence::High
    );
}

/// Malformed generation output falls back to the bank and flags the session.
#[tokio::test]
async fn malformed_generation_uses_fallback_bank() {
    let garbage = ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "success": true,
        "data": {"text": "here are your questions: 1) tell me..."}
    }));

    let stack = stack_with(
        ok_fraction("overall_confidence", 0.8),
        vec![(ok_fraction("overall_quality", 0.8), None)],
        ok_fraction("overall_quality", 0.8),
        garbage,
    )
    .await;

    let session = stack
        .orchestrator
        .create("candidate-3", None, session_config())
        .await
        .unwrap();
    assert!(session.degraded_generation);
    assert!(!session.questions.is_empty());
    assert_eq!(session.state, SessionState::Ready);

    // The degraded session still runs.
    stack.orchestrator.start(&session.id).await.unwrap();
    let running = stack.orchestrator.get(&session.id).await.unwrap();
    assert_eq!(running.state, SessionState::Running);
}

/// Abort during evaluation discards in-flight analyzer results.
#[tokio::test]
async fn abort_mid_evaluation_discards_slow_results() {
    let slow_text = ResponseTemplate::new(200)
        .set_body_json(serde_json::json!({
            "success": true,
            "data": {"overall_quality": 0.8}
        }))
        .set_delay(Duration::from_millis(500));

    let stack = stack_with(
        ok_fraction("overall_confidence", 0.8),
        vec![(ok_fraction("overall_quality", 0.8), None)],
        slow_text,
        ResponseTemplate::new(200).set_body_json(questions_payload()),
    )
    .await;

    let session = stack
        .orchestrator
        .create("candidate-4", None, session_config())
        .await
        .unwrap();
    let id = session.id.clone();
    stack.orchestrator.start(&id).await.unwrap();
    for question in &session.questions {
        stack
            .orchestrator
            .submit_answer(
                &id,
                AnswerSubmission {
                    question_id: question.id,
                    text: Some("answer".into()),
                    media_ref: None,
                    time_spent_seconds: 30,
                },
            )
            .await
            .unwrap();
    }
    assert_eq!(
        stack.orchestrator.get(&id).await.unwrap().state,
        SessionState::Evaluating
    );

    stack.orchestrator.abort(&id, "candidate dropped").await.unwrap();

    tokio::time::sleep(Duration::from_millis(800)).await;
    let after = stack.orchestrator.get(&id).await.unwrap();
    assert_eq!(after.state, SessionState::Aborted);
    assert!(after.result.is_none());
    assert!(matches!(
        stack.orchestrator.result(&id).await,
        Err(IntervoError::FailedPrecondition(_))
    ));
}

/// Completed sessions are durable: a fresh store over the same database file
/// serves the identical evaluation.
#[tokio::test]
async fn completed_sessions_survive_store_reopen() {
    let stack = stack_with(
        ok_fraction("overall_confidence", 0.8),
        vec![(ok_fraction("overall_quality", 0.8), None)],
        ok_fraction("overall_quality", 0.8),
        ResponseTemplate::new(200).set_body_json(questions_payload()),
    )
    .await;

    let session = stack
        .orchestrator
        .create("candidate-5", None, session_config())
        .await
        .unwrap();
    let id = session.id.clone();
    stack.orchestrator.start(&id).await.unwrap();
    for question in &session.questions {
        stack
            .orchestrator
            .submit_answer(
                &id,
                AnswerSubmission {
                    question_id: question.id,
                    text: Some("answer".into()),
                    media_ref: Some("blob://rec".into()),
                    time_spent_seconds: 30,
                },
            )
            .await
            .unwrap();
    }
    let completed = wait_completed(&stack, &id).await;
    let evaluation = completed.result.clone().unwrap();

    // Reopen the same database file as a restarted process would.
    let storage = StorageConfig {
        database_path: stack
            ._dir
            .path()
            .join("e2e.db")
            .to_string_lossy()
            .into_owned(),
        wal_mode: true,
    };
    let reopened = SqliteSessionStore::open(&storage).await.unwrap();
    let stale = reopened.abort_stale().await.unwrap();
    assert_eq!(stale, 0, "completed sessions are not stale");

    let persisted = reopened.get(&id).await.unwrap().unwrap();
    assert_eq!(persisted.state, SessionState::Completed);
    assert_eq!(persisted.result.unwrap(), evaluation);
}
