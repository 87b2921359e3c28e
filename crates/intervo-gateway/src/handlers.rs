// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the interview REST API under `/api`.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use intervo_core::types::{
    Difficulty, Evaluation, InterviewType, Question, Session, SessionConfig, SessionId,
};
use intervo_core::IntervoError;
use intervo_session::{AnswerSubmission, SubmitOutcome};

use crate::error::ApiError;
use crate::server::GatewayState;

/// Request body for POST /api/interviews.
#[derive(Debug, Deserialize)]
pub struct CreateInterviewRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub interview_type: InterviewType,
    pub difficulty: Difficulty,
    /// Interview duration in minutes.
    pub duration: u32,
}

/// Response wrapper carrying a full session snapshot.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: Session,
}

/// Request body for POST /api/interviews/{id}/answers.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_id: u32,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media_ref: Option<String>,
    pub time_spent_seconds: u32,
}

/// Response body for POST /api/interviews/{id}/answers.
#[derive(Debug, Serialize)]
pub struct SubmitAnswerResponse {
    pub accepted: bool,
    /// True when that was the last question and evaluation has begun.
    #[serde(rename = "final")]
    pub is_final: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_question: Option<Question>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

/// Request body for POST /api/interviews/{id}/abort.
#[derive(Debug, Default, Deserialize)]
pub struct AbortRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Request body for POST /api/questions/generate.
#[derive(Debug, Deserialize)]
pub struct GenerateQuestionsRequest {
    #[serde(rename = "type")]
    pub interview_type: InterviewType,
    pub difficulty: Difficulty,
    pub duration: u32,
}

/// Response body for POST /api/questions/generate.
#[derive(Debug, Serialize)]
pub struct GenerateQuestionsResponse {
    pub questions: Vec<Question>,
    pub degraded_generation: bool,
}

/// Response body for GET /api/health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// The caller identity; authentication itself is an external collaborator,
/// the edge trusts the forwarded header.
fn owner_from(headers: &HeaderMap) -> String {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or("anonymous")
        .to_string()
}

/// POST /api/interviews
pub async fn create_interview(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<CreateInterviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let config = SessionConfig {
        interview_type: body.interview_type,
        difficulty: body.difficulty,
        duration_minutes: body.duration,
    };
    let session = state
        .orchestrator
        .create(&owner_from(&headers), body.title, config)
        .await?;
    Ok((StatusCode::CREATED, Json(SessionResponse { session })))
}

/// GET /api/interviews
pub async fn list_interviews(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Session>>, ApiError> {
    let sessions = state.orchestrator.list(&owner_from(&headers)).await?;
    Ok(Json(sessions))
}

/// GET /api/interviews/{id}
pub async fn get_interview(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.orchestrator.get(&SessionId(id)).await?;
    Ok(Json(SessionResponse { session }))
}

/// POST /api/interviews/{id}/start
pub async fn start_interview(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.orchestrator.start(&SessionId(id)).await?;
    Ok(Json(SessionResponse { session }))
}

/// POST /api/interviews/{id}/answers
pub async fn submit_answer(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<SubmitAnswerRequest>,
) -> Result<Json<SubmitAnswerResponse>, ApiError> {
    if let Some(media_ref) = &body.media_ref
        && media_ref.len() as u64 > state.max_media_bytes
    {
        return Err(IntervoError::InvalidArgument(format!(
            "media_ref exceeds {} bytes",
            state.max_media_bytes
        ))
        .into());
    }

    let outcome = state
        .orchestrator
        .submit_answer(
            &SessionId(id),
            AnswerSubmission {
                question_id: body.question_id,
                text: body.text,
                media_ref: body.media_ref,
                time_spent_seconds: body.time_spent_seconds,
            },
        )
        .await?;

    let response = match outcome {
        SubmitOutcome::Next { question, deadline } => SubmitAnswerResponse {
            accepted: true,
            is_final: false,
            next_question: Some(question),
            deadline: Some(deadline),
        },
        SubmitOutcome::Final => SubmitAnswerResponse {
            accepted: true,
            is_final: true,
            next_question: None,
            deadline: None,
        },
    };
    Ok(Json(response))
}

/// POST /api/interviews/{id}/abort
pub async fn abort_interview(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    body: Option<Json<AbortRequest>>,
) -> Result<StatusCode, ApiError> {
    let reason = body
        .and_then(|Json(b)| b.reason)
        .unwrap_or_else(|| "aborted by caller".to_string());
    state.orchestrator.abort(&SessionId(id), &reason).await?;
    Ok(StatusCode::OK)
}

/// GET /api/interviews/{id}/result
pub async fn get_result(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<Evaluation>, ApiError> {
    let evaluation = state.orchestrator.result(&SessionId(id)).await?;
    Ok(Json(evaluation))
}

/// POST /api/questions/generate
pub async fn generate_questions(
    State(state): State<GatewayState>,
    Json(body): Json<GenerateQuestionsRequest>,
) -> Result<Json<GenerateQuestionsResponse>, ApiError> {
    let config = SessionConfig {
        interview_type: body.interview_type,
        difficulty: body.difficulty,
        duration_minutes: body.duration,
    };
    if !(5..=120).contains(&config.duration_minutes) {
        return Err(IntervoError::InvalidArgument(format!(
            "duration must be within 5..=120 minutes, got {}",
            config.duration_minutes
        ))
        .into());
    }
    let generated = state.orchestrator.preview_questions(config).await?;
    Ok(Json(GenerateQuestionsResponse {
        questions: generated.questions,
        degraded_generation: generated.degraded,
    }))
}

/// GET /api/health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_deserializes_kebab_type() {
        let json = r#"{"type": "system-design", "difficulty": "hard", "duration": 30}"#;
        let req: CreateInterviewRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.interview_type, InterviewType::SystemDesign);
        assert_eq!(req.difficulty, Difficulty::Hard);
        assert_eq!(req.duration, 30);
        assert!(req.title.is_none());
    }

    #[test]
    fn submit_request_accepts_partial_payloads() {
        let json = r#"{"question_id": 2, "text": "an answer", "time_spent_seconds": 45}"#;
        let req: SubmitAnswerRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.question_id, 2);
        assert_eq!(req.text.as_deref(), Some("an answer"));
        assert!(req.media_ref.is_none());
    }

    #[test]
    fn submit_response_uses_final_keyword_and_omits_empty_fields() {
        let response = SubmitAnswerResponse {
            accepted: true,
            is_final: true,
            next_question: None,
            deadline: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"final\":true"));
        assert!(!json.contains("next_question"));
    }

    #[test]
    fn owner_defaults_to_anonymous() {
        let headers = HeaderMap::new();
        assert_eq!(owner_from(&headers), "anonymous");

        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", "user-42".parse().unwrap());
        assert_eq!(owner_from(&headers), "user-42");
    }
}
