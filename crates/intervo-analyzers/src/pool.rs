// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fan-out of one answer across the applicable analyzer modalities.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use intervo_config::model::AnalyzerConfig;
use intervo_core::types::{Answer, Modality, ModalityReport, ModalityStatus, Question};
use intervo_core::IntervoError;

use crate::breaker::CircuitBreaker;
use crate::client::{AudioClient, FaceClient, TextClient};
use crate::dispatch::{DispatchOutcome, RetryPolicy};
use crate::error::AnalyzerError;
use crate::{AnswerAnalyzer, ProgressFn, TextGenerator};

/// The three per-answer modality reports, before composite scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalityOutcomes {
    pub facial: ModalityReport,
    pub audio: ModalityReport,
    pub text: ModalityReport,
}

/// One client per external modality, sharing nothing but the retry policy.
///
/// Breaker state is per analyzer and process-wide: a face service outage
/// observed by one session fails fast for every other session.
pub struct AnalyzerPool {
    face: FaceClient,
    audio: AudioClient,
    text: Arc<TextClient>,
}

impl AnalyzerPool {
    /// Build the pool from configuration, one breaker per analyzer.
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self, IntervoError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let policy = RetryPolicy::default();
        let api_key = config
            .llm_api_key
            .clone()
            .or_else(|| std::env::var("INTERVO_LLM_API_KEY").ok());

        Ok(Self {
            face: FaceClient::new(
                &config.face_url,
                timeout,
                Arc::new(CircuitBreaker::new("face")),
                policy.clone(),
            )?,
            audio: AudioClient::new(
                &config.audio_url,
                timeout,
                Arc::new(CircuitBreaker::new("audio")),
                policy.clone(),
            )?,
            text: Arc::new(TextClient::new(
                &config.text_url,
                timeout,
                api_key.as_deref(),
                Arc::new(CircuitBreaker::new("text")),
                policy,
            )?),
        })
    }

    /// The text client, for question generation.
    pub fn text_generator(&self) -> Arc<dyn TextGenerator> {
        self.text.clone()
    }

    fn report_from(outcome: Result<DispatchOutcome, AnalyzerError>) -> ModalityReport {
        match outcome {
            Ok(outcome) => ModalityReport {
                score: outcome.result.score,
                status: if outcome.retries > 0 {
                    ModalityStatus::Degraded
                } else {
                    ModalityStatus::Ok
                },
                detail: outcome.result.detail,
            },
            Err(err) => ModalityReport::failed(&err.reason()),
        }
    }
}

#[async_trait]
impl AnswerAnalyzer for AnalyzerPool {
    async fn analyze_answer(
        &self,
        question: &Question,
        answer: &Answer,
        progress: ProgressFn,
    ) -> ModalityOutcomes {
        let facial_fut = async {
            let report = match (question.allow_video, answer.media_ref.as_deref()) {
                (true, Some(media)) => Self::report_from(self.face.analyze(media).await),
                _ => ModalityReport::failed("missing input"),
            };
            progress(Modality::Facial, &report);
            report
        };

        let audio_fut = async {
            let report = match (question.allow_audio, answer.media_ref.as_deref()) {
                (true, Some(media)) => Self::report_from(self.audio.analyze(media).await),
                _ => ModalityReport::failed("missing input"),
            };
            progress(Modality::Audio, &report);
            report
        };

        let text_fut = async {
            let report = match (question.allow_text, answer.text.as_deref()) {
                (true, Some(text)) if !text.is_empty() => {
                    Self::report_from(self.text.analyze(&question.text, text).await)
                }
                _ => ModalityReport::failed("empty answer"),
            };
            progress(Modality::Text, &report);
            report
        };

        let (facial, audio, text) = tokio::join!(facial_fut, audio_fut, text_fut);
        debug!(
            question_id = question.id,
            facial = %facial.status,
            audio = %audio.status,
            text = %text.status,
            "answer fan-out settled"
        );
        ModalityOutcomes {
            facial,
            audio,
            text,
        }
    }
}
