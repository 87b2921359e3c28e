// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed clients for the three external analyzer services.
//!
//! Each modality (face, audio, text) gets a client with a uniform contract:
//! bounded retries with jittered exponential backoff, a process-wide circuit
//! breaker per analyzer, and normalization of the service's native metrics
//! into a common 0..=100 score. Exhausted failures degrade to a
//! `ModalityReport` with `status = failed` instead of propagating errors —
//! the orchestrator treats those as a missing modality.

pub mod breaker;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod pool;

use async_trait::async_trait;
use std::sync::Arc;

use intervo_core::types::{Answer, Modality, ModalityReport, Question};

pub use breaker::CircuitBreaker;
pub use client::{AudioClient, FaceClient, TextClient};
pub use dispatch::{DispatchOutcome, Dispatcher, RetryPolicy};
pub use error::{AnalyzerError, AnalyzerResult};
pub use pool::{AnalyzerPool, ModalityOutcomes};

/// Callback invoked as each modality settles, before the full answer is done.
pub type ProgressFn = Arc<dyn Fn(Modality, &ModalityReport) + Send + Sync>;

/// Seam between the orchestrator and the analyzer fan-out, so session logic
/// can be tested against scripted outcomes.
#[async_trait]
pub trait AnswerAnalyzer: Send + Sync {
    /// Analyze one answer across all applicable modalities.
    ///
    /// Never fails: unusable or exhausted modalities come back as
    /// `status = failed` reports.
    async fn analyze_answer(
        &self,
        question: &Question,
        answer: &Answer,
        progress: ProgressFn,
    ) -> ModalityOutcomes;
}

/// Seam for raw LLM text generation, used by the question generator.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        temperature: f64,
        max_output_tokens: u32,
    ) -> Result<String, AnalyzerError>;
}
