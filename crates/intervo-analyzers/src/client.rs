// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP plumbing for the analyzer services and the three typed clients.
//!
//! All three services speak the same envelope:
//!
//! ```json
//! {"success": true, "data": { ...analyzer-native metrics... }}
//! ```
//!
//! The face service reports `data.overall_confidence` and the audio/text
//! services report `data.overall_quality`, each as a 0..1 fraction. The
//! normalized score is `round(fraction * 100)`, stable across versions;
//! everything else in `data` is preserved verbatim as the report detail.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use intervo_core::IntervoError;

use crate::breaker::CircuitBreaker;
use crate::dispatch::{DispatchOutcome, Dispatcher, RetryPolicy};
use crate::error::{AnalyzerError, AnalyzerResult};
use crate::TextGenerator;

/// One analyzer service endpoint with its HTTP client.
#[derive(Clone)]
pub(crate) struct ServiceEndpoint {
    http: reqwest::Client,
    base_url: String,
}

impl ServiceEndpoint {
    pub(crate) fn new(
        base_url: &str,
        timeout: Duration,
        bearer_token: Option<&str>,
    ) -> Result<Self, IntervoError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = bearer_token {
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| IntervoError::Config(format!("invalid analyzer API key: {e}")))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| IntervoError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// POST a JSON body and unwrap the `{success, data}` envelope.
    ///
    /// Maps transport and status failures onto the analyzer error classes:
    /// connect/timeout and 5xx are transient, 429 is rate-limited with the
    /// `Retry-After` hint, and any other 4xx or a malformed body is permanent.
    pub(crate) async fn post_json(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<Value, AnalyzerError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AnalyzerError::Transient(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        debug!(%url, status = %status, "analyzer response received");

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(AnalyzerError::RateLimited { retry_after });
        }

        if status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::Transient(format!(
                "analyzer returned {status}: {text}"
            )));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::Permanent(format!(
                "analyzer returned {status}: {text}"
            )));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| AnalyzerError::Permanent(format!("unparseable response body: {e}")))?;

        if envelope["success"].as_bool() != Some(true) {
            let message = envelope["message"]
                .as_str()
                .or_else(|| envelope["error"].as_str())
                .unwrap_or("analyzer reported failure");
            return Err(AnalyzerError::Permanent(message.to_string()));
        }

        Ok(envelope
            .get("data")
            .cloned()
            .unwrap_or_else(|| json!({})))
    }
}

/// Read a 0..1 fraction from the analyzer payload and scale it to 0..=100.
pub(crate) fn normalized_score(data: &Value, key: &str) -> Result<u8, AnalyzerError> {
    let fraction = data[key]
        .as_f64()
        .ok_or_else(|| AnalyzerError::Permanent(format!("response missing `{key}`")))?;
    Ok((fraction.clamp(0.0, 1.0) * 100.0).round() as u8)
}

/// Client for the facial confidence analyzer.
pub struct FaceClient {
    endpoint: ServiceEndpoint,
    dispatcher: Dispatcher,
}

impl FaceClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        breaker: Arc<CircuitBreaker>,
        policy: RetryPolicy,
    ) -> Result<Self, IntervoError> {
        Ok(Self {
            endpoint: ServiceEndpoint::new(base_url, timeout, None)?,
            dispatcher: Dispatcher::new(breaker, policy),
        })
    }

    /// Analyze the referenced recording for on-camera confidence.
    pub async fn analyze(&self, media_ref: &str) -> Result<DispatchOutcome, AnalyzerError> {
        let body = json!({ "media_ref": media_ref });
        let endpoint = &self.endpoint;
        let body = &body;
        self.dispatcher
            .run(move || async move {
                let data = endpoint.post_json("/analyze", body).await?;
                let score = normalized_score(&data, "overall_confidence")?;
                Ok(AnalyzerResult { score, detail: data })
            })
            .await
    }
}

/// Client for the audio quality analyzer.
pub struct AudioClient {
    endpoint: ServiceEndpoint,
    dispatcher: Dispatcher,
}

impl AudioClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        breaker: Arc<CircuitBreaker>,
        policy: RetryPolicy,
    ) -> Result<Self, IntervoError> {
        Ok(Self {
            endpoint: ServiceEndpoint::new(base_url, timeout, None)?,
            dispatcher: Dispatcher::new(breaker, policy),
        })
    }

    /// Analyze the referenced recording for speech quality.
    pub async fn analyze(&self, media_ref: &str) -> Result<DispatchOutcome, AnalyzerError> {
        let body = json!({ "media_ref": media_ref });
        let endpoint = &self.endpoint;
        let body = &body;
        self.dispatcher
            .run(move || async move {
                let data = endpoint.post_json("/analyze", body).await?;
                let score = normalized_score(&data, "overall_quality")?;
                Ok(AnalyzerResult { score, detail: data })
            })
            .await
    }
}

/// Client for the text analysis / LLM service.
///
/// Doubles as the generation backend for interview questions; analysis and
/// generation share one breaker since they hit the same service.
pub struct TextClient {
    endpoint: ServiceEndpoint,
    dispatcher: Dispatcher,
}

impl TextClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        api_key: Option<&str>,
        breaker: Arc<CircuitBreaker>,
        policy: RetryPolicy,
    ) -> Result<Self, IntervoError> {
        Ok(Self {
            endpoint: ServiceEndpoint::new(base_url, timeout, api_key)?,
            dispatcher: Dispatcher::new(breaker, policy),
        })
    }

    /// Score a candidate's answer text against the question that was asked.
    pub async fn analyze(
        &self,
        question: &str,
        answer: &str,
    ) -> Result<DispatchOutcome, AnalyzerError> {
        let body = json!({ "text": answer, "question": question });
        let endpoint = &self.endpoint;
        let body = &body;
        self.dispatcher
            .run(move || async move {
                let data = endpoint.post_json("/analyze", body).await?;
                let score = normalized_score(&data, "overall_quality")?;
                Ok(AnalyzerResult { score, detail: data })
            })
            .await
    }

    async fn generate_raw(
        &self,
        prompt: &str,
        temperature: f64,
        max_output_tokens: u32,
    ) -> Result<String, AnalyzerError> {
        let body = json!({
            "prompt": prompt,
            "temperature": temperature,
            "max_output_tokens": max_output_tokens,
        });
        let endpoint = &self.endpoint;
        let body = &body;
        let outcome = self
            .dispatcher
            .run(move || async move {
                let data = endpoint.post_json("/generate", body).await?;
                let text = data["text"].as_str().ok_or_else(|| {
                    AnalyzerError::Permanent("generation response missing `text`".to_string())
                })?;
                // Score is irrelevant for generation; the text rides in detail.
                Ok(AnalyzerResult {
                    score: 0,
                    detail: json!({ "text": text }),
                })
            })
            .await?;
        Ok(outcome.result.detail["text"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }
}

#[async_trait]
impl TextGenerator for TextClient {
    async fn generate(
        &self,
        prompt: &str,
        temperature: f64,
        max_output_tokens: u32,
    ) -> Result<String, AnalyzerError> {
        self.generate_raw(prompt, temperature, max_output_tokens).await
    }
}
