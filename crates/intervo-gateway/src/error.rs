// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping from the domain error taxonomy to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use intervo_core::IntervoError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// Newtype so `IntervoError` can flow out of handlers with `?`.
#[derive(Debug)]
pub struct ApiError(pub IntervoError);

impl From<IntervoError> for ApiError {
    fn from(err: IntervoError) -> Self {
        ApiError(err)
    }
}

/// Status mapping: 400 invalid input, 404 missing, 409 wrong state or
/// version conflict, 503 downstream outage, 500 otherwise.
pub fn status_for(err: &IntervoError) -> StatusCode {
    match err {
        IntervoError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        IntervoError::NotFound(_) => StatusCode::NOT_FOUND,
        IntervoError::FailedPrecondition(_) | IntervoError::Conflict(_) => StatusCode::CONFLICT,
        IntervoError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        IntervoError::Config(_) | IntervoError::Storage { .. } | IntervoError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_documented_status_codes() {
        let cases = [
            (IntervoError::InvalidArgument("x".into()), 400),
            (IntervoError::NotFound("x".into()), 404),
            (IntervoError::FailedPrecondition("x".into()), 409),
            (IntervoError::Conflict("x".into()), 409),
            (IntervoError::Unavailable("x".into()), 503),
            (IntervoError::Internal("x".into()), 500),
        ];
        for (err, expected) in cases {
            assert_eq!(status_for(&err).as_u16(), expected, "{err}");
        }
    }

    #[test]
    fn error_body_serializes() {
        let body = ErrorResponse {
            error: "not found: no session x".into(),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("no session x"));
    }
}
