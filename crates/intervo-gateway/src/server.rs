// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, CORS, and shared state for the edge.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use intervo_core::IntervoError;
use intervo_session::InterviewOrchestrator;

use crate::handlers;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// The single orchestrator instance behind every route.
    pub orchestrator: Arc<InterviewOrchestrator>,
    /// Process start for uptime reporting.
    pub start_time: std::time::Instant,
    /// Upper bound on accepted `media_ref` lengths.
    pub max_media_bytes: u64,
}

/// Gateway server configuration (mirrors ServerConfig from intervo-config).
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
    /// Allowed browser origin; `None` allows any origin.
    pub frontend_origin: Option<String>,
}

/// Assemble the full route table.
pub fn build_router(state: GatewayState, frontend_origin: Option<&str>) -> Router {
    let cors = match frontend_origin {
        Some(origin) => match origin.parse::<HeaderValue>() {
            Ok(value) => CorsLayer::new()
                .allow_origin(AllowOrigin::exact(value))
                .allow_methods(Any)
                .allow_headers(Any),
            Err(_) => {
                tracing::warn!(origin, "unparseable frontend_origin, allowing any origin");
                CorsLayer::permissive()
            }
        },
        None => CorsLayer::permissive(),
    };

    Router::new()
        .route("/api/health", get(handlers::get_health))
        .route(
            "/api/interviews",
            post(handlers::create_interview).get(handlers::list_interviews),
        )
        .route("/api/interviews/{id}", get(handlers::get_interview))
        .route("/api/interviews/{id}/start", post(handlers::start_interview))
        .route("/api/interviews/{id}/answers", post(handlers::submit_answer))
        .route("/api/interviews/{id}/abort", post(handlers::abort_interview))
        .route("/api/interviews/{id}/result", get(handlers::get_result))
        .route("/api/questions/generate", post(handlers::generate_questions))
        .route("/ws", get(ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn start_server(
    options: &ServerOptions,
    state: GatewayState,
) -> Result<(), IntervoError> {
    let app = build_router(state, options.frontend_origin.as_deref());

    let addr = format!("{}:{}", options.host, options.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        IntervoError::Internal(format!("failed to bind gateway to {addr}: {e}"))
    })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| IntervoError::Internal(format!("gateway server error: {e}")))
}
