// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `intervo serve` command implementation.
//!
//! Wires the SQLite store, analyzer client pool, question generator, event
//! bus, and orchestrator together, recovers sessions stranded by a previous
//! process, and serves the HTTP/WebSocket edge until interrupted.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use intervo_analyzers::AnalyzerPool;
use intervo_bus::EventBus;
use intervo_config::IntervoConfig;
use intervo_core::IntervoError;
use intervo_gateway::server::ServerOptions;
use intervo_gateway::GatewayState;
use intervo_questions::QuestionGenerator;
use intervo_session::{InterviewOrchestrator, OrchestratorConfig};
use intervo_store::{SessionStore, SqliteSessionStore};

/// Run the server until it fails or receives an interrupt.
pub async fn run_serve(config: IntervoConfig) -> Result<(), IntervoError> {
    init_tracing(&config.server.log_level);
    info!("starting intervo serve");

    // Storage first; everything else depends on it.
    let store = Arc::new(SqliteSessionStore::open(&config.storage).await?);

    // Sessions left Running/Evaluating by a previous process cannot resume:
    // their timers and pending analyses died with it.
    let stale = store.abort_stale().await?;
    if stale > 0 {
        warn!(count = stale, "aborted sessions stranded by a previous run");
    }

    let pool = AnalyzerPool::from_config(&config.analyzers)?;
    let generator =
        QuestionGenerator::new(pool.text_generator(), config.analyzers.fallback_enabled);
    let bus = Arc::new(EventBus::new(config.gateway.per_subscriber_queue));

    let orchestrator = InterviewOrchestrator::new(
        store.clone(),
        Arc::new(pool),
        generator,
        bus,
        OrchestratorConfig {
            pass_threshold: config.scoring.pass_threshold,
            answer_grace_seconds: config.scoring.answer_grace_seconds,
            evaluation_timeout: Duration::from_secs(config.scoring.evaluation_timeout_secs),
            start_grace: Duration::from_secs(2),
        },
    );

    let state = GatewayState {
        orchestrator,
        start_time: std::time::Instant::now(),
        max_media_bytes: config.analyzers.max_media_bytes,
    };
    let options = ServerOptions {
        host: config.server.host.clone(),
        port: config.server.port,
        frontend_origin: config.server.frontend_origin.clone(),
    };

    tokio::select! {
        result = intervo_gateway::start_server(&options, state) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            store.close().await?;
            Ok(())
        }
    }
}

/// Initialize the tracing subscriber, honoring `RUST_LOG` when set.
fn init_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
