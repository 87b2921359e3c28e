// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP and WebSocket edge for the Intervo server.
//!
//! Translates external requests into orchestrator operations — no domain
//! logic lives here beyond input-shape validation — and multiplexes realtime
//! subscriptions by session id, forwarding event bus messages to WebSocket
//! clients.

pub mod error;
pub mod handlers;
pub mod server;
pub mod ws;

pub use server::{build_router, start_server, GatewayState};
