// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-analyzer circuit breaker shared across all sessions.
//!
//! Opens after 5 consecutive failures inside a 60s window, lets one probe
//! through every 30s while open, and closes again on the first success.
//! Uses `tokio::time::Instant` so paused-clock tests can drive it.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

/// Consecutive failures required to open the breaker.
const FAILURE_THRESHOLD: u32 = 5;
/// Failures older than this no longer count toward the threshold.
const FAILURE_WINDOW: Duration = Duration::from_secs(60);
/// Interval between half-open probes while the breaker is open.
const PROBE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Closed,
    Open,
}

#[derive(Debug)]
struct BreakerState {
    phase: Phase,
    consecutive_failures: u32,
    window_start: Option<Instant>,
    /// While open: when the breaker last allowed (or will next allow) a probe.
    opened_or_probed_at: Option<Instant>,
}

/// Availability gate for one analyzer backend.
///
/// State is guarded by a plain mutex: every operation is a short read-modify
/// -write with no await points, safe under concurrent sessions.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: &'static str,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(BreakerState {
                phase: Phase::Closed,
                consecutive_failures: 0,
                window_start: None,
                opened_or_probed_at: None,
            }),
        }
    }

    /// Whether a call may go out right now.
    ///
    /// Closed: always. Open: only once per probe interval (half-open probe).
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().expect("breaker mutex poisoned");
        match state.phase {
            Phase::Closed => true,
            Phase::Open => {
                let last = state
                    .opened_or_probed_at
                    .expect("open breaker always records a timestamp");
                if last.elapsed() >= PROBE_INTERVAL {
                    debug!(analyzer = self.name, "circuit half-open, allowing probe");
                    state.opened_or_probed_at = Some(Instant::now());
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call: closes the breaker and resets the window.
    pub fn record_success(&self) {
        let mut state = self.state.lock().expect("breaker mutex poisoned");
        if state.phase == Phase::Open {
            debug!(analyzer = self.name, "circuit closed after successful probe");
        }
        state.phase = Phase::Closed;
        state.consecutive_failures = 0;
        state.window_start = None;
        state.opened_or_probed_at = None;
    }

    /// Record a failed call, opening the breaker at the threshold.
    pub fn record_failure(&self) {
        let mut state = self.state.lock().expect("breaker mutex poisoned");
        let now = Instant::now();

        let window_expired = state
            .window_start
            .is_some_and(|start| now.duration_since(start) > FAILURE_WINDOW);
        if state.window_start.is_none() || window_expired {
            state.window_start = Some(now);
            state.consecutive_failures = 0;
        }
        state.consecutive_failures += 1;

        if state.phase == Phase::Closed && state.consecutive_failures >= FAILURE_THRESHOLD {
            warn!(
                analyzer = self.name,
                failures = state.consecutive_failures,
                "circuit opened"
            );
            state.phase = Phase::Open;
            state.opened_or_probed_at = Some(now);
        }
    }

    /// True while the breaker is rejecting calls.
    pub fn is_open(&self) -> bool {
        self.state.lock().expect("breaker mutex poisoned").phase == Phase::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn opens_exactly_on_the_fifth_consecutive_failure() {
        let breaker = CircuitBreaker::new("face");
        for _ in 0..4 {
            breaker.record_failure();
            assert!(!breaker.is_open());
            assert!(breaker.try_acquire());
        }
        breaker.record_failure();
        assert!(breaker.is_open());
        assert!(!breaker.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_the_failure_run() {
        let breaker = CircuitBreaker::new("audio");
        for _ in 0..4 {
            breaker.record_failure();
        }
        breaker.record_success();
        for _ in 0..4 {
            breaker.record_failure();
        }
        assert!(!breaker.is_open(), "run restarted after success");
    }

    #[tokio::test(start_paused = true)]
    async fn failures_outside_the_window_restart_the_count() {
        let breaker = CircuitBreaker::new("text");
        for _ in 0..4 {
            breaker.record_failure();
        }
        tokio::time::advance(Duration::from_secs(61)).await;
        breaker.record_failure();
        assert!(!breaker.is_open(), "stale failures no longer count");
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_probe_every_interval_then_closes_on_success() {
        let breaker = CircuitBreaker::new("face");
        for _ in 0..5 {
            breaker.record_failure();
        }
        assert!(!breaker.try_acquire(), "open rejects immediately");

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(breaker.try_acquire(), "probe allowed after interval");
        assert!(!breaker.try_acquire(), "only one probe per interval");

        breaker.record_success();
        assert!(!breaker.is_open());
        assert!(breaker.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_probe_keeps_the_circuit_open() {
        let breaker = CircuitBreaker::new("audio");
        for _ in 0..5 {
            breaker.record_failure();
        }
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(breaker.try_acquire());
        breaker.record_failure();
        assert!(breaker.is_open());
        assert!(!breaker.try_acquire(), "next probe only after another interval");
    }
}
