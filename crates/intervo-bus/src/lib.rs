// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session pub/sub for realtime notifications.
//!
//! Each subscriber gets a bounded queue. Publishing never blocks the
//! orchestrator: when a slow subscriber's queue is full, the oldest
//! non-critical event is evicted, and an incoming non-critical event is
//! dropped if nothing can be evicted. Critical events (snapshots, state
//! transitions, completion) are always enqueued, growing past the bound if a
//! queue is saturated with other critical events.
//!
//! Delivery per session is in publish order; subscribers attaching through
//! the orchestrator receive a snapshot enqueued atomically with registration,
//! so the live events that follow are a contiguous suffix of the emission
//! log.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio::sync::Notify;
use tracing::{debug, trace};

use intervo_core::event::{EventEnvelope, SessionEvent};

/// Bounded event queue owned by one subscriber.
struct SubQueue {
    queue: Mutex<VecDeque<EventEnvelope>>,
    notify: Notify,
    closed: AtomicBool,
    capacity: usize,
}

impl SubQueue {
    fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            capacity,
        }
    }

    /// Enqueue an envelope, applying the overflow policy.
    fn push(&self, envelope: EventEnvelope) {
        let mut queue = self.queue.lock().expect("bus queue mutex poisoned");
        if queue.len() >= self.capacity {
            if let Some(pos) = queue.iter().position(|e| !e.event.is_critical()) {
                trace!("subscriber queue full, evicting oldest non-critical event");
                queue.remove(pos);
            } else if !envelope.event.is_critical() {
                trace!("subscriber queue full of critical events, dropping non-critical");
                return;
            }
            // A critical event lands even when only critical events are queued.
        }
        queue.push_back(envelope);
        drop(queue);
        self.notify.notify_one();
    }

    async fn pop(&self) -> Option<EventEnvelope> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut queue = self.queue.lock().expect("bus queue mutex poisoned");
                if let Some(envelope) = queue.pop_front() {
                    return Some(envelope);
                }
                if self.closed.load(Ordering::Acquire) {
                    return None;
                }
            }

            notified.await;
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

/// A live subscription to one session's events.
///
/// Dropping the subscription detaches it; the bus prunes it on the next
/// publish.
pub struct Subscription {
    queue: Arc<SubQueue>,
}

impl Subscription {
    /// Receive the next event in order, or `None` once detached and drained.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        self.queue.pop().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.queue.close();
    }
}

/// Per-session ordered fan-out to any number of subscribers.
pub struct EventBus {
    topics: DashMap<String, Vec<Arc<SubQueue>>>,
    queue_capacity: usize,
}

impl EventBus {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            queue_capacity,
        }
    }

    /// Attach a subscriber to a session, delivering `snapshot` as its first
    /// event atomically with registration.
    pub fn subscribe(&self, session_id: &str, snapshot: SessionEvent) -> Subscription {
        let queue = Arc::new(SubQueue::new(self.queue_capacity));
        queue.push(EventEnvelope::new(session_id, snapshot));

        self.topics
            .entry(session_id.to_string())
            .or_default()
            .push(queue.clone());
        debug!(session_id, "subscriber attached");

        Subscription { queue }
    }

    /// Publish an event to every current subscriber of the session.
    ///
    /// Synchronous and non-blocking; detached subscribers are pruned here.
    pub fn publish(&self, session_id: &str, event: SessionEvent) {
        let Some(mut subscribers) = self.topics.get_mut(session_id) else {
            return;
        };

        subscribers.retain(|q| !q.closed.load(Ordering::Acquire));
        if subscribers.is_empty() {
            drop(subscribers);
            self.topics.remove(session_id);
            return;
        }

        let envelope = EventEnvelope::new(session_id, event);
        for queue in subscribers.iter() {
            queue.push(envelope.clone());
        }
    }

    /// Current subscriber count for a session (diagnostics).
    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.topics
            .get(session_id)
            .map(|subs| {
                subs.iter()
                    .filter(|q| !q.closed.load(Ordering::Acquire))
                    .count()
            })
            .unwrap_or(0)
    }
}
