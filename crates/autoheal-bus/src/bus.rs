//! ---
//! ah_section: "02-messaging-ipc-data-model"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Event envelope and topic vocabulary for the healing bus."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use autoheal_common::time::elapsed_secs;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, error, warn};

use crate::message::BusMessage;
use crate::metrics::BusMetrics;
use crate::subscriber::Subscriber;

/// Shared handle passed to every publishing component.
pub type SharedBus = Arc<EventBus>;

/// Snapshot of bus counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BusStats {
    /// Messages published since creation, delivered or not.
    pub total_messages: u64,
    pub uptime_seconds: f64,
    /// `total_messages / max(uptime, 1ms)`.
    pub throughput_per_sec: f64,
    /// Successful subscriber invocations.
    pub delivered: u64,
    /// Subscriber errors and panics.
    pub subscriber_faults: u64,
}

struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    faults: AtomicU64,
}

impl Counters {
    fn new() -> Self {
        Self {
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            faults: AtomicU64::new(0),
        }
    }
}

/// Topic-based publish/subscribe bus.
///
/// Subscribers for a topic are snapshotted under a read lock, the lock is
/// released, and only then are handlers invoked. A handler that errors or
/// panics is logged and counted; it never affects the publisher or the other
/// subscribers of the same message.
pub struct EventBus {
    registry: RwLock<HashMap<String, Vec<Arc<dyn Subscriber>>>>,
    counters: Counters,
    started: Instant,
    metrics: Option<BusMetrics>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            counters: Counters::new(),
            started: Instant::now(),
            metrics: None,
        }
    }

    /// Attach a Prometheus exporter.
    pub fn with_metrics(mut self, metrics: BusMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Convenience constructor returning a [`SharedBus`].
    pub fn shared() -> SharedBus {
        Arc::new(Self::new())
    }

    /// Register `subscriber` for every future publish on `topic`.
    pub fn subscribe(&self, topic: impl Into<String>, subscriber: Arc<dyn Subscriber>) {
        let topic = topic.into();
        debug!(topic = %topic, subscriber = subscriber.name(), "subscriber registered");
        self.registry.write().entry(topic).or_default().push(subscriber);
    }

    /// Number of subscribers currently registered for `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.registry.read().get(topic).map_or(0, Vec::len)
    }

    /// Deliver `payload` to every subscriber of `topic`.
    ///
    /// Returns the number of subscribers that handled the message without
    /// error. The message counter is incremented even when nobody listens.
    pub fn publish(&self, topic: &str, payload: JsonValue) -> usize {
        let subscribers: Vec<Arc<dyn Subscriber>> = self
            .registry
            .read()
            .get(topic)
            .cloned()
            .unwrap_or_default();

        let message = BusMessage::new(topic, payload);
        self.counters.published.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            metrics.observe_published(topic);
        }
        debug!(
            message_id = %message.id,
            topic,
            subscribers = subscribers.len(),
            "publishing"
        );

        let mut delivered = 0usize;
        for subscriber in &subscribers {
            match catch_unwind(AssertUnwindSafe(|| subscriber.handle(&message))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    warn!(
                        topic,
                        subscriber = subscriber.name(),
                        error = %err,
                        "subscriber failed to handle message"
                    );
                    self.record_fault();
                }
                Err(panic) => {
                    error!(
                        topic,
                        subscriber = subscriber.name(),
                        panic = panic_message(panic.as_ref()),
                        "subscriber panicked while handling message"
                    );
                    self.record_fault();
                }
            }
        }

        self.counters
            .delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            for _ in 0..delivered {
                metrics.observe_delivered();
            }
        }
        delivered
    }

    /// Serialize `payload` and publish it; serialization failures are logged.
    pub fn publish_serialized<T: Serialize>(&self, topic: &str, payload: &T) -> usize {
        match serde_json::to_value(payload) {
            Ok(value) => self.publish(topic, value),
            Err(err) => {
                warn!(topic, error = %err, "unable to serialize bus payload");
                0
            }
        }
    }

    /// Current counters and throughput.
    pub fn stats(&self) -> BusStats {
        let total_messages = self.counters.published.load(Ordering::Relaxed);
        BusStats {
            total_messages,
            uptime_seconds: self.started.elapsed().as_secs_f64(),
            throughput_per_sec: total_messages as f64 / elapsed_secs(self.started),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            subscriber_faults: self.counters.faults.load(Ordering::Relaxed),
        }
    }

    fn record_fault(&self) {
        self.counters.faults.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            metrics.observe_fault();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("topics", &self.registry.read().len())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
