//! ---
//! ah_section: "07-resilience-fault-tolerance"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Incident detection, uptime tracking and healing strategies."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use anyhow::Result;
use autoheal_common::SharedRegistry;
use prometheus::{self, HistogramOpts, HistogramVec, IntCounterVec, Opts};

use crate::types::{FailureState, HealingAction, Outcome, UptimeStatus};

/// Metrics published by the incident-response loop.
#[derive(Clone)]
pub struct ResilienceMetrics {
    registry: SharedRegistry,
    issues_detected_total: IntCounterVec,
    healing_attempts_total: IntCounterVec,
    healing_latency_ms: HistogramVec,
    uptime_transitions_total: IntCounterVec,
    value_updates_total: IntCounterVec,
}

impl ResilienceMetrics {
    /// Register the resilience metric family against the provided registry.
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let issues_detected_total = IntCounterVec::new(
            Opts::new(
                "autoheal_issues_detected_total",
                "Detector classifications that reported a failure",
            ),
            &["state"],
        )?;
        registry.register(Box::new(issues_detected_total.clone()))?;

        let healing_attempts_total = IntCounterVec::new(
            Opts::new(
                "autoheal_healing_attempts_total",
                "Healing actions executed, by action and outcome",
            ),
            &["action", "outcome"],
        )?;
        registry.register(Box::new(healing_attempts_total.clone()))?;

        let histogram_opts = HistogramOpts::new(
            "autoheal_healing_latency_ms",
            "Latency reported by healing actions in milliseconds",
        )
        .buckets(prometheus::exponential_buckets(50.0, 2.0, 12)?);
        let healing_latency_ms = HistogramVec::new(histogram_opts, &["action"])?;
        registry.register(Box::new(healing_latency_ms.clone()))?;

        let uptime_transitions_total = IntCounterVec::new(
            Opts::new(
                "autoheal_uptime_transitions_total",
                "Uptime state changes, by new status",
            ),
            &["status"],
        )?;
        registry.register(Box::new(uptime_transitions_total.clone()))?;

        let value_updates_total = IntCounterVec::new(
            Opts::new(
                "autoheal_value_updates_total",
                "Value-table updates applied by the adaptive policy",
            ),
            &["state", "action"],
        )?;
        registry.register(Box::new(value_updates_total.clone()))?;

        Ok(Self {
            registry,
            issues_detected_total,
            healing_attempts_total,
            healing_latency_ms,
            uptime_transitions_total,
            value_updates_total,
        })
    }

    /// Expose the underlying shared registry for convenience.
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn record_issue(&self, state: FailureState) {
        self.issues_detected_total
            .with_label_values(&[state.as_str()])
            .inc();
    }

    pub fn record_healing(&self, action: HealingAction, outcome: Outcome, latency_ms: f64) {
        self.healing_attempts_total
            .with_label_values(&[action.as_str(), outcome.as_str()])
            .inc();
        self.healing_latency_ms
            .with_label_values(&[action.as_str()])
            .observe(latency_ms);
    }

    pub fn record_transition(&self, status: UptimeStatus) {
        self.uptime_transitions_total
            .with_label_values(&[status.as_str()])
            .inc();
    }

    pub fn record_value_update(&self, state: FailureState, action: HealingAction) {
        self.value_updates_total
            .with_label_values(&[state.as_str(), action.as_str()])
            .inc();
    }
}

impl std::fmt::Debug for ResilienceMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceMetrics").finish_non_exhaustive()
    }
}
