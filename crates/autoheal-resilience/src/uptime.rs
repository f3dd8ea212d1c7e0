//! ---
//! ah_section: "07-resilience-fault-tolerance"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Incident detection, uptime tracking and healing strategies."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::{Context, Result};
use autoheal_bus::{topics, SharedBus};
use autoheal_common::time::timestamp_now;
use autoheal_persistence::CsvLog;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::metrics::ResilienceMetrics;
use crate::types::UptimeStatus;

/// Column layout of the uptime timeline.
pub const UPTIME_HEADERS: [&str; 3] = ["timestamp", "status", "event"];

const INITIAL_EVENT: &str = "Initial status check";

/// Two-state availability tracker backed by an append-only timeline.
///
/// Only real transitions are recorded: asking for the status the monitor is
/// already in is a no-op.
#[derive(Debug)]
pub struct UptimeMonitor {
    log: Arc<CsvLog>,
    bus: SharedBus,
    status: UptimeStatus,
    metrics: Option<ResilienceMetrics>,
}

impl UptimeMonitor {
    /// Resume from the last recorded status, or start `UP` with an initial
    /// record when the timeline holds nothing usable.
    pub fn open(log: Arc<CsvLog>, bus: SharedBus) -> Result<Self> {
        let table = log
            .read()
            .with_context(|| format!("unable to read uptime timeline {}", log.path().display()))?;
        let resumed = match table.last_value("status") {
            Some(raw) => match raw.parse::<UptimeStatus>() {
                Ok(status) => Some(status),
                Err(err) => {
                    warn!(path = %log.path().display(), error = %err, "ignoring unparseable uptime status");
                    None
                }
            },
            None => None,
        };

        let status = match resumed {
            Some(status) => {
                debug!(status = %status, "resumed uptime status from timeline");
                status
            }
            None => {
                log.append([timestamp_now(), UptimeStatus::Up.to_string(), INITIAL_EVENT.to_owned()])?;
                UptimeStatus::Up
            }
        };

        Ok(Self {
            log,
            bus,
            status,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: ResilienceMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Current status.
    pub fn status(&self) -> UptimeStatus {
        self.status
    }

    /// Move to `status`, recording `reason`.
    ///
    /// Returns `Ok(false)` when the monitor was already in `status`. The
    /// timeline record is written before the in-memory state changes, so a
    /// failed append leaves the monitor where it was.
    pub fn update_status(&mut self, status: UptimeStatus, reason: &str) -> Result<bool> {
        if status == self.status {
            debug!(status = %status, reason, "uptime status unchanged");
            return Ok(false);
        }

        let previous = self.status;
        self.log
            .append([timestamp_now(), status.to_string(), reason.to_owned()])
            .with_context(|| format!("unable to append to {}", self.log.path().display()))?;
        self.status = status;

        if let Some(metrics) = &self.metrics {
            metrics.record_transition(status);
        }
        info!(
            target: "autoheal::resilience::uptime",
            previous = %previous,
            status = %status,
            reason,
            "uptime transition"
        );

        let topic = match status {
            UptimeStatus::Up => topics::SYSTEM_UP,
            UptimeStatus::Down => topics::SYSTEM_DOWN,
        };
        self.bus.publish(
            topic,
            json!({ "reason": reason, "previous": previous.as_str() }),
        );
        Ok(true)
    }
}
