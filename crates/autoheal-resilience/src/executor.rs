//! ---
//! ah_section: "07-resilience-fault-tolerance"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Incident detection, uptime tracking and healing strategies."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::fs;
use std::sync::Arc;

use autoheal_bus::{topics, SharedBus};
use autoheal_common::time::{round_ms, timestamp_now};
use autoheal_common::DatasetConfig;
use autoheal_persistence::CsvLog;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::deployment::{DeploymentRequest, DeploymentResult, DeploymentTrigger};
use crate::metrics::ResilienceMetrics;
use crate::types::{HealingAction, Outcome};

/// Column layout of the healing log.
pub const HEALING_HEADERS: [&str; 4] = ["timestamp", "strategy", "status", "response_time_ms"];

/// Latency reported by a threshold adjustment.
pub const ADJUST_LATENCY_MS: f64 = 200.0;

/// Result of running one healing action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealingReport {
    pub action: HealingAction,
    pub outcome: Outcome,
    pub latency_ms: f64,
}

impl HealingReport {
    pub fn heal_type(&self) -> &'static str {
        self.action.heal_type()
    }

    /// The report viewed as a deployment result for the deployment log.
    pub fn as_deployment(&self) -> DeploymentResult {
        DeploymentResult::new(self.outcome, self.latency_ms)
    }
}

/// Runs healing actions against the monitored dataset.
pub struct HealingExecutor {
    dataset: DatasetConfig,
    trigger: Arc<dyn DeploymentTrigger>,
    healing_log: Arc<CsvLog>,
    bus: SharedBus,
    metrics: Option<ResilienceMetrics>,
}

impl HealingExecutor {
    pub fn new(
        dataset: DatasetConfig,
        trigger: Arc<dyn DeploymentTrigger>,
        healing_log: Arc<CsvLog>,
        bus: SharedBus,
    ) -> Self {
        Self {
            dataset,
            trigger,
            healing_log,
            bus,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: ResilienceMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run `action`, log it and announce completion.
    pub fn execute(&self, action: HealingAction) -> HealingReport {
        info!(
            target: "autoheal::resilience::executor",
            action = %action,
            dataset = %self.dataset.label(),
            "executing healing action"
        );
        let result = match action {
            HealingAction::RetryDeployment => self.redeploy(),
            HealingAction::RestorePreviousVersion => self.restore(),
            HealingAction::AdjustThresholds => {
                DeploymentResult::new(Outcome::Success, ADJUST_LATENCY_MS)
            }
        };
        let report = HealingReport {
            action,
            outcome: result.outcome,
            latency_ms: result.latency_ms,
        };

        if let Err(err) = self.healing_log.append([
            timestamp_now(),
            action.to_string(),
            report.outcome.to_string(),
            round_ms(report.latency_ms).to_string(),
        ]) {
            warn!(error = %err, "unable to append to healing log");
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_healing(action, report.outcome, report.latency_ms);
        }
        info!(
            target: "autoheal::resilience::executor",
            action = %action,
            status = %report.outcome,
            response_time_ms = report.latency_ms,
            heal_type = report.heal_type(),
            "healing completed"
        );
        self.bus.publish(
            topics::HEALING_COMPLETED,
            json!({
                "strategy": action.as_str(),
                "status": report.outcome.as_str(),
                "response_time": report.latency_ms,
                "heal_type": report.heal_type(),
            }),
        );
        report
    }

    fn redeploy(&self) -> DeploymentResult {
        self.trigger.trigger(&DeploymentRequest::healthy())
    }

    fn restore(&self) -> DeploymentResult {
        let backup = self.dataset.backup_path();
        if !backup.exists() {
            warn!(backup = %backup.display(), "no backup available; cannot restore");
            return DeploymentResult::new(Outcome::Failure, 0.0);
        }
        match fs::copy(&backup, &self.dataset.path) {
            Ok(_) => {
                info!(
                    backup = %backup.display(),
                    dataset = %self.dataset.label(),
                    "dataset restored from backup"
                );
                self.redeploy()
            }
            Err(err) => {
                warn!(backup = %backup.display(), error = %err, "restoring backup failed");
                DeploymentResult::new(Outcome::Failure, 0.0)
            }
        }
    }
}

impl std::fmt::Debug for HealingExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealingExecutor")
            .field("dataset", &self.dataset)
            .finish_non_exhaustive()
    }
}
