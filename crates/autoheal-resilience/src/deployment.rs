//! ---
//! ah_section: "07-resilience-fault-tolerance"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Incident detection, uptime tracking and healing strategies."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use autoheal_bus::{topics, SharedBus};
use autoheal_common::time::{round_ms, timestamp_now};
use autoheal_persistence::CsvLog;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::types::Outcome;

/// Column layout of the deployment log.
pub const DEPLOYMENT_HEADERS: [&str; 5] = [
    "timestamp",
    "dataset_changed",
    "status",
    "response_time_ms",
    "action_type",
];

/// Action type recorded for regular (non-healing) deployments.
pub const DEPLOY_ACTION: &str = "deploy";

/// Failure mode requested from a deployment trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureHint {
    /// The deployment fails outright.
    Crash,
    /// The deployment succeeds but exceeds the latency ceiling.
    Latency,
}

impl FailureHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureHint::Crash => "crash",
            FailureHint::Latency => "latency",
        }
    }
}

impl fmt::Display for FailureHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureHint {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "crash" => Ok(FailureHint::Crash),
            "latency" => Ok(FailureHint::Latency),
            other => Err(anyhow!("unknown failure type '{}'", other)),
        }
    }
}

/// Parameters handed to a [`DeploymentTrigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeploymentRequest {
    pub should_fail: bool,
    pub failure_hint: Option<FailureHint>,
}

impl DeploymentRequest {
    /// A deployment expected to go through.
    pub fn healthy() -> Self {
        Self::default()
    }

    /// A deployment forced to misbehave the way `hint` describes.
    pub fn failing(hint: Option<FailureHint>) -> Self {
        Self {
            should_fail: true,
            failure_hint: hint,
        }
    }
}

/// Status and latency reported by a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeploymentResult {
    pub outcome: Outcome,
    pub latency_ms: f64,
}

impl DeploymentResult {
    pub fn new(outcome: Outcome, latency_ms: f64) -> Self {
        Self {
            outcome,
            latency_ms,
        }
    }
}

/// External deployment mechanism.
pub trait DeploymentTrigger: Send + Sync {
    fn trigger(&self, request: &DeploymentRequest) -> DeploymentResult;
}

/// Trigger that always reports the same result.
#[derive(Debug, Clone, Copy)]
pub struct StaticDeployment {
    result: DeploymentResult,
}

impl StaticDeployment {
    pub fn new(outcome: Outcome, latency_ms: f64) -> Self {
        Self {
            result: DeploymentResult::new(outcome, latency_ms),
        }
    }
}

impl DeploymentTrigger for StaticDeployment {
    fn trigger(&self, _request: &DeploymentRequest) -> DeploymentResult {
        self.result
    }
}

/// Appends deployments to the deployment log and announces them on the bus.
#[derive(Debug, Clone)]
pub struct DeploymentRecorder {
    log: Arc<CsvLog>,
    bus: SharedBus,
}

impl DeploymentRecorder {
    pub fn new(log: Arc<CsvLog>, bus: SharedBus) -> Self {
        Self { log, bus }
    }

    /// Record one deployment.
    ///
    /// Publishes `deploy.<status>` for regular deployments and
    /// `heal.<status>` for any other action type.
    pub fn record(
        &self,
        dataset: &str,
        result: &DeploymentResult,
        action_type: &str,
    ) -> Result<()> {
        let latency = round_ms(result.latency_ms);
        self.log
            .append([
                timestamp_now(),
                dataset.to_owned(),
                result.outcome.to_string(),
                latency.to_string(),
                action_type.to_owned(),
            ])
            .with_context(|| format!("unable to append to {}", self.log.path().display()))?;
        info!(
            target: "autoheal::resilience::deployment",
            dataset,
            status = %result.outcome,
            response_time_ms = latency,
            action_type,
            "deployment recorded"
        );

        let status = result.outcome.as_str();
        let topic = if action_type == DEPLOY_ACTION {
            topics::deploy_status(status)
        } else {
            topics::heal_status(status)
        };
        self.bus.publish(
            &topic,
            json!({
                "dataset": dataset,
                "response_time": result.latency_ms,
                "action_type": action_type,
            }),
        );
        Ok(())
    }

    pub fn log(&self) -> &Arc<CsvLog> {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoheal_bus::{EventBus, RecordingSubscriber};
    use tempfile::tempdir;

    #[test]
    fn topic_depends_on_action_type() {
        let dir = tempdir().unwrap();
        let log = Arc::new(
            CsvLog::open(dir.path().join("deployment_log.csv"), &DEPLOYMENT_HEADERS).unwrap(),
        );
        let bus = EventBus::shared();
        let deploys = Arc::new(RecordingSubscriber::new("deploys"));
        let heals = Arc::new(RecordingSubscriber::new("heals"));
        bus.subscribe("deploy.failure", deploys.clone());
        bus.subscribe("heal.success", heals.clone());

        let recorder = DeploymentRecorder::new(log.clone(), bus);
        recorder
            .record(
                "dataset/scores.csv",
                &DeploymentResult::new(Outcome::Failure, 812.3456),
                DEPLOY_ACTION,
            )
            .unwrap();
        recorder
            .record(
                "dataset/scores.csv",
                &DeploymentResult::new(Outcome::Success, 200.0),
                "heal_adjust",
            )
            .unwrap();

        assert_eq!(deploys.len(), 1);
        assert_eq!(heals.len(), 1);
        let table = log.read().unwrap();
        assert_eq!(table.rows()[0].get(3), Some("812.35"));
        assert_eq!(table.last_value("action_type"), Some("heal_adjust"));
    }

    #[test]
    fn failure_hint_parses_case_insensitively() {
        assert_eq!("Latency".parse::<FailureHint>().unwrap(), FailureHint::Latency);
        assert!("meteor".parse::<FailureHint>().is_err());
    }
}
