//! ---
//! ah_section: "07-resilience-fault-tolerance"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Incident detection, uptime tracking and healing strategies."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::sync::Arc;

use autoheal_bus::{topics, SharedBus};
use autoheal_common::time::timestamp_now;
use autoheal_common::{DatasetConfig, DatasetKind, Thresholds};
use autoheal_persistence::{CsvLog, PersistenceError, Table};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::metrics::ResilienceMetrics;
use crate::types::{Detection, FailureState};

/// Column layout of the issue log.
pub const ISSUE_HEADERS: [&str; 3] = ["timestamp", "failure_state", "reason"];

pub const SCORE_COLUMN: &str = "score";
pub const HEART_RATE_COLUMN: &str = "heart_rate";
pub const OXYGEN_COLUMN: &str = "oxygen_level";
const STATUS_COLUMN: &str = "status";
const RESPONSE_TIME_COLUMN: &str = "response_time_ms";

/// What one source contributed to a detection pass.
enum Evidence {
    Found(Detection),
    Clear,
    Unreadable(String),
}

/// Classifies the current condition from the dataset and the deployment log.
///
/// Data-quality signals are checked before deployment telemetry and the first
/// match wins. Sources that are missing or cannot be read count as "no
/// evidence"; detection itself never fails.
#[derive(Debug)]
pub struct IssueDetector {
    dataset: DatasetConfig,
    deployment_log: PathBuf,
    thresholds: Thresholds,
    issue_log: Arc<CsvLog>,
    bus: SharedBus,
    metrics: Option<ResilienceMetrics>,
}

impl IssueDetector {
    pub fn new(
        dataset: DatasetConfig,
        deployment_log: impl Into<PathBuf>,
        thresholds: Thresholds,
        issue_log: Arc<CsvLog>,
        bus: SharedBus,
    ) -> Self {
        Self {
            dataset,
            deployment_log: deployment_log.into(),
            thresholds,
            issue_log,
            bus,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: ResilienceMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Run one detection pass.
    pub fn detect(&self) -> Detection {
        let mut diagnostics = Vec::new();
        for evidence in [self.check_dataset(), self.check_deployments()] {
            match evidence {
                Evidence::Found(detection) => {
                    self.report(&detection);
                    return detection;
                }
                Evidence::Clear => {}
                Evidence::Unreadable(diagnostic) => diagnostics.push(diagnostic),
            }
        }

        let reason = if diagnostics.is_empty() {
            "No issues detected.".to_owned()
        } else {
            format!("No issues detected ({}).", diagnostics.join("; "))
        };
        debug!(reason = %reason, "detector found no failure");
        Detection::new(FailureState::NoFailure, reason)
    }

    fn check_dataset(&self) -> Evidence {
        match self.dataset.kind {
            DatasetKind::Scores => self.check_scores(),
            DatasetKind::Health => self.check_vitals(),
            DatasetKind::Unmonitored => Evidence::Clear,
        }
    }

    fn check_scores(&self) -> Evidence {
        let table = match read_source(&self.dataset.path, "dataset") {
            Ok(Some(table)) => table,
            Ok(None) => return Evidence::Clear,
            Err(evidence) => return evidence,
        };
        let scores = match table.numbers(SCORE_COLUMN) {
            Ok(scores) => scores,
            Err(err) => return unreadable("dataset", err),
        };
        if scores.is_empty() {
            return Evidence::Clear;
        }
        let average = scores.iter().sum::<f64>() / scores.len() as f64;
        if average < self.thresholds.low_score_avg {
            Evidence::Found(Detection::new(
                FailureState::AnomalyScore,
                format!("Low student performance (avg={average:.2})"),
            ))
        } else {
            Evidence::Clear
        }
    }

    fn check_vitals(&self) -> Evidence {
        let table = match read_source(&self.dataset.path, "dataset") {
            Ok(Some(table)) => table,
            Ok(None) => return Evidence::Clear,
            Err(evidence) => return evidence,
        };
        if table.is_empty() {
            return Evidence::Clear;
        }
        let heart_rate = match table.last_number(HEART_RATE_COLUMN) {
            Ok(value) => value.unwrap_or(0.0),
            Err(err) => return unreadable("dataset", err),
        };
        let oxygen = match table.last_number(OXYGEN_COLUMN) {
            Ok(value) => value.unwrap_or(100.0),
            Err(err) => return unreadable("dataset", err),
        };

        if heart_rate > self.thresholds.high_heart_rate {
            Evidence::Found(Detection::new(
                FailureState::AnomalyHealth,
                format!("High heart rate detected ({}).", reading(heart_rate)),
            ))
        } else if oxygen < self.thresholds.low_oxygen_level {
            Evidence::Found(Detection::new(
                FailureState::AnomalyHealth,
                format!("Low oxygen detected ({}).", reading(oxygen)),
            ))
        } else {
            Evidence::Clear
        }
    }

    fn check_deployments(&self) -> Evidence {
        let table = match read_source(&self.deployment_log, "deployment log") {
            Ok(Some(table)) => table,
            Ok(None) => return Evidence::Clear,
            Err(evidence) => return evidence,
        };
        if table.is_empty() {
            return Evidence::Clear;
        }

        let status = table
            .last_value(STATUS_COLUMN)
            .map(|raw| raw.trim().to_lowercase())
            .unwrap_or_default();
        if status == "failure" {
            return Evidence::Found(Detection::new(
                FailureState::DeploymentFailure,
                "Last deployment attempt failed.",
            ));
        }

        match table.last_number(RESPONSE_TIME_COLUMN) {
            Ok(Some(latency)) if latency > self.thresholds.latency_ms => {
                Evidence::Found(Detection::new(
                    FailureState::LatencyIssue,
                    format!("High latency detected: {latency:.2} ms."),
                ))
            }
            Ok(_) => Evidence::Clear,
            Err(err) => {
                warn!(error = %err, "ignoring unparseable deployment latency");
                Evidence::Clear
            }
        }
    }

    fn report(&self, detection: &Detection) {
        if let Err(err) = self.issue_log.append([
            timestamp_now(),
            detection.state.to_string(),
            detection.reason.clone(),
        ]) {
            warn!(error = %err, "unable to append to issue log");
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_issue(detection.state);
        }
        info!(
            target: "autoheal::resilience::detector",
            state = %detection.state,
            reason = %detection.reason,
            "issue detected"
        );
        self.bus.publish(
            topics::ISSUE_DETECTED,
            json!({
                "failure_type": detection.state.as_str(),
                "reason": detection.reason,
                "dataset": self.dataset.label(),
            }),
        );
    }
}

fn read_source(path: &Path, source: &str) -> Result<Option<Table>, Evidence> {
    Table::read(path).map_err(|err| unreadable(source, err))
}

fn unreadable(source: &str, err: PersistenceError) -> Evidence {
    warn!(source, error = %err, "detector source unreadable; treating as no evidence");
    Evidence::Unreadable(format!("{source} unreadable: {err}"))
}

/// Render a vital-sign reading without a trailing `.0` for whole numbers.
fn reading(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoheal_bus::{EventBus, RecordingSubscriber};
    use std::fs;
    use tempfile::tempdir;

    struct Fixture {
        detector: IssueDetector,
        issues: Arc<CsvLog>,
        recorder: Arc<RecordingSubscriber>,
    }

    fn fixture(dir: &Path, kind: DatasetKind, dataset: &str, deployments: Option<&str>) -> Fixture {
        let data_path = dir.join("dataset.csv");
        fs::write(&data_path, dataset).unwrap();
        let deploy_path = dir.join("deployment_log.csv");
        if let Some(contents) = deployments {
            fs::write(&deploy_path, contents).unwrap();
        }
        let issues = Arc::new(CsvLog::open(dir.join("issue_log.csv"), &ISSUE_HEADERS).unwrap());
        let bus = EventBus::shared();
        let recorder = Arc::new(RecordingSubscriber::new("issues"));
        bus.subscribe(topics::ISSUE_DETECTED, recorder.clone());
        let detector = IssueDetector::new(
            DatasetConfig::new(data_path, kind),
            deploy_path,
            Thresholds::default(),
            issues.clone(),
            bus,
        );
        Fixture {
            detector,
            issues,
            recorder,
        }
    }

    #[test]
    fn low_average_score_is_an_anomaly() {
        let dir = tempdir().unwrap();
        let f = fixture(dir.path(), DatasetKind::Scores, "name,score\na,20\nb,40\n", None);
        let detection = f.detector.detect();
        assert_eq!(detection.state, FailureState::AnomalyScore);
        assert_eq!(detection.reason, "Low student performance (avg=30.00)");
        assert_eq!(f.issues.len().unwrap(), 1);
        let events = f.recorder.messages();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].str_field("failure_type"), Some("anomaly_score"));
    }

    #[test]
    fn heart_rate_checked_before_oxygen() {
        let dir = tempdir().unwrap();
        let f = fixture(
            dir.path(),
            DatasetKind::Health,
            "heart_rate,oxygen_level\n80,99\n130,90\n",
            None,
        );
        let detection = f.detector.detect();
        assert_eq!(detection.state, FailureState::AnomalyHealth);
        assert_eq!(detection.reason, "High heart rate detected (130).");
    }

    #[test]
    fn missing_heart_rate_column_falls_through_to_oxygen() {
        let dir = tempdir().unwrap();
        let f = fixture(dir.path(), DatasetKind::Health, "oxygen_level\n91.5\n", None);
        assert_eq!(f.detector.detect().reason, "Low oxygen detected (91.5).");
    }

    #[test]
    fn data_signal_wins_over_deployment_failure() {
        let dir = tempdir().unwrap();
        let f = fixture(
            dir.path(),
            DatasetKind::Scores,
            "score\n10\n",
            Some("timestamp,dataset_changed,status,response_time_ms,action_type\nt,d,failure,100,deploy\n"),
        );
        assert_eq!(f.detector.detect().state, FailureState::AnomalyScore);
    }

    #[test]
    fn deployment_failure_then_latency() {
        let dir = tempdir().unwrap();
        let f = fixture(
            dir.path(),
            DatasetKind::Scores,
            "score\n90\n",
            Some("timestamp,dataset_changed,status,response_time_ms,action_type\nt,d, FAILURE ,100,deploy\n"),
        );
        let detection = f.detector.detect();
        assert_eq!(detection.state, FailureState::DeploymentFailure);
        assert_eq!(detection.reason, "Last deployment attempt failed.");

        let f = fixture(
            dir.path(),
            DatasetKind::Scores,
            "score\n90\n",
            Some("timestamp,dataset_changed,status,response_time_ms,action_type\nt,d,success,26500.456,deploy\n"),
        );
        let detection = f.detector.detect();
        assert_eq!(detection.state, FailureState::LatencyIssue);
        assert_eq!(detection.reason, "High latency detected: 26500.46 ms.");
    }

    #[test]
    fn malformed_dataset_is_no_evidence_but_deployments_still_checked() {
        let dir = tempdir().unwrap();
        let f = fixture(
            dir.path(),
            DatasetKind::Scores,
            "score\nabc\n",
            Some("timestamp,dataset_changed,status,response_time_ms,action_type\nt,d,success,100,deploy\n"),
        );
        let detection = f.detector.detect();
        assert_eq!(detection.state, FailureState::NoFailure);
        assert!(detection.reason.contains("dataset unreadable"));
        assert!(f.recorder.is_empty());
        assert!(f.issues.is_empty().unwrap());
    }

    #[test]
    fn healthy_sources_report_no_issues() {
        let dir = tempdir().unwrap();
        let f = fixture(dir.path(), DatasetKind::Unmonitored, "", None);
        assert_eq!(
            f.detector.detect(),
            Detection::new(FailureState::NoFailure, "No issues detected.")
        );
    }
}
