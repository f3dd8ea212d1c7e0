//! ---
//! ah_section: "15-testing-qa-runbook"
//! ah_subsection: "integration-tests"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Integration and validation tests for the autoheal stack."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;
use std::sync::Arc;

use autoheal_bus::{topics, EventBus, RecordingSubscriber};
use autoheal_common::{AppConfig, DatasetConfig, DatasetKind, LogPaths, PolicyConfig, PolicyKind};
use autoheal_persistence::CsvLog;
use autoheal_resilience::deployment::DEPLOYMENT_HEADERS;
use autoheal_resilience::detector::ISSUE_HEADERS;
use autoheal_resilience::{
    CycleOptions, FailureState, HealingAction, IncidentController, IssueDetector, Outcome,
    StaticDeployment, UptimeStatus, ValueTable,
};

fn config(dir: &Path, dataset: &str, kind: DatasetKind) -> AppConfig {
    let path = dir.join("dataset.csv");
    fs::write(&path, dataset).unwrap();
    AppConfig {
        paths: LogPaths::in_directory(dir.join("logs")),
        dataset: DatasetConfig::new(path, kind),
        policy: PolicyConfig {
            kind: PolicyKind::Adaptive,
            epsilon: 0.0,
            seed: Some(1),
            ..PolicyConfig::default()
        },
        ..AppConfig::default()
    }
}

#[test]
fn low_scores_are_healed_by_adjusting_thresholds() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(
        dir.path(),
        "name,score\na,20\nb,30\nc,40\n",
        DatasetKind::Scores,
    );
    let prior = 0.5;
    let mut table = ValueTable::new();
    table.set(FailureState::AnomalyScore, HealingAction::AdjustThresholds, prior);
    table.set(FailureState::AnomalyScore, HealingAction::RetryDeployment, 0.1);
    table.save(&config.paths.value_table()).unwrap();

    let bus = EventBus::shared();
    let uptime_events = Arc::new(RecordingSubscriber::new("uptime"));
    bus.subscribe(topics::SYSTEM_DOWN, uptime_events.clone());
    bus.subscribe(topics::SYSTEM_UP, uptime_events.clone());

    let mut controller = IncidentController::from_config(
        &config,
        bus,
        Arc::new(StaticDeployment::new(Outcome::Success, 1_200.0)),
        None,
    )
    .unwrap();
    let report = controller.run_cycle(CycleOptions::default());

    assert_eq!(report.initial.state, FailureState::AnomalyScore);
    assert_eq!(report.detection.state, FailureState::AnomalyScore);
    assert_eq!(report.detection.reason, "Low student performance (avg=30.00)");
    assert_eq!(report.action, Some(HealingAction::AdjustThresholds));
    let healing = report.healing.unwrap();
    assert_eq!(healing.outcome, Outcome::Success);
    assert_eq!(healing.latency_ms, 200.0);
    assert_eq!(report.status, UptimeStatus::Up);

    let topics_seen: Vec<_> = uptime_events
        .messages()
        .into_iter()
        .map(|m| m.topic)
        .collect();
    assert_eq!(topics_seen, [topics::SYSTEM_DOWN, topics::SYSTEM_UP]);

    // No feedback: reward is the base +1.
    let alpha = config.policy.alpha;
    let expected = prior + alpha * (1.0 - prior);
    let learned = report.new_value.unwrap();
    assert!((learned - expected).abs() < 1e-12);
    let reloaded = ValueTable::load(&config.paths.value_table()).unwrap();
    assert!(
        (reloaded.get(FailureState::AnomalyScore, HealingAction::AdjustThresholds) - expected)
            .abs()
            < 1e-12
    );
    assert_eq!(
        reloaded.get(FailureState::AnomalyScore, HealingAction::RetryDeployment),
        0.1
    );

    let timeline = fs::read_to_string(config.paths.uptime_log()).unwrap();
    let statuses: Vec<_> = timeline
        .lines()
        .skip(1)
        .filter_map(|line| line.split(',').nth(1))
        .collect();
    assert_eq!(statuses, ["UP", "DOWN", "UP"]);
    assert!(timeline.contains("Recovery successful via heal_adjust"));
}

#[test]
fn failed_last_deployment_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "name,score\na,80\nb,90\n", DatasetKind::Scores);
    let deployments = CsvLog::open(config.paths.deployment_log(), &DEPLOYMENT_HEADERS).unwrap();
    deployments
        .append(["2026-01-01T00:00:00.000Z", "dataset.csv", "success", "1200", "deploy"])
        .unwrap();
    deployments
        .append(["2026-01-01T00:01:00.000Z", "dataset.csv", "failure", "900", "deploy"])
        .unwrap();
    let issue_log = Arc::new(CsvLog::open(config.paths.issue_log(), &ISSUE_HEADERS).unwrap());

    let detector = IssueDetector::new(
        config.dataset.clone(),
        config.paths.deployment_log(),
        config.thresholds(),
        issue_log.clone(),
        EventBus::shared(),
    );
    let detection = detector.detect();
    assert_eq!(detection.state, FailureState::DeploymentFailure);
    assert_eq!(detection.reason, "Last deployment attempt failed.");
    assert_eq!(
        issue_log.read().unwrap().last_value("failure_state"),
        Some("deployment_failure")
    );
}

#[test]
fn crashing_deployment_is_detected_after_it_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "name,score\na,80\nb,90\n", DatasetKind::Scores);
    let mut controller = IncidentController::from_config(
        &config,
        EventBus::shared(),
        Arc::new(StaticDeployment::new(Outcome::Failure, 900.0)),
        None,
    )
    .unwrap();
    let report = controller.run_cycle(CycleOptions {
        force_failure: true,
        ..CycleOptions::default()
    });

    assert_eq!(report.initial.state, FailureState::NoFailure);
    assert_eq!(report.detection.state, FailureState::DeploymentFailure);
    assert_eq!(report.detection.reason, "Last deployment attempt failed.");
    assert!(report.action.is_some());
}
