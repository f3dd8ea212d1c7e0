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

use autoheal_bus::{topics, EventBus, RecordingSubscriber};
use autoheal_common::{
    new_registry, AppConfig, DatasetConfig, DatasetKind, LogPaths, PolicyConfig, PolicyKind,
};
use autoheal_resilience::{
    CycleOptions, FailureHint, FailureState, FixedFeedback, HealingAction, HumanFeedback,
    IncidentController, Outcome, ResilienceMetrics, StaticDeployment, UptimeStatus, ValueTable,
};

fn adaptive_config(dir: &std::path::Path) -> AppConfig {
    let dataset = dir.join("patient_health.csv");
    fs::write(&dataset, "patient_id,heart_rate,oxygen_level\np1,72,98\n").unwrap();
    AppConfig {
        paths: LogPaths::in_directory(dir.join("logs")),
        dataset: DatasetConfig::new(dataset, DatasetKind::Health),
        policy: PolicyConfig {
            kind: PolicyKind::Adaptive,
            epsilon: 0.0,
            seed: Some(11),
            ..PolicyConfig::default()
        },
        ..AppConfig::default()
    }
}

#[test]
fn latency_incident_is_learned_and_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let config = adaptive_config(dir.path());
    let registry = new_registry();
    let metrics = ResilienceMetrics::new(registry.clone()).unwrap();
    let bus = EventBus::shared();
    let events = Arc::new(RecordingSubscriber::new("audit"));
    for topic in [
        topics::ISSUE_DETECTED,
        topics::SYSTEM_DOWN,
        topics::SYSTEM_UP,
        topics::ACTION_CHOSEN,
        topics::HEALING_COMPLETED,
        topics::LEARNED,
    ] {
        bus.subscribe(topic, events.clone());
    }

    let mut controller = IncidentController::from_config(
        &config,
        bus,
        Arc::new(StaticDeployment::new(Outcome::Success, 27_500.0)),
        Some(metrics),
    )
    .unwrap()
    .with_feedback(Arc::new(FixedFeedback(HumanFeedback::Accepted)));

    let report = controller.run_cycle(CycleOptions {
        failure_hint: Some(FailureHint::Latency),
        ..CycleOptions::default()
    });
    assert_eq!(report.detection.state, FailureState::LatencyIssue);
    assert_eq!(report.detection.reason, "High latency detected: 27500.00 ms.");
    // All-zero table with epsilon 0 exploits the first declared action.
    assert_eq!(report.action, Some(HealingAction::RetryDeployment));
    // Accepted success: reward 2, so 0 + 0.1 * (2 - 0).
    let learned = report.new_value.unwrap();
    assert!((learned - 0.2).abs() < 1e-12);
    assert_eq!(report.status, UptimeStatus::Up);
    assert!(report.errors.is_empty(), "{:?}", report.errors);

    let order: Vec<_> = events.messages().into_iter().map(|m| m.topic).collect();
    assert_eq!(
        order,
        [
            topics::ISSUE_DETECTED,
            topics::SYSTEM_DOWN,
            topics::ACTION_CHOSEN,
            topics::HEALING_COMPLETED,
            topics::LEARNED,
            topics::SYSTEM_UP,
        ]
    );

    let table = ValueTable::load(&config.paths.value_table()).unwrap();
    assert!(
        (table.get(FailureState::LatencyIssue, HealingAction::RetryDeployment) - 0.2).abs()
            < 1e-12
    );
    let feedback = fs::read_to_string(config.paths.feedback_log()).unwrap();
    assert!(feedback.contains("latency_issue,retry_deployment,success,accepted"));

    let families = registry.gather();
    for name in [
        "autoheal_issues_detected_total",
        "autoheal_healing_attempts_total",
        "autoheal_uptime_transitions_total",
        "autoheal_value_updates_total",
    ] {
        assert!(families.iter().any(|f| f.get_name() == name), "{name}");
    }
}

#[test]
fn second_run_resumes_down_status_from_timeline() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = adaptive_config(dir.path());
    fs::write(
        &config.dataset.path,
        "patient_id,heart_rate,oxygen_level\np1,150,98\n",
    )
    .unwrap();
    config.policy.kind = PolicyKind::Random;
    config.policy.seed = Some(3);

    {
        let mut controller = IncidentController::from_config(
            &config,
            EventBus::shared(),
            Arc::new(StaticDeployment::new(Outcome::Failure, 900.0)),
            None,
        )
        .unwrap();
        let report = controller.run_cycle(CycleOptions::default());
        assert_eq!(report.detection.reason, "High heart rate detected (150).");
        // Every action fails against a failing trigger and no backup.
        if report.action != Some(HealingAction::AdjustThresholds) {
            assert_eq!(report.status, UptimeStatus::Down);
        }
    }

    let timeline = fs::read_to_string(config.paths.uptime_log()).unwrap();
    let last_status = timeline
        .lines()
        .last()
        .and_then(|line| line.split(',').nth(1))
        .unwrap()
        .to_owned();
    let controller = IncidentController::from_config(
        &config,
        EventBus::shared(),
        Arc::new(StaticDeployment::new(Outcome::Success, 900.0)),
        None,
    )
    .unwrap();
    assert_eq!(controller.status().as_str(), last_status);
}
