//! ---
//! ah_section: "11-simulation"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Simulation runtime helpers and deployment fleet."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use autoheal_bus::{topics, EventBus, RecordingSubscriber};
use autoheal_common::SimulatorConfig;
use autoheal_persistence::CsvLog;
use autoheal_sim::{FleetSimulator, FLEET_HEADERS};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn workers_deploy_until_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(CsvLog::open(dir.path().join("fleet.csv"), &FLEET_HEADERS).unwrap());
    let bus = EventBus::shared();
    let deployments = Arc::new(RecordingSubscriber::new("deployments"));
    bus.subscribe(topics::DEPLOYMENTS, deployments.clone());

    let config = SimulatorConfig {
        workers: 3,
        success_probability: 1.0,
        min_latency_ms: 10,
        max_latency_ms: 20,
        min_interval: Duration::from_millis(5),
        max_interval: Duration::from_millis(10),
        random_seed: 42,
    };
    let mut fleet = FleetSimulator::new(config, log.clone(), bus).unwrap();
    fleet.start();
    tokio::time::sleep(Duration::from_millis(120)).await;
    fleet.shutdown().await;

    let stats = fleet.stats();
    assert_eq!(stats.active_workers, 0);
    assert!(stats.total_deployments >= 3, "{stats:?}");
    assert!(fleet.per_worker().iter().all(|(_, count)| *count >= 1));

    // Nothing is recorded after shutdown.
    let recorded = log.len().unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(log.len().unwrap(), recorded);
    assert_eq!(recorded as u64, stats.total_deployments);

    let events = deployments.messages();
    assert_eq!(events.len() as u64, stats.total_deployments);
    assert!(events.iter().all(|m| m.str_field("status") == Some("success")));
    let agents: HashSet<_> = events
        .iter()
        .filter_map(|m| m.payload.get("agent_id").and_then(|v| v.as_u64()))
        .collect();
    assert_eq!(agents, HashSet::from([1, 2, 3]));

    let table = log.read().unwrap();
    assert!(table
        .rows()
        .iter()
        .all(|row| row.get(4).is_some_and(|details| details.starts_with("Agent-"))));
}

#[test]
fn fleet_refuses_configs_that_would_panic_workers() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(CsvLog::open(dir.path().join("fleet.csv"), &FLEET_HEADERS).unwrap());
    let config = SimulatorConfig {
        success_probability: -0.2,
        ..SimulatorConfig::default()
    };
    assert!(FleetSimulator::new(config, log.clone(), EventBus::shared()).is_err());
    assert_eq!(log.len().unwrap(), 0);
}
