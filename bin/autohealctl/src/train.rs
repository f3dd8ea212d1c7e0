//! ---
//! ah_section: "05-networking-external-interfaces"
//! ah_subsection: "binary"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Operator CLI driving the autoheal pipeline."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use autoheal_common::{new_registry, AppConfig, DatasetConfig, DatasetKind, PolicyKind};
use autoheal_resilience::{CycleOptions, FailureHint, FixedFeedback, HumanFeedback, ValueTable};
use clap::Args;
use tracing::info;

use crate::table::print_table;

#[derive(Debug, Args)]
pub struct TrainArgs {
    #[arg(long, value_name = "PATH", default_value = "dataset/student_scores.csv")]
    scores: PathBuf,
    #[arg(long, value_name = "PATH", default_value = "dataset/patient_health.csv")]
    health: PathBuf,
    #[arg(long, help = "Seed every random component")]
    seed: Option<u64>,
}

struct Scenario {
    kind: DatasetKind,
    force_anomaly: bool,
    failure_hint: Option<FailureHint>,
    training: bool,
}

const fn scenario(
    kind: DatasetKind,
    force_anomaly: bool,
    failure_hint: Option<FailureHint>,
    training: bool,
) -> Scenario {
    Scenario {
        kind,
        force_anomaly,
        failure_hint,
        training,
    }
}

/// Anomalies and deployment failures on both datasets, first exploring then exploiting.
const SCENARIOS: [Scenario; 8] = [
    scenario(DatasetKind::Scores, true, None, true),
    scenario(DatasetKind::Health, true, None, true),
    scenario(DatasetKind::Scores, false, Some(FailureHint::Latency), true),
    scenario(DatasetKind::Health, false, Some(FailureHint::Crash), true),
    scenario(DatasetKind::Scores, true, None, false),
    scenario(DatasetKind::Health, true, None, false),
    scenario(DatasetKind::Scores, false, Some(FailureHint::Latency), false),
    scenario(DatasetKind::Health, false, Some(FailureHint::Crash), false),
];

pub fn run(config: AppConfig, args: TrainArgs) -> Result<()> {
    println!("Training adaptive policy across {} scenarios", SCENARIOS.len());
    for (index, scenario) in SCENARIOS.iter().enumerate() {
        let run = index + 1;
        println!();
        println!("--- Run {}/{} ---", run, SCENARIOS.len());

        let mut scenario_config = config.clone();
        let path = match scenario.kind {
            DatasetKind::Health => args.health.clone(),
            _ => args.scores.clone(),
        };
        scenario_config.dataset = DatasetConfig::new(path, scenario.kind);
        scenario_config.policy.kind = PolicyKind::Adaptive;
        scenario_config.policy.training = scenario.training;
        let seed = args.seed.map(|seed| seed.wrapping_add(index as u64));
        scenario_config.policy.seed = seed;

        let registry = new_registry();
        let bus = crate::instrumented_bus(&registry)?;
        let mut controller = crate::controller(
            &scenario_config,
            bus,
            registry,
            Arc::new(FixedFeedback(HumanFeedback::Accepted)),
            seed,
        )
        .with_context(|| format!("unable to prepare training run {}", run))?;
        let report = controller.run_cycle(CycleOptions {
            failure_hint: scenario.failure_hint,
            force_anomaly: scenario.force_anomaly,
            force_failure: false,
        });
        info!(
            target: "autoheal::ctl::train",
            run,
            state = %report.detection.state,
            action = ?report.action,
            status = %report.status,
            "training run complete"
        );
        crate::print_report(&scenario_config.dataset, &report);
    }

    let path = config.paths.value_table();
    let table = ValueTable::load(&path)
        .with_context(|| format!("unable to load value table {}", path.display()))?;
    println!();
    print_table(&table);
    Ok(())
}
