//! ---
//! ah_section: "05-networking-external-interfaces"
//! ah_subsection: "binary"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Operator CLI driving the autoheal pipeline."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use autoheal_bus::{topics, LoggingSubscriber, SharedBus};
use autoheal_common::{new_registry, AppConfig};
use autoheal_persistence::CsvLog;
use autoheal_sim::{FleetSimulator, FLEET_HEADERS};
use clap::Args;
use tokio::signal;
use tracing::info;

const REPORT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Args)]
pub struct SimulateArgs {
    #[arg(long, default_value_t = 30, help = "Seconds to run before scaling down")]
    duration_secs: u64,
    #[arg(long, help = "Override the configured worker count")]
    workers: Option<usize>,
    #[arg(long, help = "Print collected metrics in Prometheus text format")]
    metrics: bool,
}

pub async fn run(mut config: AppConfig, args: SimulateArgs) -> Result<()> {
    if let Some(workers) = args.workers {
        config.simulator.workers = workers;
    }

    let registry = new_registry();
    let bus = crate::instrumented_bus(&registry)?;
    let monitor = Arc::new(LoggingSubscriber::new("fleet-monitor"));
    bus.subscribe(topics::DEPLOYMENTS, monitor.clone());
    bus.subscribe(topics::SCALING, monitor);

    let path = config.paths.fleet_log();
    let log = Arc::new(
        CsvLog::open(&path, &FLEET_HEADERS)
            .with_context(|| format!("unable to open fleet log {}", path.display()))?,
    );
    let mut fleet = FleetSimulator::new(config.simulator.clone(), log, bus.clone())?;
    fleet.start();

    let deadline = tokio::time::sleep(Duration::from_secs(args.duration_secs));
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(REPORT_INTERVAL);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!(duration_secs = args.duration_secs, "simulation window elapsed");
                break;
            }
            result = signal::ctrl_c() => {
                result?;
                info!("ctrl-c received; scaling down");
                break;
            }
            _ = ticker.tick() => report(&fleet, &bus),
        }
    }

    fleet.shutdown().await;
    println!();
    println!("Final statistics");
    report(&fleet, &bus);
    for (worker, deployments) in fleet.per_worker() {
        println!("  Agent-{worker}: {deployments} deployments");
    }
    if args.metrics {
        crate::print_metrics(&registry)?;
    }
    Ok(())
}

fn report(fleet: &FleetSimulator, bus: &SharedBus) {
    let fleet_stats = fleet.stats();
    let bus_stats = bus.stats();
    println!(
        "Workers active: {} | deployments: {} ({:.1}/worker) | bus messages: {} ({:.2}/s) | faults: {}",
        fleet_stats.active_workers,
        fleet_stats.total_deployments,
        fleet_stats.avg_deployments_per_worker,
        bus_stats.total_messages,
        bus_stats.throughput_per_sec,
        bus_stats.subscriber_faults,
    );
}
