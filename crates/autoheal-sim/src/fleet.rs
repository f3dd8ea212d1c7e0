//! ---
//! ah_section: "11-simulation"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Simulation runtime helpers and deployment fleet."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use autoheal_bus::{topics, SharedBus};
use autoheal_common::time::timestamp_now;
use autoheal_common::SimulatorConfig;
use autoheal_persistence::CsvLog;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Column layout of the fleet deployment log.
pub const FLEET_HEADERS: [&str; 5] = ["timestamp", "agent_id", "status", "latency_ms", "details"];

/// On-demand snapshot of fleet activity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FleetStats {
    pub active_workers: usize,
    pub total_deployments: u64,
    pub avg_deployments_per_worker: f64,
}

#[derive(Debug)]
struct Worker {
    id: usize,
    running: Arc<AtomicBool>,
    deployments: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn new(id: usize) -> Self {
        Self {
            id,
            running: Arc::new(AtomicBool::new(false)),
            deployments: Arc::new(AtomicU64::new(0)),
            handle: None,
        }
    }

    fn is_live(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst) && self.is_live()
    }
}

/// Everything a worker task needs, moved into the task.
struct WorkerContext {
    id: usize,
    running: Arc<AtomicBool>,
    deployments: Arc<AtomicU64>,
    config: SimulatorConfig,
    log: Arc<CsvLog>,
    bus: SharedBus,
    rng: StdRng,
}

/// Independent deployment workers sharing one log and one bus.
///
/// Each worker is a tokio task that deploys, records the result, announces it
/// and sleeps a random interval. Stopping is cooperative: a worker notices its
/// cleared flag when it next wakes. Restarting replaces any task that is still
/// winding down.
#[derive(Debug)]
pub struct FleetSimulator {
    config: SimulatorConfig,
    log: Arc<CsvLog>,
    bus: SharedBus,
    workers: Vec<Worker>,
}

impl FleetSimulator {
    pub fn new(config: SimulatorConfig, log: Arc<CsvLog>, bus: SharedBus) -> Result<Self> {
        config
            .validate()
            .context("invalid simulator configuration")?;
        let workers = (1..=config.workers).map(Worker::new).collect();
        Ok(Self {
            config,
            log,
            bus,
            workers,
        })
    }

    /// Launch or resume every worker that is not running; returns how many
    /// were started. Must be called from within a tokio runtime.
    pub fn start(&mut self) -> usize {
        let mut launched = 0;
        for worker in &mut self.workers {
            if worker.is_active() {
                continue;
            }
            // A stopped task may still be sleeping, or may already have seen
            // the cleared flag and be on its way out. Either way it is dropped
            // at its next await point.
            if let Some(stale) = worker.handle.take() {
                stale.abort();
            }
            worker.running.store(true, Ordering::SeqCst);
            let context = WorkerContext {
                id: worker.id,
                running: worker.running.clone(),
                deployments: worker.deployments.clone(),
                config: self.config.clone(),
                log: self.log.clone(),
                bus: self.bus.clone(),
                rng: StdRng::seed_from_u64(self.config.random_seed.wrapping_add(worker.id as u64)),
            };
            worker.handle = Some(tokio::spawn(run_worker(context)));
            launched += 1;
        }

        if launched > 0 {
            let count = self.workers.len();
            info!(
                target: "autoheal::sim::fleet",
                launched,
                workers = count,
                "fleet scaled up"
            );
            self.bus.publish(
                topics::SCALING,
                json!({
                    "type": "scale_up",
                    "agent_count": count,
                    "message": format!("Scaled up to {count} deploy agents"),
                }),
            );
        }
        launched
    }

    /// Ask every worker to stop after its current iteration.
    pub fn stop(&self) {
        for worker in &self.workers {
            worker.running.store(false, Ordering::SeqCst);
        }
        info!(target: "autoheal::sim::fleet", "fleet scaled down");
        self.bus.publish(
            topics::SCALING,
            json!({
                "type": "scale_down",
                "agent_count": 0,
                "message": "Scaled down all deploy agents",
            }),
        );
    }

    /// Stop every worker and wait for its task to finish.
    pub async fn shutdown(&mut self) {
        self.stop();
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                match handle.await {
                    Ok(()) => {}
                    Err(err) if err.is_cancelled() => {}
                    Err(err) => error!(worker = worker.id, error = %err, "worker task join error"),
                }
            }
        }
        debug!("fleet shutdown complete");
    }

    pub fn stats(&self) -> FleetStats {
        let active_workers = self
            .workers
            .iter()
            .filter(|w| w.is_active())
            .count();
        let total_deployments: u64 = self
            .workers
            .iter()
            .map(|w| w.deployments.load(Ordering::SeqCst))
            .sum();
        let avg_deployments_per_worker = if self.workers.is_empty() {
            0.0
        } else {
            total_deployments as f64 / self.workers.len() as f64
        };
        FleetStats {
            active_workers,
            total_deployments,
            avg_deployments_per_worker,
        }
    }

    /// Deployment count of each worker, by worker id.
    pub fn per_worker(&self) -> Vec<(usize, u64)> {
        self.workers
            .iter()
            .map(|w| (w.id, w.deployments.load(Ordering::SeqCst)))
            .collect()
    }
}

async fn run_worker(mut ctx: WorkerContext) {
    debug!(worker = ctx.id, "worker started");
    while ctx.running.load(Ordering::SeqCst) {
        deploy_once(&mut ctx);

        let min = ctx.config.min_interval.as_millis() as u64;
        let max = ctx.config.max_interval.as_millis() as u64;
        let pause = Duration::from_millis(ctx.rng.gen_range(min..=max));
        tokio::time::sleep(pause).await;
    }
    debug!(worker = ctx.id, "worker stopped");
}

fn deploy_once(ctx: &mut WorkerContext) {
    let succeeded = ctx.rng.gen_bool(ctx.config.success_probability);
    let status = if succeeded { "success" } else { "failure" };
    let latency_ms = ctx
        .rng
        .gen_range(ctx.config.min_latency_ms..=ctx.config.max_latency_ms);
    let sequence = ctx.deployments.fetch_add(1, Ordering::SeqCst) + 1;

    if let Err(err) = ctx.log.append([
        timestamp_now(),
        ctx.id.to_string(),
        status.to_owned(),
        latency_ms.to_string(),
        format!("Agent-{} deployment #{}", ctx.id, sequence),
    ]) {
        warn!(worker = ctx.id, error = %err, "unable to append to fleet log");
    }
    ctx.bus.publish(
        topics::DEPLOYMENTS,
        json!({
            "type": "deployment_complete",
            "agent_id": ctx.id,
            "status": status,
            "latency_ms": latency_ms,
            "deployment_count": sequence,
        }),
    );
    debug!(worker = ctx.id, status, latency_ms, sequence, "deployment complete");
}
