//! ---
//! ah_section: "11-simulation"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Simulation runtime helpers and deployment fleet."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::ops::RangeInclusive;

use autoheal_resilience::{
    DeploymentRequest, DeploymentResult, DeploymentTrigger, FailureHint, Outcome,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

const HEALTHY_LATENCY_MS: RangeInclusive<u64> = 1_000..=5_000;
const SLOW_LATENCY_MS: RangeInclusive<u64> = 25_000..=30_000;
const CRASH_LATENCY_MS: RangeInclusive<u64> = 500..=1_500;

/// Deployment trigger that fabricates outcomes instead of deploying.
///
/// Healthy requests succeed quickly, latency failures succeed slowly enough to
/// trip the default latency ceiling, everything else crashes.
#[derive(Debug)]
pub struct SimulatedDeployment {
    rng: Mutex<StdRng>,
}

impl SimulatedDeployment {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    fn latency(&self, range: RangeInclusive<u64>) -> f64 {
        self.rng.lock().gen_range(range) as f64
    }
}

impl Default for SimulatedDeployment {
    fn default() -> Self {
        Self::new()
    }
}

impl DeploymentTrigger for SimulatedDeployment {
    fn trigger(&self, request: &DeploymentRequest) -> DeploymentResult {
        let result = match (request.should_fail, request.failure_hint) {
            (false, _) => DeploymentResult::new(Outcome::Success, self.latency(HEALTHY_LATENCY_MS)),
            (true, Some(FailureHint::Latency)) => {
                DeploymentResult::new(Outcome::Success, self.latency(SLOW_LATENCY_MS))
            }
            (true, _) => DeploymentResult::new(Outcome::Failure, self.latency(CRASH_LATENCY_MS)),
        };
        debug!(
            should_fail = request.should_fail,
            hint = ?request.failure_hint,
            outcome = %result.outcome,
            latency_ms = result.latency_ms,
            "simulated deployment"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_follow_the_request() {
        let trigger = SimulatedDeployment::new().with_seed(7);
        for _ in 0..50 {
            let healthy = trigger.trigger(&DeploymentRequest::healthy());
            assert_eq!(healthy.outcome, Outcome::Success);
            assert!((1_000.0..=5_000.0).contains(&healthy.latency_ms));

            let slow = trigger.trigger(&DeploymentRequest::failing(Some(FailureHint::Latency)));
            assert_eq!(slow.outcome, Outcome::Success);
            assert!(slow.latency_ms >= 25_000.0);

            let crash = trigger.trigger(&DeploymentRequest::failing(Some(FailureHint::Crash)));
            assert_eq!(crash.outcome, Outcome::Failure);
            assert!((500.0..=1_500.0).contains(&crash.latency_ms));
        }
    }

    #[test]
    fn unspecified_failure_crashes() {
        let trigger = SimulatedDeployment::new().with_seed(1);
        let result = trigger.trigger(&DeploymentRequest::failing(None));
        assert_eq!(result.outcome, Outcome::Failure);
    }
}
