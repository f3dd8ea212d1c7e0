//! ---
//! ah_section: "07-resilience-fault-tolerance"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Incident detection, uptime tracking and healing strategies."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use rand::SeedableRng;
use strum::IntoEnumIterator;
use tracing::{debug, info};

use super::HealingPolicy;
use crate::types::{FailureState, HealingAction, HumanFeedback};

/// Uniform choice over every action; learns nothing.
#[derive(Debug)]
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Seed the internal RNG for deterministic testing.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl HealingPolicy for RandomPolicy {
    fn name(&self) -> &'static str {
        "random"
    }

    fn choose_action(&mut self, state: FailureState) -> HealingAction {
        let action = HealingAction::iter()
            .choose(&mut self.rng)
            .unwrap_or(HealingAction::RetryDeployment);
        info!(
            target: "autoheal::resilience::policy",
            policy = self.name(),
            state = %state,
            action = %action,
            "healing action chosen"
        );
        action
    }

    fn record_outcome(
        &mut self,
        state: FailureState,
        action: HealingAction,
        base_reward: f64,
        feedback: Option<HumanFeedback>,
    ) -> Result<Option<f64>> {
        debug!(
            state = %state,
            action = %action,
            base_reward,
            feedback = ?feedback,
            "random policy does not learn"
        );
        Ok(None)
    }
}
