//! ---
//! ah_section: "07-resilience-fault-tolerance"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Incident detection, uptime tracking and healing strategies."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
//! Strategies that pick a healing action for a detected failure state.

use anyhow::Result;

use crate::types::{FailureState, HealingAction, HumanFeedback};

pub mod adaptive;
pub mod random;
pub mod table;

pub use adaptive::AdaptivePolicy;
pub use random::RandomPolicy;
pub use table::{BestAction, ValueTable};

/// Contract shared by every healing strategy.
pub trait HealingPolicy: Send {
    /// Short identifier used in logs and the CLI.
    fn name(&self) -> &'static str;

    /// Pick the action to run for `state`.
    fn choose_action(&mut self, state: FailureState) -> HealingAction;

    /// Fold the result of running `action` back into the strategy.
    ///
    /// Returns the updated estimate for learning strategies, `None` otherwise.
    fn record_outcome(
        &mut self,
        state: FailureState,
        action: HealingAction,
        base_reward: f64,
        feedback: Option<HumanFeedback>,
    ) -> Result<Option<f64>>;

    /// Persist any learned state.
    fn save(&self) -> Result<()> {
        Ok(())
    }
}
