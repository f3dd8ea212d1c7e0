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

use anyhow::{Context, Result};
use autoheal_bus::{topics, SharedBus};
use autoheal_common::time::timestamp_now;
use autoheal_common::PolicyConfig;
use autoheal_persistence::CsvLog;
use rand::rngs::StdRng;
use rand::seq::{IteratorRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use serde_json::json;
use strum::IntoEnumIterator;
use tracing::{debug, info};

use super::table::{BestAction, ValueTable};
use super::HealingPolicy;
use crate::metrics::ResilienceMetrics;
use crate::types::{FailureState, HealingAction, HumanFeedback};

/// Column layout of the reward history.
pub const PERFORMANCE_HEADERS: [&str; 4] = ["timestamp", "state", "action", "reward"];

/// How an action was picked; carried in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    Untried,
    Explore,
    Exploit,
}

impl Selection {
    fn as_str(&self) -> &'static str {
        match self {
            Selection::Untried => "untried",
            Selection::Explore => "explore",
            Selection::Exploit => "exploit",
        }
    }
}

/// Epsilon-greedy strategy over a persisted moving-average value table.
///
/// Each update moves the estimate a fraction `alpha` of the way toward the
/// observed reward; there is no discounting or bootstrapping from successor
/// states.
#[derive(Debug)]
pub struct AdaptivePolicy {
    table: ValueTable,
    table_path: PathBuf,
    performance_log: Arc<CsvLog>,
    bus: SharedBus,
    epsilon: f64,
    alpha: f64,
    training: bool,
    rng: StdRng,
    metrics: Option<ResilienceMetrics>,
}

impl AdaptivePolicy {
    /// Load the table at `table_path` (or start from zero) using the
    /// exploration settings in `config`.
    pub fn open(
        table_path: impl Into<PathBuf>,
        performance_log: Arc<CsvLog>,
        bus: SharedBus,
        config: &PolicyConfig,
    ) -> Result<Self> {
        let table_path = table_path.into();
        let table = ValueTable::load(&table_path)?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!(
            target: "autoheal::resilience::policy",
            path = %table_path.display(),
            training = config.training,
            epsilon = config.effective_epsilon(),
            alpha = config.alpha,
            "adaptive policy initialised"
        );
        Ok(Self {
            table,
            table_path,
            performance_log,
            bus,
            epsilon: config.effective_epsilon(),
            alpha: config.alpha,
            training: config.training,
            rng,
            metrics: None,
        })
    }

    /// Seed the internal RNG for deterministic testing.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon.clamp(0.0, 1.0);
        self
    }

    pub fn with_metrics(mut self, metrics: ResilienceMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn table(&self) -> &ValueTable {
        &self.table
    }

    pub fn table_path(&self) -> &Path {
        &self.table_path
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn best_action(&self, state: FailureState) -> BestAction {
        self.table.best_action(state)
    }

    /// Best action and value for every failure state.
    pub fn summary(&self) -> Vec<BestAction> {
        self.table.summary()
    }

    fn select(&mut self, state: FailureState) -> (HealingAction, Selection) {
        if self.training {
            let untried = self.table.untried(state);
            if let Some(action) = untried.choose(&mut self.rng) {
                return (*action, Selection::Untried);
            }
        }
        if self.rng.gen::<f64>() < self.epsilon {
            if let Some(action) = HealingAction::iter().choose(&mut self.rng) {
                return (action, Selection::Explore);
            }
        }
        (self.table.best_action(state).action, Selection::Exploit)
    }
}

impl HealingPolicy for AdaptivePolicy {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn choose_action(&mut self, state: FailureState) -> HealingAction {
        let (action, selection) = self.select(state);
        let value = self.table.get(state, action);
        info!(
            target: "autoheal::resilience::policy",
            policy = self.name(),
            state = %state,
            action = %action,
            selection = selection.as_str(),
            value,
            "healing action chosen"
        );
        self.bus.publish(
            topics::ACTION_CHOSEN,
            json!({
                "state": state.as_str(),
                "action": action.as_str(),
                "q_value": value,
            }),
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
        let reward = HumanFeedback::shape(feedback, base_reward);
        self.performance_log
            .append([
                timestamp_now(),
                state.to_string(),
                action.to_string(),
                reward.to_string(),
            ])
            .with_context(|| {
                format!(
                    "unable to append to {}",
                    self.performance_log.path().display()
                )
            })?;

        let old = self.table.get(state, action);
        let new = old + self.alpha * (reward - old);
        self.table.set(state, action, new);
        if let Some(metrics) = &self.metrics {
            metrics.record_value_update(state, action);
        }

        let best = self.table.best_action(state);
        info!(
            target: "autoheal::resilience::policy",
            state = %state,
            action = %action,
            reward,
            old,
            new,
            best_action = %best.action,
            best_value = best.value,
            "value estimate updated"
        );
        self.bus.publish(
            topics::LEARNED,
            json!({
                "state": state.as_str(),
                "action": action.as_str(),
                "reward": reward,
                "new_q": new,
            }),
        );
        Ok(Some(new))
    }

    fn save(&self) -> Result<()> {
        self.table.save(&self.table_path)?;
        debug!(path = %self.table_path.display(), "value table saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoheal_bus::{EventBus, RecordingSubscriber};
    use tempfile::{tempdir, TempDir};

    fn policy(dir: &TempDir, training: bool) -> AdaptivePolicy {
        let log = Arc::new(
            CsvLog::open(dir.path().join("rl_performance_log.csv"), &PERFORMANCE_HEADERS).unwrap(),
        );
        let config = PolicyConfig {
            training,
            ..PolicyConfig::default()
        };
        AdaptivePolicy::open(dir.path().join("rl_log.csv"), log, EventBus::shared(), &config)
            .unwrap()
            .with_seed(42)
    }

    #[test]
    fn greedy_choice_follows_dominant_action() {
        let dir = tempdir().unwrap();
        let mut policy = policy(&dir, false).with_epsilon(0.0);
        policy
            .table
            .set(FailureState::LatencyIssue, HealingAction::AdjustThresholds, 0.3);
        policy
            .table
            .set(FailureState::LatencyIssue, HealingAction::RetryDeployment, -0.2);
        for _ in 0..20 {
            assert_eq!(
                policy.choose_action(FailureState::LatencyIssue),
                HealingAction::AdjustThresholds
            );
        }
    }

    #[test]
    fn training_tries_untried_actions_first() {
        let dir = tempdir().unwrap();
        let mut policy = policy(&dir, true).with_epsilon(0.0);
        policy
            .table
            .set(FailureState::AnomalyScore, HealingAction::RetryDeployment, 0.9);
        let action = policy.choose_action(FailureState::AnomalyScore);
        assert_ne!(action, HealingAction::RetryDeployment);
    }

    #[test]
    fn repeated_success_converges_without_overshoot() {
        let dir = tempdir().unwrap();
        let mut policy = policy(&dir, false);
        let mut previous = 0.0;
        for _ in 0..50 {
            let new = policy
                .record_outcome(
                    FailureState::DeploymentFailure,
                    HealingAction::RetryDeployment,
                    1.0,
                    None,
                )
                .unwrap()
                .unwrap();
            assert!(new > previous);
            assert!(new < 1.0);
            previous = new;
        }
        assert_eq!(policy.performance_log.len().unwrap(), 50);
    }

    #[test]
    fn rejection_forces_negative_reward() {
        let dir = tempdir().unwrap();
        let mut policy = policy(&dir, false);
        let bus_recorder = Arc::new(RecordingSubscriber::new("learned"));
        policy.bus.subscribe(topics::LEARNED, bus_recorder.clone());

        let new = policy
            .record_outcome(
                FailureState::AnomalyHealth,
                HealingAction::AdjustThresholds,
                1.0,
                Some(HumanFeedback::Rejected),
            )
            .unwrap()
            .unwrap();
        assert!((new - -0.1).abs() < 1e-12);
        let events = bus_recorder.messages();
        assert_eq!(events[0].f64_field("reward"), Some(-1.0));
    }

    #[test]
    fn save_and_reopen_keeps_learned_values() {
        let dir = tempdir().unwrap();
        let mut first = policy(&dir, false);
        first
            .record_outcome(
                FailureState::LatencyIssue,
                HealingAction::RestorePreviousVersion,
                1.0,
                Some(HumanFeedback::Accepted),
            )
            .unwrap();
        first.save().unwrap();

        let second = policy(&dir, false);
        let value = second
            .table()
            .get(FailureState::LatencyIssue, HealingAction::RestorePreviousVersion);
        assert!((value - 0.2).abs() < 1e-12);
        assert_eq!(
            second.best_action(FailureState::LatencyIssue).action,
            HealingAction::RestorePreviousVersion
        );
    }

    #[test]
    fn malformed_table_file_opens_as_zero_table_and_is_rewritten() {
        let dir = tempdir().unwrap();
        let table_path = dir.path().join("rl_log.csv");
        std::fs::write(&table_path, b",retry\xff\xfe_deployment\nlatency_issue,0.4\n").unwrap();

        let mut policy = policy(&dir, false);
        for state in FailureState::iter() {
            for action in HealingAction::iter() {
                assert_eq!(policy.table.get(state, action), 0.0);
            }
        }

        let learned = policy
            .record_outcome(
                FailureState::LatencyIssue,
                HealingAction::RetryDeployment,
                1.0,
                None,
            )
            .unwrap()
            .unwrap();
        policy.save().unwrap();
        let reloaded = ValueTable::load(&table_path).unwrap();
        let stored = reloaded.get(FailureState::LatencyIssue, HealingAction::RetryDeployment);
        assert!((stored - learned).abs() < 1e-12);
    }
}
