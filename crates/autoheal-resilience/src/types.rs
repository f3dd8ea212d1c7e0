//! ---
//! ah_section: "07-resilience-fault-tolerance"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Incident detection, uptime tracking and healing strategies."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use strum::{EnumCount, EnumIter, IntoEnumIterator};

/// Condition classified by the issue detector in one cycle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumCount,
)]
#[serde(rename_all = "snake_case")]
pub enum FailureState {
    DeploymentFailure,
    LatencyIssue,
    AnomalyScore,
    AnomalyHealth,
    NoFailure,
}

impl FailureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureState::DeploymentFailure => "deployment_failure",
            FailureState::LatencyIssue => "latency_issue",
            FailureState::AnomalyScore => "anomaly_score",
            FailureState::AnomalyHealth => "anomaly_health",
            FailureState::NoFailure => "no_failure",
        }
    }

    /// Whether this state calls for remediation.
    pub fn is_failure(&self) -> bool {
        !matches!(self, FailureState::NoFailure)
    }

    /// Every state that triggers healing, in declaration order.
    pub fn failures() -> impl Iterator<Item = FailureState> {
        FailureState::iter().filter(FailureState::is_failure)
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for FailureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FailureState::iter()
            .find(|state| state.as_str() == s.trim())
            .ok_or_else(|| anyhow!("unknown failure state '{}'", s))
    }
}

/// Remediation vocabulary shared by every healing policy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumCount,
)]
#[serde(rename_all = "snake_case")]
pub enum HealingAction {
    RetryDeployment,
    RestorePreviousVersion,
    AdjustThresholds,
}

impl HealingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealingAction::RetryDeployment => "retry_deployment",
            HealingAction::RestorePreviousVersion => "restore_previous_version",
            HealingAction::AdjustThresholds => "adjust_thresholds",
        }
    }

    /// Action type recorded in the deployment log for healing deployments.
    pub fn heal_type(&self) -> &'static str {
        match self {
            HealingAction::RetryDeployment => "heal_retry",
            HealingAction::RestorePreviousVersion => "heal_restore",
            HealingAction::AdjustThresholds => "heal_adjust",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for HealingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealingAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HealingAction::iter()
            .find(|action| action.as_str() == s.trim())
            .ok_or_else(|| anyhow!("unknown healing action '{}'", s))
    }
}

/// Result of a deployment or healing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// Reward before any human feedback is applied.
    pub fn base_reward(&self) -> f64 {
        match self {
            Outcome::Success => 1.0,
            Outcome::Failure => -1.0,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator verdict on a healing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumanFeedback {
    Accepted,
    Rejected,
}

impl HumanFeedback {
    pub fn as_str(&self) -> &'static str {
        match self {
            HumanFeedback::Accepted => "accepted",
            HumanFeedback::Rejected => "rejected",
        }
    }

    /// Fold the verdict into a base reward: acceptance adds one, rejection
    /// forces the reward to -1.
    pub fn shape(feedback: Option<HumanFeedback>, base_reward: f64) -> f64 {
        match feedback {
            Some(HumanFeedback::Accepted) => base_reward + 1.0,
            Some(HumanFeedback::Rejected) => -1.0,
            None => base_reward,
        }
    }
}

impl FromStr for HumanFeedback {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accepted" | "yes" | "y" => Ok(HumanFeedback::Accepted),
            "rejected" | "no" | "n" => Ok(HumanFeedback::Rejected),
            other => Err(anyhow!("unknown feedback '{}'", other)),
        }
    }
}

/// Service availability tracked by the uptime monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UptimeStatus {
    Up,
    Down,
}

impl UptimeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UptimeStatus::Up => "UP",
            UptimeStatus::Down => "DOWN",
        }
    }
}

impl fmt::Display for UptimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UptimeStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "UP" => Ok(UptimeStatus::Up),
            "DOWN" => Ok(UptimeStatus::Down),
            other => Err(anyhow!("unknown uptime status '{}'", other)),
        }
    }
}

/// Classification produced by one detector pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub state: FailureState,
    pub reason: String,
}

impl Detection {
    pub fn new(state: FailureState, reason: impl Into<String>) -> Self {
        Self {
            state,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_from_str() {
        for state in FailureState::iter() {
            assert_eq!(state.as_str().parse::<FailureState>().unwrap(), state);
        }
        for action in HealingAction::iter() {
            assert_eq!(action.as_str().parse::<HealingAction>().unwrap(), action);
        }
        assert!("reboot_universe".parse::<HealingAction>().is_err());
    }

    #[test]
    fn failures_exclude_no_failure() {
        let failures: Vec<_> = FailureState::failures().collect();
        assert_eq!(failures.len(), 4);
        assert!(!failures.contains(&FailureState::NoFailure));
    }

    #[test]
    fn feedback_shapes_reward() {
        assert_eq!(HumanFeedback::shape(None, -1.0), -1.0);
        assert_eq!(HumanFeedback::shape(Some(HumanFeedback::Accepted), 1.0), 2.0);
        assert_eq!(HumanFeedback::shape(Some(HumanFeedback::Rejected), 1.0), -1.0);
    }

    #[test]
    fn counts_match_vocabulary() {
        assert_eq!(FailureState::COUNT, 5);
        assert_eq!(HealingAction::COUNT, 3);
        assert_eq!(HealingAction::AdjustThresholds.heal_type(), "heal_adjust");
    }
}
