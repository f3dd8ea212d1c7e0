//! ---
//! ah_section: "07-resilience-fault-tolerance"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Incident detection, uptime tracking and healing strategies."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
//! Incident response for the deployment pipeline: classify what went wrong,
//! track availability, pick and run a remediation, and learn from the result.

pub mod controller;
pub mod deployment;
pub mod detector;
pub mod executor;
pub mod feedback;
pub mod metrics;
pub mod policy;
pub mod types;
pub mod uptime;

pub use controller::{CycleOptions, CycleReport, DatasetMutator, IncidentController, NoMutation};
pub use deployment::{
    DeploymentRecorder, DeploymentRequest, DeploymentResult, DeploymentTrigger, FailureHint,
    StaticDeployment,
};
pub use detector::IssueDetector;
pub use executor::{HealingExecutor, HealingReport};
pub use feedback::{FeedbackJournal, FeedbackProvider, FixedFeedback, NoFeedback};
pub use metrics::ResilienceMetrics;
pub use policy::{AdaptivePolicy, BestAction, HealingPolicy, RandomPolicy, ValueTable};
pub use types::{Detection, FailureState, HealingAction, HumanFeedback, Outcome, UptimeStatus};
pub use uptime::UptimeMonitor;

/// Crate prelude collecting the most commonly used types.
pub mod prelude {
    pub use super::controller::{CycleOptions, IncidentController};
    pub use super::deployment::{DeploymentTrigger, FailureHint};
    pub use super::policy::{AdaptivePolicy, HealingPolicy, RandomPolicy};
    pub use super::types::{FailureState, HealingAction, Outcome, UptimeStatus};
}
