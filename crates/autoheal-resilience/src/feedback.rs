//! ---
//! ah_section: "07-resilience-fault-tolerance"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Incident detection, uptime tracking and healing strategies."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::{Context, Result};
use autoheal_common::time::timestamp_now;
use autoheal_persistence::CsvLog;
use tracing::debug;

use crate::types::{FailureState, HealingAction, HumanFeedback, Outcome};

/// Column layout of the feedback log.
pub const FEEDBACK_HEADERS: [&str; 5] = ["timestamp", "state", "action", "outcome", "feedback"];

/// Source of operator verdicts on healing decisions.
pub trait FeedbackProvider: Send + Sync {
    fn feedback(
        &self,
        state: FailureState,
        action: HealingAction,
        outcome: Outcome,
    ) -> Option<HumanFeedback>;
}

/// Never has an opinion.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFeedback;

impl FeedbackProvider for NoFeedback {
    fn feedback(&self, _: FailureState, _: HealingAction, _: Outcome) -> Option<HumanFeedback> {
        None
    }
}

/// Gives the same verdict every time.
#[derive(Debug, Clone, Copy)]
pub struct FixedFeedback(pub HumanFeedback);

impl FeedbackProvider for FixedFeedback {
    fn feedback(&self, _: FailureState, _: HealingAction, _: Outcome) -> Option<HumanFeedback> {
        Some(self.0)
    }
}

/// Append-only record of every collected verdict.
#[derive(Debug, Clone)]
pub struct FeedbackJournal {
    log: Arc<CsvLog>,
}

impl FeedbackJournal {
    pub fn new(log: Arc<CsvLog>) -> Self {
        Self { log }
    }

    /// Record one decision; an absent verdict is written as `none`.
    pub fn record(
        &self,
        state: FailureState,
        action: HealingAction,
        outcome: Outcome,
        feedback: Option<HumanFeedback>,
    ) -> Result<()> {
        let verdict = feedback.map_or("none", |f| f.as_str());
        self.log
            .append([
                timestamp_now(),
                state.to_string(),
                action.to_string(),
                outcome.to_string(),
                verdict.to_owned(),
            ])
            .with_context(|| format!("unable to append to {}", self.log.path().display()))?;
        debug!(state = %state, action = %action, outcome = %outcome, feedback = verdict, "feedback recorded");
        Ok(())
    }
}
