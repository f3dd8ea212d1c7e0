//! ---
//! ah_section: "05-networking-external-interfaces"
//! ah_subsection: "binary"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Operator CLI driving the autoheal pipeline."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::io::{self, BufRead, Write};

use autoheal_resilience::{FailureState, FeedbackProvider, HealingAction, HumanFeedback, Outcome};
use tracing::warn;

/// Asks the operator on the terminal; blank or unrecognised input means no verdict.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalFeedback;

impl FeedbackProvider for TerminalFeedback {
    fn feedback(
        &self,
        state: FailureState,
        action: HealingAction,
        outcome: Outcome,
    ) -> Option<HumanFeedback> {
        print!("Healing {state} with {action} ended in {outcome}. Was this the right call? [y/n] ");
        if let Err(err) = io::stdout().flush() {
            warn!(error = %err, "unable to flush prompt");
        }
        let mut line = String::new();
        if let Err(err) = io::stdin().lock().read_line(&mut line) {
            warn!(error = %err, "unable to read operator feedback");
            return None;
        }
        line.trim().parse().ok()
    }
}
