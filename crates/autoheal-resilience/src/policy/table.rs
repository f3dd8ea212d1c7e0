//! ---
//! ah_section: "07-resilience-fault-tolerance"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Incident detection, uptime tracking and healing strategies."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::path::Path;

use anyhow::{Context, Result};
use autoheal_persistence::{load_matrix, save_matrix, LabeledMatrix};
use indexmap::IndexMap;
use serde::Serialize;
use strum::{EnumCount, IntoEnumIterator};
use tracing::{debug, warn};

use crate::types::{FailureState, HealingAction};

type Row = [f64; HealingAction::COUNT];

/// Dense value estimate for every (state, action) pair.
///
/// The table is total: every known state holds a value for every known
/// action, zero until learned.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTable {
    values: [Row; FailureState::COUNT],
}

/// Best known action for one state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BestAction {
    pub state: FailureState,
    pub action: HealingAction,
    pub value: f64,
}

impl ValueTable {
    pub fn new() -> Self {
        Self {
            values: [[0.0; HealingAction::COUNT]; FailureState::COUNT],
        }
    }

    pub fn get(&self, state: FailureState, action: HealingAction) -> f64 {
        self.values[state.index()][action.index()]
    }

    pub fn set(&mut self, state: FailureState, action: HealingAction, value: f64) {
        self.values[state.index()][action.index()] = value;
    }

    /// Values for `state` paired with their actions, in declaration order.
    pub fn row(&self, state: FailureState) -> impl Iterator<Item = (HealingAction, f64)> + '_ {
        HealingAction::iter().map(move |action| (action, self.get(state, action)))
    }

    /// Highest-valued action for `state`; ties go to the earliest action.
    pub fn best_action(&self, state: FailureState) -> BestAction {
        let mut best = BestAction {
            state,
            action: HealingAction::RetryDeployment,
            value: f64::NEG_INFINITY,
        };
        for (action, value) in self.row(state) {
            if value > best.value {
                best.action = action;
                best.value = value;
            }
        }
        best
    }

    /// Actions for `state` that have never received an update.
    pub fn untried(&self, state: FailureState) -> Vec<HealingAction> {
        self.row(state)
            .filter(|(_, value)| *value == 0.0)
            .map(|(action, _)| action)
            .collect()
    }

    /// Best action and value for every failure state.
    pub fn summary(&self) -> Vec<BestAction> {
        FailureState::failures()
            .map(|state| self.best_action(state))
            .collect()
    }

    /// Restore a table, backfilling anything absent with zero.
    ///
    /// Unknown state or action labels are ignored with a warning. A missing
    /// file yields an all-zero table.
    pub fn load(path: &Path) -> Result<Self> {
        let mut table = Self::new();
        let Some(matrix) = load_matrix(path)
            .with_context(|| format!("unable to read value table {}", path.display()))?
        else {
            debug!(path = %path.display(), "no stored value table; starting from zero");
            return Ok(table);
        };

        for (state_label, row) in &matrix {
            let Ok(state) = state_label.parse::<FailureState>() else {
                warn!(state = %state_label, "ignoring unknown state in value table");
                continue;
            };
            for (action_label, value) in row {
                match action_label.parse::<HealingAction>() {
                    Ok(action) => table.set(state, action, *value),
                    Err(_) => {
                        warn!(action = %action_label, "ignoring unknown action in value table")
                    }
                }
            }
        }
        Ok(table)
    }

    /// Persist the full table, replacing any previous file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut matrix = LabeledMatrix::new();
        for state in FailureState::iter() {
            let row: IndexMap<String, f64> = self
                .row(state)
                .map(|(action, value)| (action.as_str().to_owned(), value))
                .collect();
            matrix.insert(state.as_str().to_owned(), row);
        }
        save_matrix(path, &matrix)
            .with_context(|| format!("unable to write value table {}", path.display()))
    }
}

impl Default for ValueTable {
    fn default() -> Self {
        Self::new()
    }
}
