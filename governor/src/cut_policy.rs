//! Cut policy state machine.
//!
//! ```text
//! normal ──(utilization >= trigger)──► cut_policy_active
//!    │                                        │
//!    └────────(utilization > 1.0)─────────────┴──► hard_limit_exceeded (terminal)
//! ```
//!
//! The engine activates the policy before cutting and checks the hard limit
//! after cutting, so a span that briefly pushes utilization over 1.0 but is
//! absorbed by cuts does not enter the terminal phase.

use serde::{Deserialize, Serialize};

use crate::budget::utilization;
use crate::detect::expansion::ExpansionType;
use crate::governor::SummaryTypeGovernor;
use crate::state::GovernorState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutPolicyPhase {
    #[default]
    Normal,
    CutPolicyActive,
    /// Terminal for the session; enforcement decides the outcome.
    HardLimitExceeded,
}

impl std::fmt::Display for CutPolicyPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::CutPolicyActive => write!(f, "cut_policy_active"),
            Self::HardLimitExceeded => write!(f, "hard_limit_exceeded"),
        }
    }
}

/// Deterministic cut decisions for one governor.
#[derive(Debug, Clone, Copy)]
pub struct CutPolicyEngine<'g> {
    governor: &'g SummaryTypeGovernor,
}

impl<'g> CutPolicyEngine<'g> {
    pub fn new(governor: &'g SummaryTypeGovernor) -> Self {
        Self { governor }
    }

    pub fn utilization(&self, state: &GovernorState, total_budget: u32) -> f64 {
        utilization(state.current_word_count, total_budget)
    }

    /// Utilization has reached the trigger threshold.
    pub fn should_activate_cut_policy(&self, state: &GovernorState, total_budget: u32) -> bool {
        self.utilization(state, total_budget) >= self.governor.cut_policy().trigger_threshold
    }

    /// Utilization is strictly above the hard limit.
    pub fn is_hard_limit_exceeded(&self, state: &GovernorState, total_budget: u32) -> bool {
        self.utilization(state, total_budget) > self.governor.cut_policy().hard_limit_threshold
    }

    /// First type in cut order that still has kept spans and has not run
    /// dry. `CoreArgument` is never in cut order and so never returned.
    pub fn next_expansion_to_cut(&self, state: &GovernorState) -> Option<ExpansionType> {
        self.governor
            .cut_policy()
            .cut_order
            .iter()
            .copied()
            .find(|t| !t.is_protected() && state.usage(*t) > 0 && !state.fully_cut.contains(t))
    }

    /// Move `normal → cut_policy_active` when the trigger is reached.
    ///
    /// Returns `true` on the transition itself.
    pub fn activate(&self, state: &mut GovernorState, total_budget: u32) -> bool {
        if !self.should_activate_cut_policy(state, total_budget) {
            return false;
        }
        state.cut_policy_activated = true;
        if state.phase == CutPolicyPhase::Normal {
            state.phase = CutPolicyPhase::CutPolicyActive;
            return true;
        }
        false
    }

    /// Enter the terminal phase if still over the hard limit.
    ///
    /// Returns `true` on the transition itself.
    pub fn check_hard_limit(&self, state: &mut GovernorState, total_budget: u32) -> bool {
        if state.phase == CutPolicyPhase::HardLimitExceeded
            || !self.is_hard_limit_exceeded(state, total_budget)
        {
            return false;
        }
        state.cut_policy_activated = true;
        state.phase = CutPolicyPhase::HardLimitExceeded;
        true
    }
}
