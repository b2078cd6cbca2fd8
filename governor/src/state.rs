//! Governor State: per-session counters and the cut event log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::cut_policy::CutPolicyPhase;
use crate::detect::expansion::ExpansionType;

/// Why a span was cut
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CutReason {
    /// Utilization reached the cut-policy trigger
    TriggerThreshold { utilization: f64, threshold: f64 },
    /// Utilization was already above the hard limit
    HardLimit { utilization: f64 },
}

impl std::fmt::Display for CutReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TriggerThreshold {
                utilization,
                threshold,
            } => write!(
                f,
                "utilization {:.3} reached trigger {:.2}",
                utilization, threshold
            ),
            Self::HardLimit { utilization } => {
                write!(f, "utilization {:.3} above hard limit", utilization)
            }
        }
    }
}

/// Append-only record of one cut
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutEvent {
    pub expansion_type: ExpansionType,
    /// Words removed with the span
    pub original_word_count: u32,
    /// Words the synthesis added for this cut (the growth of the group
    /// paragraph when consolidated)
    pub replacement_word_count: u32,
    pub reason: CutReason,
    pub section_index: u32,
    pub chunk_index: u32,
    /// Utilization when the cut was decided
    pub budget_utilization: f64,
    pub timestamp: DateTime<Utc>,
    pub was_consolidated: bool,
}

impl CutEvent {
    /// Net words saved by this cut.
    pub fn net_savings(&self) -> i64 {
        self.original_word_count as i64 - self.replacement_word_count as i64
    }
}

/// A cut waiting on (or already folded into) the open consolidation group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCut {
    pub expansion_type: ExpansionType,
    pub section_index: u32,
    pub chunk_index: u32,
    pub word_count: u32,
}

/// Mutable counters for one generation session.
///
/// Owned by exactly one session; never shared. Maps are ordered so that
/// serialized state and every derived result are stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GovernorState {
    /// Words in the governed guide right now (kept spans plus synthesis)
    pub current_word_count: u32,
    pub current_section_index: u32,
    pub section_word_counts: BTreeMap<u32, u32>,
    /// Kept spans of each type
    pub expansion_usage_counts: BTreeMap<ExpansionType, u32>,
    pub visual_count: u32,
    pub cut_policy_activated: bool,
    pub synthesis_count_per_section: BTreeMap<u32, u32>,
    /// Open consolidation group, oldest first
    pub pending_consolidation: Vec<PendingCut>,
    /// Types with no eligible span left to cut
    pub fully_cut: BTreeSet<ExpansionType>,
    /// Cut order ran out while still over the trigger
    pub cut_policy_exhausted: bool,
    pub phase: CutPolicyPhase,
}

impl GovernorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a kept span's words into the counters.
    pub fn record_span(&mut self, section_index: u32, expansion_type: ExpansionType, words: u32) {
        self.current_section_index = section_index;
        self.add_words(section_index, words);
        *self.expansion_usage_counts.entry(expansion_type).or_insert(0) += 1;
        // A fresh span reopens a type that had run dry.
        self.fully_cut.remove(&expansion_type);
    }

    pub fn record_visual(&mut self, section_index: u32) {
        self.current_section_index = section_index;
        self.visual_count += 1;
    }

    /// Remove a cut span's words and its usage.
    pub fn record_cut(&mut self, section_index: u32, expansion_type: ExpansionType, words: u32) {
        self.remove_words(section_index, words);
        if let Some(count) = self.expansion_usage_counts.get_mut(&expansion_type) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.expansion_usage_counts.remove(&expansion_type);
            }
        }
    }

    /// Account for a new synthesis paragraph in a section.
    pub fn record_synthesis(&mut self, section_index: u32, words: u32) {
        self.add_words(section_index, words);
        *self
            .synthesis_count_per_section
            .entry(section_index)
            .or_insert(0) += 1;
    }

    /// Swap the word cost of a regenerated (consolidated) synthesis.
    pub fn replace_synthesis_words(&mut self, section_index: u32, old_words: u32, new_words: u32) {
        self.remove_words(section_index, old_words);
        self.add_words(section_index, new_words);
    }

    /// Kept spans of a type.
    pub fn usage(&self, expansion_type: ExpansionType) -> u32 {
        self.expansion_usage_counts
            .get(&expansion_type)
            .copied()
            .unwrap_or(0)
    }

    pub fn synthesis_count(&self, section_index: u32) -> u32 {
        self.synthesis_count_per_section
            .get(&section_index)
            .copied()
            .unwrap_or(0)
    }

    /// Whether a cut of this type in this section joins the open group.
    pub fn joins_pending(&self, expansion_type: ExpansionType, section_index: u32) -> bool {
        self.pending_consolidation
            .last()
            .is_some_and(|p| p.expansion_type == expansion_type && p.section_index == section_index)
    }

    fn add_words(&mut self, section_index: u32, words: u32) {
        self.current_word_count = self.current_word_count.saturating_add(words);
        *self.section_word_counts.entry(section_index).or_insert(0) += words;
    }

    fn remove_words(&mut self, section_index: u32, words: u32) {
        self.current_word_count = self.current_word_count.saturating_sub(words);
        if let Some(count) = self.section_word_counts.get_mut(&section_index) {
            *count = count.saturating_sub(words);
        }
    }

    /// Get a summary for logging
    pub fn summary(&self) -> String {
        format!(
            "words={} section={} visuals={} phase={} cut_policy={} exhausted={}",
            self.current_word_count,
            self.current_section_index,
            self.visual_count,
            self.phase,
            self.cut_policy_activated,
            self.cut_policy_exhausted,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_new_is_empty() {
        let state = GovernorState::new();
        assert_eq!(state.current_word_count, 0);
        assert!(state.expansion_usage_counts.is_empty());
        assert!(!state.cut_policy_activated);
        assert_eq!(state.phase, CutPolicyPhase::Normal);
    }

    #[test]
    fn test_record_span_and_cut() {
        let mut state = GovernorState::new();
        state.record_span(0, ExpansionType::CoreArgument, 120);
        state.record_span(0, ExpansionType::SecondaryExample, 80);
        state.record_span(1, ExpansionType::SecondaryExample, 60);
        assert_eq!(state.current_word_count, 260);
        assert_eq!(state.section_word_counts[&0], 200);
        assert_eq!(state.usage(ExpansionType::SecondaryExample), 2);
        assert_eq!(state.current_section_index, 1);

        state.record_cut(0, ExpansionType::SecondaryExample, 80);
        assert_eq!(state.current_word_count, 180);
        assert_eq!(state.section_word_counts[&0], 120);
        assert_eq!(state.usage(ExpansionType::SecondaryExample), 1);

        state.record_cut(1, ExpansionType::SecondaryExample, 60);
        assert!(!state
            .expansion_usage_counts
            .contains_key(&ExpansionType::SecondaryExample));
    }

    #[test]
    fn test_record_synthesis_counts_per_section() {
        let mut state = GovernorState::new();
        state.record_synthesis(2, 60);
        state.record_synthesis(2, 55);
        assert_eq!(state.synthesis_count(2), 2);
        assert_eq!(state.synthesis_count(0), 0);
        assert_eq!(state.current_word_count, 115);

        state.replace_synthesis_words(2, 55, 90);
        assert_eq!(state.current_word_count, 150);
        assert_eq!(state.synthesis_count(2), 2);
    }

    #[test]
    fn test_new_span_reopens_fully_cut_type() {
        let mut state = GovernorState::new();
        state.fully_cut.insert(ExpansionType::Exercise);
        state.record_span(0, ExpansionType::Exercise, 40);
        assert!(!state.fully_cut.contains(&ExpansionType::Exercise));
    }

    #[test]
    fn test_joins_pending() {
        let mut state = GovernorState::new();
        assert!(!state.joins_pending(ExpansionType::Exercise, 0));
        state.pending_consolidation.push(PendingCut {
            expansion_type: ExpansionType::Exercise,
            section_index: 0,
            chunk_index: 3,
            word_count: 150,
        });
        assert!(state.joins_pending(ExpansionType::Exercise, 0));
        assert!(!state.joins_pending(ExpansionType::Exercise, 1));
        assert!(!state.joins_pending(ExpansionType::SecondaryExample, 0));
    }

    #[test]
    fn test_cut_reason_display() {
        let reason = CutReason::TriggerThreshold {
            utilization: 0.9,
            threshold: 0.85,
        };
        assert_eq!(reason.to_string(), "utilization 0.900 reached trigger 0.85");
    }

    #[test]
    fn test_state_serde_roundtrip() {
        let mut state = GovernorState::new();
        state.record_span(0, ExpansionType::StylisticElaboration, 30);
        state.record_visual(0);
        let json = serde_json::to_string(&state).unwrap();
        let parsed: GovernorState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_summary() {
        let mut state = GovernorState::new();
        state.record_span(0, ExpansionType::CoreArgument, 10);
        let s = state.summary();
        assert!(s.contains("words=10"));
        assert!(s.contains("phase=normal"));
    }
}
