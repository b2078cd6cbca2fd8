//! Validation and enforcement.
//!
//! `validate` accumulates every violation instead of stopping at the first;
//! `enforce` turns the result into halt or accept-with-flag according to the
//! governor's strictness. Both are pure: the same state and inputs always
//! yield the same result.

use serde::{Deserialize, Serialize};

use crate::budget::{utilization, BudgetCalculator, ChapterBudget, SectionBudgets};
use crate::detect::chapter::{ChapterDetectionResult, FallbackStrategy};
use crate::governor::SummaryTypeGovernor;
use crate::state::{CutEvent, GovernorState};

/// Shown to end users on halt. Violation details stay internal.
pub const RETRY_MESSAGE: &str = "generation did not meet quality budget, please retry";

/// Kind tag for a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    TotalWordCountExceeded,
    VisualCountExceeded,
    AudioMinutesExceeded,
    SynthesisLimitExceeded,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TotalWordCountExceeded => write!(f, "total_word_count_exceeded"),
            Self::VisualCountExceeded => write!(f, "visual_count_exceeded"),
            Self::AudioMinutesExceeded => write!(f, "audio_minutes_exceeded"),
            Self::SynthesisLimitExceeded => write!(f, "synthesis_limit_exceeded"),
        }
    }
}

/// A budget rule the guide broke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GovernorViolation {
    TotalWordCountExceeded { current: u32, limit: u32 },
    VisualCountExceeded { current: u32, limit: u32 },
    AudioMinutesExceeded { current: f64, limit: f64 },
    SynthesisLimitExceeded { section_index: u32, current: u32, limit: u32 },
}

impl GovernorViolation {
    pub fn kind(&self) -> ViolationKind {
        match self {
            Self::TotalWordCountExceeded { .. } => ViolationKind::TotalWordCountExceeded,
            Self::VisualCountExceeded { .. } => ViolationKind::VisualCountExceeded,
            Self::AudioMinutesExceeded { .. } => ViolationKind::AudioMinutesExceeded,
            Self::SynthesisLimitExceeded { .. } => ViolationKind::SynthesisLimitExceeded,
        }
    }
}

impl std::fmt::Display for GovernorViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TotalWordCountExceeded { current, limit } => {
                write!(f, "{} words (ceiling: {})", current, limit)
            }
            Self::VisualCountExceeded { current, limit } => {
                write!(f, "{} visuals (limit: {})", current, limit)
            }
            Self::AudioMinutesExceeded { current, limit } => {
                write!(f, "{:.1} audio minutes (limit: {:.1})", current, limit)
            }
            Self::SynthesisLimitExceeded {
                section_index,
                current,
                limit,
            } => write!(
                f,
                "section {} has {} synthesis paragraphs (limit: {})",
                section_index, current, limit
            ),
        }
    }
}

/// Observability flags that never fail validation on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GovernorWarning {
    /// Utilization of the total budget is above 1.0.
    HardLimitExceeded { utilization: f64 },
    /// The cut order ran out while utilization was still over the trigger.
    CutPolicyExhausted,
    /// Narration is over the nominal minutes but within tolerance.
    AudioAboveNominal { minutes: f64, nominal: u32 },
    /// Chapter structure came from a fallback rather than markers.
    ChapterFallback {
        strategy: FallbackStrategy,
        forced_monolith: bool,
    },
}

impl std::fmt::Display for GovernorWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HardLimitExceeded { utilization } => {
                write!(f, "hard limit exceeded (utilization {:.3})", utilization)
            }
            Self::CutPolicyExhausted => write!(f, "cut policy exhausted"),
            Self::AudioAboveNominal { minutes, nominal } => {
                write!(f, "{:.1} audio minutes above nominal {}", minutes, nominal)
            }
            Self::ChapterFallback {
                strategy,
                forced_monolith,
            } => {
                if *forced_monolith {
                    write!(f, "chapter budget fell back to monolith")
                } else {
                    write!(f, "no chapter markers, applied {}", strategy)
                }
            }
        }
    }
}

/// How the source's structure was resolved at session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDetectionEvent {
    pub chapter_detection: ChapterDetectionResult,
    pub strategy: FallbackStrategy,
    pub section_budgets: SectionBudgets,
    pub chapter_budget: ChapterBudget,
    /// Chapter budget fell back, so the source is treated as one chapter.
    pub forced_monolith: bool,
}

impl SectionDetectionEvent {
    pub fn fallback_applied(&self) -> bool {
        self.chapter_detection.fallback_triggered || self.forced_monolith
    }
}

/// Outcome of validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernorValidationResult {
    pub is_valid: bool,
    pub violations: Vec<GovernorViolation>,
    pub warnings: Vec<GovernorWarning>,
    /// Current words over the total budget.
    pub budget_utilization: f64,
    /// Words plus the word cost of visuals.
    pub effective_budget: u32,
    pub cut_events: Vec<CutEvent>,
    pub section_detection_event: Option<SectionDetectionEvent>,
}

impl GovernorValidationResult {
    pub fn has_violation(&self, kind: ViolationKind) -> bool {
        self.violations.iter().any(|v| v.kind() == kind)
    }

    pub fn violation_kinds(&self) -> Vec<ViolationKind> {
        self.violations.iter().map(GovernorViolation::kind).collect()
    }
}

/// What the caller must do with the generated output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EnforcementDecision {
    /// Discard the output.
    Halt { violations: Vec<GovernorViolation> },
    /// Deliver the output; keep the flags for quality monitoring.
    AcceptWithFlag {
        violations: Vec<GovernorViolation>,
        warnings: Vec<GovernorWarning>,
    },
}

impl EnforcementDecision {
    pub fn is_halt(&self) -> bool {
        matches!(self, Self::Halt { .. })
    }

    /// Message for end users, if any. Never includes violation codes.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::Halt { .. } => Some(RETRY_MESSAGE),
            Self::AcceptWithFlag { .. } => None,
        }
    }

    pub fn violations(&self) -> &[GovernorViolation] {
        match self {
            Self::Halt { violations } | Self::AcceptWithFlag { violations, .. } => violations,
        }
    }
}

impl std::fmt::Display for EnforcementDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Halt { violations } => write!(f, "halt ({} violations)", violations.len()),
            Self::AcceptWithFlag {
                violations,
                warnings,
            } => write!(
                f,
                "accept ({} violations, {} warnings)",
                violations.len(),
                warnings.len()
            ),
        }
    }
}

/// Validator bound to one governor.
#[derive(Debug, Clone, Copy)]
pub struct GovernorValidator<'g> {
    governor: &'g SummaryTypeGovernor,
}

impl<'g> GovernorValidator<'g> {
    pub fn new(governor: &'g SummaryTypeGovernor) -> Self {
        Self { governor }
    }

    /// Check every budget rule against the state.
    pub fn validate(
        &self,
        state: &GovernorState,
        source_word_count: u32,
        cut_events: &[CutEvent],
        section_detection_event: Option<&SectionDetectionEvent>,
    ) -> GovernorValidationResult {
        let g = self.governor;
        let calc = BudgetCalculator::new(g);
        let words = state.current_word_count;
        let mut violations = Vec::new();

        if words > g.max_word_ceiling() {
            violations.push(GovernorViolation::TotalWordCountExceeded {
                current: words,
                limit: g.max_word_ceiling(),
            });
        }

        if state.visual_count > g.max_visuals() {
            violations.push(GovernorViolation::VisualCountExceeded {
                current: state.visual_count,
                limit: g.max_visuals(),
            });
        }

        if !calc.is_audio_duration_valid(words) {
            violations.push(GovernorViolation::AudioMinutesExceeded {
                current: calc.calculate_audio_minutes(words),
                limit: calc.audio_minutes_limit(),
            });
        }

        for (section_index, count) in &state.synthesis_count_per_section {
            if *count > g.max_synthesis_per_section() {
                violations.push(GovernorViolation::SynthesisLimitExceeded {
                    section_index: *section_index,
                    current: *count,
                    limit: g.max_synthesis_per_section(),
                });
            }
        }

        let total_budget = calc.calculate_total_budget(source_word_count);
        let budget_utilization = utilization(words, total_budget);

        let mut warnings = Vec::new();
        if budget_utilization > g.cut_policy().hard_limit_threshold {
            warnings.push(GovernorWarning::HardLimitExceeded {
                utilization: budget_utilization,
            });
        }
        if state.cut_policy_exhausted {
            warnings.push(GovernorWarning::CutPolicyExhausted);
        }
        if calc.is_audio_above_nominal(words) && calc.is_audio_duration_valid(words) {
            warnings.push(GovernorWarning::AudioAboveNominal {
                minutes: calc.calculate_audio_minutes(words),
                nominal: g.max_audio_minutes(),
            });
        }
        if let Some(event) = section_detection_event.filter(|e| e.fallback_applied()) {
            warnings.push(GovernorWarning::ChapterFallback {
                strategy: event.strategy,
                forced_monolith: event.forced_monolith,
            });
        }

        GovernorValidationResult {
            is_valid: violations.is_empty(),
            violations,
            warnings,
            budget_utilization,
            effective_budget: calc.calculate_effective_budget(words, state.visual_count),
            cut_events: cut_events.to_vec(),
            section_detection_event: section_detection_event.cloned(),
        }
    }

    /// Halt on an invalid result under strict enforcement, otherwise accept
    /// with the flags attached.
    pub fn enforce(&self, result: &GovernorValidationResult) -> EnforcementDecision {
        if self.governor.strict_enforcement() && !result.is_valid {
            EnforcementDecision::Halt {
                violations: result.violations.clone(),
            }
        } else {
            EnforcementDecision::AcceptWithFlag {
                violations: result.violations.clone(),
                warnings: result.warnings.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governor::SummaryType;

    fn state(words: u32, visuals: u32) -> GovernorState {
        GovernorState {
            current_word_count: words,
            visual_count: visuals,
            ..GovernorState::default()
        }
    }

    #[test]
    fn test_visual_budget_independent_of_words() {
        let g = SummaryType::QuickReference.governor();
        let v = GovernorValidator::new(&g);
        let result = v.validate(&state(500, 2), 10_000, &[], None);
        assert!(!result.is_valid);
        assert_eq!(result.violation_kinds(), vec![ViolationKind::VisualCountExceeded]);
        assert_eq!(
            result.violations[0],
            GovernorViolation::VisualCountExceeded {
                current: 2,
                limit: 1
            }
        );
    }

    #[test]
    fn test_accumulates_all_violations() {
        let g = SummaryType::QuickReference.governor();
        let v = GovernorValidator::new(&g);
        let mut s = state(1500, 3);
        s.synthesis_count_per_section.insert(0, 1);
        s.synthesis_count_per_section.insert(4, 2);
        let result = v.validate(&s, 10_000, &[], None);
        assert_eq!(
            result.violation_kinds(),
            vec![
                ViolationKind::TotalWordCountExceeded,
                ViolationKind::VisualCountExceeded,
                ViolationKind::AudioMinutesExceeded,
                ViolationKind::SynthesisLimitExceeded,
            ]
        );
        assert!(matches!(
            result.violations[3],
            GovernorViolation::SynthesisLimitExceeded {
                section_index: 4,
                current: 2,
                limit: 1
            }
        ));
    }

    #[test]
    fn test_valid_state() {
        let g = SummaryType::Professional.governor();
        let v = GovernorValidator::new(&g);
        let result = v.validate(&state(2500, 3), 30_000, &[], None);
        assert!(result.is_valid);
        assert!(result.violations.is_empty());
        assert_eq!(result.effective_budget, 3100);
        // 30k → 3000 + 600
        assert!((result.budget_utilization - 2500.0 / 3600.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate_is_idempotent() {
        let g = SummaryType::Accessible.governor();
        let v = GovernorValidator::new(&g);
        let mut s = state(7000, 5);
        s.cut_policy_exhausted = true;
        let first = v.validate(&s, 40_000, &[], None);
        let second = v.validate(&s, 40_000, &[], None);
        assert_eq!(first, second);
    }

    #[test]
    fn test_warnings() {
        let g = SummaryType::QuickReference.governor();
        let v = GovernorValidator::new(&g);
        // budget for 1000-word source is 800; 950 words: over hard limit,
        // audio 6.33 min is above nominal 6 but within 6.6
        let mut s = state(950, 0);
        s.cut_policy_exhausted = true;
        let result = v.validate(&s, 1000, &[], None);
        assert!(result.is_valid);
        assert!(matches!(
            result.warnings[0],
            GovernorWarning::HardLimitExceeded { .. }
        ));
        assert_eq!(result.warnings[1], GovernorWarning::CutPolicyExhausted);
        assert!(matches!(
            result.warnings[2],
            GovernorWarning::AudioAboveNominal { nominal: 6, .. }
        ));
    }

    #[test]
    fn test_chapter_fallback_warning() {
        let g = SummaryType::Professional.governor();
        let v = GovernorValidator::new(&g);
        let event = SectionDetectionEvent {
            chapter_detection: ChapterDetectionResult::monolith(4000),
            strategy: FallbackStrategy::TreatAsMonolith,
            section_budgets: SectionBudgets {
                intro: 300,
                chapter_pool: 2400,
                conclusion: 300,
            },
            chapter_budget: ChapterBudget::Normal {
                min_words: 300,
                max_words: 900,
            },
            forced_monolith: false,
        };
        let result = v.validate(&state(100, 0), 4000, &[], Some(&event));
        assert_eq!(
            result.warnings,
            vec![GovernorWarning::ChapterFallback {
                strategy: FallbackStrategy::TreatAsMonolith,
                forced_monolith: false
            }]
        );
        assert_eq!(result.section_detection_event, Some(event));
    }

    #[test]
    fn test_strict_enforcement_halts() {
        let g = SummaryType::QuickReference.governor();
        let v = GovernorValidator::new(&g);
        let result = v.validate(&state(500, 2), 10_000, &[], None);
        let decision = v.enforce(&result);
        assert!(decision.is_halt());
        assert_eq!(decision.user_message(), Some(RETRY_MESSAGE));
        assert_eq!(decision.violations().len(), 1);
        assert!(!RETRY_MESSAGE.contains("visual"));
    }

    #[test]
    fn test_lenient_enforcement_accepts_with_flags() {
        let g = SummaryType::Accessible.governor();
        let v = GovernorValidator::new(&g);
        let result = v.validate(&state(500, 9), 10_000, &[], None);
        assert!(!result.is_valid);
        let decision = v.enforce(&result);
        assert!(!decision.is_halt());
        assert_eq!(decision.user_message(), None);
        assert!(matches!(
            decision,
            EnforcementDecision::AcceptWithFlag { ref violations, .. } if violations.len() == 1
        ));
    }

    #[test]
    fn test_valid_result_accepted_under_strict() {
        let g = SummaryType::QuickReference.governor();
        let v = GovernorValidator::new(&g);
        let result = v.validate(&state(700, 1), 10_000, &[], None);
        assert!(!v.enforce(&result).is_halt());
    }

    #[test]
    fn test_violation_serde_tag() {
        let v = GovernorViolation::VisualCountExceeded {
            current: 2,
            limit: 1,
        };
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"kind":"visual_count_exceeded","current":2,"limit":1}"#);
    }
}
