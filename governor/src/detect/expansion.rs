//! Expansion type classification for generated spans.
//!
//! Rules are evaluated in a fixed order and the first match wins. The order
//! is part of the contract: a span carrying both an exercise marker and a
//! comparison marker is an exercise.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static EXERCISE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(exercise:|try this:|your turn:|practice:)").unwrap()
});

static COMPARISON_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(similarly in\b|analogous to\b|just as in\b)").unwrap());

static COMMENTARY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(furthermore,|moreover,|additionally,)").unwrap());

static SECONDARY_EXAMPLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(for another example|another example)\b").unwrap());

static STYLISTIC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(in other words,|put differently,|to put it another way,)").unwrap()
});

/// Purpose a generated span serves within the guide.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionType {
    /// The argument itself. Never cut.
    CoreArgument,
    /// Reader task or practice prompt
    Exercise,
    /// Analogy drawn from another field
    AdjacentDomainComparison,
    /// Elaboration layered on an established point
    ExtendedCommentary,
    /// Additional example beyond the first
    SecondaryExample,
    /// Restatement of something already said
    StylisticElaboration,
}

impl ExpansionType {
    /// Every expansion type, core argument first.
    pub const ALL: [ExpansionType; 6] = [
        Self::CoreArgument,
        Self::Exercise,
        Self::AdjacentDomainComparison,
        Self::ExtendedCommentary,
        Self::SecondaryExample,
        Self::StylisticElaboration,
    ];

    /// Protected types can never be selected for cutting.
    pub fn is_protected(self) -> bool {
        match self {
            Self::CoreArgument => true,
            Self::Exercise
            | Self::AdjacentDomainComparison
            | Self::ExtendedCommentary
            | Self::SecondaryExample
            | Self::StylisticElaboration => false,
        }
    }

    /// Short human label used in synthesis text.
    pub fn label(self) -> &'static str {
        match self {
            Self::CoreArgument => "core argument",
            Self::Exercise => "practice exercise",
            Self::AdjacentDomainComparison => "cross-domain comparison",
            Self::ExtendedCommentary => "extended commentary",
            Self::SecondaryExample => "additional example",
            Self::StylisticElaboration => "restatement",
        }
    }
}

impl std::fmt::Display for ExpansionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CoreArgument => write!(f, "core_argument"),
            Self::Exercise => write!(f, "exercise"),
            Self::AdjacentDomainComparison => write!(f, "adjacent_domain_comparison"),
            Self::ExtendedCommentary => write!(f, "extended_commentary"),
            Self::SecondaryExample => write!(f, "secondary_example"),
            Self::StylisticElaboration => write!(f, "stylistic_elaboration"),
        }
    }
}

/// First-match-wins span classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpansionTypeDetector;

impl ExpansionTypeDetector {
    /// Classify a single generated span.
    pub fn classify(text: &str) -> ExpansionType {
        let rules: [(&Regex, ExpansionType); 5] = [
            (&*EXERCISE_PATTERN, ExpansionType::Exercise),
            (&*COMPARISON_PATTERN, ExpansionType::AdjacentDomainComparison),
            (&*COMMENTARY_PATTERN, ExpansionType::ExtendedCommentary),
            (&*SECONDARY_EXAMPLE_PATTERN, ExpansionType::SecondaryExample),
            (&*STYLISTIC_PATTERN, ExpansionType::StylisticElaboration),
        ];

        rules
            .iter()
            .find(|(pattern, _)| pattern.is_match(text))
            .map(|(_, kind)| *kind)
            .unwrap_or(ExpansionType::CoreArgument)
    }
}
