//! Governor error taxonomy.
//!
//! Budget and content violations are not errors: they are data carried in
//! [`crate::validation::GovernorValidationResult`]. The types here cover the
//! two remaining failure classes:
//! - [`GovernorConfigError`]: an invalid governor preset or override
//! - [`GovernorError`]: a caller (or a plugged-in synthesis generator)
//!   breaking the session contract

use serde::{Deserialize, Serialize};

use crate::detect::expansion::ExpansionType;

/// Invalid governor configuration.
///
/// Returned by [`crate::SummaryTypeGovernor::try_new`]; the panicking
/// constructor reports the same variants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GovernorConfigError {
    #[error("hard limit threshold must be exactly 1.0, got {0}")]
    HardLimitNotUnity(f64),

    #[error("cut order must not contain core_argument")]
    CoreArgumentInCutOrder,

    #[error("cut order lists {0} more than once")]
    DuplicateCutOrderEntry(ExpansionType),

    #[error("trigger threshold must be in (0, 1], got {0}")]
    InvalidTriggerThreshold(f64),

    #[error(
        "section budget fractions must each be in [0, 1] and sum to 1.0 \
         (intro {intro}, chapter pool {chapter_pool}, conclusion {conclusion})"
    )]
    InvalidSectionBudget {
        intro: f64,
        chapter_pool: f64,
        conclusion: f64,
    },

    #[error("max word ceiling must be positive")]
    ZeroCeiling,

    #[error("base word count {base} exceeds max word ceiling {ceiling}")]
    BaseExceedsCeiling { base: u32, ceiling: u32 },

    #[error("source scaling factor must be finite and non-negative, got {0}")]
    InvalidScalingFactor(f64),

    #[error("chapter word range is invalid (min {min}, max {max})")]
    InvalidChapterPolicy { min: u32, max: u32 },

    #[error("unknown summary type: {0}")]
    UnknownSummaryType(String),

    #[error("unknown fallback strategy: {0}")]
    UnknownFallbackStrategy(String),

    #[error("failed to read governor config {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse governor config: {0}")]
    Parse(String),
}

/// High-level kind for session contract errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernorErrorKind {
    /// Source text too short to yield a non-zero budget.
    EmptySource,
    /// Span arrived with a position not after the previous span.
    OutOfOrderSpan,
    /// Span moved back to an earlier section.
    SectionRegressed,
    /// A synthesis generator returned a paragraph outside its contract.
    SynthesisContract,
}

impl GovernorErrorKind {
    /// Suggested action for this error kind.
    pub fn suggested_action(self) -> &'static str {
        match self {
            Self::EmptySource => "supply the full source document before starting a session",
            Self::OutOfOrderSpan => "deliver spans in generation order",
            Self::SectionRegressed => "finish a section before requesting spans for the next one",
            Self::SynthesisContract => {
                "keep synthesis declarative and within its word range"
            }
        }
    }
}

impl std::fmt::Display for GovernorErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySource => write!(f, "empty_source"),
            Self::OutOfOrderSpan => write!(f, "out_of_order_span"),
            Self::SectionRegressed => write!(f, "section_regressed"),
            Self::SynthesisContract => write!(f, "synthesis_contract"),
        }
    }
}

/// Session contract error with position context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernorError {
    /// Error kind.
    pub kind: GovernorErrorKind,
    /// Human-readable detail.
    pub detail: String,
    /// `(section_index, chunk_index)` of the offending span, if any.
    pub position: Option<(u32, u32)>,
}

impl GovernorError {
    /// Create a new governor error.
    pub fn new(kind: GovernorErrorKind, detail: &str) -> Self {
        Self {
            kind,
            detail: detail.to_string(),
            position: None,
        }
    }

    /// Add span position context.
    pub fn at(mut self, section_index: u32, chunk_index: u32) -> Self {
        self.position = Some((section_index, chunk_index));
        self
    }
}

impl std::fmt::Display for GovernorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "governor error [{}]: {}", self.kind, self.detail)?;
        if let Some((section, chunk)) = self.position {
            write!(f, " (section {}, chunk {})", section, chunk)?;
        }
        Ok(())
    }
}

impl std::error::Error for GovernorError {}
