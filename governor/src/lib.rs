//! Summary Governor Engine
//!
//! Deterministic budget enforcement and content shaping for generated book
//! guides. The engine consumes already-generated text spans and guarantees
//! the final guide obeys auditable limits on:
//! - total word count (scaled by source length, capped by a ceiling)
//! - visual count
//! - audio narration minutes
//! - synthesis paragraphs per section
//!
//! It never writes prose of its own beyond short template-based synthesis
//! paragraphs that stand in for cut expansions, and it never touches spans
//! classified as core argument.
//!
//! # Flow
//!
//! ```text
//! source text ──► SourceTypeDetector ─┐
//!             └─► ChapterDetector ────┴─► begin_session (budgets, chapter plan)
//!
//! span ──► ExpansionTypeDetector ──► fold into GovernorState
//!                                   └─► cut policy ──► SynthesisGenerator
//!
//! finish ──► validate ──► enforce (halt | accept with flags)
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use summary_governor::{
//!     FallbackStrategy, GeneratedSpan, SummaryGovernorEngine, SummaryType,
//! };
//!
//! let engine = SummaryGovernorEngine::for_type(SummaryType::Professional);
//! let source = std::fs::read_to_string("book.txt").unwrap();
//! let mut session = engine
//!     .begin_session(&source, FallbackStrategy::InferSections, "habit formation")
//!     .unwrap();
//! engine
//!     .fold_span(&mut session, GeneratedSpan::prose("Habits compound.", 0, 0))
//!     .unwrap();
//! let guide = engine.finish(session);
//! println!("{}", guide.record.governed_word_count);
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod budget;
pub mod config;
pub mod cut_policy;
pub mod detect;
pub mod engine;
pub mod errors;
pub mod governor;
pub mod state;
pub mod synthesis;
pub mod validation;

pub use budget::{
    BudgetCalculator, ChapterBudget, SectionBudgets, WhitespaceWordCounter, WordCounter,
};
pub use config::{GovernorConfig, GovernorOverrides};
pub use cut_policy::{CutPolicyEngine, CutPolicyPhase};
pub use detect::{
    BlockBehavior, BlockKind, ChapterDetectionResult, ChapterDetector, ExpansionType,
    ExpansionTypeDetector, FallbackStrategy, SourceType, SourceTypeDetectionResult,
    SourceTypeDetector,
};
pub use engine::{
    FoldOutcome, GeneratedSpan, GovernedGuide, GovernedSpan, GovernorSession, GuideRecord,
    PlacedSynthesis, SpanStatus, SummaryGovernorEngine,
};
pub use errors::{GovernorConfigError, GovernorError, GovernorErrorKind};
pub use governor::{
    ChapterPolicy, CutPolicy, GovernorParams, SectionBudget, SummaryType, SummaryTypeGovernor,
    VisualBudget,
};
pub use state::{CutEvent, CutReason, GovernorState, PendingCut};
pub use synthesis::{SynthesisGenerator, SynthesisParagraph, SynthesisRequest, TemplateSynthesizer};
pub use validation::{
    EnforcementDecision, GovernorValidationResult, GovernorValidator, GovernorViolation,
    GovernorWarning, SectionDetectionEvent, ViolationKind, RETRY_MESSAGE,
};
