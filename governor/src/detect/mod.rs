//! Deterministic text classifiers.
//!
//! - [`source_type`]: argumentative / narrative / technical source scoring
//! - [`expansion`]: first-match-wins span classification
//! - [`chapter`]: chapter markers with infer/monolith fallback
//! - [`block`]: block kind → governing behaviour table

pub mod block;
pub mod chapter;
pub mod expansion;
pub mod source_type;

pub use block::{BlockBehavior, BlockKind};
pub use chapter::{ChapterDetectionResult, ChapterDetector, ChapterSpan, FallbackStrategy};
pub use expansion::{ExpansionType, ExpansionTypeDetector};
pub use source_type::{SourceType, SourceTypeDetectionResult, SourceTypeDetector, SourceTypeScores};
