//! Source document classification from surface discourse markers.
//!
//! Scores are weighted marker counts. The winner is the highest score, with
//! ties broken argumentative > technical > narrative. A document without any
//! markers is argumentative.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// A weighted marker pattern.
struct Marker {
    pattern: &'static LazyLock<Regex>,
    weight: u32,
}

static ARGUES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bargues\b").unwrap());
static EVIDENCE_SUGGESTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bevidence suggests\b").unwrap());
static THEREFORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\btherefore\b").unwrap());
static THUS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bthus\b").unwrap());

static TEMPORAL_CONNECTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(the next day|meanwhile|eventually|later that evening)\b").unwrap()
});
static DIALOGUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\"[^\"\\n]{1,300}\"|\u{201C}[^\u{201D}\\n]{1,300}\u{201D}").unwrap());
static SCENE_SETTING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(had been|it was (a|the)|once upon a time)\b").unwrap()
});

static STEP_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bstep \d+:").unwrap());
static PARAMETER_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bparameter:").unwrap());
static RETURNS_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\breturns:").unwrap());
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*```").unwrap());

static ARGUMENTATIVE_MARKERS: [Marker; 4] = [
    Marker { pattern: &ARGUES, weight: 2 },
    Marker { pattern: &EVIDENCE_SUGGESTS, weight: 2 },
    Marker { pattern: &THEREFORE, weight: 1 },
    Marker { pattern: &THUS, weight: 1 },
];

static NARRATIVE_MARKERS: [Marker; 3] = [
    Marker { pattern: &TEMPORAL_CONNECTOR, weight: 2 },
    Marker { pattern: &DIALOGUE, weight: 1 },
    Marker { pattern: &SCENE_SETTING, weight: 1 },
];

static TECHNICAL_MARKERS: [Marker; 3] = [
    Marker { pattern: &STEP_MARKER, weight: 2 },
    Marker { pattern: &PARAMETER_MARKER, weight: 2 },
    Marker { pattern: &RETURNS_MARKER, weight: 2 },
];

/// Weight of one fenced code block (an opening/closing fence pair).
const CODE_BLOCK_WEIGHT: u32 = 2;

/// Discourse style of the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Argumentative,
    Narrative,
    Technical,
}

impl SourceType {
    /// Tie-break priority, strongest first.
    pub const PRIORITY: [SourceType; 3] = [Self::Argumentative, Self::Technical, Self::Narrative];
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Argumentative => write!(f, "argumentative"),
            Self::Narrative => write!(f, "narrative"),
            Self::Technical => write!(f, "technical"),
        }
    }
}

/// Weighted marker score per source type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTypeScores {
    pub argumentative: u32,
    pub narrative: u32,
    pub technical: u32,
}

impl SourceTypeScores {
    /// Score for a single type.
    pub fn score(&self, source_type: SourceType) -> u32 {
        match source_type {
            SourceType::Argumentative => self.argumentative,
            SourceType::Narrative => self.narrative,
            SourceType::Technical => self.technical,
        }
    }

    /// Sum of all scores.
    pub fn total(&self) -> u32 {
        self.argumentative + self.narrative + self.technical
    }
}

/// Result of source type detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTypeDetectionResult {
    pub detected_type: SourceType,
    pub scores: SourceTypeScores,
}

/// Deterministic marker scorer for source documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceTypeDetector;

impl SourceTypeDetector {
    /// Score the text and pick a winner.
    pub fn detect(text: &str) -> SourceTypeDetectionResult {
        let scores = Self::score(text);
        SourceTypeDetectionResult {
            detected_type: Self::resolve(&scores),
            scores,
        }
    }

    /// Compute per-type scores without resolving a winner.
    pub fn score(text: &str) -> SourceTypeScores {
        let fence_lines = CODE_FENCE.find_iter(text).count() as u32;
        let code_blocks = fence_lines.div_ceil(2);

        SourceTypeScores {
            argumentative: weighted_count(text, &ARGUMENTATIVE_MARKERS),
            narrative: weighted_count(text, &NARRATIVE_MARKERS),
            technical: weighted_count(text, &TECHNICAL_MARKERS) + code_blocks * CODE_BLOCK_WEIGHT,
        }
    }

    /// Highest score wins; ties fall to the earlier entry in
    /// [`SourceType::PRIORITY`]. All-zero resolves to argumentative.
    pub fn resolve(scores: &SourceTypeScores) -> SourceType {
        let mut best = SourceType::PRIORITY[0];
        for candidate in SourceType::PRIORITY.iter().skip(1) {
            if scores.score(*candidate) > scores.score(best) {
                best = *candidate;
            }
        }
        best
    }
}

fn weighted_count(text: &str, markers: &[Marker]) -> u32 {
    markers
        .iter()
        .map(|m| m.pattern.find_iter(text).count() as u32 * m.weight)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argumentative_detection() {
        let text = "The author argues that habits compound. Evidence suggests small \
                    changes matter; therefore we should start small.";
        let result = SourceTypeDetector::detect(text);
        assert_eq!(result.detected_type, SourceType::Argumentative);
        assert_eq!(result.scores.argumentative, 5);
    }

    #[test]
    fn test_narrative_detection() {
        let text = "It was a cold morning. \"Where are you going?\" she asked. \
                    The next day he left. Meanwhile the town slept. Eventually \
                    the snow had been cleared.";
        let result = SourceTypeDetector::detect(text);
        assert_eq!(result.detected_type, SourceType::Narrative);
        // 3 temporal × 2 + 1 dialogue + 2 scene-setting
        assert_eq!(result.scores.narrative, 9);
    }

    #[test]
    fn test_technical_detection() {
        let text = "Step 1: install the tool.\nStep 2: configure it.\n```\nrun --fast\n```\n\
                    Parameter: path to config.\nReturns: exit code.";
        let result = SourceTypeDetector::detect(text);
        assert_eq!(result.detected_type, SourceType::Technical);
        assert_eq!(result.scores.technical, 10);
    }

    #[test]
    fn test_no_markers_defaults_to_argumentative() {
        let result = SourceTypeDetector::detect("Plain words with nothing special.");
        assert_eq!(result.detected_type, SourceType::Argumentative);
        assert_eq!(result.scores.total(), 0);
        assert_eq!(
            SourceTypeDetector::detect("").detected_type,
            SourceType::Argumentative
        );
    }

    #[test]
    fn test_tie_argumentative_beats_technical() {
        let text = "She argues for clarity. Parameter: the input size.";
        let result = SourceTypeDetector::detect(text);
        assert_eq!(result.scores.argumentative, result.scores.technical);
        assert_eq!(result.detected_type, SourceType::Argumentative);
    }

    #[test]
    fn test_tie_technical_beats_narrative() {
        let scores = SourceTypeScores {
            argumentative: 0,
            narrative: 4,
            technical: 4,
        };
        assert_eq!(SourceTypeDetector::resolve(&scores), SourceType::Technical);
    }

    #[test]
    fn test_unclosed_fence_counts_as_block() {
        let scores = SourceTypeDetector::score("```\nlet x = 1;");
        assert_eq!(scores.technical, CODE_BLOCK_WEIGHT);
    }

    #[test]
    fn test_detection_is_repeatable() {
        let text = "Meanwhile, the author argues. Step 3: repeat. Thus it ends.";
        let first = SourceTypeDetector::detect(text);
        for _ in 0..3 {
            assert_eq!(SourceTypeDetector::detect(text), first);
        }
    }

    #[test]
    fn test_word_boundaries() {
        // "thusly" and "arguesome" are not markers
        let scores = SourceTypeDetector::score("thusly arguesome");
        assert_eq!(scores.argumentative, 0);
    }
}
