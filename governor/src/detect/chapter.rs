//! Chapter structure detection.
//!
//! Finds explicit chapter markers (`Chapter 3:`, `Part 2`, markdown headings).
//! When a document has none, the caller-selected [`FallbackStrategy`] decides
//! between inferring sections from paragraph blocks and treating the whole
//! document as a single chapter.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::budget::count_words;
use crate::errors::GovernorConfigError;

static CHAPTER_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(chapter\s+(\d+|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve)\b|part\s+\d+\b)",
    )
    .unwrap()
});

/// `Chapter IV:` / `Part ii` candidates. The numeral must end the line or be
/// followed by a title separator, and must be well formed.
static ROMAN_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(chapter|part)\s+([ivxlcdm]+)\s*($|[:.\-\x{2013}\x{2014}])").unwrap()
});

static ROMAN_NUMERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^m{0,3}(cm|cd|d?c{0,3})(xc|xl|l?x{0,3})(ix|iv|v?i{0,3})$").unwrap()
});

static HEADING_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}#{1,2}\s+\S").unwrap());

static FENCE_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(```|~~~)").unwrap());

static BLANK_LINE_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Inferred sections grow block by block until they reach this size.
pub const INFERRED_SECTION_MIN_WORDS: usize = 200;

/// What to do when no chapter markers are present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    /// Split on blank-line-delimited blocks.
    #[default]
    InferSections,
    /// One chapter holding the whole document.
    TreatAsMonolith,
}

impl std::fmt::Display for FallbackStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InferSections => write!(f, "infer_sections"),
            Self::TreatAsMonolith => write!(f, "treat_as_monolith"),
        }
    }
}

impl std::str::FromStr for FallbackStrategy {
    type Err = GovernorConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "infer_sections" | "infersections" | "infer" => Ok(Self::InferSections),
            "treat_as_monolith" | "treatasmonolith" | "monolith" => Ok(Self::TreatAsMonolith),
            other => Err(GovernorConfigError::UnknownFallbackStrategy(other.to_string())),
        }
    }
}

/// A detected or inferred chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSpan {
    /// Marker line, or `None` for inferred sections.
    pub title: Option<String>,
    /// Words in the chapter body, marker line included.
    pub word_count: usize,
}

/// Result of chapter detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterDetectionResult {
    pub chapter_count: u32,
    pub is_monolith: bool,
    /// No markers were found and a fallback strategy was applied.
    pub fallback_triggered: bool,
    pub chapters: Vec<ChapterSpan>,
}

impl ChapterDetectionResult {
    /// Single chapter covering the whole document.
    pub fn monolith(word_count: usize) -> Self {
        Self {
            chapter_count: 1,
            is_monolith: true,
            fallback_triggered: true,
            chapters: vec![ChapterSpan {
                title: None,
                word_count,
            }],
        }
    }

    /// Total words across chapters.
    pub fn total_words(&self) -> usize {
        self.chapters.iter().map(|c| c.word_count).sum()
    }
}

/// Structural chapter scanner.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChapterDetector;

impl ChapterDetector {
    /// Detect chapters, applying `fallback` if the text has no markers.
    pub fn detect(text: &str, fallback: FallbackStrategy) -> ChapterDetectionResult {
        let marked = Self::marked_chapters(text);
        if !marked.is_empty() {
            return ChapterDetectionResult {
                chapter_count: marked.len() as u32,
                is_monolith: false,
                fallback_triggered: false,
                chapters: marked,
            };
        }

        let total_words = count_words(text);
        if total_words == 0 {
            return ChapterDetectionResult {
                chapter_count: 0,
                is_monolith: false,
                fallback_triggered: true,
                chapters: Vec::new(),
            };
        }

        match fallback {
            FallbackStrategy::TreatAsMonolith => ChapterDetectionResult::monolith(total_words),
            FallbackStrategy::InferSections => {
                let sections = Self::infer_sections(text);
                ChapterDetectionResult {
                    chapter_count: sections.len() as u32,
                    is_monolith: sections.len() == 1,
                    fallback_triggered: true,
                    chapters: sections,
                }
            }
        }
    }

    /// Whether a single line is a chapter marker.
    pub fn is_marker_line(line: &str) -> bool {
        CHAPTER_MARKER.is_match(line) || HEADING_MARKER.is_match(line) || Self::is_roman_marker(line)
    }

    fn is_roman_marker(line: &str) -> bool {
        ROMAN_MARKER
            .captures(line)
            .and_then(|caps| caps.get(2))
            .is_some_and(|numeral| ROMAN_NUMERAL.is_match(numeral.as_str()))
    }

    /// Chapters delimited by marker lines. Front matter before the first
    /// marker is folded into the first chapter. Lines inside fenced code
    /// blocks are never markers.
    fn marked_chapters(text: &str) -> Vec<ChapterSpan> {
        let mut chapters: Vec<ChapterSpan> = Vec::new();
        let mut front_matter_words = 0usize;
        let mut in_fence = false;

        for line in text.lines() {
            let words = count_words(line);
            if FENCE_LINE.is_match(line) {
                in_fence = !in_fence;
            }
            if !in_fence && Self::is_marker_line(line) {
                chapters.push(ChapterSpan {
                    title: Some(line.trim().to_string()),
                    word_count: words,
                });
            } else if let Some(current) = chapters.last_mut() {
                current.word_count += words;
            } else {
                front_matter_words += words;
            }
        }

        if let Some(first) = chapters.first_mut() {
            first.word_count += front_matter_words;
        }
        chapters
    }

    /// Group blank-line-delimited blocks into sections of at least
    /// [`INFERRED_SECTION_MIN_WORDS`]; an undersized tail joins the previous
    /// section.
    fn infer_sections(text: &str) -> Vec<ChapterSpan> {
        let mut sections: Vec<ChapterSpan> = Vec::new();
        let mut pending = 0usize;

        for block in BLANK_LINE_SPLIT.split(text) {
            let words = count_words(block);
            if words == 0 {
                continue;
            }
            pending += words;
            if pending >= INFERRED_SECTION_MIN_WORDS {
                sections.push(ChapterSpan {
                    title: None,
                    word_count: pending,
                });
                pending = 0;
            }
        }

        if pending > 0 {
            match sections.last_mut() {
                Some(last) => last.word_count += pending,
                None => sections.push(ChapterSpan {
                    title: None,
                    word_count: pending,
                }),
            }
        }
        sections
    }
}
