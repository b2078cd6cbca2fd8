//! Budget math: total, effective, audio, section and chapter budgets.
//!
//! Every function here is a pure function of its inputs and the governor:
//! no clock, no randomness, no shared state.

use serde::{Deserialize, Serialize};

use crate::governor::SummaryTypeGovernor;

/// Budget cost of one visual, in words.
pub const WORDS_PER_VISUAL: u32 = 200;

/// Narration reading rate.
pub const WORDS_PER_AUDIO_MINUTE: u32 = 150;

/// Audio may run this many percent over the preset's minutes.
pub const AUDIO_TOLERANCE_PERCENT: u32 = 10;

/// Below this a chapter cannot carry a meaningful summary.
pub const MIN_VIABLE_CHAPTER_WORDS: u32 = 100;

/// Trait for counting words in generated or source text.
pub trait WordCounter {
    /// Count the words in the given text.
    fn count(&self, text: &str) -> u32;

    /// Counter name for logging.
    fn name(&self) -> &str;
}

/// Whitespace-delimited word counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceWordCounter;

impl WordCounter for WhitespaceWordCounter {
    fn count(&self, text: &str) -> u32 {
        count_words(text) as u32
    }

    fn name(&self) -> &str {
        "whitespace"
    }
}

/// Whitespace-delimited word count.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Utilization as a fraction of `budget`.
///
/// A zero budget is fully used by any content at all.
pub fn utilization(word_count: u32, budget: u32) -> f64 {
    if budget == 0 {
        return if word_count == 0 { 0.0 } else { f64::INFINITY };
    }
    word_count as f64 / budget as f64
}

/// Split of the total budget across the guide's parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionBudgets {
    pub intro: u32,
    pub chapter_pool: u32,
    pub conclusion: u32,
}

impl SectionBudgets {
    pub fn total(&self) -> u32 {
        self.intro + self.chapter_pool + self.conclusion
    }
}

/// Per-chapter word range, or a signal to flatten the structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChapterBudget {
    Normal { min_words: u32, max_words: u32 },
    /// Too many chapters for the pool (or none at all): merge chapters or
    /// treat the source as a monolith.
    Fallback,
}

impl ChapterBudget {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback)
    }
}

impl std::fmt::Display for ChapterBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal {
                min_words,
                max_words,
            } => write!(f, "normal({}..{})", min_words, max_words),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Budget calculations bound to one governor.
#[derive(Debug, Clone, Copy)]
pub struct BudgetCalculator<'g> {
    governor: &'g SummaryTypeGovernor,
}

impl<'g> BudgetCalculator<'g> {
    pub fn new(governor: &'g SummaryTypeGovernor) -> Self {
        Self { governor }
    }

    /// Total word budget for a source of the given length.
    ///
    /// 1. Short sources get the base budget.
    /// 2. Longer sources add `source × factor`, capped at the max addition.
    /// 3. Clamp to the preset ceiling.
    /// 4. Clamp to 80% of the source so a guide never outgrows its book.
    pub fn calculate_total_budget(&self, source_word_count: u32) -> u32 {
        let g = self.governor;
        let budget = if source_word_count < g.min_source_length_for_scaling() {
            g.base_word_count()
        } else {
            let scaled = (source_word_count as f64 * g.source_scaling_factor()).floor() as u32;
            g.base_word_count()
                .saturating_add(scaled.min(g.max_scaled_addition()))
        };

        let short_source_cap = (source_word_count as u64 * 4 / 5) as u32;
        budget.min(g.max_word_ceiling()).min(short_source_cap)
    }

    /// Word budget consumed by text plus visuals.
    pub fn calculate_effective_budget(&self, word_count: u32, visual_count: u32) -> u32 {
        word_count.saturating_add(visual_count.saturating_mul(WORDS_PER_VISUAL))
    }

    /// Narration length in minutes.
    pub fn calculate_audio_minutes(&self, word_count: u32) -> f64 {
        word_count as f64 / WORDS_PER_AUDIO_MINUTE as f64
    }

    /// Whether narration fits the preset's minutes plus tolerance.
    ///
    /// Evaluated in whole words to keep the boundary exact: for 6 minutes
    /// the limit is 6 × 150 × 1.10 = 990 words.
    pub fn is_audio_duration_valid(&self, word_count: u32) -> bool {
        word_count as u64 * 100
            <= self.max_audio_words_scaled(100 + AUDIO_TOLERANCE_PERCENT as u64)
    }

    /// Narration exceeds the nominal minutes (tolerance not applied).
    pub fn is_audio_above_nominal(&self, word_count: u32) -> bool {
        word_count as u64 * 100 > self.max_audio_words_scaled(100)
    }

    /// Minutes allowed once tolerance is applied.
    pub fn audio_minutes_limit(&self) -> f64 {
        self.governor.max_audio_minutes() as f64 * (100 + AUDIO_TOLERANCE_PERCENT) as f64 / 100.0
    }

    fn max_audio_words_scaled(&self, percent: u64) -> u64 {
        self.governor.max_audio_minutes() as u64 * WORDS_PER_AUDIO_MINUTE as u64 * percent
    }

    /// Split `total_budget` by the governor's section fractions.
    ///
    /// Intro and conclusion round half-up; the chapter pool takes the
    /// remainder so the parts always sum to the total.
    pub fn calculate_section_budgets(&self, total_budget: u32) -> SectionBudgets {
        let fractions = self.governor.section_budget();
        let intro = ((total_budget as f64 * fractions.intro).round() as u32).min(total_budget);
        let conclusion = ((total_budget as f64 * fractions.conclusion).round() as u32)
            .min(total_budget - intro);
        SectionBudgets {
            intro,
            chapter_pool: total_budget - intro - conclusion,
            conclusion,
        }
    }

    /// Per-chapter range for `chapter_count` chapters sharing the pool.
    pub fn calculate_chapter_budget(&self, chapter_count: u32, chapter_pool_words: u32) -> ChapterBudget {
        if chapter_count == 0 {
            return ChapterBudget::Fallback;
        }

        let policy = self.governor.chapter_policy();
        let min_words = policy.min_words_per_chapter;
        let max_words = policy.max_words_per_chapter;

        if min_words as u64 * chapter_count as u64 > chapter_pool_words as u64 {
            let adjusted_min = chapter_pool_words / chapter_count;
            if adjusted_min < MIN_VIABLE_CHAPTER_WORDS {
                return ChapterBudget::Fallback;
            }
            return ChapterBudget::Normal {
                min_words: adjusted_min,
                max_words,
            };
        }

        ChapterBudget::Normal {
            min_words,
            max_words,
        }
    }
}
