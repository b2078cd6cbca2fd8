//! Summary type governors: immutable budget and policy presets.
//!
//! One governor exists per [`SummaryType`]. Governors are validated once at
//! construction and are read-only afterwards; every budget computation in
//! the crate is a pure function of a governor and its inputs.

use serde::{Deserialize, Serialize};

use crate::detect::expansion::ExpansionType;
use crate::errors::GovernorConfigError;

/// The only permitted hard limit: utilization above 1.0 is over budget.
pub const HARD_LIMIT_THRESHOLD: f64 = 1.0;

/// Allowed drift when checking that section fractions sum to 1.0.
const FRACTION_SUM_TOLERANCE: f64 = 1e-6;

/// Kind of guide being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryType {
    QuickReference,
    Professional,
    Accessible,
    DeepResearch,
}

impl SummaryType {
    pub const ALL: [SummaryType; 4] = [
        Self::QuickReference,
        Self::Professional,
        Self::Accessible,
        Self::DeepResearch,
    ];

    /// Built-in governor for this type.
    pub fn governor(self) -> SummaryTypeGovernor {
        SummaryTypeGovernor::preset(self)
    }

    /// Reader-facing name.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::QuickReference => "Quick Reference",
            Self::Professional => "Professional",
            Self::Accessible => "Accessible",
            Self::DeepResearch => "Deep Research",
        }
    }
}

impl std::fmt::Display for SummaryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuickReference => write!(f, "quick_reference"),
            Self::Professional => write!(f, "professional"),
            Self::Accessible => write!(f, "accessible"),
            Self::DeepResearch => write!(f, "deep_research"),
        }
    }
}

impl std::str::FromStr for SummaryType {
    type Err = GovernorConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "quickreference" | "quick" => Ok(Self::QuickReference),
            "professional" => Ok(Self::Professional),
            "accessible" => Ok(Self::Accessible),
            "deepresearch" | "deep" => Ok(Self::DeepResearch),
            _ => Err(GovernorConfigError::UnknownSummaryType(s.to_string())),
        }
    }
}

/// Share of the total budget given to each part of the guide.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectionBudget {
    pub intro: f64,
    pub chapter_pool: f64,
    pub conclusion: f64,
}

/// Ordered cut priorities and activation thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutPolicy {
    /// Expansion types in the order they are cut. Never contains
    /// [`ExpansionType::CoreArgument`].
    pub cut_order: Vec<ExpansionType>,
    /// Utilization at which cutting starts.
    pub trigger_threshold: f64,
    /// Always [`HARD_LIMIT_THRESHOLD`].
    pub hard_limit_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualBudget {
    pub max_visuals: u32,
}

/// Nominal words per chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterPolicy {
    pub min_words_per_chapter: u32,
    pub max_words_per_chapter: u32,
}

/// Unvalidated governor fields.
///
/// Build one of these (or take a preset's via [`SummaryTypeGovernor::params`])
/// and pass it to [`SummaryTypeGovernor::try_new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernorParams {
    pub summary_type: SummaryType,
    pub base_word_count: u32,
    pub max_word_ceiling: u32,
    pub source_scaling_factor: f64,
    pub min_source_length_for_scaling: u32,
    pub max_scaled_addition: u32,
    pub max_audio_minutes: u32,
    pub max_synthesis_per_section: u32,
    pub section_budget: SectionBudget,
    pub cut_policy: CutPolicy,
    pub visual_budget: VisualBudget,
    pub chapter_policy: ChapterPolicy,
    pub strict_enforcement: bool,
}

impl GovernorParams {
    /// Check every construction invariant.
    pub fn validate(&self) -> Result<(), GovernorConfigError> {
        let policy = &self.cut_policy;
        if policy.hard_limit_threshold != HARD_LIMIT_THRESHOLD {
            return Err(GovernorConfigError::HardLimitNotUnity(
                policy.hard_limit_threshold,
            ));
        }
        if policy.cut_order.iter().any(|t| t.is_protected()) {
            return Err(GovernorConfigError::CoreArgumentInCutOrder);
        }
        for (i, kind) in policy.cut_order.iter().enumerate() {
            if policy.cut_order[..i].contains(kind) {
                return Err(GovernorConfigError::DuplicateCutOrderEntry(*kind));
            }
        }
        let trigger = policy.trigger_threshold;
        if !(trigger > 0.0 && trigger <= HARD_LIMIT_THRESHOLD) {
            return Err(GovernorConfigError::InvalidTriggerThreshold(trigger));
        }

        let s = &self.section_budget;
        let fractions = [s.intro, s.chapter_pool, s.conclusion];
        let in_range = fractions.iter().all(|f| (0.0..=1.0).contains(f));
        let sum: f64 = fractions.iter().sum();
        if !in_range || (sum - 1.0).abs() > FRACTION_SUM_TOLERANCE {
            return Err(GovernorConfigError::InvalidSectionBudget {
                intro: s.intro,
                chapter_pool: s.chapter_pool,
                conclusion: s.conclusion,
            });
        }

        if self.max_word_ceiling == 0 {
            return Err(GovernorConfigError::ZeroCeiling);
        }
        if self.base_word_count > self.max_word_ceiling {
            return Err(GovernorConfigError::BaseExceedsCeiling {
                base: self.base_word_count,
                ceiling: self.max_word_ceiling,
            });
        }
        if !self.source_scaling_factor.is_finite() || self.source_scaling_factor < 0.0 {
            return Err(GovernorConfigError::InvalidScalingFactor(
                self.source_scaling_factor,
            ));
        }

        let c = &self.chapter_policy;
        if c.min_words_per_chapter == 0 || c.min_words_per_chapter > c.max_words_per_chapter {
            return Err(GovernorConfigError::InvalidChapterPolicy {
                min: c.min_words_per_chapter,
                max: c.max_words_per_chapter,
            });
        }
        Ok(())
    }
}

/// Validated, immutable governor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GovernorParams", into = "GovernorParams")]
pub struct SummaryTypeGovernor {
    params: GovernorParams,
}

impl TryFrom<GovernorParams> for SummaryTypeGovernor {
    type Error = GovernorConfigError;

    fn try_from(params: GovernorParams) -> Result<Self, Self::Error> {
        Self::try_new(params)
    }
}

impl From<SummaryTypeGovernor> for GovernorParams {
    fn from(governor: SummaryTypeGovernor) -> Self {
        governor.params
    }
}

impl SummaryTypeGovernor {
    /// Validate and wrap the given parameters.
    pub fn try_new(params: GovernorParams) -> Result<Self, GovernorConfigError> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Construct a governor, failing fast on a broken invariant.
    ///
    /// # Panics
    ///
    /// Panics if `params` fails [`GovernorParams::validate`]. An invalid
    /// governor is a programming error, not a runtime data condition.
    pub fn new(params: GovernorParams) -> Self {
        match Self::try_new(params) {
            Ok(governor) => governor,
            Err(err) => panic!("invalid summary type governor: {}", err),
        }
    }

    /// Built-in preset for a summary type.
    pub fn preset(summary_type: SummaryType) -> Self {
        use ExpansionType::{
            AdjacentDomainComparison as Adjacent, Exercise, ExtendedCommentary as Commentary,
            SecondaryExample as Secondary, StylisticElaboration as Stylistic,
        };

        let params = match summary_type {
            SummaryType::QuickReference => GovernorParams {
                summary_type,
                base_word_count: 900,
                max_word_ceiling: 1200,
                source_scaling_factor: 0.01,
                min_source_length_for_scaling: 15_000,
                max_scaled_addition: 300,
                max_audio_minutes: 6,
                max_synthesis_per_section: 1,
                section_budget: SectionBudget {
                    intro: 0.15,
                    chapter_pool: 0.70,
                    conclusion: 0.15,
                },
                cut_policy: CutPolicy {
                    cut_order: vec![Stylistic, Adjacent, Commentary, Secondary, Exercise],
                    trigger_threshold: 0.85,
                    hard_limit_threshold: HARD_LIMIT_THRESHOLD,
                },
                visual_budget: VisualBudget { max_visuals: 1 },
                chapter_policy: ChapterPolicy {
                    min_words_per_chapter: 150,
                    max_words_per_chapter: 400,
                },
                strict_enforcement: true,
            },
            SummaryType::Professional => GovernorParams {
                summary_type,
                base_word_count: 3000,
                max_word_ceiling: 4000,
                source_scaling_factor: 0.02,
                min_source_length_for_scaling: 20_000,
                max_scaled_addition: 1000,
                max_audio_minutes: 18,
                max_synthesis_per_section: 2,
                section_budget: SectionBudget {
                    intro: 0.10,
                    chapter_pool: 0.80,
                    conclusion: 0.10,
                },
                cut_policy: CutPolicy {
                    cut_order: vec![Stylistic, Adjacent, Commentary, Secondary, Exercise],
                    trigger_threshold: 0.88,
                    hard_limit_threshold: HARD_LIMIT_THRESHOLD,
                },
                visual_budget: VisualBudget { max_visuals: 3 },
                chapter_policy: ChapterPolicy {
                    min_words_per_chapter: 300,
                    max_words_per_chapter: 900,
                },
                strict_enforcement: true,
            },
            SummaryType::Accessible => GovernorParams {
                summary_type,
                base_word_count: 4500,
                max_word_ceiling: 6000,
                source_scaling_factor: 0.03,
                min_source_length_for_scaling: 20_000,
                max_scaled_addition: 1500,
                max_audio_minutes: 25,
                max_synthesis_per_section: 3,
                section_budget: SectionBudget {
                    intro: 0.12,
                    chapter_pool: 0.76,
                    conclusion: 0.12,
                },
                cut_policy: CutPolicy {
                    cut_order: vec![Adjacent, Stylistic, Commentary, Exercise, Secondary],
                    trigger_threshold: 0.90,
                    hard_limit_threshold: HARD_LIMIT_THRESHOLD,
                },
                visual_budget: VisualBudget { max_visuals: 4 },
                chapter_policy: ChapterPolicy {
                    min_words_per_chapter: 400,
                    max_words_per_chapter: 1200,
                },
                strict_enforcement: false,
            },
            SummaryType::DeepResearch => GovernorParams {
                summary_type,
                base_word_count: 7000,
                max_word_ceiling: 12_000,
                source_scaling_factor: 0.10,
                min_source_length_for_scaling: 25_000,
                max_scaled_addition: 5000,
                max_audio_minutes: 50,
                max_synthesis_per_section: 4,
                section_budget: SectionBudget {
                    intro: 0.08,
                    chapter_pool: 0.84,
                    conclusion: 0.08,
                },
                cut_policy: CutPolicy {
                    cut_order: vec![Stylistic, Exercise, Secondary, Commentary, Adjacent],
                    trigger_threshold: 0.92,
                    hard_limit_threshold: HARD_LIMIT_THRESHOLD,
                },
                visual_budget: VisualBudget { max_visuals: 6 },
                chapter_policy: ChapterPolicy {
                    min_words_per_chapter: 500,
                    max_words_per_chapter: 2000,
                },
                strict_enforcement: false,
            },
        };

        Self::new(params)
    }

    /// All parameters, read-only.
    pub fn params(&self) -> &GovernorParams {
        &self.params
    }

    pub fn summary_type(&self) -> SummaryType {
        self.params.summary_type
    }

    pub fn base_word_count(&self) -> u32 {
        self.params.base_word_count
    }

    pub fn max_word_ceiling(&self) -> u32 {
        self.params.max_word_ceiling
    }

    pub fn source_scaling_factor(&self) -> f64 {
        self.params.source_scaling_factor
    }

    pub fn min_source_length_for_scaling(&self) -> u32 {
        self.params.min_source_length_for_scaling
    }

    pub fn max_scaled_addition(&self) -> u32 {
        self.params.max_scaled_addition
    }

    pub fn max_audio_minutes(&self) -> u32 {
        self.params.max_audio_minutes
    }

    pub fn max_synthesis_per_section(&self) -> u32 {
        self.params.max_synthesis_per_section
    }

    pub fn section_budget(&self) -> &SectionBudget {
        &self.params.section_budget
    }

    pub fn cut_policy(&self) -> &CutPolicy {
        &self.params.cut_policy
    }

    pub fn max_visuals(&self) -> u32 {
        self.params.visual_budget.max_visuals
    }

    pub fn chapter_policy(&self) -> &ChapterPolicy {
        &self.params.chapter_policy
    }

    pub fn strict_enforcement(&self) -> bool {
        self.params.strict_enforcement
    }
}
