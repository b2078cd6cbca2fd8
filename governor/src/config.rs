//! Governor configuration: preset selection and overrides.
//!
//! Loaded from TOML, then adjusted from the environment:
//!
//! ```toml
//! summary_type = "quick_reference"
//! strict_enforcement = false
//! fallback_strategy = "treat_as_monolith"
//!
//! [overrides.quick_reference]
//! max_visuals = 2
//! cut_order = ["adjacent_domain_comparison", "stylistic_elaboration"]
//! ```
//!
//! | Variable | Field |
//! |---|---|
//! | `GOVERNOR_SUMMARY_TYPE` | `summary_type` |
//! | `GOVERNOR_STRICT` | `strict_enforcement` |
//! | `GOVERNOR_FALLBACK_STRATEGY` | `fallback_strategy` |
//!
//! Every resulting governor goes back through
//! [`SummaryTypeGovernor::try_new`], so an override can never break an
//! invariant the presets hold.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::detect::chapter::FallbackStrategy;
use crate::detect::expansion::ExpansionType;
use crate::errors::GovernorConfigError;
use crate::governor::{GovernorParams, SectionBudget, SummaryType, SummaryTypeGovernor};

/// Optional replacements for preset fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GovernorOverrides {
    pub base_word_count: Option<u32>,
    pub max_word_ceiling: Option<u32>,
    pub source_scaling_factor: Option<f64>,
    pub min_source_length_for_scaling: Option<u32>,
    pub max_scaled_addition: Option<u32>,
    pub max_audio_minutes: Option<u32>,
    pub max_synthesis_per_section: Option<u32>,
    pub max_visuals: Option<u32>,
    pub section_budget: Option<SectionBudget>,
    pub cut_order: Option<Vec<ExpansionType>>,
    pub trigger_threshold: Option<f64>,
    pub min_words_per_chapter: Option<u32>,
    pub max_words_per_chapter: Option<u32>,
    pub strict_enforcement: Option<bool>,
}

impl GovernorOverrides {
    /// Write every set field into `params`.
    pub fn apply(&self, params: &mut GovernorParams) {
        if let Some(v) = self.base_word_count {
            params.base_word_count = v;
        }
        if let Some(v) = self.max_word_ceiling {
            params.max_word_ceiling = v;
        }
        if let Some(v) = self.source_scaling_factor {
            params.source_scaling_factor = v;
        }
        if let Some(v) = self.min_source_length_for_scaling {
            params.min_source_length_for_scaling = v;
        }
        if let Some(v) = self.max_scaled_addition {
            params.max_scaled_addition = v;
        }
        if let Some(v) = self.max_audio_minutes {
            params.max_audio_minutes = v;
        }
        if let Some(v) = self.max_synthesis_per_section {
            params.max_synthesis_per_section = v;
        }
        if let Some(v) = self.max_visuals {
            params.visual_budget.max_visuals = v;
        }
        if let Some(v) = self.section_budget {
            params.section_budget = v;
        }
        if let Some(v) = &self.cut_order {
            params.cut_policy.cut_order = v.clone();
        }
        if let Some(v) = self.trigger_threshold {
            params.cut_policy.trigger_threshold = v;
        }
        if let Some(v) = self.min_words_per_chapter {
            params.chapter_policy.min_words_per_chapter = v;
        }
        if let Some(v) = self.max_words_per_chapter {
            params.chapter_policy.max_words_per_chapter = v;
        }
        if let Some(v) = self.strict_enforcement {
            params.strict_enforcement = v;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Top-level governor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// Preset used for new sessions
    #[serde(default = "default_summary_type")]
    pub summary_type: SummaryType,
    /// Overrides every preset's strictness when set
    #[serde(default)]
    pub strict_enforcement: Option<bool>,
    #[serde(default)]
    pub fallback_strategy: FallbackStrategy,
    /// Per-preset overrides keyed by summary type name
    #[serde(default)]
    pub overrides: BTreeMap<String, GovernorOverrides>,
}

fn default_summary_type() -> SummaryType {
    SummaryType::Professional
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            summary_type: default_summary_type(),
            strict_enforcement: None,
            fallback_strategy: FallbackStrategy::default(),
            overrides: BTreeMap::new(),
        }
    }
}

impl GovernorConfig {
    /// Parse from TOML text. Override keys must name a summary type.
    pub fn from_toml_str(text: &str) -> Result<Self, GovernorConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|e| GovernorConfigError::Parse(e.to_string()))?;
        for key in config.overrides.keys() {
            key.parse::<SummaryType>()?;
        }
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, GovernorConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| GovernorConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Defaults adjusted by the process environment.
    pub fn from_env() -> Result<Self, GovernorConfigError> {
        Self::default().with_env_overrides()
    }

    /// Apply `GOVERNOR_*` variables from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, GovernorConfigError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply `GOVERNOR_*` variables from an arbitrary lookup.
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, GovernorConfigError> {
        if let Some(value) = lookup("GOVERNOR_SUMMARY_TYPE") {
            self.summary_type = value.parse()?;
        }
        if let Some(value) = lookup("GOVERNOR_STRICT") {
            self.strict_enforcement = Some(value.to_lowercase() == "true" || value == "1");
        }
        if let Some(value) = lookup("GOVERNOR_FALLBACK_STRATEGY") {
            self.fallback_strategy = value.parse()?;
        }
        Ok(self)
    }

    /// Overrides for one summary type, if any.
    pub fn overrides_for(&self, summary_type: SummaryType) -> Option<&GovernorOverrides> {
        self.overrides
            .iter()
            .find(|(key, _)| key.parse::<SummaryType>().ok() == Some(summary_type))
            .map(|(_, overrides)| overrides)
    }

    /// Validated governor for the configured summary type.
    pub fn governor(&self) -> Result<SummaryTypeGovernor, GovernorConfigError> {
        self.governor_for(self.summary_type)
    }

    /// Validated governor for any summary type under this configuration.
    pub fn governor_for(
        &self,
        summary_type: SummaryType,
    ) -> Result<SummaryTypeGovernor, GovernorConfigError> {
        let mut params = SummaryTypeGovernor::preset(summary_type).params().clone();
        if let Some(overrides) = self.overrides_for(summary_type) {
            overrides.apply(&mut params);
        }
        if let Some(strict) = self.strict_enforcement {
            params.strict_enforcement = strict;
        }
        SummaryTypeGovernor::try_new(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = GovernorConfig::default();
        assert_eq!(config.summary_type, SummaryType::Professional);
        assert_eq!(config.fallback_strategy, FallbackStrategy::InferSections);
        let governor = config.governor().unwrap();
        assert_eq!(governor, SummaryType::Professional.governor());
    }

    #[test]
    fn test_parse_toml_with_overrides() {
        let config = GovernorConfig::from_toml_str(
            r#"
            summary_type = "quick_reference"
            strict_enforcement = false
            fallback_strategy = "treat_as_monolith"

            [overrides.quick_reference]
            max_visuals = 2
            cut_order = ["adjacent_domain_comparison", "stylistic_elaboration"]
            "#,
        )
        .unwrap();
        assert_eq!(config.summary_type, SummaryType::QuickReference);
        assert_eq!(config.fallback_strategy, FallbackStrategy::TreatAsMonolith);

        let governor = config.governor().unwrap();
        assert_eq!(governor.max_visuals(), 2);
        assert!(!governor.strict_enforcement());
        assert_eq!(
            governor.cut_policy().cut_order,
            vec![
                ExpansionType::AdjacentDomainComparison,
                ExpansionType::StylisticElaboration
            ]
        );
        // untouched fields keep preset values
        assert_eq!(governor.base_word_count(), 900);
    }

    #[test]
    fn test_override_revalidated() {
        let config = GovernorConfig::from_toml_str(
            r#"
            [overrides.professional]
            cut_order = ["core_argument"]
            "#,
        )
        .unwrap();
        assert_eq!(
            config.governor(),
            Err(GovernorConfigError::CoreArgumentInCutOrder)
        );
    }

    #[test]
    fn test_override_key_aliases() {
        let config = GovernorConfig::from_toml_str(
            r#"
            summary_type = "deep_research"
            [overrides.deep-research]
            max_audio_minutes = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.governor().unwrap().max_audio_minutes(), 60);
        assert!(config.overrides_for(SummaryType::Accessible).is_none());
    }

    #[test]
    fn test_rejects_unknown_override_key_and_field() {
        let err = GovernorConfig::from_toml_str("[overrides.executive]\nmax_visuals = 1\n")
            .unwrap_err();
        assert!(matches!(err, GovernorConfigError::UnknownSummaryType(_)));

        let err =
            GovernorConfig::from_toml_str("[overrides.accessible]\nmax_pictures = 1\n").unwrap_err();
        assert!(matches!(err, GovernorConfigError::Parse(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: BTreeMap<&str, &str> = [
            ("GOVERNOR_SUMMARY_TYPE", "accessible"),
            ("GOVERNOR_STRICT", "TRUE"),
            ("GOVERNOR_FALLBACK_STRATEGY", "monolith"),
        ]
        .into_iter()
        .collect();
        let config = GovernorConfig::default()
            .with_overrides_from(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.summary_type, SummaryType::Accessible);
        assert_eq!(config.fallback_strategy, FallbackStrategy::TreatAsMonolith);
        // accessible is lenient by default
        assert!(config.governor().unwrap().strict_enforcement());
    }

    #[test]
    fn test_env_rejects_bad_summary_type() {
        let result = GovernorConfig::default().with_overrides_from(|k| {
            (k == "GOVERNOR_SUMMARY_TYPE").then(|| "executive".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "summary_type = \"accessible\"").unwrap();
        let config = GovernorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.summary_type, SummaryType::Accessible);

        let missing = GovernorConfig::from_file(Path::new("/nonexistent/governor.toml"));
        assert!(matches!(missing, Err(GovernorConfigError::Read { .. })));
    }

    #[test]
    fn test_overrides_is_empty() {
        assert!(GovernorOverrides::default().is_empty());
        let o = GovernorOverrides {
            max_visuals: Some(1),
            ..Default::default()
        };
        assert!(!o.is_empty());
    }
}
