//! Synthesis generation: short declarative stand-ins for cut spans.
//!
//! Defines the generator interface and the deterministic template
//! generator the engine uses by default. Templates are selected by
//! `(SourceType, ExpansionType)` and never restate the cut content; they
//! carry only the caller's short topic summary.

use serde::{Deserialize, Serialize};

use crate::budget::count_words;
use crate::detect::expansion::ExpansionType;
use crate::detect::source_type::SourceType;
use crate::errors::{GovernorError, GovernorErrorKind};

/// Shortest acceptable synthesis paragraph.
pub const SYNTHESIS_MIN_WORDS: u32 = 50;

/// Longest single-cut synthesis paragraph.
pub const SYNTHESIS_MAX_WORDS: u32 = 100;

/// Longest paragraph standing in for a consolidated group.
pub const CONSOLIDATED_MAX_WORDS: u32 = 150;

/// Topic text longer than this is truncated.
const MAX_TOPIC_WORDS: usize = 12;

const FALLBACK_TOPIC: &str = "the material in this section";

/// Contract for synthesis input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub source_type: SourceType,
    pub expansion_type: ExpansionType,
    pub section_index: u32,
    /// Short caller-supplied description of the guide's topic.
    pub context_summary: String,
    /// Cuts the paragraph stands in for; above 1 means consolidated.
    pub merged_cuts: u32,
}

impl SynthesisRequest {
    pub fn is_consolidated(&self) -> bool {
        self.merged_cuts > 1
    }

    /// Upper word bound for a paragraph answering this request.
    pub fn max_words(&self) -> u32 {
        if self.is_consolidated() {
            CONSOLIDATED_MAX_WORDS
        } else {
            SYNTHESIS_MAX_WORDS
        }
    }
}

/// A replacement paragraph for one cut or a consolidated group of cuts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisParagraph {
    pub content: String,
    /// Whitespace-delimited count of `content`. The engine charges the
    /// budget with its own word counter.
    pub word_count: u32,
    pub replaced_expansion_type: ExpansionType,
    pub section_index: u32,
    pub was_consolidated: bool,
}

impl SynthesisParagraph {
    /// Validate the paragraph against the request contract.
    pub fn validate(&self, request: &SynthesisRequest) -> Result<(), GovernorError> {
        let contract = |detail: String| {
            GovernorError::new(GovernorErrorKind::SynthesisContract, &detail)
        };

        if self.content.contains('?') {
            return Err(contract("synthesis contains a question mark".to_string()));
        }
        let counted = count_words(&self.content) as u32;
        if counted != self.word_count {
            return Err(contract(format!(
                "declared {} words but content has {}",
                self.word_count, counted
            )));
        }
        if self.word_count < SYNTHESIS_MIN_WORDS || self.word_count > request.max_words() {
            return Err(contract(format!(
                "{} words outside {}..={}",
                self.word_count,
                SYNTHESIS_MIN_WORDS,
                request.max_words()
            )));
        }
        if self.replaced_expansion_type != request.expansion_type
            || self.section_index != request.section_index
        {
            return Err(contract(format!(
                "paragraph for {} in section {} answers request for {} in section {}",
                self.replaced_expansion_type,
                self.section_index,
                request.expansion_type,
                request.section_index
            )));
        }
        if self.was_consolidated != request.is_consolidated() {
            return Err(contract("consolidation flag does not match request".to_string()));
        }
        Ok(())
    }
}

/// Trait for synthesis generators.
pub trait SynthesisGenerator {
    /// Produce a paragraph for the request. Must be deterministic.
    fn synthesize(&self, request: &SynthesisRequest) -> SynthesisParagraph;

    /// Generator name for logging.
    fn name(&self) -> &str;
}

/// Deterministic template-based generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateSynthesizer;

impl TemplateSynthesizer {
    pub fn new() -> Self {
        Self
    }

    fn lead(expansion_type: ExpansionType, topic: &str) -> String {
        let label = expansion_type.label();
        match expansion_type {
            ExpansionType::Exercise => format!("The {} on {} has been condensed here.", label, topic),
            ExpansionType::AdjacentDomainComparison => format!(
                "A {} drawn to illuminate {} has been folded into this summary.",
                label, topic
            ),
            ExpansionType::ExtendedCommentary => format!(
                "The {} on {} is condensed here to its essentials.",
                label, topic
            ),
            ExpansionType::SecondaryExample => format!(
                "An {} supporting {} has been set aside in favour of the primary case.",
                label, topic
            ),
            ExpansionType::StylisticElaboration => format!(
                "A {} of the point about {} has been trimmed.",
                label, topic
            ),
            ExpansionType::CoreArgument => format!("The discussion of {} continues below.", topic),
        }
    }

    fn body(source_type: SourceType) -> &'static str {
        match source_type {
            SourceType::Argumentative => {
                "The central claim stands on the evidence already presented, and the reasoning \
                 that connects premise to conclusion is unchanged. Readers who want the full \
                 development of this point will find it in the original text, where the author \
                 builds the case step by step. What matters for this guide is that the argument \
                 holds and that its implications carry forward into the sections that follow."
            }
            SourceType::Narrative => {
                "The story keeps its shape without this passage, and the events that matter most \
                 to the arc remain in place. The characters and the consequences of their choices \
                 carry forward intact. Readers who want the full texture of the scene can return \
                 to the original, where the author lingers over the moment in far greater detail \
                 than a guide of this length allows."
            }
            SourceType::Technical => {
                "The procedure described in this section is complete without the omitted \
                 material, and each required step remains in the order given. Configuration \
                 details and expected results are unchanged. Readers who need the extended \
                 walkthrough can consult the original documentation, which covers edge cases \
                 and variations that fall outside the scope of this guide."
            }
        }
    }

    fn padding(source_type: SourceType) -> &'static str {
        match source_type {
            SourceType::Argumentative => "The surrounding sections carry the argument forward.",
            SourceType::Narrative => "The surrounding sections carry the story forward.",
            SourceType::Technical => "The surrounding sections carry the procedure forward.",
        }
    }
}

impl SynthesisGenerator for TemplateSynthesizer {
    fn synthesize(&self, request: &SynthesisRequest) -> SynthesisParagraph {
        let topic = topic_phrase(&request.context_summary);
        let mut content = Self::lead(request.expansion_type, &topic);
        if request.is_consolidated() {
            content.push_str(&format!(
                " This note stands in for {} related passages of the same kind in this section.",
                request.merged_cuts
            ));
        }
        content.push(' ');
        content.push_str(Self::body(request.source_type));

        while (count_words(&content) as u32) < SYNTHESIS_MIN_WORDS {
            content.push(' ');
            content.push_str(Self::padding(request.source_type));
        }
        let content = truncate_words(&content, request.max_words() as usize);

        SynthesisParagraph {
            word_count: count_words(&content) as u32,
            content,
            replaced_expansion_type: request.expansion_type,
            section_index: request.section_index,
            was_consolidated: request.is_consolidated(),
        }
    }

    fn name(&self) -> &str {
        "template"
    }
}

/// Sanitised topic: no question marks, at most [`MAX_TOPIC_WORDS`] words,
/// no trailing punctuation.
fn topic_phrase(context_summary: &str) -> String {
    let cleaned = context_summary.replace('?', "");
    let words: Vec<&str> = cleaned.split_whitespace().take(MAX_TOPIC_WORDS).collect();
    let joined = words.join(" ");
    let trimmed = joined.trim_end_matches(|c: char| c.is_ascii_punctuation());
    if trimmed.is_empty() {
        FALLBACK_TOPIC.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Keep the first `max` words, ending on a full stop.
fn truncate_words(text: &str, max: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max {
        return words.join(" ");
    }
    let mut out = words[..max].join(" ");
    let kept = out
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .len();
    out.truncate(kept);
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(source: SourceType, kind: ExpansionType, merged: u32) -> SynthesisRequest {
        SynthesisRequest {
            source_type: source,
            expansion_type: kind,
            section_index: 2,
            context_summary: "how small habits compound over time".to_string(),
            merged_cuts: merged,
        }
    }

    #[test]
    fn test_every_template_within_bounds() {
        let synth = TemplateSynthesizer::new();
        for source in [
            SourceType::Argumentative,
            SourceType::Narrative,
            SourceType::Technical,
        ] {
            for kind in ExpansionType::ALL {
                for merged in [1, 2, 5] {
                    let req = request(source, kind, merged);
                    let p = synth.synthesize(&req);
                    assert!(p.validate(&req).is_ok(), "{} {} {}: {:?}", source, kind, merged, p);
                    assert!(!p.content.contains('?'));
                }
            }
        }
    }

    #[test]
    fn test_lead_names_replaced_expansion() {
        let synth = TemplateSynthesizer::new();
        for kind in [
            ExpansionType::Exercise,
            ExpansionType::AdjacentDomainComparison,
            ExpansionType::ExtendedCommentary,
            ExpansionType::SecondaryExample,
            ExpansionType::StylisticElaboration,
        ] {
            let p = synth.synthesize(&request(SourceType::Argumentative, kind, 1));
            assert!(p.content.contains(kind.label()), "{}: {}", kind, p.content);
        }
    }

    #[test]
    fn test_deterministic() {
        let synth = TemplateSynthesizer::new();
        let req = request(SourceType::Narrative, ExpansionType::SecondaryExample, 1);
        let first = synth.synthesize(&req);
        assert_eq!(synth.synthesize(&req), first);
    }

    #[test]
    fn test_templates_differ_by_source_type() {
        let synth = TemplateSynthesizer::new();
        let a = synth.synthesize(&request(SourceType::Argumentative, ExpansionType::Exercise, 1));
        let t = synth.synthesize(&request(SourceType::Technical, ExpansionType::Exercise, 1));
        assert_ne!(a.content, t.content);
    }

    #[test]
    fn test_consolidated_paragraph() {
        let synth = TemplateSynthesizer::new();
        let req = request(SourceType::Technical, ExpansionType::ExtendedCommentary, 3);
        let p = synth.synthesize(&req);
        assert!(p.was_consolidated);
        assert!(p.content.contains("3 related passages"));
        assert!(p.word_count <= CONSOLIDATED_MAX_WORDS);
    }

    #[test]
    fn test_question_marks_stripped_from_topic() {
        let synth = TemplateSynthesizer::new();
        let mut req = request(SourceType::Argumentative, ExpansionType::ExtendedCommentary, 1);
        req.context_summary = "why do habits stick?".to_string();
        let p = synth.synthesize(&req);
        assert!(!p.content.contains('?'));
        assert!(p.content.contains("why do habits stick"));
    }

    #[test]
    fn test_long_topic_truncated_and_empty_topic_falls_back() {
        let synth = TemplateSynthesizer::new();
        let mut req = request(SourceType::Argumentative, ExpansionType::AdjacentDomainComparison, 1);
        req.context_summary = vec!["topic"; 80].join(" ");
        let p = synth.synthesize(&req);
        assert!(p.word_count <= SYNTHESIS_MAX_WORDS);

        req.context_summary = "   ".to_string();
        let p = synth.synthesize(&req);
        assert!(p.content.contains(FALLBACK_TOPIC));
    }

    #[test]
    fn test_validate_rejects_bad_paragraphs() {
        let req = request(SourceType::Argumentative, ExpansionType::Exercise, 1);
        let good = TemplateSynthesizer::new().synthesize(&req);

        let mut question = good.clone();
        question.content.push_str(" Why?");
        question.word_count += 1;
        let err = question.validate(&req).unwrap_err();
        assert_eq!(err.kind, GovernorErrorKind::SynthesisContract);

        let mut short = good.clone();
        short.content = "Too short.".to_string();
        short.word_count = 2;
        assert!(short.validate(&req).is_err());

        let mut wrong_count = good.clone();
        wrong_count.word_count += 5;
        assert!(wrong_count.validate(&req).is_err());

        let mut wrong_type = good;
        wrong_type.replaced_expansion_type = ExpansionType::SecondaryExample;
        assert!(wrong_type.validate(&req).is_err());
    }

    #[test]
    fn test_truncate_words() {
        assert_eq!(truncate_words("one two, three four", 2), "one two.");
        assert_eq!(truncate_words("one  two", 5), "one two");
    }
}
