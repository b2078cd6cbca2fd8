//! Summary Governor Engine: orchestrates one governed generation session
//!
//! The engine is immutable and can serve any number of sessions. Each
//! session owns its [`GovernorState`], span ledger and cut log; nothing is
//! shared between sessions. Spans must be folded in emission order because
//! cut decisions depend on cumulative counts and cut selection is
//! positional (earliest eligible span first).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::budget::{BudgetCalculator, WhitespaceWordCounter, WordCounter};
use crate::cut_policy::{CutPolicyEngine, CutPolicyPhase};
use crate::detect::block::BlockKind;
use crate::detect::chapter::{ChapterDetectionResult, ChapterDetector, FallbackStrategy};
use crate::detect::expansion::{ExpansionType, ExpansionTypeDetector};
use crate::detect::source_type::{SourceTypeDetectionResult, SourceTypeDetector};
use crate::errors::{GovernorError, GovernorErrorKind};
use crate::governor::{SummaryType, SummaryTypeGovernor};
use crate::state::{CutEvent, CutReason, GovernorState, PendingCut};
use crate::synthesis::{SynthesisGenerator, SynthesisParagraph, SynthesisRequest, TemplateSynthesizer};
use crate::validation::{
    EnforcementDecision, GovernorValidationResult, GovernorValidator, SectionDetectionEvent,
};

/// One span emitted by the generation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSpan {
    pub text: String,
    pub section_index: u32,
    pub chunk_index: u32,
    #[serde(default)]
    pub kind: BlockKind,
}

impl GeneratedSpan {
    pub fn prose(text: impl Into<String>, section_index: u32, chunk_index: u32) -> Self {
        Self::with_kind(text, section_index, chunk_index, BlockKind::Prose)
    }

    pub fn heading(text: impl Into<String>, section_index: u32, chunk_index: u32) -> Self {
        Self::with_kind(text, section_index, chunk_index, BlockKind::Heading)
    }

    /// A visual; `caption` is carried into the governed text but costs no words.
    pub fn visual(caption: impl Into<String>, section_index: u32, chunk_index: u32) -> Self {
        Self::with_kind(caption, section_index, chunk_index, BlockKind::Visual)
    }

    fn with_kind(text: impl Into<String>, section_index: u32, chunk_index: u32, kind: BlockKind) -> Self {
        Self {
            text: text.into(),
            section_index,
            chunk_index,
            kind,
        }
    }

    pub fn position(&self) -> (u32, u32) {
        (self.section_index, self.chunk_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    Kept,
    Cut,
}

/// A folded span in the session ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernedSpan {
    pub text: String,
    pub section_index: u32,
    pub chunk_index: u32,
    pub kind: BlockKind,
    pub expansion_type: ExpansionType,
    /// Words counted against the budget (0 for visuals)
    pub word_count: u32,
    pub status: SpanStatus,
}

/// A synthesis paragraph and the ledger position it is rendered before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedSynthesis {
    pub anchor: usize,
    pub paragraph: SynthesisParagraph,
    /// Words charged to the budget, measured by the engine's word counter
    pub word_count: u32,
}

/// Result of folding one span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldOutcome {
    pub expansion_type: ExpansionType,
    pub word_count: u32,
    /// Utilization after any cuts this fold triggered
    pub utilization: f64,
    pub phase: CutPolicyPhase,
    pub cuts: Vec<CutEvent>,
}

/// Live state of one generation session.
#[derive(Debug, Clone)]
pub struct GovernorSession {
    id: Uuid,
    context_summary: String,
    source_word_count: u32,
    source_type: SourceTypeDetectionResult,
    total_budget: u32,
    section_event: SectionDetectionEvent,
    state: GovernorState,
    spans: Vec<GovernedSpan>,
    syntheses: Vec<PlacedSynthesis>,
    cut_events: Vec<CutEvent>,
    last_position: Option<(u32, u32)>,
}

impl GovernorSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source_word_count(&self) -> u32 {
        self.source_word_count
    }

    pub fn source_type(&self) -> &SourceTypeDetectionResult {
        &self.source_type
    }

    pub fn total_budget(&self) -> u32 {
        self.total_budget
    }

    pub fn section_event(&self) -> &SectionDetectionEvent {
        &self.section_event
    }

    pub fn state(&self) -> &GovernorState {
        &self.state
    }

    pub fn spans(&self) -> &[GovernedSpan] {
        &self.spans
    }

    pub fn syntheses(&self) -> &[PlacedSynthesis] {
        &self.syntheses
    }

    pub fn cut_events(&self) -> &[CutEvent] {
        &self.cut_events
    }

    /// Kept spans in emission order with each synthesis paragraph placed
    /// before the first span it replaced.
    pub fn governed_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for (idx, span) in self.spans.iter().enumerate() {
            for placed in self.syntheses.iter().filter(|p| p.anchor == idx) {
                parts.push(placed.paragraph.content.as_str());
            }
            if span.status == SpanStatus::Kept {
                let text = span.text.trim();
                if !text.is_empty() {
                    parts.push(text);
                }
            }
        }
        parts.join("\n\n")
    }
}

/// The four values a finished session contributes to the library record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideRecord {
    pub governed_word_count: u32,
    pub cut_policy_activated: bool,
    pub cut_event_count: u32,
    pub validation: GovernorValidationResult,
}

/// Output of a finished session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernedGuide {
    pub session_id: Uuid,
    pub summary_type: SummaryType,
    pub source_type: SourceTypeDetectionResult,
    pub text: String,
    pub record: GuideRecord,
    pub enforcement: EnforcementDecision,
    pub syntheses: Vec<SynthesisParagraph>,
    pub final_phase: CutPolicyPhase,
}

impl GovernedGuide {
    pub fn is_halted(&self) -> bool {
        self.enforcement.is_halt()
    }

    /// Text the caller may deliver; `None` when the output must be discarded.
    pub fn deliverable_text(&self) -> Option<&str> {
        if self.is_halted() {
            None
        } else {
            Some(&self.text)
        }
    }
}

/// Orchestrates budgets, cut policy, synthesis and validation for one governor.
pub struct SummaryGovernorEngine {
    governor: SummaryTypeGovernor,
    synthesizer: Box<dyn SynthesisGenerator + Send + Sync>,
    counter: Box<dyn WordCounter + Send + Sync>,
}

impl std::fmt::Debug for SummaryGovernorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummaryGovernorEngine")
            .field("summary_type", &self.governor.summary_type())
            .field("synthesizer", &self.synthesizer.name())
            .field("counter", &self.counter.name())
            .finish()
    }
}

impl SummaryGovernorEngine {
    /// Engine with the template synthesizer and whitespace word counting.
    pub fn new(governor: SummaryTypeGovernor) -> Self {
        Self {
            governor,
            synthesizer: Box::new(TemplateSynthesizer::new()),
            counter: Box::new(WhitespaceWordCounter),
        }
    }

    /// Engine for a built-in preset.
    pub fn for_type(summary_type: SummaryType) -> Self {
        Self::new(summary_type.governor())
    }

    pub fn with_synthesizer(mut self, synthesizer: impl SynthesisGenerator + Send + Sync + 'static) -> Self {
        self.synthesizer = Box::new(synthesizer);
        self
    }

    pub fn with_word_counter(mut self, counter: impl WordCounter + Send + Sync + 'static) -> Self {
        self.counter = Box::new(counter);
        self
    }

    pub fn governor(&self) -> &SummaryTypeGovernor {
        &self.governor
    }

    pub fn budget(&self) -> BudgetCalculator<'_> {
        BudgetCalculator::new(&self.governor)
    }

    /// Start a session for `source`.
    ///
    /// Detects source type and chapter structure, computes the total,
    /// section and chapter budgets, and falls back to a monolith when the
    /// chapter pool cannot hold the detected chapters.
    pub fn begin_session(
        &self,
        source: &str,
        strategy: FallbackStrategy,
        context_summary: impl Into<String>,
    ) -> Result<GovernorSession, GovernorError> {
        let calc = self.budget();
        let source_word_count = self.counter.count(source);
        let total_budget = calc.calculate_total_budget(source_word_count);
        if total_budget == 0 {
            return Err(GovernorError::new(
                GovernorErrorKind::EmptySource,
                &format!(
                    "source has {} words, total budget is 0",
                    source_word_count
                ),
            ));
        }

        let source_type = SourceTypeDetector::detect(source);
        let mut chapter_detection = ChapterDetector::detect(source, strategy);
        let section_budgets = calc.calculate_section_budgets(total_budget);
        let mut chapter_budget =
            calc.calculate_chapter_budget(chapter_detection.chapter_count, section_budgets.chapter_pool);

        let forced_monolith = chapter_budget.is_fallback();
        if forced_monolith {
            info!(
                chapters = chapter_detection.chapter_count,
                chapter_pool = section_budgets.chapter_pool,
                "chapter budget fell back, treating source as monolith"
            );
            chapter_detection = ChapterDetectionResult::monolith(source_word_count as usize);
            chapter_budget = calc.calculate_chapter_budget(1, section_budgets.chapter_pool);
        }

        let session = GovernorSession {
            id: Uuid::new_v4(),
            context_summary: context_summary.into(),
            source_word_count,
            source_type,
            total_budget,
            section_event: SectionDetectionEvent {
                chapter_detection,
                strategy,
                section_budgets,
                chapter_budget,
                forced_monolith,
            },
            state: GovernorState::new(),
            spans: Vec::new(),
            syntheses: Vec::new(),
            cut_events: Vec::new(),
            last_position: None,
        };

        info!(
            session = %session.id,
            summary_type = %self.governor.summary_type(),
            source_words = source_word_count,
            source_type = %session.source_type.detected_type,
            total_budget,
            chapters = session.section_event.chapter_detection.chapter_count,
            chapter_budget = %session.section_event.chapter_budget,
            "governor session started"
        );
        Ok(session)
    }

    /// Fold one span into the session and apply the cut policy.
    ///
    /// On a contract error from the synthesizer the span stays folded and
    /// the pending cut is not applied.
    pub fn fold_span(
        &self,
        session: &mut GovernorSession,
        span: GeneratedSpan,
    ) -> Result<FoldOutcome, GovernorError> {
        self.check_order(session, &span)?;

        let behavior = span.kind.behavior();
        let word_count = if behavior.counts_words {
            self.counter.count(&span.text)
        } else {
            0
        };
        let expansion_type = if behavior.classify {
            ExpansionTypeDetector::classify(&span.text)
        } else {
            ExpansionType::CoreArgument
        };

        session.last_position = Some(span.position());
        if behavior.counts_as_visual {
            session.state.record_visual(span.section_index);
        } else {
            session
                .state
                .record_span(span.section_index, expansion_type, word_count);
        }

        debug!(
            session = %session.id,
            section = span.section_index,
            chunk = span.chunk_index,
            kind = %span.kind,
            expansion = %expansion_type,
            words = word_count,
            state = %session.state.summary(),
            "span folded"
        );

        session.spans.push(GovernedSpan {
            text: span.text,
            section_index: span.section_index,
            chunk_index: span.chunk_index,
            kind: span.kind,
            expansion_type,
            word_count,
            status: SpanStatus::Kept,
        });

        let cuts = self.apply_cut_policy(session)?;
        let policy = CutPolicyEngine::new(&self.governor);

        Ok(FoldOutcome {
            expansion_type,
            word_count,
            utilization: policy.utilization(&session.state, session.total_budget),
            phase: session.state.phase,
            cuts,
        })
    }

    /// Validate the session's current state.
    pub fn validate(&self, session: &GovernorSession) -> GovernorValidationResult {
        GovernorValidator::new(&self.governor).validate(
            &session.state,
            session.source_word_count,
            &session.cut_events,
            Some(&session.section_event),
        )
    }

    pub fn enforce(&self, result: &GovernorValidationResult) -> EnforcementDecision {
        GovernorValidator::new(&self.governor).enforce(result)
    }

    /// Close the session: assemble text, validate, enforce.
    pub fn finish(&self, session: GovernorSession) -> GovernedGuide {
        let validation = self.validate(&session);
        let enforcement = self.enforce(&validation);

        match &enforcement {
            EnforcementDecision::Halt { violations } => warn!(
                session = %session.id,
                violations = violations.len(),
                words = session.state.current_word_count,
                "governed guide halted"
            ),
            EnforcementDecision::AcceptWithFlag {
                violations,
                warnings,
            } => info!(
                session = %session.id,
                violations = violations.len(),
                warnings = warnings.len(),
                words = session.state.current_word_count,
                cuts = session.cut_events.len(),
                "governed guide accepted"
            ),
        }

        let text = session.governed_text();
        GovernedGuide {
            session_id: session.id,
            summary_type: self.governor.summary_type(),
            source_type: session.source_type,
            text,
            record: GuideRecord {
                governed_word_count: session.state.current_word_count,
                cut_policy_activated: session.state.cut_policy_activated,
                cut_event_count: session.cut_events.len() as u32,
                validation,
            },
            enforcement,
            syntheses: session.syntheses.into_iter().map(|p| p.paragraph).collect(),
            final_phase: session.state.phase,
        }
    }

    fn check_order(&self, session: &GovernorSession, span: &GeneratedSpan) -> Result<(), GovernorError> {
        let Some(last) = session.last_position else {
            return Ok(());
        };
        if span.section_index < last.0 {
            return Err(GovernorError::new(
                GovernorErrorKind::SectionRegressed,
                &format!("section {} after section {}", span.section_index, last.0),
            )
            .at(span.section_index, span.chunk_index));
        }
        if span.position() <= last {
            return Err(GovernorError::new(
                GovernorErrorKind::OutOfOrderSpan,
                &format!("chunk {} after chunk {}", span.chunk_index, last.1),
            )
            .at(span.section_index, span.chunk_index));
        }
        Ok(())
    }

    fn apply_cut_policy(&self, session: &mut GovernorSession) -> Result<Vec<CutEvent>, GovernorError> {
        let policy = CutPolicyEngine::new(&self.governor);
        let total_budget = session.total_budget;
        let mut cuts = Vec::new();

        if policy.activate(&mut session.state, total_budget) {
            info!(
                session = %session.id,
                utilization = policy.utilization(&session.state, total_budget),
                trigger = self.governor.cut_policy().trigger_threshold,
                "cut policy activated"
            );
        }

        while policy.should_activate_cut_policy(&session.state, total_budget) {
            let Some(expansion_type) = policy.next_expansion_to_cut(&session.state) else {
                if !session.state.cut_policy_exhausted {
                    session.state.cut_policy_exhausted = true;
                    warn!(
                        session = %session.id,
                        utilization = policy.utilization(&session.state, total_budget),
                        "cut policy exhausted"
                    );
                }
                break;
            };
            // a reopened type puts the policy back in play
            session.state.cut_policy_exhausted = false;

            let at = policy.utilization(&session.state, total_budget);
            let reason = if at > self.governor.cut_policy().hard_limit_threshold {
                CutReason::HardLimit { utilization: at }
            } else {
                CutReason::TriggerThreshold {
                    utilization: at,
                    threshold: self.governor.cut_policy().trigger_threshold,
                }
            };

            match self.try_cut(session, expansion_type, reason, at)? {
                Some(event) => cuts.push(event),
                None => {
                    debug!(
                        session = %session.id,
                        expansion = %expansion_type,
                        "no eligible span left to cut"
                    );
                    session.state.fully_cut.insert(expansion_type);
                }
            }
        }

        if policy.check_hard_limit(&mut session.state, total_budget) {
            warn!(
                session = %session.id,
                utilization = policy.utilization(&session.state, total_budget),
                words = session.state.current_word_count,
                total_budget,
                "hard limit exceeded"
            );
        }
        Ok(cuts)
    }

    /// Cut the earliest kept span of `expansion_type` whose removal saves
    /// words net of synthesis. Spans whose section has used up its
    /// synthesis allowance are skipped unless they join the open group.
    fn try_cut(
        &self,
        session: &mut GovernorSession,
        expansion_type: ExpansionType,
        reason: CutReason,
        at_utilization: f64,
    ) -> Result<Option<CutEvent>, GovernorError> {
        let synthesis_cap = self.governor.max_synthesis_per_section();

        for idx in 0..session.spans.len() {
            let (section_index, chunk_index, words) = {
                let span = &session.spans[idx];
                if span.status != SpanStatus::Kept || span.expansion_type != expansion_type {
                    continue;
                }
                (span.section_index, span.chunk_index, span.word_count)
            };

            let joins = session.state.joins_pending(expansion_type, section_index);
            if !joins && session.state.synthesis_count(section_index) >= synthesis_cap {
                continue;
            }

            let request = SynthesisRequest {
                source_type: session.source_type.detected_type,
                expansion_type,
                section_index,
                context_summary: session.context_summary.clone(),
                merged_cuts: if joins {
                    session.state.pending_consolidation.len() as u32 + 1
                } else {
                    1
                },
            };
            let paragraph = self.synthesizer.synthesize(&request);
            paragraph
                .validate(&request)
                .map_err(|e| e.at(section_index, chunk_index))?;

            let synthesis_words = self.counter.count(&paragraph.content);
            let previous_words = if joins {
                session.syntheses.last().map(|p| p.word_count).unwrap_or(0)
            } else {
                0
            };
            let added = synthesis_words as i64 - previous_words as i64;
            if words as i64 - added <= 0 {
                continue;
            }

            session.spans[idx].status = SpanStatus::Cut;
            session.state.record_cut(section_index, expansion_type, words);
            if joins {
                session
                    .state
                    .replace_synthesis_words(section_index, previous_words, synthesis_words);
                if let Some(group) = session.syntheses.last_mut() {
                    group.anchor = group.anchor.min(idx);
                    group.paragraph = paragraph;
                    group.word_count = synthesis_words;
                }
            } else {
                session.state.pending_consolidation.clear();
                session.state.record_synthesis(section_index, synthesis_words);
                session.syntheses.push(PlacedSynthesis {
                    anchor: idx,
                    paragraph,
                    word_count: synthesis_words,
                });
            }
            session.state.pending_consolidation.push(PendingCut {
                expansion_type,
                section_index,
                chunk_index,
                word_count: words,
            });

            let event = CutEvent {
                expansion_type,
                original_word_count: words,
                replacement_word_count: added.max(0) as u32,
                reason,
                section_index,
                chunk_index,
                budget_utilization: at_utilization,
                timestamp: Utc::now(),
                was_consolidated: joins,
            };
            info!(
                session = %session.id,
                expansion = %expansion_type,
                section = section_index,
                chunk = chunk_index,
                removed = words,
                added = event.replacement_word_count,
                consolidated = joins,
                reason = %event.reason,
                "span cut"
            );
            session.cut_events.push(event.clone());
            return Ok(Some(event));
        }

        Ok(None)
    }
}
