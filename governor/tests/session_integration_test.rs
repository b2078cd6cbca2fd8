//! Integration tests for governed sessions
//!
//! Drives the full detect → budget → fold → cut → validate → enforce flow
//! with realistic sources and span streams.

use summary_governor::{
    ChapterBudget, CutPolicyPhase, EnforcementDecision, ExpansionType, FallbackStrategy,
    GeneratedSpan, GovernorConfig, GovernorWarning, GuideRecord, SourceType,
    SummaryGovernorEngine, SummaryType, ViolationKind, RETRY_MESSAGE,
};

fn filler(n: usize) -> String {
    vec!["lorem"; n].join(" ")
}

/// An argumentative book with explicit chapters.
fn argumentative_book(chapters: usize, words_per_chapter: usize) -> String {
    let mut book = String::new();
    for i in 1..=chapters {
        book.push_str(&format!("Chapter {}: Part of the case\n", i));
        book.push_str("The author argues that routines outlast motivation. ");
        book.push_str("Evidence suggests that environment shapes behaviour; therefore design matters.\n\n");
        book.push_str(&filler(words_per_chapter));
        book.push_str("\n\n");
    }
    book
}

fn prose(marker: &str, words: usize, section: u32, chunk: u32) -> GeneratedSpan {
    GeneratedSpan::prose(
        format!("{} {}", marker, filler(words)).trim().to_string(),
        section,
        chunk,
    )
}

#[test]
fn test_professional_session_end_to_end() {
    let engine = SummaryGovernorEngine::for_type(SummaryType::Professional);
    let source = argumentative_book(8, 400);
    let mut session = engine
        .begin_session(&source, FallbackStrategy::InferSections, "designing habits that last")
        .unwrap();

    assert_eq!(session.source_type().detected_type, SourceType::Argumentative);
    let event = session.section_event();
    assert_eq!(event.chapter_detection.chapter_count, 8);
    assert!(!event.chapter_detection.fallback_triggered);
    assert!(!event.forced_monolith);
    // 3376 source words: the 80% cap binds below the 3000 base
    let budget = session.total_budget();
    assert_eq!(budget, 2700);
    // 8 × 300 does not fit the 2160-word pool, so the minimum shrinks
    assert_eq!(
        event.chapter_budget,
        ChapterBudget::Normal {
            min_words: 270,
            max_words: 900
        }
    );

    let mut chunk = 0;
    for section in 0..6u32 {
        session_fold(&engine, &mut session, prose("", 250, section, chunk));
        chunk += 1;
        session_fold(&engine, &mut session, prose("Another example", 120, section, chunk));
        chunk += 1;
        session_fold(&engine, &mut session, prose("In other words,", 110, section, chunk));
        chunk += 1;
    }

    let state = session.state();
    assert!(state.cut_policy_activated);
    assert!(!session.cut_events().is_empty());
    assert!(session
        .cut_events()
        .iter()
        .all(|e| e.expansion_type != ExpansionType::CoreArgument));
    // stylistic elaboration is first in professional cut order
    assert_eq!(
        session.cut_events()[0].expansion_type,
        ExpansionType::StylisticElaboration
    );

    let guide = engine.finish(session);
    assert!(!guide.is_halted(), "violations: {:?}", guide.enforcement.violations());
    assert_ne!(guide.final_phase, CutPolicyPhase::HardLimitExceeded);
    assert!(guide.record.governed_word_count <= budget);
    assert_eq!(
        guide.record.cut_event_count as usize,
        guide.record.validation.cut_events.len()
    );
    assert!(guide.deliverable_text().is_some());
}

fn session_fold(
    engine: &SummaryGovernorEngine,
    session: &mut summary_governor::GovernorSession,
    span: GeneratedSpan,
) {
    engine.fold_span(session, span).unwrap();
}

#[test]
fn test_quick_reference_visual_overrun_halts() {
    let engine = SummaryGovernorEngine::for_type(SummaryType::QuickReference);
    let mut session = engine
        .begin_session(&filler(10_000), FallbackStrategy::TreatAsMonolith, "habits")
        .unwrap();
    engine
        .fold_span(&mut session, prose("", 500, 0, 0))
        .unwrap();
    engine
        .fold_span(&mut session, GeneratedSpan::visual("[Figure 1]", 0, 1))
        .unwrap();
    engine
        .fold_span(&mut session, GeneratedSpan::visual("[Figure 2]", 0, 2))
        .unwrap();

    let guide = engine.finish(session);
    assert_eq!(
        guide.record.validation.violation_kinds(),
        vec![ViolationKind::VisualCountExceeded]
    );
    assert!(matches!(guide.enforcement, EnforcementDecision::Halt { .. }));
    assert_eq!(guide.enforcement.user_message(), Some(RETRY_MESSAGE));
    assert!(guide
        .record
        .validation
        .warnings
        .iter()
        .any(|w| matches!(w, GovernorWarning::ChapterFallback { .. })));
}

#[test]
fn test_lenient_preset_accepts_with_flags() {
    let engine = SummaryGovernorEngine::for_type(SummaryType::Accessible);
    let mut session = engine
        .begin_session(&filler(30_000), FallbackStrategy::InferSections, "habits")
        .unwrap();
    for chunk in 0..6 {
        engine
            .fold_span(&mut session, GeneratedSpan::visual(format!("[Figure {}]", chunk), 0, chunk))
            .unwrap();
    }
    let guide = engine.finish(session);
    assert!(!guide.is_halted());
    assert_eq!(guide.enforcement.user_message(), None);
    assert_eq!(guide.enforcement.violations().len(), 1);
    assert!(!guide.record.validation.is_valid);
}

#[test]
fn test_config_override_changes_session_behaviour() {
    let config = GovernorConfig::from_toml_str(
        r#"
        summary_type = "quick_reference"
        [overrides.quick_reference]
        max_visuals = 3
        "#,
    )
    .unwrap();
    let engine = SummaryGovernorEngine::new(config.governor().unwrap());
    let mut session = engine
        .begin_session(&filler(10_000), config.fallback_strategy, "habits")
        .unwrap();
    for chunk in 0..3 {
        engine
            .fold_span(&mut session, GeneratedSpan::visual("[Figure]", 0, chunk))
            .unwrap();
    }
    let guide = engine.finish(session);
    assert!(guide.record.validation.is_valid);
}

#[test]
fn test_guide_record_json_roundtrip() {
    let engine = SummaryGovernorEngine::for_type(SummaryType::QuickReference);
    let mut session = engine
        .begin_session(&filler(10_000), FallbackStrategy::InferSections, "habits")
        .unwrap();
    engine.fold_span(&mut session, prose("", 300, 0, 0)).unwrap();
    engine
        .fold_span(&mut session, prose("Furthermore,", 250, 0, 1))
        .unwrap();
    engine.fold_span(&mut session, prose("", 250, 0, 2)).unwrap();
    let guide = engine.finish(session);
    assert_eq!(guide.record.cut_event_count, 1);

    let json = serde_json::to_value(&guide.record).unwrap();
    for key in [
        "governed_word_count",
        "cut_policy_activated",
        "cut_event_count",
        "validation",
    ] {
        assert!(json.get(key).is_some(), "missing {}", key);
    }
    let parsed: GuideRecord = serde_json::from_value(json).unwrap();
    assert_eq!(parsed.governed_word_count, guide.record.governed_word_count);
    assert_eq!(parsed.cut_event_count, 1);
    assert_eq!(
        parsed.validation.cut_events[0].expansion_type,
        ExpansionType::ExtendedCommentary
    );
}

#[test]
fn test_narrative_source_uses_narrative_templates() {
    let engine = SummaryGovernorEngine::for_type(SummaryType::QuickReference);
    let source = format!(
        "It was a cold morning. \"Come back,\" she said. The next day he left. {}",
        filler(10_000)
    );
    let mut session = engine
        .begin_session(&source, FallbackStrategy::InferSections, "a long journey home")
        .unwrap();
    assert_eq!(session.source_type().detected_type, SourceType::Narrative);

    engine.fold_span(&mut session, prose("", 400, 0, 0)).unwrap();
    engine
        .fold_span(&mut session, prose("Another example", 200, 0, 1))
        .unwrap();
    engine.fold_span(&mut session, prose("", 200, 0, 2)).unwrap();

    assert_eq!(session.syntheses().len(), 1);
    assert!(session.syntheses()[0]
        .paragraph
        .content
        .contains("story"));
}
