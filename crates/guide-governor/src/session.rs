//! Recorded session inputs and per-session reports.
//!
//! A recorded session is a source text plus the JSON-lines log of spans the
//! generation pipeline emitted for it, one [`GeneratedSpan`] per line:
//!
//! ```text
//! {"text": "Habits compound.", "section_index": 0, "chunk_index": 0}
//! {"text": "[Figure 1]", "section_index": 0, "chunk_index": 1, "kind": "visual"}
//! ```
//!
//! Batch runs describe each session with a TOML manifest. Relative paths in
//! a manifest resolve against the manifest's directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use summary_governor::{
    ChapterBudget, CutPolicyPhase, EnforcementDecision, FallbackStrategy, GeneratedSpan,
    GovernedGuide, GuideRecord, SourceType, SummaryGovernorEngine, SummaryType,
};
use tracing::{debug, info};

/// One batch entry on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionManifest {
    /// Source text file
    pub source: PathBuf,
    /// JSON-lines span log
    pub spans: PathBuf,
    #[serde(default)]
    pub context_summary: String,
    /// Falls back to the configured summary type when absent
    #[serde(default)]
    pub summary_type: Option<SummaryType>,
    #[serde(default)]
    pub fallback_strategy: Option<FallbackStrategy>,
}

impl SessionManifest {
    /// Load a manifest, resolving its paths against the manifest directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        let mut manifest: Self = toml::from_str(&text)
            .with_context(|| format!("failed to parse manifest {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        manifest.source = resolve(base, &manifest.source);
        manifest.spans = resolve(base, &manifest.spans);
        Ok(manifest)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Everything needed to replay one session.
#[derive(Debug, Clone)]
pub struct SessionInput {
    /// Name used in reports and logs
    pub label: String,
    pub source: String,
    pub spans: Vec<GeneratedSpan>,
    pub context_summary: String,
    pub fallback_strategy: FallbackStrategy,
}

impl SessionInput {
    /// Read the source text and span log from disk.
    pub fn from_files(
        label: impl Into<String>,
        source: &Path,
        spans: &Path,
        context_summary: impl Into<String>,
        fallback_strategy: FallbackStrategy,
    ) -> Result<Self> {
        let source_text = std::fs::read_to_string(source)
            .with_context(|| format!("failed to read source {}", source.display()))?;
        let span_log = std::fs::read_to_string(spans)
            .with_context(|| format!("failed to read span log {}", spans.display()))?;
        let spans = parse_span_log(&span_log)
            .with_context(|| format!("invalid span log {}", spans.display()))?;
        Ok(Self {
            label: label.into(),
            source: source_text,
            spans,
            context_summary: context_summary.into(),
            fallback_strategy,
        })
    }
}

/// Parse a JSON-lines span log. Blank lines are skipped.
pub fn parse_span_log(text: &str) -> Result<Vec<GeneratedSpan>> {
    let mut spans = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let span: GeneratedSpan = serde_json::from_str(line)
            .with_context(|| format!("line {}: not a span", index + 1))?;
        spans.push(span);
    }
    Ok(spans)
}

/// Outcome of one replayed session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub label: String,
    pub session_id: String,
    pub summary_type: SummaryType,
    pub source_type: SourceType,
    pub source_word_count: u32,
    pub total_budget: u32,
    pub chapter_budget: ChapterBudget,
    pub record: GuideRecord,
    pub enforcement: EnforcementDecision,
    pub final_phase: CutPolicyPhase,
    /// Shown to the end user when the guide is halted
    pub user_message: Option<String>,
    /// Governed text, absent when halted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl SessionReport {
    pub fn is_halted(&self) -> bool {
        self.enforcement.is_halt()
    }

    fn new(
        label: String,
        source_word_count: u32,
        total_budget: u32,
        chapter_budget: ChapterBudget,
        guide: GovernedGuide,
    ) -> Self {
        let user_message = guide.enforcement.user_message().map(str::to_string);
        let text = guide.deliverable_text().map(str::to_string);
        Self {
            label,
            session_id: guide.session_id.to_string(),
            summary_type: guide.summary_type,
            source_type: guide.source_type.detected_type,
            source_word_count,
            total_budget,
            chapter_budget,
            record: guide.record,
            enforcement: guide.enforcement,
            final_phase: guide.final_phase,
            user_message,
            text,
        }
    }
}

/// Replay every span of `input` through a fresh session.
pub fn run_session(engine: &SummaryGovernorEngine, input: &SessionInput) -> Result<SessionReport> {
    let mut session = engine
        .begin_session(&input.source, input.fallback_strategy, input.context_summary.as_str())
        .with_context(|| format!("{}: cannot start session", input.label))?;
    let source_word_count = session.source_word_count();
    let total_budget = session.total_budget();
    let chapter_budget = session.section_event().chapter_budget;

    for span in &input.spans {
        let outcome = engine
            .fold_span(&mut session, span.clone())
            .with_context(|| format!("{}: span rejected", input.label))?;
        if !outcome.cuts.is_empty() {
            debug!(
                label = %input.label,
                cuts = outcome.cuts.len(),
                utilization = outcome.utilization,
                "cuts applied"
            );
        }
    }

    let guide = engine.finish(session);
    info!(
        label = %input.label,
        decision = %guide.enforcement,
        words = guide.record.governed_word_count,
        budget = total_budget,
        "session replayed"
    );
    Ok(SessionReport::new(
        input.label.clone(),
        source_word_count,
        total_budget,
        chapter_budget,
        guide,
    ))
}
