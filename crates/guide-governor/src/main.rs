//! Replay CLI for the summary governor.
//!
//! Feeds recorded generation sessions through the engine and reports what
//! the governor decided for each one.
//!
//! # Usage
//!
//! ```bash
//! # One session, JSON report on stdout
//! guide-governor govern --source book.txt --spans spans.jsonl --context "habit formation"
//!
//! # Governed text only
//! guide-governor govern --source book.txt --spans spans.jsonl --text
//!
//! # Budgets for a 40k-word source across every preset
//! guide-governor budget --source-words 40000 --chapters 12
//!
//! # Many sessions concurrently, one JSON report per line
//! GOVERNOR_STRICT=false guide-governor --config governor.toml batch sessions/*.toml
//! ```
//!
//! A halted guide prints the generic retry message on stderr and exits
//! with status 2.

mod session;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use session::{run_session, SessionInput, SessionManifest, SessionReport};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use summary_governor::{
    BudgetCalculator, ChapterBudget, FallbackStrategy, GovernorConfig, SectionBudgets,
    SummaryGovernorEngine, SummaryType, RETRY_MESSAGE,
};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Exit status for a run where at least one guide was halted.
const EXIT_HALTED: u8 = 2;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Governor configuration file (TOML); GOVERNOR_* variables apply on top
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay one recorded session
    Govern {
        /// Source text file
        #[arg(long)]
        source: PathBuf,
        /// JSON-lines span log
        #[arg(long)]
        spans: PathBuf,
        /// Topic summary handed to the synthesis generator
        #[arg(long, default_value = "")]
        context: String,
        /// Overrides the configured summary type
        #[arg(long)]
        summary_type: Option<SummaryType>,
        /// Overrides the configured chapter fallback strategy
        #[arg(long)]
        fallback_strategy: Option<FallbackStrategy>,
        /// Print the governed text instead of the JSON report
        #[arg(long, default_value_t = false)]
        text: bool,
    },
    /// Print budgets for a source length
    Budget {
        /// Source length in words
        #[arg(long, conflicts_with = "source")]
        source_words: Option<u32>,
        /// Count words from this file instead
        #[arg(long)]
        source: Option<PathBuf>,
        /// Chapter count used for the per-chapter range
        #[arg(long, default_value_t = 1)]
        chapters: u32,
        /// Only this summary type (default: every preset)
        #[arg(long)]
        summary_type: Option<SummaryType>,
    },
    /// Replay many session manifests concurrently
    Batch {
        /// Session manifests (TOML)
        #[arg(required = true)]
        manifests: Vec<PathBuf>,
        /// Include governed text in each report
        #[arg(long, default_value_t = false)]
        with_text: bool,
    },
}

/// Budget breakdown for one preset.
#[derive(Debug, Serialize)]
struct BudgetReport {
    summary_type: SummaryType,
    /// Reader-facing preset name
    name: &'static str,
    source_word_count: u32,
    total_budget: u32,
    sections: SectionBudgets,
    chapter_budget: ChapterBudget,
    audio_minutes_limit: f64,
    max_visuals: u32,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_config(path: Option<&Path>) -> Result<GovernorConfig> {
    let config = match path {
        Some(path) => GovernorConfig::from_file(path)?.with_env_overrides()?,
        None => GovernorConfig::from_env()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.json);

    let config = load_config(args.config.as_deref()).context("invalid governor configuration")?;
    info!(
        summary_type = %config.summary_type,
        fallback = %config.fallback_strategy,
        strict = ?config.strict_enforcement,
        "guide governor starting"
    );

    match args.command {
        Command::Govern {
            source,
            spans,
            context,
            summary_type,
            fallback_strategy,
            text,
        } => {
            let summary_type = summary_type.unwrap_or(config.summary_type);
            let engine = SummaryGovernorEngine::new(config.governor_for(summary_type)?);
            let input = SessionInput::from_files(
                source.display().to_string(),
                &source,
                &spans,
                context,
                fallback_strategy.unwrap_or(config.fallback_strategy),
            )?;
            let report = run_session(&engine, &input)?;
            if text {
                if let Some(body) = &report.text {
                    println!("{}", body);
                }
            } else {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Ok(exit_for(&[report]))
        }
        Command::Budget {
            source_words,
            source,
            chapters,
            summary_type,
        } => {
            let source_word_count = match (source_words, source) {
                (Some(words), _) => words,
                (None, Some(path)) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read source {}", path.display()))?;
                    summary_governor::budget::count_words(&text) as u32
                }
                (None, None) => bail!("pass --source-words or --source"),
            };
            let types = match summary_type {
                Some(t) => vec![t],
                None => SummaryType::ALL.to_vec(),
            };
            let mut reports = Vec::with_capacity(types.len());
            for summary_type in types {
                reports.push(budget_report(&config, summary_type, source_word_count, chapters)?);
            }
            println!("{}", serde_json::to_string_pretty(&reports)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Batch {
            manifests,
            with_text,
        } => batch(&config, manifests, with_text).await,
    }
}

fn budget_report(
    config: &GovernorConfig,
    summary_type: SummaryType,
    source_word_count: u32,
    chapters: u32,
) -> Result<BudgetReport> {
    let governor = config.governor_for(summary_type)?;
    let calc = BudgetCalculator::new(&governor);
    let total_budget = calc.calculate_total_budget(source_word_count);
    let sections = calc.calculate_section_budgets(total_budget);
    Ok(BudgetReport {
        summary_type,
        name: summary_type.display_name(),
        source_word_count,
        total_budget,
        sections,
        chapter_budget: calc.calculate_chapter_budget(chapters, sections.chapter_pool),
        audio_minutes_limit: calc.audio_minutes_limit(),
        max_visuals: governor.max_visuals(),
    })
}

/// Governs every manifest on its own blocking task. Sessions share nothing.
async fn batch(config: &GovernorConfig, manifests: Vec<PathBuf>, with_text: bool) -> Result<ExitCode> {
    let mut tasks = JoinSet::new();
    for (index, path) in manifests.into_iter().enumerate() {
        let manifest = SessionManifest::load(&path)?;
        let summary_type = manifest.summary_type.unwrap_or(config.summary_type);
        let governor = config
            .governor_for(summary_type)
            .with_context(|| format!("invalid governor for {}", path.display()))?;
        let strategy = manifest.fallback_strategy.unwrap_or(config.fallback_strategy);
        let label = path.display().to_string();

        tasks.spawn_blocking(move || -> Result<(usize, SessionReport)> {
            let input = SessionInput::from_files(
                label,
                &manifest.source,
                &manifest.spans,
                manifest.context_summary,
                strategy,
            )?;
            let engine = SummaryGovernorEngine::new(governor);
            Ok((index, run_session(&engine, &input)?))
        });
    }

    let mut reports = Vec::new();
    let mut failures = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined.context("session task panicked")? {
            Ok(entry) => reports.push(entry),
            Err(e) => {
                failures += 1;
                error!(error = %format!("{:#}", e), "session failed");
            }
        }
    }
    reports.sort_by_key(|(index, _)| *index);
    let reports: Vec<SessionReport> = reports
        .into_iter()
        .map(|(_, mut report)| {
            if !with_text {
                report.text = None;
            }
            report
        })
        .collect();

    for report in &reports {
        println!("{}", serde_json::to_string(report)?);
    }

    let halted = reports.iter().filter(|r| r.is_halted()).count();
    info!(
        sessions = reports.len(),
        halted,
        failures,
        "batch finished"
    );
    if failures > 0 {
        bail!("{} of {} sessions failed", failures, failures + reports.len());
    }
    Ok(exit_for(&reports))
}

fn exit_for(reports: &[SessionReport]) -> ExitCode {
    let halted: Vec<&SessionReport> = reports.iter().filter(|r| r.is_halted()).collect();
    if halted.is_empty() {
        return ExitCode::SUCCESS;
    }
    for report in &halted {
        warn!(
            label = %report.label,
            violations = report.enforcement.violations().len(),
            "guide halted"
        );
    }
    eprintln!("{}", RETRY_MESSAGE);
    ExitCode::from(EXIT_HALTED)
}
