//! Command-line interface.
//!
//! - `analyze --task <task> [--context TEXT] [FILES...] [--raw]` — run one
//!   analysis and print the report

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::{ConfigError, ReasoningConfig};
use crate::pipeline::analysis::{
    AnalysisPipeline, AnalysisReport, GeminiClient, TaskType, TransportError, UploadedArtifact,
};
use crate::session::{AnalysisSession, SessionError};

/// GovBrain — biosecurity intelligence from field evidence
#[derive(Parser, Debug)]
#[command(name = "govbrain")]
#[command(version)]
#[command(about = "Turn field evidence into a structured outbreak intelligence report")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze evidence files and operator context.
    Analyze {
        /// detect-outbreak, simulate-scenario or generate-briefing.
        #[arg(short, long)]
        task: TaskType,

        /// Free-text operator context.
        #[arg(short, long, default_value = "")]
        context: String,

        /// Evidence files, in submission order.
        files: Vec<PathBuf>,

        /// Print the report JSON instead of the summary.
        #[arg(long)]
        raw: bool,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] TransportError),

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Cannot serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CliError {
    /// Category label printed before the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "ConfigError",
            Self::Client(_) => "TransportFailure",
            Self::Io { .. } => "IoError",
            Self::Session(SessionError::Analysis(err)) => err.kind().as_str(),
            Self::Session(SessionError::Busy) => "Busy",
            Self::Session(SessionError::LockPoisoned) => "UnknownFailure",
            Self::Serialize(_) => "UnknownFailure",
        }
    }
}

/// Tracing filter for a `-v` count.
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => crate::config::default_log_filter(),
        1 => "govbrain=debug,govbrain_lib=debug,info",
        _ => "trace",
    }
}

/// Read one evidence file. The media type is inferred from the extension.
pub async fn load_artifact(path: &Path) -> Result<UploadedArtifact, CliError> {
    let payload = tokio::fs::read(path).await.map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(UploadedArtifact::new(name, "", payload))
}

/// Execute a parsed command and map the outcome to an exit code.
pub async fn execute(cli: Cli) -> ExitCode {
    match dispatch(cli).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}: {err}", err.kind());
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<String, CliError> {
    match cli.command {
        Command::Analyze {
            task,
            context,
            files,
            raw,
        } => {
            let config = ReasoningConfig::from_env()?;
            let client = GeminiClient::new(&config)?;
            let pipeline =
                AnalysisPipeline::new(Arc::new(client)).with_temperature(config.temperature);
            cmd_analyze(AnalysisSession::new(pipeline), task, context, &files, raw).await
        }
    }
}

async fn cmd_analyze(
    session: AnalysisSession,
    task: TaskType,
    context: String,
    files: &[PathBuf],
    raw: bool,
) -> Result<String, CliError> {
    session.set_task(task)?;
    session.set_context(context)?;
    for path in files {
        session.add_artifact(load_artifact(path).await?)?;
    }

    tracing::info!(task = task.as_str(), files = files.len(), "Submitting analysis");
    let report = session.submit().await?;

    if raw {
        Ok(serde_json::to_string_pretty(&report)?)
    } else {
        Ok(render_summary(&report))
    }
}

fn push_list(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "  {title}:");
    for item in items {
        let _ = writeln!(out, "    - {item}");
    }
}

/// Human-readable report, sections in display order.
pub fn render_summary(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let risk = &report.risk_assessment;

    let _ = writeln!(out, "TASK: {}", report.task);
    let _ = writeln!(
        out,
        "RISK: {} ({})",
        risk.overall_risk_level.as_str(),
        risk.likely_pathogen_class
    );
    if let Some(strength) = report.highest_signal_strength() {
        let _ = writeln!(out, "STRONGEST SIGNAL: {}", strength.as_str());
    }
    let _ = writeln!(out, "  {}", risk.justification);
    push_list(&mut out, "Key uncertainties", &risk.key_uncertainties);

    let _ = writeln!(out, "\nSIGNALS ({})", report.signals.len());
    for signal in &report.signals {
        let _ = writeln!(
            out,
            "  [{}|{}] {}",
            signal.signal_type.as_str(),
            signal.signal_strength.as_str(),
            signal.source_description
        );
        let place: Vec<&str> = [&signal.location, &signal.timeframe, &signal.suspected_condition]
            .into_iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .collect();
        if !place.is_empty() {
            let _ = writeln!(out, "    {}", place.join(" · "));
        }
        let _ = writeln!(out, "    {}", signal.reasoning);
    }

    let scenario = &report.scenario;
    let _ = writeln!(out, "\nSCENARIO ({} days)", scenario.time_horizon_days);
    let _ = writeln!(out, "  Best case: {}", scenario.best_case);
    let _ = writeln!(out, "  Most likely: {}", scenario.most_likely_course);
    let _ = writeln!(out, "  Worst case: {}", scenario.worst_case);
    push_list(&mut out, "Critical triggers", &scenario.critical_triggers);

    let mgtc = &report.mgtc_analysis;
    let _ = writeln!(out, "\nMGTC");
    for (label, cost) in [
        ("Information", &mgtc.information_cost),
        ("Bargaining", &mgtc.bargaining_cost),
        ("Enforcement", &mgtc.enforcement_cost),
    ] {
        let _ = writeln!(out, "  {label} cost {:.1}/10: {}", cost.score, cost.summary);
    }
    push_list(&mut out, "Top governance risks", &mgtc.top_governance_risks);
    push_list(&mut out, "Opportunities", &mgtc.opportunities_for_improvement);

    let coordination = &report.international_coordination;
    let _ = writeln!(out, "\nINTERNATIONAL COORDINATION");
    push_list(&mut out, "Key actors", &coordination.key_actors);
    push_list(&mut out, "Challenges", &coordination.coordination_challenges);
    push_list(&mut out, "Opportunities", &coordination.opportunities);

    let _ = writeln!(out, "\nRECOMMENDED ACTIONS");
    for action in report.actions_by_priority() {
        let _ = writeln!(
            out,
            "  [{}] {}: {}",
            action.priority.as_str(),
            action.domain,
            action.action
        );
        let _ = writeln!(out, "    {}", action.rationale);
    }

    let briefings = &report.briefings;
    let _ = writeln!(out, "\nBRIEFINGS");
    for (label, text) in [
        ("Minister", &briefings.minister_brief),
        ("Public", &briefings.public_message),
        ("Partners", &briefings.partner_note),
    ] {
        if !text.is_empty() {
            let _ = writeln!(out, "  {label}: {text}");
        }
    }

    out.trim_end().to_string()
}
